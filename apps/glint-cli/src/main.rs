use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use glint_camera::CameraController;
use glint_common::Extent2d;
use glint_input::{InputEvent, Key};
use glint_render::recording::{RecordingDevice, RecordingExecutor, TraceEvent};
use glint_render::{
    AttachmentFormat, FramePhase, FramePipeline, FrameStats, MeshId, PipelineConfig,
    RenderContext, RenderDevice, RenderTargetManager, SceneDrawList, TargetConfig,
    create_standard_targets,
};
use glint_viewer::ViewerConfig;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Simulated frame time.
const FRAME_DT: f32 = 1.0 / 60.0;

#[derive(Parser)]
#[command(name = "glint-cli", about = "Headless tooling for the glint renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default pipeline layout
    Info,
    /// Print the default viewer config as YAML
    DefaultConfig,
    /// Check a viewer config file without opening a window
    ValidateConfig {
        /// YAML config to check
        path: PathBuf,
    },
    /// Run frames through the recording backend and print what was drawn
    Simulate {
        /// Number of frames to run
        #[arg(short, long, default_value = "1")]
        frames: u64,
        /// Viewer config supplying passes and sizes
        #[arg(long)]
        config: Option<PathBuf>,
        /// Keys tapped before the first frame
        #[arg(long, value_enum)]
        press: Vec<TapKey>,
        /// Emit the full trace as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TapKey {
    F1,
    F2,
    F3,
    Escape,
}

impl From<TapKey> for Key {
    fn from(key: TapKey) -> Self {
        match key {
            TapKey::F1 => Key::F1,
            TapKey::F2 => Key::F2,
            TapKey::F3 => Key::F3,
            TapKey::Escape => Key::Escape,
        }
    }
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    sample_count: u32,
    allocations: Vec<String>,
    frames: Vec<FrameStats>,
    /// Frame on which a quit was requested, if any.
    quit_at: Option<u64>,
    trace: Vec<TraceEvent>,
}

fn simulate(config: &ViewerConfig, frames: u64, taps: &[TapKey]) -> Result<SimulationReport> {
    let mut device = RecordingDevice::default();
    let mut passes = config.passes;
    let mut sample_count = 1;
    if passes.multisample {
        let formats = [
            AttachmentFormat::from(config.color_format),
            AttachmentFormat::Depth24PlusStencil8,
        ];
        sample_count = device
            .limits()
            .best_sample_count(&formats, config.msaa_samples);
        passes.multisample = sample_count > 1;
    }

    let extent = Extent2d::new(config.window.width, config.window.height);
    let mut manager = RenderTargetManager::new();
    let targets = create_standard_targets(
        &mut manager,
        &mut device,
        &TargetConfig {
            extent,
            msaa_samples: sample_count,
            shadow_map_size: config.shadow_map_size,
            color_format: config.color_format,
        },
        &passes,
    )?;
    let mut pipeline = FramePipeline::build(
        PipelineConfig {
            passes,
            clear_color: config.clear_color,
        },
        targets,
        &manager,
    )?;

    let camera = CameraController::new(config.camera, extent.aspect_ratio());
    // Recording draws by id only, so a configured model stands in as one part.
    let parts: &[MeshId] = if config.assets.model.is_some() { &[MeshId(1)] } else { &[] };
    let scene = SceneDrawList::containers(parts, !parts.is_empty());
    let mut ctx = RenderContext::new(camera, scene, passes);
    for &tap in taps {
        ctx.push_event(InputEvent::KeyDown(tap.into()));
        ctx.push_event(InputEvent::KeyUp(tap.into()));
    }

    let mut executor = RecordingExecutor::new();
    let mut report = SimulationReport {
        sample_count,
        allocations: device.allocations().to_vec(),
        frames: Vec::new(),
        quit_at: None,
        trace: Vec::new(),
    };
    for frame in 0..frames {
        let outcome = ctx.frame(FRAME_DT);
        if outcome.quit {
            report.quit_at = Some(frame);
            break;
        }
        if ctx.passes() != pipeline.pass_set() {
            tracing::debug!("frame {frame}: passes now {:?}", ctx.passes());
            pipeline.reconfigure(ctx.passes(), &manager)?;
        }
        report.frames.push(pipeline.execute(&ctx, &mut executor)?);
    }
    report.trace = executor.take_events();
    manager.release_all();
    Ok(report)
}

fn phase_list(phases: &[FramePhase]) -> String {
    phases
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            let config = ViewerConfig::default();
            println!("glint-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("phases: {}", phase_list(&FramePhase::ALL));
            println!("default passes: {:?}", config.passes);
            println!(
                "default targets: {}x{} {:?}, {}x MSAA, shadow map {}",
                config.window.width,
                config.window.height,
                config.color_format,
                config.msaa_samples,
                config.shadow_map_size
            );
            println!("toggles: F1 shadows, F2 stencil outline, F3 post-process");
        }
        Commands::DefaultConfig => {
            print!("{}", ViewerConfig::default().to_yaml()?);
        }
        Commands::ValidateConfig { path } => {
            let config = ViewerConfig::load(&path)?;
            config.validate()?;
            println!(
                "{}: OK ({}x{}, {}x MSAA, passes {:?})",
                path.display(),
                config.window.width,
                config.window.height,
                config.msaa_samples,
                config.passes
            );
        }
        Commands::Simulate {
            frames,
            config,
            press,
            json,
        } => {
            let config = match config {
                Some(path) => ViewerConfig::load(path)?,
                None => ViewerConfig::default(),
            };
            config.validate()?;
            let report = simulate(&config, frames, &press)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} targets allocated ({}), {}x MSAA",
                    report.allocations.len(),
                    report.allocations.join(", "),
                    report.sample_count
                );
                for stats in &report.frames {
                    println!(
                        "frame {}: {} ({} draws)",
                        stats.frame_index,
                        phase_list(&stats.passes),
                        stats.draw_calls
                    );
                }
                if let Some(frame) = report.quit_at {
                    println!("quit requested before frame {frame}");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_simulation_runs_every_phase() {
        let report = simulate(&ViewerConfig::default(), 2, &[]).unwrap();
        assert_eq!(report.sample_count, 4);
        assert_eq!(report.frames.len(), 2);
        assert_eq!(report.frames[1].frame_index, 1);
        assert_eq!(report.frames[0].passes, FramePhase::ALL.to_vec());
        assert_eq!(report.frames[0].draw_calls, 26);
        let presents = report
            .trace
            .iter()
            .filter(|e| matches!(e, TraceEvent::Present { .. }))
            .count();
        assert_eq!(presents, 2);
    }

    #[test]
    fn tapping_f1_drops_the_shadow_pass() {
        let report = simulate(&ViewerConfig::default(), 1, &[TapKey::F1]).unwrap();
        assert!(!report.frames[0].passes.contains(&FramePhase::Shadow));
        assert_eq!(report.frames[0].draw_calls, 15);
    }

    #[test]
    fn escape_quits_before_rendering() {
        let report = simulate(&ViewerConfig::default(), 5, &[TapKey::Escape]).unwrap();
        assert_eq!(report.quit_at, Some(0));
        assert!(report.frames.is_empty());
        assert!(report.trace.is_empty());
    }

    #[test]
    fn unsupported_sample_count_falls_back() {
        let config = ViewerConfig {
            msaa_samples: 16,
            ..ViewerConfig::default()
        };
        let report = simulate(&config, 1, &[]).unwrap();
        assert_eq!(report.sample_count, 4);
    }

    #[test]
    fn config_file_drives_the_pass_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"msaa_samples: 1\npasses:\n  multisample: false\n  post_process: false\n",
        )
        .unwrap();
        let config = ViewerConfig::load(file.path()).unwrap();
        let report = simulate(&config, 1, &[]).unwrap();
        assert_eq!(report.sample_count, 1);
        assert!(!report.frames[0].passes.contains(&FramePhase::Resolve));
        assert!(report.allocations.iter().all(|label| label != "scene-msaa"));
    }

    #[test]
    fn report_serializes_trace_ops() {
        let report = simulate(&ViewerConfig::default(), 1, &[]).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["trace"][0]["op"], "begin_pass");
        assert_eq!(json["frames"][0]["draw_calls"], 26);
    }

    #[test]
    fn cli_parses_repeated_taps() {
        let cli = Cli::parse_from(["glint-cli", "simulate", "--press", "f1", "--press", "f3"]);
        match cli.command {
            Commands::Simulate { press, frames, .. } => {
                assert_eq!(press, vec![TapKey::F1, TapKey::F3]);
                assert_eq!(frames, 1);
            }
            _ => panic!("expected simulate"),
        }
    }
}

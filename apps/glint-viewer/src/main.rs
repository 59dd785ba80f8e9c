mod app;

use anyhow::Result;
use clap::Parser;
use glint_viewer::ViewerConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use winit::event_loop::{ControlFlow, EventLoop};

#[derive(Parser)]
#[command(name = "glint-viewer", about = "Glint interactive scene viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML config file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// MSAA sample count (1 disables multisampling)
    #[arg(long)]
    msaa: Option<u32>,

    /// Start with the shadow pass disabled
    #[arg(long)]
    no_shadows: bool,

    /// Start with the post-process pass disabled
    #[arg(long)]
    no_post: bool,

    /// Start with the stencil outline enabled
    #[arg(long)]
    outline: bool,

    /// OBJ model drawn at the center of the scene
    #[arg(long)]
    model: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut ViewerConfig) {
        if let Some(samples) = self.msaa {
            config.msaa_samples = samples;
            config.passes.multisample = samples > 1;
        }
        if self.no_shadows {
            config.passes.shadow = false;
        }
        if self.no_post {
            config.passes.post_process = false;
        }
        if self.outline {
            config.passes.stencil_outline = true;
        }
        if let Some(model) = &self.model {
            config.assets.model = Some(model.clone());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    tracing::info!(
        "glint-viewer starting: {}x{}, {}x MSAA, {:?}",
        config.window.width,
        config.window.height,
        config.msaa_samples,
        config.passes
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = app::Viewer::new(config);
    event_loop.run_app(&mut viewer)?;

    match viewer.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "glint-viewer",
            "--msaa",
            "1",
            "--no-shadows",
            "--outline",
            "--model",
            "models/backpack.obj",
        ]);
        let mut config = ViewerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.msaa_samples, 1);
        assert!(!config.passes.multisample);
        assert!(!config.passes.shadow);
        assert!(config.passes.stencil_outline);
        assert!(config.passes.post_process);
        assert_eq!(config.assets.model, Some(PathBuf::from("models/backpack.obj")));
    }

    #[test]
    fn no_flags_keep_defaults() {
        let cli = Cli::parse_from(["glint-viewer"]);
        let mut config = ViewerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, ViewerConfig::default());
    }
}

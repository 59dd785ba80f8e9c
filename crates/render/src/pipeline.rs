//! Per-frame pass sequencing.
//!
//! # Invariants
//! - Phases run in the fixed order Shadow, Color, Resolve, Post, Present and
//!   never move backwards within a frame.
//! - A pass only reads targets written by an earlier pass of the same frame.

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::lighting::SceneLights;
use crate::scene::{DrawSink, SceneDrawList};
use crate::target::{RenderTargetManager, TargetHandle, TargetSet};
use glam::{Mat4, Vec3};
use glint_input::PassToggle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which optional pipeline features are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassSet {
    pub shadow: bool,
    pub stencil_outline: bool,
    pub post_process: bool,
    pub multisample: bool,
}

impl Default for PassSet {
    fn default() -> Self {
        Self {
            shadow: true,
            stencil_outline: false,
            post_process: true,
            multisample: true,
        }
    }
}

impl PassSet {
    /// Flip a runtime-toggleable feature. Multisampling is fixed at startup.
    pub fn toggle(&mut self, toggle: PassToggle) {
        match toggle {
            PassToggle::Shadows => self.shadow = !self.shadow,
            PassToggle::StencilOutline => self.stencil_outline = !self.stencil_outline,
            PassToggle::PostProcess => self.post_process = !self.post_process,
        }
    }
}

/// The five per-frame phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FramePhase {
    Shadow,
    Color,
    Resolve,
    Post,
    Present,
}

impl FramePhase {
    pub const ALL: [FramePhase; 5] = [
        FramePhase::Shadow,
        FramePhase::Color,
        FramePhase::Resolve,
        FramePhase::Post,
        FramePhase::Present,
    ];
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FramePhase::Shadow => "shadow",
            FramePhase::Color => "color",
            FramePhase::Resolve => "resolve",
            FramePhase::Post => "post",
            FramePhase::Present => "present",
        };
        f.write_str(name)
    }
}

/// Where a pass renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRef {
    Offscreen(TargetHandle),
    /// The swapchain image for this frame.
    Surface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderRef {
    ShadowDepth,
    /// Phong lighting with shadows; the outline shader rides along when the
    /// draw source asks for outlines.
    Lit,
    /// Tone map and gamma.
    Post,
    Passthrough,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSource {
    /// Shadow casters from the light's viewpoint.
    SceneDepth,
    Scene { outlines: bool },
    /// Hardware multisample resolve, no draws.
    Resolve,
    /// One full-screen triangle sampling a target.
    FullscreenTriangle,
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearPolicy {
    Load,
    Depth(f32),
    Color([f32; 4]),
    All {
        color: [f32; 4],
        depth: f32,
        stencil: u32,
    },
}

/// One step of the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    pub phase: FramePhase,
    pub target: TargetRef,
    pub shader: ShaderRef,
    pub draw: DrawSource,
    pub clear: ClearPolicy,
    /// Targets sampled or resolved from; each must be written earlier in
    /// the frame.
    pub reads: Vec<TargetRef>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub passes: PassSet,
    pub clear_color: [f32; 3],
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            passes: PassSet::default(),
            clear_color: [0.1, 0.15, 0.15],
        }
    }
}

/// Per-frame data handed to the executor.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub frame_index: u64,
    pub time: f32,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_position: Vec3,
    pub light_view_projection: Mat4,
    pub passes: PassSet,
    pub lights: &'a SceneLights,
    pub scene: &'a SceneDrawList,
}

impl FrameInputs<'_> {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Backend that carries out passes.
pub trait PassExecutor {
    /// Bind the pass target and apply its clear policy.
    fn begin_pass(&mut self, pass: &Pass, frame: &FrameInputs<'_>) -> Result<(), RenderError>;

    /// Issue the pass's draws. Returns the number of draw calls.
    fn run_pass(&mut self, pass: &Pass, frame: &FrameInputs<'_>) -> Result<u32, RenderError>;

    /// Unbind the target; for Present, hand the frame to the display.
    fn end_pass(&mut self, pass: &Pass, frame: &FrameInputs<'_>) -> Result<(), RenderError>;
}

/// Feed the scene draws a pass asks for into `sink`.
pub fn draw_pass_geometry(pass: &Pass, frame: &FrameInputs<'_>, sink: &mut dyn DrawSink) -> u32 {
    match pass.draw {
        DrawSource::SceneDepth => frame.scene.draw_depth_only(sink, frame.time),
        DrawSource::Scene { outlines } => {
            let mut count = frame.scene.draw(sink, frame.time);
            if outlines {
                count += frame.scene.draw_outlines(sink, frame.time);
            }
            count
        }
        DrawSource::Resolve | DrawSource::FullscreenTriangle | DrawSource::Nothing => 0,
    }
}

/// What one frame did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub frame_index: u64,
    pub passes: Vec<FramePhase>,
    pub draw_calls: u32,
}

/// Ordered pass list over a fixed target set.
#[derive(Debug, Clone)]
pub struct FramePipeline {
    config: PipelineConfig,
    targets: TargetSet,
    passes: Vec<Pass>,
    frame_index: u64,
}

impl FramePipeline {
    /// Derive the pass list from the enabled features and check the targets
    /// can support it.
    pub fn build<T>(
        config: PipelineConfig,
        targets: TargetSet,
        manager: &RenderTargetManager<T>,
    ) -> Result<Self, RenderError> {
        check_targets(&config.passes, &targets, manager)?;
        let passes = derive_passes(&config, &targets);
        tracing::info!(
            "frame pipeline built: {}",
            passes
                .iter()
                .map(|p| p.phase.to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(Self {
            config,
            targets,
            passes,
            frame_index: 0,
        })
    }

    /// Rebuild for a new feature set, keeping targets and the frame counter.
    pub fn reconfigure<T>(
        &mut self,
        passes: PassSet,
        manager: &RenderTargetManager<T>,
    ) -> Result<(), RenderError> {
        let config = PipelineConfig {
            passes,
            ..self.config
        };
        let rebuilt = Self::build(config, self.targets, manager)?;
        self.config = rebuilt.config;
        self.passes = rebuilt.passes;
        Ok(())
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn pass_set(&self) -> PassSet {
        self.config.passes
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Run every pass once, in order.
    pub fn execute<E: PassExecutor>(
        &mut self,
        ctx: &RenderContext,
        executor: &mut E,
    ) -> Result<FrameStats, RenderError> {
        let frame = ctx.frame_inputs(self.frame_index, self.config.passes);
        let mut stats = FrameStats {
            frame_index: self.frame_index,
            passes: Vec::with_capacity(self.passes.len()),
            draw_calls: 0,
        };
        let mut written: Vec<TargetRef> = Vec::with_capacity(self.passes.len());
        let mut last: Option<FramePhase> = None;

        for pass in &self.passes {
            if let Some(previous) = last {
                if pass.phase <= previous {
                    return Err(RenderError::OrderViolation {
                        phase: pass.phase,
                        reason: format!("scheduled after {previous}"),
                    });
                }
            }
            if let Some(missing) = pass.reads.iter().find(|r| !written.contains(r)) {
                return Err(RenderError::OrderViolation {
                    phase: pass.phase,
                    reason: format!("reads {missing:?} before it is written"),
                });
            }

            executor.begin_pass(pass, &frame)?;
            let draws = executor.run_pass(pass, &frame)?;
            executor.end_pass(pass, &frame)?;
            tracing::trace!("frame {} {}: {draws} draws", self.frame_index, pass.phase);

            stats.draw_calls += draws;
            stats.passes.push(pass.phase);
            written.push(pass.target);
            last = Some(pass.phase);
        }

        self.frame_index += 1;
        Ok(stats)
    }
}

fn config_error(message: impl Into<String>) -> RenderError {
    RenderError::Pipeline(message.into())
}

fn check_targets<T>(
    passes: &PassSet,
    targets: &TargetSet,
    manager: &RenderTargetManager<T>,
) -> Result<(), RenderError> {
    let color = manager
        .spec(targets.color)
        .map_err(|_| config_error("scene color target is missing"))?;
    if !color.attachments.color || !color.attachments.depth {
        return Err(config_error(format!(
            "scene target '{}' needs color and depth attachments",
            color.label
        )));
    }
    if passes.stencil_outline && !color.attachments.stencil {
        return Err(config_error(format!(
            "stencil outline needs a stencil attachment on '{}'",
            color.label
        )));
    }

    if passes.shadow {
        let handle = targets
            .shadow
            .ok_or_else(|| config_error("shadows enabled without a shadow target"))?;
        let shadow = manager
            .spec(handle)
            .map_err(|_| config_error("shadow target is missing"))?;
        if !shadow.attachments.depth || shadow.attachments.color || !shadow.sampled {
            return Err(config_error(format!(
                "shadow target '{}' must be a sampled depth-only target",
                shadow.label
            )));
        }
    }

    if passes.multisample {
        if !color.is_multisampled() {
            return Err(config_error(format!(
                "multisample enabled but '{}' has {} sample",
                color.label, color.sample_count
            )));
        }
        let handle = targets
            .resolve
            .ok_or_else(|| config_error("multisample enabled without a resolve target"))?;
        let resolve = manager
            .spec(handle)
            .map_err(|_| config_error("resolve target is missing"))?;
        if resolve.is_multisampled()
            || !resolve.attachments.color
            || !resolve.sampled
            || resolve.extent != color.extent
            || resolve.color_format != color.color_format
        {
            return Err(config_error(format!(
                "resolve target '{}' does not match '{}'",
                resolve.label, color.label
            )));
        }
    } else if color.is_multisampled() || !color.sampled {
        return Err(config_error(format!(
            "multisample disabled but '{}' cannot be sampled directly",
            color.label
        )));
    }
    Ok(())
}

fn derive_passes(config: &PipelineConfig, targets: &TargetSet) -> Vec<Pass> {
    let set = config.passes;
    let [r, g, b] = config.clear_color;
    let color_target = TargetRef::Offscreen(targets.color);
    let mut passes = Vec::with_capacity(5);

    let shadow = targets.shadow.filter(|_| set.shadow).map(TargetRef::Offscreen);
    if let Some(shadow) = shadow {
        passes.push(Pass {
            phase: FramePhase::Shadow,
            target: shadow,
            shader: ShaderRef::ShadowDepth,
            draw: DrawSource::SceneDepth,
            clear: ClearPolicy::Depth(1.0),
            reads: Vec::new(),
        });
    }

    passes.push(Pass {
        phase: FramePhase::Color,
        target: color_target,
        shader: ShaderRef::Lit,
        draw: DrawSource::Scene {
            outlines: set.stencil_outline,
        },
        clear: ClearPolicy::All {
            color: [r, g, b, 1.0],
            depth: 1.0,
            stencil: 0,
        },
        reads: shadow.into_iter().collect(),
    });

    let scene_texture = match targets.resolve.filter(|_| set.multisample) {
        Some(resolve) => {
            let resolve = TargetRef::Offscreen(resolve);
            passes.push(Pass {
                phase: FramePhase::Resolve,
                target: resolve,
                shader: ShaderRef::None,
                draw: DrawSource::Resolve,
                clear: ClearPolicy::Load,
                reads: vec![color_target],
            });
            resolve
        }
        None => color_target,
    };

    passes.push(Pass {
        phase: FramePhase::Post,
        target: TargetRef::Surface,
        shader: if set.post_process {
            ShaderRef::Post
        } else {
            ShaderRef::Passthrough
        },
        draw: DrawSource::FullscreenTriangle,
        clear: ClearPolicy::Color([0.0, 0.0, 0.0, 1.0]),
        reads: vec![scene_texture],
    });

    passes.push(Pass {
        phase: FramePhase::Present,
        target: TargetRef::Surface,
        shader: ShaderRef::None,
        draw: DrawSource::Nothing,
        clear: ClearPolicy::Load,
        reads: vec![TargetRef::Surface],
    });

    passes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{RecordingDevice, RecordingExecutor};
    use crate::target::{
        Attachments, ColorFormat, TargetConfig, TargetSpec, create_standard_targets,
    };
    use glint_common::Extent2d;

    fn setup(passes: PassSet) -> (RenderTargetManager<u32>, TargetSet) {
        let mut device = RecordingDevice::default();
        let mut manager = RenderTargetManager::new();
        let config = TargetConfig {
            extent: Extent2d::new(640, 480),
            msaa_samples: 4,
            shadow_map_size: 1024,
            color_format: ColorFormat::Rgba16Float,
        };
        let targets = create_standard_targets(&mut manager, &mut device, &config, &passes).unwrap();
        (manager, targets)
    }

    fn phases(pipeline: &FramePipeline) -> Vec<FramePhase> {
        pipeline.passes().iter().map(|p| p.phase).collect()
    }

    #[test]
    fn full_pipeline_has_all_phases_in_order() {
        let (manager, targets) = setup(PassSet::default());
        let pipeline = FramePipeline::build(PipelineConfig::default(), targets, &manager).unwrap();
        assert_eq!(phases(&pipeline), FramePhase::ALL.to_vec());

        let color = &pipeline.passes()[1];
        assert_eq!(color.reads, vec![TargetRef::Offscreen(targets.shadow.unwrap())]);
        let post = &pipeline.passes()[3];
        assert_eq!(post.reads, vec![TargetRef::Offscreen(targets.resolve.unwrap())]);
        assert_eq!(post.shader, ShaderRef::Post);
    }

    #[test]
    fn disabled_features_drop_passes() {
        let passes = PassSet {
            shadow: false,
            multisample: false,
            post_process: false,
            ..PassSet::default()
        };
        let (manager, targets) = setup(passes);
        let config = PipelineConfig {
            passes,
            ..PipelineConfig::default()
        };
        let pipeline = FramePipeline::build(config, targets, &manager).unwrap();
        assert_eq!(
            phases(&pipeline),
            vec![FramePhase::Color, FramePhase::Post, FramePhase::Present]
        );
        let post = &pipeline.passes()[1];
        assert_eq!(post.reads, vec![TargetRef::Offscreen(targets.color)]);
        assert_eq!(post.shader, ShaderRef::Passthrough);
        assert!(pipeline.passes()[0].reads.is_empty());
    }

    #[test]
    fn multisample_needs_multisampled_color() {
        let mut device = RecordingDevice::default();
        let mut manager = RenderTargetManager::new();
        let extent = Extent2d::new(64, 64);
        let color = manager
            .create_target(
                &mut device,
                TargetSpec::multisample_color(extent, 1, ColorFormat::Rgba16Float),
            )
            .unwrap();
        let resolve = manager
            .create_target(&mut device, TargetSpec::resolve(extent, ColorFormat::Rgba16Float))
            .unwrap();
        let targets = TargetSet {
            shadow: None,
            color,
            resolve: Some(resolve),
        };
        let config = PipelineConfig {
            passes: PassSet {
                shadow: false,
                ..PassSet::default()
            },
            ..PipelineConfig::default()
        };
        let err = FramePipeline::build(config, targets, &manager).unwrap_err();
        assert!(matches!(err, RenderError::Pipeline(msg) if msg.contains("1 sample")));
    }

    #[test]
    fn outline_needs_stencil() {
        let mut device = RecordingDevice::default();
        let mut manager = RenderTargetManager::new();
        let mut spec = TargetSpec::scene_color(Extent2d::new(64, 64), ColorFormat::Rgba16Float);
        spec.attachments = Attachments {
            color: true,
            depth: true,
            stencil: false,
        };
        let color = manager.create_target(&mut device, spec).unwrap();
        let targets = TargetSet {
            shadow: None,
            color,
            resolve: None,
        };
        let config = PipelineConfig {
            passes: PassSet {
                shadow: false,
                multisample: false,
                stencil_outline: true,
                post_process: true,
            },
            ..PipelineConfig::default()
        };
        let err = FramePipeline::build(config, targets, &manager).unwrap_err();
        assert!(matches!(err, RenderError::Pipeline(msg) if msg.contains("stencil")));
    }

    #[test]
    fn shadows_without_target_fail() {
        let (manager, mut targets) = setup(PassSet::default());
        targets.shadow = None;
        assert!(matches!(
            FramePipeline::build(PipelineConfig::default(), targets, &manager),
            Err(RenderError::Pipeline(_))
        ));
    }

    #[test]
    fn reconfigure_toggles_shadow_pass() {
        let (manager, targets) = setup(PassSet::default());
        let mut pipeline =
            FramePipeline::build(PipelineConfig::default(), targets, &manager).unwrap();
        let mut set = pipeline.pass_set();
        set.toggle(PassToggle::Shadows);
        pipeline.reconfigure(set, &manager).unwrap();
        assert_eq!(pipeline.passes()[0].phase, FramePhase::Color);
        assert!(!pipeline.pass_set().shadow);
    }

    #[test]
    fn execute_rejects_out_of_order_passes() {
        let (manager, targets) = setup(PassSet::default());
        let mut pipeline =
            FramePipeline::build(PipelineConfig::default(), targets, &manager).unwrap();
        pipeline.passes.swap(0, 1);

        let ctx = RenderContext::default();
        let mut executor = RecordingExecutor::default();
        let err = pipeline.execute(&ctx, &mut executor).unwrap_err();
        assert!(matches!(
            err,
            RenderError::OrderViolation {
                phase: FramePhase::Color,
                ..
            }
        ));
        assert_eq!(pipeline.frame_index(), 0);
    }

    #[test]
    fn execute_rejects_unwritten_reads() {
        let (manager, targets) = setup(PassSet::default());
        let mut pipeline =
            FramePipeline::build(PipelineConfig::default(), targets, &manager).unwrap();
        pipeline.passes.remove(2);

        let ctx = RenderContext::default();
        let mut executor = RecordingExecutor::default();
        let err = pipeline.execute(&ctx, &mut executor).unwrap_err();
        match err {
            RenderError::OrderViolation { phase, reason } => {
                assert_eq!(phase, FramePhase::Post);
                assert!(reason.contains("before it is written"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pass_set_fills_missing_yaml_fields_with_defaults() {
        let passes: PassSet =
            serde_yaml::from_str("shadow: false\nstencil_outline: true\n").unwrap();
        assert_eq!(
            passes,
            PassSet {
                shadow: false,
                stencil_outline: true,
                ..PassSet::default()
            }
        );
        assert!(passes.post_process && passes.multisample);

        let yaml = serde_yaml::to_string(&passes).unwrap();
        assert_eq!(serde_yaml::from_str::<PassSet>(&yaml).unwrap(), passes);
    }
}

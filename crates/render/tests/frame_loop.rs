//! Drives whole frames through the recording backend.

use glint_camera::{CameraController, CameraSettings};
use glint_common::Extent2d;
use glint_input::{InputEvent, Key};
use glint_render::recording::{RecordingDevice, RecordingExecutor, TraceEvent};
use glint_render::{
    ColorFormat, DrawKind, FramePhase, FramePipeline, MeshId, PassSet, PipelineConfig,
    RenderContext, RenderError, RenderTargetManager, SceneDrawList, TargetConfig,
    create_standard_targets,
};

const EXTENT: Extent2d = Extent2d::new(800, 600);

fn target_config() -> TargetConfig {
    TargetConfig {
        extent: EXTENT,
        msaa_samples: 4,
        shadow_map_size: 1024,
        color_format: ColorFormat::Rgba16Float,
    }
}

struct Harness {
    manager: RenderTargetManager<u32>,
    pipeline: FramePipeline,
    ctx: RenderContext,
}

fn harness(passes: PassSet, model: bool) -> Harness {
    let mut device = RecordingDevice::default();
    let mut manager = RenderTargetManager::new();
    let targets = create_standard_targets(&mut manager, &mut device, &target_config(), &passes)
        .expect("targets");
    let config = PipelineConfig {
        passes,
        ..PipelineConfig::default()
    };
    let pipeline = FramePipeline::build(config, targets, &manager).expect("pipeline");
    let camera = CameraController::new(CameraSettings::default(), EXTENT.aspect_ratio());
    let parts: &[MeshId] = if model { &[MeshId(1)] } else { &[] };
    let scene = SceneDrawList::containers(parts, true);
    Harness {
        manager,
        pipeline,
        ctx: RenderContext::new(camera, scene, passes),
    }
}

#[test]
fn one_iteration_runs_every_phase_once_in_order() {
    let mut h = harness(PassSet::default(), false);
    let mut executor = RecordingExecutor::new();

    h.ctx.frame(1.0 / 60.0);
    let stats = h.pipeline.execute(&h.ctx, &mut executor).unwrap();

    assert_eq!(stats.frame_index, 0);
    assert_eq!(stats.passes, FramePhase::ALL.to_vec());
    assert_eq!(executor.phases(), FramePhase::ALL.to_vec());
    assert_eq!(
        executor
            .events()
            .iter()
            .filter(|e| matches!(e, TraceEvent::Present { .. }))
            .count(),
        1
    );

    // 10 containers + floor cast shadows; the lit pass adds 4 lamps.
    assert_eq!(executor.draws_in(FramePhase::Shadow).len(), 11);
    assert_eq!(executor.draws_in(FramePhase::Color).len(), 15);
    assert!(executor.draws_in(FramePhase::Resolve).is_empty());
    assert_eq!(stats.draw_calls, 26);
}

#[test]
fn floor_is_the_last_lit_draw() {
    let mut h = harness(PassSet::default(), false);
    let mut executor = RecordingExecutor::new();
    h.pipeline.execute(&h.ctx, &mut executor).unwrap();

    let draws = executor.draws_in(FramePhase::Color);
    let floor_slot = h.ctx.scene().len();
    assert_eq!(draws.last(), Some(&(DrawKind::Lit, floor_slot)));
}

#[test]
fn outlines_follow_lit_draws_in_color_pass() {
    let passes = PassSet {
        stencil_outline: true,
        ..PassSet::default()
    };
    let mut h = harness(passes, true);
    let mut executor = RecordingExecutor::new();
    h.pipeline.execute(&h.ctx, &mut executor).unwrap();

    let draws = executor.draws_in(FramePhase::Color);
    assert_eq!(draws.last().map(|d| d.0), Some(DrawKind::Outline));
    assert_eq!(draws.iter().filter(|d| d.0 == DrawKind::Outline).count(), 1);
}

#[test]
fn runtime_toggle_rebuilds_pipeline() {
    let mut h = harness(PassSet::default(), false);
    let mut executor = RecordingExecutor::new();

    h.ctx.push_event(InputEvent::KeyDown(Key::F1));
    h.ctx.frame(0.016);
    if h.ctx.passes() != h.pipeline.pass_set() {
        h.pipeline.reconfigure(h.ctx.passes(), &h.manager).unwrap();
    }
    let stats = h.pipeline.execute(&h.ctx, &mut executor).unwrap();
    assert_eq!(
        stats.passes,
        vec![
            FramePhase::Color,
            FramePhase::Resolve,
            FramePhase::Post,
            FramePhase::Present
        ]
    );
}

#[test]
fn frames_advance_the_counter() {
    let mut h = harness(PassSet::default(), false);
    let mut executor = RecordingExecutor::new();
    for expected in 0..3 {
        h.ctx.frame(0.016);
        let stats = h.pipeline.execute(&h.ctx, &mut executor).unwrap();
        assert_eq!(stats.frame_index, expected);
    }
    assert_eq!(h.pipeline.frame_index(), 3);
}

#[test]
fn device_failure_surfaces_as_device_error() {
    let mut h = harness(PassSet::default(), false);
    let mut executor = RecordingExecutor::new().fail_at(FramePhase::Post);
    let err = h.pipeline.execute(&h.ctx, &mut executor).unwrap_err();
    assert!(matches!(err, RenderError::Device(_)));
    assert_eq!(
        executor.phases(),
        vec![FramePhase::Shadow, FramePhase::Color, FramePhase::Resolve]
    );
}

#[test]
fn release_all_tears_down_targets() {
    let mut h = harness(PassSet::default(), false);
    assert_eq!(h.manager.len(), 3);
    assert_eq!(h.manager.release_all(), 3);
    assert!(h.manager.get(h.pipeline.targets().color).is_err());
}

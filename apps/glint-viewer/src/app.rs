use anyhow::{Context, Result, anyhow};
use glint_camera::CameraController;
use glint_common::Extent2d;
use glint_input::{InputEvent, Key};
use glint_render::{
    AttachmentFormat, FramePipeline, PipelineConfig, RenderContext, RenderDevice,
    RenderTargetManager, TargetConfig, create_standard_targets,
};
use glint_render_wgpu::{GpuContext, GpuTarget, RendererSettings, SceneRenderer};
use glint_viewer::{ViewerConfig, load_scene, referenced_meshes};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

/// Pixel scroll deltas (touchpads) per line of wheel scroll.
const PIXELS_PER_LINE: f64 = 20.0;
/// Frame deltas are clamped so a stall does not teleport the camera.
const MAX_FRAME_DT: f32 = 0.1;

pub fn map_key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyQ => Key::Q,
        KeyCode::Space => Key::Space,
        KeyCode::Escape => Key::Escape,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F4 => Key::F4,
        KeyCode::ShiftLeft => Key::LeftShift,
        _ => return None,
    })
}

/// Translate a window event into zero or one input events.
pub fn translate_window_event(event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state,
                    repeat: false,
                    ..
                },
            ..
        } => {
            let key = map_key(*code)?;
            Some(match state {
                ElementState::Pressed => InputEvent::KeyDown(key),
                ElementState::Released => InputEvent::KeyUp(key),
            })
        }
        WindowEvent::MouseWheel { delta, .. } => {
            let dy = match delta {
                MouseScrollDelta::LineDelta(_, y) => *y,
                MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_LINE) as f32,
            };
            Some(InputEvent::Scroll { dy })
        }
        WindowEvent::CursorLeft { .. } => Some(InputEvent::PointerReleased),
        WindowEvent::Focused(false) => Some(InputEvent::FocusLost),
        WindowEvent::CloseRequested => Some(InputEvent::CloseRequested),
        _ => None,
    }
}

/// Frames and draws over the last title refresh.
struct FrameCounter {
    since: Instant,
    frames: u32,
    draws: u32,
}

impl FrameCounter {
    fn new() -> Self {
        Self {
            since: Instant::now(),
            frames: 0,
            draws: 0,
        }
    }

    /// Record a frame; returns `(fps, draws per frame)` once a second.
    fn record(&mut self, draws: u32) -> Option<(f32, u32)> {
        self.frames += 1;
        self.draws = draws;
        let elapsed = self.since.elapsed();
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.since = Instant::now();
        self.frames = 0;
        Some((fps, self.draws))
    }
}

/// Everything that exists once the window and GPU are up.
///
/// Field order is drop order: the frame state goes before the GPU objects
/// it was created from.
struct Running {
    ctx: RenderContext,
    pipeline: FramePipeline,
    renderer: SceneRenderer,
    targets: RenderTargetManager<GpuTarget>,
    gpu: GpuContext,
    window: Arc<Window>,
}

impl Running {
    fn new(window: Arc<Window>, config: &ViewerConfig) -> Result<Self> {
        let size = window.inner_size();
        let extent = Extent2d::new(size.width.max(1), size.height.max(1));
        let mut gpu = GpuContext::new(window.clone(), extent)?;

        let mut passes = config.passes;
        let mut samples = 1;
        if passes.multisample {
            let formats = [
                AttachmentFormat::from(config.color_format),
                AttachmentFormat::Depth24PlusStencil8,
            ];
            samples = gpu.limits().best_sample_count(&formats, config.msaa_samples);
            if samples != config.msaa_samples {
                tracing::warn!(
                    "{}x MSAA unsupported, using {samples}x",
                    config.msaa_samples
                );
            }
            if samples == 1 {
                passes.multisample = false;
            }
        }

        let mut targets = RenderTargetManager::new();
        let target_config = TargetConfig {
            extent: gpu.size(),
            msaa_samples: samples,
            shadow_map_size: config.shadow_map_size,
            color_format: config.color_format,
        };
        let target_set = create_standard_targets(&mut targets, &mut gpu, &target_config, &passes)?;

        let loaded = load_scene(&config.assets)?;
        tracing::debug!("scene meshes: {:?}", referenced_meshes(&loaded.scene));

        let pipeline = FramePipeline::build(
            PipelineConfig {
                passes,
                clear_color: config.clear_color,
            },
            target_set,
            &targets,
        )?;
        let renderer = SceneRenderer::new(
            &gpu,
            &loaded.assets,
            &loaded.scene,
            &targets,
            &target_set,
            RendererSettings {
                exposure: config.exposure,
                gamma: config.gamma,
                ..RendererSettings::default()
            },
        )?;

        let info = gpu.adapter_info();
        tracing::info!(
            "{} ready on {}: {} meshes, {} draw slots, {samples}x MSAA",
            config.window.title,
            info.name,
            renderer.mesh_count(),
            renderer.instance_capacity()
        );

        let camera = CameraController::new(config.camera, gpu.size().aspect_ratio());
        let ctx = RenderContext::new(camera, loaded.scene, passes);

        Ok(Self {
            ctx,
            pipeline,
            renderer,
            targets,
            gpu,
            window,
        })
    }

    /// Input, simulation and one pass through the pipeline. Returns the
    /// number of draw calls, or `None` when the frame was skipped.
    fn frame(&mut self, dt: f32) -> Result<Option<u32>> {
        let passes = self.ctx.passes();
        if passes != self.pipeline.pass_set() {
            self.pipeline.reconfigure(passes, &self.targets)?;
        }

        let Some(mut frame) = self.renderer.begin_frame(&self.gpu, &self.targets)? else {
            return Ok(None);
        };
        let stats = self.pipeline.execute(&self.ctx, &mut frame)?;
        if !frame.presented() {
            return Err(anyhow!("frame {} was not presented", stats.frame_index));
        }
        tracing::trace!("{dt:.4}s frame: {stats:?}");
        Ok(Some(stats.draw_calls))
    }

    fn teardown(&mut self) {
        self.gpu.wait_idle();
        let released = self.targets.release_all();
        tracing::info!(
            "shut down after {} frames, released {released} targets",
            self.pipeline.frame_index()
        );
    }
}

pub struct Viewer {
    config: ViewerConfig,
    running: Option<Running>,
    pointer: (f64, f64),
    last_frame: Instant,
    counter: FrameCounter,
    /// Set when setup or a frame fails; `main` turns it into the exit code.
    error: Option<anyhow::Error>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            running: None,
            pointer: (0.0, 0.0),
            last_frame: Instant::now(),
            counter: FrameCounter::new(),
            error: None,
        }
    }

    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let window_config = &self.config.window;
        let attrs = Window::default_attributes()
            .with_title(&window_config.title)
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height))
            .with_resizable(false);
        let window = event_loop.create_window(attrs).context("creating window")?;

        // Pointer look works on raw motion, so hide and hold the cursor.
        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        if let Err(e) = grabbed {
            tracing::warn!("could not grab cursor: {e}");
        }
        window.set_cursor_visible(false);
        Ok(Arc::new(window))
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(MAX_FRAME_DT);
        self.last_frame = now;

        let Some(running) = self.running.as_mut() else {
            return;
        };
        let outcome = running.ctx.frame(dt);
        if outcome.quit {
            tracing::info!("close requested");
            event_loop.exit();
            return;
        }

        match running.frame(dt) {
            Ok(Some(draws)) => {
                if let Some((fps, draws)) = self.counter.record(draws) {
                    let passes = running.ctx.passes();
                    running.window.set_title(&format!(
                        "{} | {fps:.0} fps | {draws} draws | shadows {} | outline {} | post {}",
                        self.config.window.title,
                        on_off(passes.shadow),
                        on_off(passes.stencil_outline),
                        on_off(passes.post_process),
                    ));
                }
            }
            Ok(None) => {}
            Err(e) => self.fail(event_loop, e.context("rendering frame")),
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        let setup = self
            .create_window(event_loop)
            .and_then(|window| Running::new(window, &self.config));
        match setup {
            Ok(running) => {
                self.running = Some(running);
                self.last_frame = Instant::now();
            }
            Err(e) => self.fail(event_loop, e.context("viewer setup failed")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::RedrawRequested = event {
            self.redraw(event_loop);
            return;
        }
        let Some(running) = self.running.as_mut() else {
            return;
        };
        if let Some(input) = translate_window_event(&event) {
            running.ctx.push_event(input);
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            let Some(running) = self.running.as_mut() else {
                return;
            };
            // Accumulate into an unbounded virtual position, as with a
            // hidden, locked cursor.
            self.pointer.0 += delta.0;
            self.pointer.1 += delta.1;
            running.ctx.push_event(InputEvent::PointerMoved {
                x: self.pointer.0 as f32,
                y: self.pointer.1 as f32,
            });
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut running) = self.running.take() {
            running.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_keys_map() {
        assert_eq!(map_key(KeyCode::KeyW), Some(Key::W));
        assert_eq!(map_key(KeyCode::ShiftLeft), Some(Key::LeftShift));
        assert_eq!(map_key(KeyCode::F3), Some(Key::F3));
        assert_eq!(map_key(KeyCode::KeyZ), None);
    }

    #[test]
    fn window_events_translate() {
        assert_eq!(
            translate_window_event(&WindowEvent::CloseRequested),
            Some(InputEvent::CloseRequested)
        );
        assert_eq!(
            translate_window_event(&WindowEvent::Focused(false)),
            Some(InputEvent::FocusLost)
        );
        assert_eq!(translate_window_event(&WindowEvent::Focused(true)), None);
    }

    #[test]
    fn frame_counter_reports_once_per_second() {
        let mut counter = FrameCounter::new();
        assert_eq!(counter.record(10), None);
        counter.since -= Duration::from_secs(2);
        let (fps, draws) = counter.record(26).unwrap();
        assert_eq!(draws, 26);
        assert!(fps > 0.0 && fps < 2.0);
    }
}

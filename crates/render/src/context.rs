use crate::lighting::SceneLights;
use crate::pipeline::{FrameInputs, PassSet};
use crate::scene::SceneDrawList;
use glint_camera::{CameraController, MoveDirection};
use glint_input::{Action, Bindings, InputEvent, InputQueue, KeyTable, PassToggle};

/// Speed multiplier while the sprint action is held.
pub const SPRINT_MULTIPLIER: f32 = 2.5;

/// Result of draining the input queue for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputOutcome {
    pub events: usize,
    pub toggled: Vec<PassToggle>,
    pub quit: bool,
}

/// Everything the frame loop mutates between frames.
///
/// Owned by the loop and passed by reference; there is no global state.
#[derive(Debug)]
pub struct RenderContext {
    camera: CameraController,
    keys: KeyTable,
    queue: InputQueue,
    bindings: Bindings,
    passes: PassSet,
    scene: SceneDrawList,
    lights: SceneLights,
    time: f32,
    quit_requested: bool,
}

impl RenderContext {
    pub fn new(camera: CameraController, scene: SceneDrawList, passes: PassSet) -> Self {
        let mut ctx = Self {
            camera,
            keys: KeyTable::new(),
            queue: InputQueue::new(),
            bindings: Bindings::default(),
            passes,
            scene,
            lights: SceneLights::default(),
            time: 0.0,
            quit_requested: false,
        };
        ctx.follow_camera();
        ctx
    }

    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_lights(mut self, lights: SceneLights) -> Self {
        self.lights = lights;
        self.follow_camera();
        self
    }

    /// Queue an event for the next frame. Safe to call from window callbacks.
    pub fn push_event(&mut self, event: InputEvent) {
        self.queue.push(event);
    }

    /// Drain queued events into key state, camera and pass toggles.
    pub fn process_input(&mut self) -> InputOutcome {
        let mut outcome = InputOutcome::default();
        let events: Vec<InputEvent> = self.queue.drain().collect();
        outcome.events = events.len();

        for event in events {
            match event {
                InputEvent::KeyDown(key) => {
                    let repeat = self.keys.is_down(key);
                    self.keys.press(key);
                    if repeat {
                        continue;
                    }
                    match self.bindings.action_for(key) {
                        Some(Action::Toggle(toggle)) => {
                            self.passes.toggle(toggle);
                            outcome.toggled.push(toggle);
                            tracing::info!("{toggle:?} toggled: {:?}", self.passes);
                        }
                        Some(Action::Quit) => self.quit_requested = true,
                        _ => {}
                    }
                }
                InputEvent::KeyUp(key) => self.keys.release(key),
                InputEvent::PointerMoved { x, y } => self.camera.apply_pointer_position(x, y),
                InputEvent::Scroll { dy } => self.camera.apply_scroll(dy),
                InputEvent::PointerReleased => self.camera.reactivate(),
                InputEvent::FocusLost => {
                    self.keys.clear();
                    self.camera.reactivate();
                }
                InputEvent::CloseRequested => self.quit_requested = true,
            }
        }
        outcome.quit = self.quit_requested;
        outcome
    }

    /// Apply held movement, advance the camera animation and scene clock.
    pub fn advance(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let held = self.bindings.held_actions(&self.keys);
        let speed = if held.contains(&Action::Sprint) {
            self.camera.move_speed() * SPRINT_MULTIPLIER
        } else {
            self.camera.move_speed()
        };
        for action in held {
            let direction = match action {
                Action::MoveForward => MoveDirection::Forward,
                Action::MoveBackward => MoveDirection::Backward,
                Action::StrafeLeft => MoveDirection::Left,
                Action::StrafeRight => MoveDirection::Right,
                _ => continue,
            };
            self.camera.translate(direction, speed, dt);
        }
        self.camera.update(dt);
        self.time += dt;
        self.follow_camera();
    }

    /// One frame of input and simulation.
    pub fn frame(&mut self, dt: f32) -> InputOutcome {
        let outcome = self.process_input();
        self.advance(dt);
        outcome
    }

    fn follow_camera(&mut self) {
        let position = self.camera.camera().position;
        self.lights.attach_spot(position, self.camera.front());
    }

    /// Snapshot of everything the passes read this frame.
    pub fn frame_inputs(&self, frame_index: u64, passes: PassSet) -> FrameInputs<'_> {
        FrameInputs {
            frame_index,
            time: self.time,
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
            view_position: self.camera.camera().position,
            light_view_projection: self.lights.light_view_projection(),
            passes,
            lights: &self.lights,
            scene: &self.scene,
        }
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraController {
        &mut self.camera
    }

    pub fn keys(&self) -> &KeyTable {
        &self.keys
    }

    pub fn passes(&self) -> PassSet {
        self.passes
    }

    pub fn scene(&self) -> &SceneDrawList {
        &self.scene
    }

    pub fn lights(&self) -> &SceneLights {
        &self.lights
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(
            CameraController::default(),
            SceneDrawList::default(),
            PassSet::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use glint_input::Key;

    #[test]
    fn held_forward_moves_camera() {
        let mut ctx = RenderContext::default();
        ctx.push_event(InputEvent::KeyDown(Key::W));
        for _ in 0..3 {
            ctx.frame(0.1);
        }
        let position = ctx.camera().camera().position;
        assert!(position.abs_diff_eq(Vec3::new(0.0, 0.0, 1.5), 1e-4));
        assert!((ctx.time() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn toggles_fire_once_per_press() {
        let mut ctx = RenderContext::default();
        assert!(ctx.passes().shadow);
        ctx.push_event(InputEvent::KeyDown(Key::F1));
        // OS key repeat.
        ctx.push_event(InputEvent::KeyDown(Key::F1));
        let outcome = ctx.process_input();
        assert_eq!(outcome.toggled, vec![PassToggle::Shadows]);
        assert!(!ctx.passes().shadow);

        ctx.push_event(InputEvent::KeyUp(Key::F1));
        ctx.push_event(InputEvent::KeyDown(Key::F1));
        ctx.process_input();
        assert!(ctx.passes().shadow);
    }

    #[test]
    fn quit_on_escape_or_close() {
        let mut ctx = RenderContext::default();
        ctx.push_event(InputEvent::KeyDown(Key::Escape));
        assert!(ctx.process_input().quit);

        let mut ctx = RenderContext::default();
        ctx.push_event(InputEvent::CloseRequested);
        assert!(ctx.frame(0.016).quit);
    }

    #[test]
    fn focus_loss_releases_keys_and_rearms_pointer() {
        let mut ctx = RenderContext::default();
        ctx.push_event(InputEvent::KeyDown(Key::W));
        ctx.push_event(InputEvent::PointerMoved { x: 10.0, y: 10.0 });
        ctx.push_event(InputEvent::FocusLost);
        ctx.process_input();
        assert_eq!(ctx.keys().pressed_count(), 0);

        // First sample after refocus is swallowed.
        let yaw = ctx.camera().camera().yaw;
        ctx.push_event(InputEvent::PointerMoved { x: 500.0, y: 10.0 });
        ctx.process_input();
        assert_eq!(ctx.camera().camera().yaw, yaw);
    }

    #[test]
    fn spot_light_tracks_camera() {
        let mut ctx = RenderContext::default();
        ctx.push_event(InputEvent::KeyDown(Key::D));
        ctx.frame(0.5);
        assert_eq!(ctx.lights().spot.position, ctx.camera().camera().position);
        assert!(ctx.lights().spot.direction.abs_diff_eq(ctx.camera().front(), 1e-6));
    }

    #[test]
    fn events_wait_for_the_frame() {
        let mut ctx = RenderContext::default();
        ctx.push_event(InputEvent::Scroll { dy: 1.0 });
        assert_eq!(ctx.pending_events(), 1);
        assert_eq!(ctx.camera().fov(), 45.0);
        let outcome = ctx.frame(1.0);
        assert_eq!(outcome.events, 1);
        assert_eq!(ctx.pending_events(), 0);
        assert!((ctx.camera().fov() - 42.0).abs() < 1e-4);
    }
}

use crate::easing::FovEasing;
use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Pitch limit in degrees. Keeps the view from flipping over the poles.
pub const PITCH_LIMIT_DEGREES: f32 = 89.0;

/// Initial pose and tuning for a [`CameraController`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: Vec3,
    /// Degrees. -90 looks down -Z.
    pub yaw: f32,
    /// Degrees.
    pub pitch: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Units per second for keyboard movement.
    pub move_speed: f32,
    /// Degrees of rotation per pointer pixel at the widest field of view.
    pub sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            yaw: -90.0,
            pitch: 0.0,
            fov: 45.0,
            near: 0.1,
            far: 100.0,
            move_speed: 5.0,
            sensitivity: 0.12,
        }
    }
}

/// Direction for keyboard-driven translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
}

/// Perspective camera state: pose, animated field of view, projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Degrees.
    pub yaw: f32,
    /// Degrees, always within `±PITCH_LIMIT_DEGREES`.
    pub(crate) pitch: f32,
    pub(crate) fov: FovEasing,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Degrees. Only the controller writes this, keeping it clamped.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn fov(&self) -> &FovEasing {
        &self.fov
    }

    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }
}

/// Converts raw pointer, scroll and keyboard input into camera state.
///
/// Owns the [`Camera`] exclusively. Every operation clamps its inputs, so
/// none of them can fail.
#[derive(Debug, Clone)]
pub struct CameraController {
    camera: Camera,
    move_speed: f32,
    sensitivity: f32,
    /// Last absolute pointer sample. `None` until the first pointer event
    /// after (re)activation.
    last_pointer: Option<Vec2>,
    /// Set once the cold-start pointer sample has been swallowed.
    pointer_primed: bool,
    view: Mat4,
}

impl CameraController {
    pub fn new(settings: CameraSettings, aspect_ratio: f32) -> Self {
        let camera = Camera {
            position: settings.position,
            yaw: settings.yaw,
            pitch: settings
                .pitch
                .clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES),
            fov: FovEasing::settled(settings.fov),
            aspect_ratio,
            near: settings.near,
            far: settings.far,
        };
        let mut controller = Self {
            camera,
            move_speed: settings.move_speed,
            sensitivity: settings.sensitivity,
            last_pointer: None,
            pointer_primed: false,
            view: Mat4::IDENTITY,
        };
        controller.rebuild_view();
        controller
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    /// Current (animated) field of view in degrees.
    pub fn fov(&self) -> f32 {
        self.camera.fov.current()
    }

    pub fn front(&self) -> Vec3 {
        self.camera.front()
    }

    pub fn right(&self) -> Vec3 {
        self.camera.right()
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
            self.camera.aspect_ratio = aspect_ratio;
        }
    }

    /// Advance the zoom animation by `dt` seconds and rebuild the view matrix.
    pub fn update(&mut self, dt: f32) {
        self.camera.fov.advance(dt);
        self.rebuild_view();
    }

    /// Rotate by a pointer delta in pixels.
    ///
    /// The first call after creation or [`reactivate`](Self::reactivate) only
    /// arms the controller, so a cursor that enters the window far from
    /// where it left does not snap the view.
    pub fn apply_pointer_delta(&mut self, dx: f32, dy: f32) {
        if !self.pointer_primed {
            self.pointer_primed = true;
            tracing::trace!("pointer primed, first delta ({dx}, {dy}) ignored");
            return;
        }
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }

        let sensitivity = self.sensitivity * (crate::FOV_MAX_DEGREES / self.fov());
        self.camera.yaw += dx * sensitivity;
        self.camera.pitch = (self.camera.pitch - dy * sensitivity)
            .clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);
        self.rebuild_view();
    }

    /// Rotate from an absolute pointer position in pixels.
    pub fn apply_pointer_position(&mut self, x: f32, y: f32) {
        let sample = Vec2::new(x, y);
        let delta = match self.last_pointer.replace(sample) {
            Some(last) => sample - last,
            None => Vec2::ZERO,
        };
        self.apply_pointer_delta(delta.x, delta.y);
    }

    /// Zoom by a signed scroll amount. Positive scroll narrows the view.
    pub fn apply_scroll(&mut self, dy: f32) {
        self.camera.fov.retarget(dy);
        tracing::trace!(target_fov = self.camera.fov.target(), "zoom retargeted");
    }

    /// Translate along the view direction or its right vector.
    pub fn translate(&mut self, direction: MoveDirection, speed: f32, dt: f32) {
        let step = speed * dt;
        if !step.is_finite() {
            return;
        }
        let offset = match direction {
            MoveDirection::Forward => self.front() * step,
            MoveDirection::Backward => -self.front() * step,
            MoveDirection::Left => -self.right() * step,
            MoveDirection::Right => self.right() * step,
        };
        self.camera.position += offset;
        self.rebuild_view();
    }

    /// Re-arm the cold-start guard, e.g. after the cursor is recaptured.
    pub fn reactivate(&mut self) {
        self.last_pointer = None;
        self.pointer_primed = false;
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov().to_radians(),
            self.camera.aspect_ratio,
            self.camera.near,
            self.camera.far,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view
    }

    fn rebuild_view(&mut self) {
        let camera = &self.camera;
        self.view = Mat4::look_at_rh(camera.position, camera.position + camera.front(), Vec3::Y);
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(CameraSettings::default(), 4.0 / 3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FOV_MAX_DEGREES, FOV_MIN_DEGREES};

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let controller = CameraController::default();
        assert!(approx(controller.front(), Vec3::new(0.0, 0.0, -1.0)));
        assert!(approx(controller.right(), Vec3::X));
        let vp = controller.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn first_pointer_delta_is_swallowed() {
        let mut controller = CameraController::default();
        let before = *controller.camera();
        controller.apply_pointer_delta(5000.0, -5000.0);
        assert_eq!(controller.camera().yaw, before.yaw);
        assert_eq!(controller.camera().pitch(), before.pitch());

        controller.apply_pointer_delta(10.0, 0.0);
        assert!(controller.camera().yaw > before.yaw);
    }

    #[test]
    fn first_pointer_position_is_swallowed() {
        let mut controller = CameraController::default();
        controller.apply_pointer_position(400.0, 300.0);
        let yaw = controller.camera().yaw;
        controller.apply_pointer_position(410.0, 300.0);
        let expected = yaw + 10.0 * 0.12;
        assert!((controller.camera().yaw - expected).abs() < 1e-4);
    }

    #[test]
    fn reactivate_rearms_cold_start_guard() {
        let mut controller = CameraController::default();
        controller.apply_pointer_delta(0.0, 0.0);
        controller.reactivate();
        let yaw = controller.camera().yaw;
        controller.apply_pointer_delta(300.0, 0.0);
        assert_eq!(controller.camera().yaw, yaw);
    }

    #[test]
    fn pitch_stays_clamped() {
        let mut controller = CameraController::default();
        controller.apply_pointer_delta(0.0, 0.0);
        for dy in [-10_000.0, 3.0, -1.0, 25_000.0, -77.0, 1e6, -1e6] {
            controller.apply_pointer_delta(1.0, dy);
            let pitch = controller.camera().pitch();
            assert!((-PITCH_LIMIT_DEGREES..=PITCH_LIMIT_DEGREES).contains(&pitch));
        }
    }

    #[test]
    fn configured_pitch_is_clamped_on_construction() {
        let settings = CameraSettings {
            pitch: 120.0,
            ..CameraSettings::default()
        };
        let controller = CameraController::new(settings, 1.0);
        assert_eq!(controller.camera().pitch(), PITCH_LIMIT_DEGREES);
        assert!(controller.front().y < 1.0);
    }

    #[test]
    fn pointer_up_pitches_up() {
        let mut controller = CameraController::default();
        controller.apply_pointer_delta(0.0, 0.0);
        controller.apply_pointer_delta(0.0, -10.0);
        assert!(controller.camera().pitch() > 0.0);
    }

    #[test]
    fn sensitivity_rises_as_fov_narrows() {
        let mut wide = CameraController::default();
        wide.apply_pointer_delta(0.0, 0.0);
        wide.apply_pointer_delta(10.0, 0.0);
        let wide_turn = wide.camera().yaw + 90.0;

        let mut narrow = CameraController::new(
            CameraSettings {
                fov: 15.0,
                ..CameraSettings::default()
            },
            4.0 / 3.0,
        );
        narrow.apply_pointer_delta(0.0, 0.0);
        narrow.apply_pointer_delta(10.0, 0.0);
        let narrow_turn = narrow.camera().yaw + 90.0;

        assert!((wide_turn - 1.2).abs() < 1e-4);
        assert!((narrow_turn - 3.6).abs() < 1e-4);
    }

    #[test]
    fn scroll_target_stays_in_range() {
        let mut controller = CameraController::default();
        for dy in [1.0, 40.0, -3.0, -100.0, 7.5, 0.25, -0.5, 1e9, -1e9] {
            controller.apply_scroll(dy);
            let target = controller.camera().fov().target();
            assert!((FOV_MIN_DEGREES..=FOV_MAX_DEGREES).contains(&target));
            controller.update(0.1);
            let fov = controller.fov();
            assert!((FOV_MIN_DEGREES..=FOV_MAX_DEGREES).contains(&fov));
        }
    }

    #[test]
    fn zoom_eases_to_target() {
        let mut controller = CameraController::default();
        controller.apply_scroll(1000.0);
        while !controller.camera().fov().is_settled() {
            controller.update(0.07);
        }
        assert_eq!(controller.fov(), FOV_MIN_DEGREES);
    }

    #[test]
    fn forward_moves_land_on_expected_point() {
        let mut controller = CameraController::default();
        for _ in 0..3 {
            controller.translate(MoveDirection::Forward, 5.0, 0.1);
        }
        assert!(approx(controller.camera().position, Vec3::new(0.0, 0.0, 1.5)));
    }

    #[test]
    fn strafing_uses_right_vector() {
        let mut controller = CameraController::default();
        controller.translate(MoveDirection::Right, 2.0, 0.5);
        assert!(approx(controller.camera().position, Vec3::new(1.0, 0.0, 3.0)));
        controller.translate(MoveDirection::Left, 2.0, 1.0);
        assert!(approx(controller.camera().position, Vec3::new(-1.0, 0.0, 3.0)));
        controller.translate(MoveDirection::Backward, 1.0, 1.0);
        assert!(approx(controller.camera().position, Vec3::new(-1.0, 0.0, 4.0)));
    }

    #[test]
    fn view_matrix_tracks_position() {
        let mut controller = CameraController::default();
        controller.translate(MoveDirection::Forward, 1.0, 1.0);
        let eye = controller.view_matrix().inverse().transform_point3(Vec3::ZERO);
        assert!(approx(eye, controller.camera().position));
    }

    #[test]
    fn aspect_ratio_rejects_garbage() {
        let mut controller = CameraController::default();
        controller.set_aspect_ratio(0.0);
        controller.set_aspect_ratio(f32::INFINITY);
        assert_eq!(controller.camera().aspect_ratio, 4.0 / 3.0);
        controller.set_aspect_ratio(2.0);
        assert_eq!(controller.camera().aspect_ratio, 2.0);
    }
}

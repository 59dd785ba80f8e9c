//! Free-look perspective camera with smoothed zoom.
//!
//! Pure function of time and input deltas; no GPU types appear here.
//!
//! # Invariants
//! - Pitch stays within ±89 degrees after every rotation.
//! - Field of view stays within [1, 45] degrees, including mid-animation.
//! - The first pointer sample after activation never rotates the view.

mod controller;
mod easing;

pub use controller::{Camera, CameraController, CameraSettings, MoveDirection, PITCH_LIMIT_DEGREES};
pub use easing::{
    FOV_EASING_DURATION, FOV_MAX_DEGREES, FOV_MIN_DEGREES, FOV_SCROLL_STEP_DEGREES, FovEasing,
    ease_out_quart,
};

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Spatial transform: position, rotation, scale.
///
/// Composes as `translation * rotation * scale`, matching the order the
/// scene instances are authored in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Model matrix for this transform.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Width and height of a surface or render target, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Width over height. An empty extent reports 1.0 so projections stay finite.
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl std::fmt::Display for Extent2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn transform_applies_scale_before_translation() {
        let t = Transform::from_position(Vec3::new(0.0, -1.0, 0.0))
            .with_scale(Vec3::new(15.0, 0.001, 15.0));
        let corner = t.matrix().transform_point3(Vec3::new(0.5, 0.5, 0.5));
        assert!((corner - Vec3::new(7.5, -0.9995, 7.5)).length() < 1e-5);
    }

    #[test]
    fn extent_aspect_and_emptiness() {
        assert_eq!(Extent2d::new(800, 600).aspect_ratio(), 800.0 / 600.0);
        assert!(Extent2d::new(0, 600).is_empty());
        assert_eq!(Extent2d::new(0, 0).aspect_ratio(), 1.0);
        assert_eq!(Extent2d::square(1024).max_dimension(), 1024);
        assert_eq!(Extent2d::new(1280, 720).to_string(), "1280x720");
    }
}

use glam::{Mat4, Vec3};

/// Number of point lights the lit shader expects.
pub const POINT_LIGHT_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

/// Distance attenuation `1 / (constant + linear·d + quadratic·d²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Attenuation {
    /// Roughly a 50 unit range.
    pub const MEDIUM: Self = Self {
        constant: 1.0,
        linear: 0.09,
        quadratic: 0.032,
    };

    pub fn at(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub attenuation: Attenuation,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

/// A cone light. Cutoffs are stored as cosines of the half-angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub cut_off: f32,
    pub outer_cut_off: f32,
    pub attenuation: Attenuation,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

/// All lights in the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLights {
    pub directional: DirectionalLight,
    pub points: [PointLight; POINT_LIGHT_COUNT],
    /// Follows the camera, a flashlight.
    pub spot: SpotLight,
    /// Half-width of the orthographic shadow frustum.
    pub shadow_extent: f32,
}

pub const POINT_LIGHT_POSITIONS: [Vec3; POINT_LIGHT_COUNT] = [
    Vec3::new(0.7, 0.2, 2.0),
    Vec3::new(2.3, -3.3, -4.0),
    Vec3::new(-4.0, 2.0, -12.0),
    Vec3::new(0.0, 0.0, -3.0),
];

impl Default for SceneLights {
    fn default() -> Self {
        let point = |position| PointLight {
            position,
            attenuation: Attenuation::MEDIUM,
            ambient: Vec3::splat(0.05),
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
        };
        Self {
            directional: DirectionalLight {
                direction: Vec3::NEG_Y,
                ambient: Vec3::splat(0.05),
                diffuse: Vec3::ONE,
                specular: Vec3::ZERO,
            },
            points: POINT_LIGHT_POSITIONS.map(point),
            spot: SpotLight {
                position: Vec3::ZERO,
                direction: Vec3::NEG_Z,
                cut_off: 12.5_f32.to_radians().cos(),
                outer_cut_off: 15.5_f32.to_radians().cos(),
                attenuation: Attenuation::MEDIUM,
                ambient: Vec3::ZERO,
                diffuse: Vec3::ONE,
                specular: Vec3::ONE,
            },
            shadow_extent: 15.0,
        }
    }
}

impl SceneLights {
    /// Move the spot light to the camera.
    pub fn attach_spot(&mut self, position: Vec3, front: Vec3) {
        self.spot.position = position;
        self.spot.direction = front.try_normalize().unwrap_or(Vec3::NEG_Z);
    }

    pub fn point_positions(&self) -> [Vec3; POINT_LIGHT_COUNT] {
        self.points.map(|p| p.position)
    }

    /// Orthographic view-projection from the directional light, covering a
    /// cube of half-width `shadow_extent` around the origin.
    pub fn light_view_projection(&self) -> Mat4 {
        let extent = self.shadow_extent;
        let direction = self.directional.direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        let eye = -direction * extent;
        // Straight-down light makes Y a degenerate up vector.
        let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, up);
        let projection =
            Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.1, extent * 2.0);
        projection * view
    }
}

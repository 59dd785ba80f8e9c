//! CPU mirrors of the WGSL uniform blocks. Everything is vec4-aligned so
//! the Rust layout matches WGSL's uniform address space rules.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use glint_render::{
    DrawKind, FrameInputs, InstanceDraw, Material, POINT_LIGHT_COUNT, SceneLights,
};

/// Byte stride between per-draw uniform slots. WebGPU caps the dynamic
/// offset alignment at 256, so this works on every device.
pub const INSTANCE_STRIDE: u64 = 256;

/// Depth bias applied when comparing against the shadow map.
pub const SHADOW_BIAS: f32 = 0.005;

fn v4(v: Vec3, w: f32) -> [f32; 4] {
    [v.x, v.y, v.z, w]
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct DirLightUniform {
    pub direction: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct PointLightUniform {
    pub position: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// constant, linear, quadratic, unused
    pub attenuation: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct SpotLightUniform {
    pub position: [f32; 4],
    pub direction: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub attenuation: [f32; 4],
    /// cos(inner), cos(outer), unused, unused
    pub cutoff: [f32; 4],
}

/// Group 0 of the lit shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub view_pos: [f32; 4],
    pub dir_light: DirLightUniform,
    pub points: [PointLightUniform; POINT_LIGHT_COUNT],
    pub spot: SpotLightUniform,
    /// shadows enabled, time, shadow bias, unused
    pub params: [f32; 4],
}

impl FrameUniforms {
    pub fn new(frame: &FrameInputs<'_>) -> Self {
        let lights: &SceneLights = frame.lights;
        let d = &lights.directional;
        let s = &lights.spot;
        Self {
            view_proj: frame.view_projection().to_cols_array_2d(),
            light_view_proj: frame.light_view_projection.to_cols_array_2d(),
            view_pos: v4(frame.view_position, 1.0),
            dir_light: DirLightUniform {
                direction: v4(d.direction, 0.0),
                ambient: v4(d.ambient, 0.0),
                diffuse: v4(d.diffuse, 0.0),
                specular: v4(d.specular, 0.0),
            },
            points: lights.points.map(|p| PointLightUniform {
                position: v4(p.position, 1.0),
                ambient: v4(p.ambient, 0.0),
                diffuse: v4(p.diffuse, 0.0),
                specular: v4(p.specular, 0.0),
                attenuation: [
                    p.attenuation.constant,
                    p.attenuation.linear,
                    p.attenuation.quadratic,
                    0.0,
                ],
            }),
            spot: SpotLightUniform {
                position: v4(s.position, 1.0),
                direction: v4(s.direction, 0.0),
                ambient: v4(s.ambient, 0.0),
                diffuse: v4(s.diffuse, 0.0),
                specular: v4(s.specular, 0.0),
                attenuation: [
                    s.attenuation.constant,
                    s.attenuation.linear,
                    s.attenuation.quadratic,
                    0.0,
                ],
                cutoff: [s.cut_off, s.outer_cut_off, 0.0, 0.0],
            },
            params: [
                if frame.passes.shadow { 1.0 } else { 0.0 },
                frame.time,
                SHADOW_BIAS,
                0.0,
            ],
        }
    }
}

/// Group 0 of the shadow shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ShadowUniforms {
    pub light_view_proj: [[f32; 4]; 4],
}

/// Per-draw block, one per dynamic-offset slot.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct InstanceUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// shininess, emissive flag, emission strength, unused
    pub params: [f32; 4],
}

/// Strength of the emission map on textured surfaces.
pub const EMISSION_STRENGTH: f32 = 0.3;

impl InstanceUniform {
    pub fn new(draw: &InstanceDraw, outline_color: [f32; 4]) -> Self {
        let (color, params) = match (draw.kind, draw.material) {
            (DrawKind::Outline, _) => (outline_color, [0.0, 1.0, 0.0, 0.0]),
            (_, Material::Textured { shininess }) => {
                ([1.0; 4], [shininess, 0.0, EMISSION_STRENGTH, 0.0])
            }
            (_, Material::Emissive { color }) => (v4(color, 1.0), [0.0, 1.0, 0.0, 0.0]),
        };
        Self {
            model: draw.model.to_cols_array_2d(),
            normal: Mat4::from_mat3(draw.normal).to_cols_array_2d(),
            color,
            params,
        }
    }
}

/// One [`InstanceUniform`] padded out to [`INSTANCE_STRIDE`].
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct InstanceSlot {
    pub uniform: InstanceUniform,
    _pad: [f32; 24],
}

impl From<InstanceUniform> for InstanceSlot {
    fn from(uniform: InstanceUniform) -> Self {
        Self {
            uniform,
            _pad: [0.0; 24],
        }
    }
}

/// Post pass parameters.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct PostUniforms {
    /// exposure, gamma, apply gamma (surface is not sRGB), unused
    pub params: [f32; 4],
}

impl PostUniforms {
    pub fn new(exposure: f32, gamma: f32, surface_is_srgb: bool) -> Self {
        Self {
            params: [
                exposure,
                gamma,
                if surface_is_srgb { 0.0 } else { 1.0 },
                0.0,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat3;
    use glint_render::{MeshId, PassSet, RenderContext};

    #[test]
    fn layouts_match_wgsl_sizes() {
        assert_eq!(std::mem::size_of::<DirLightUniform>(), 64);
        assert_eq!(std::mem::size_of::<PointLightUniform>(), 80);
        assert_eq!(std::mem::size_of::<SpotLightUniform>(), 112);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 656);
        assert_eq!(std::mem::size_of::<InstanceUniform>(), 160);
        assert_eq!(std::mem::size_of::<InstanceSlot>() as u64, INSTANCE_STRIDE);
        assert_eq!(std::mem::size_of::<PostUniforms>(), 16);
    }

    #[test]
    fn frame_uniforms_carry_shadow_flag() {
        let ctx = RenderContext::default();
        let on = FrameUniforms::new(&ctx.frame_inputs(0, PassSet::default()));
        assert_eq!(on.params[0], 1.0);

        let off = PassSet {
            shadow: false,
            ..PassSet::default()
        };
        let frame = ctx.frame_inputs(0, off);
        assert_eq!(FrameUniforms::new(&frame).params[0], 0.0);
        assert_eq!(
            FrameUniforms::new(&frame).view_pos,
            [0.0, 0.0, 3.0, 1.0]
        );
    }

    #[test]
    fn emissive_and_outline_draws_are_unlit() {
        let draw = InstanceDraw {
            kind: DrawKind::Lit,
            slot: 0,
            mesh: MeshId::CUBE,
            model: Mat4::IDENTITY,
            normal: Mat3::IDENTITY,
            material: Material::Emissive {
                color: Vec3::new(1.0, 0.5, 0.25),
            },
            outline: false,
        };
        let lamp = InstanceUniform::new(&draw, [0.0; 4]);
        assert_eq!(lamp.params[1], 1.0);
        assert_eq!(lamp.color, [1.0, 0.5, 0.25, 1.0]);

        let outline = InstanceUniform::new(
            &InstanceDraw {
                kind: DrawKind::Outline,
                ..draw
            },
            [0.9, 0.6, 0.1, 1.0],
        );
        assert_eq!(outline.color, [0.9, 0.6, 0.1, 1.0]);
    }
}

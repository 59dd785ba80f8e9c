//! The fixed list of instances drawn every frame.
//!
//! # Invariants
//! - Instances are drawn in insertion order; the floor is always last.
//! - Normal transforms are derived from the model transform on every draw
//!   and never stored.

use crate::lighting::POINT_LIGHT_POSITIONS;
use glam::{Mat3, Mat4, Quat, Vec3};
use glint_common::Transform;
use serde::Serialize;

/// Index of a mesh uploaded by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

impl MeshId {
    /// The built-in unit cube, always uploaded first.
    pub const CUBE: Self = Self(0);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    /// Diffuse/specular/emission textures with a Phong exponent.
    Textured { shininess: f32 },
    /// Unlit flat color.
    Emissive { color: Vec3 },
}

impl Material {
    pub fn casts_shadow(&self) -> bool {
        matches!(self, Material::Textured { .. })
    }
}

/// Constant rotation about an axis, applied after the base transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    pub axis: Vec3,
    pub degrees_per_second: f32,
}

impl Spin {
    pub fn rotation_at(&self, time: f32) -> Quat {
        let axis = self.axis.try_normalize().unwrap_or(Vec3::Y);
        Quat::from_axis_angle(axis, (self.degrees_per_second * time).to_radians())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    pub mesh: MeshId,
    pub transform: Mat4,
    pub material: Material,
    pub spin: Option<Spin>,
    /// Draw a stencil outline around this instance.
    pub outline: bool,
    /// Local-space point the outline scales about.
    pub outline_pivot: Vec3,
}

impl Instance {
    pub fn new(mesh: MeshId, transform: Mat4, material: Material) -> Self {
        Self {
            mesh,
            transform,
            material,
            spin: None,
            outline: false,
            outline_pivot: Vec3::ZERO,
        }
    }

    pub fn with_spin(mut self, spin: Spin) -> Self {
        self.spin = Some(spin);
        self
    }

    pub fn with_outline(mut self, pivot: Vec3) -> Self {
        self.outline = true;
        self.outline_pivot = pivot;
        self
    }

    /// Model transform at `time` seconds.
    pub fn model_at(&self, time: f32) -> Mat4 {
        match self.spin {
            Some(spin) => self.transform * Mat4::from_quat(spin.rotation_at(time)),
            None => self.transform,
        }
    }
}

/// What kind of draw a sink is receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawKind {
    Lit,
    DepthOnly,
    Outline,
}

/// Everything a backend needs to issue one draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceDraw {
    pub kind: DrawKind,
    /// Position in the draw list; the floor uses `len()`.
    pub slot: usize,
    pub mesh: MeshId,
    pub model: Mat4,
    pub normal: Mat3,
    pub material: Material,
    pub outline: bool,
}

/// Receiver of draw calls, implemented per backend.
pub trait DrawSink {
    fn draw(&mut self, draw: &InstanceDraw);
}

/// Inverse-transpose of the upper 3x3; identity for singular transforms.
pub fn normal_matrix(model: Mat4) -> Mat3 {
    let linear = Mat3::from_mat4(model);
    if linear.determinant().abs() <= f32::EPSILON * f32::EPSILON {
        return Mat3::IDENTITY;
    }
    linear.inverse().transpose()
}

pub const CONTAINER_POSITIONS: [Vec3; 10] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(2.0, 5.0, -15.0),
    Vec3::new(-1.5, -2.2, -2.5),
    Vec3::new(-3.8, -2.0, -12.3),
    Vec3::new(2.4, -0.4, -3.5),
    Vec3::new(-1.7, 3.0, -7.5),
    Vec3::new(1.3, -2.0, -2.5),
    Vec3::new(1.5, 2.0, -2.5),
    Vec3::new(1.5, 0.2, -1.5),
    Vec3::new(-1.3, 1.0, -1.5),
];

const CONTAINER_SHININESS: f32 = 32.0;
const MODEL_SHININESS: f32 = 64.0;
const LAMP_SCALE: f32 = 0.2;
/// Outlines are the instance scaled up by this factor.
pub const OUTLINE_SCALE: f32 = 1.1;

/// Fixed ordered instance list plus the floor.
#[derive(Debug, Clone)]
pub struct SceneDrawList {
    instances: Vec<Instance>,
    floor: Instance,
}

/// Builds a [`SceneDrawList`]; the only way to add instances.
#[derive(Debug, Default)]
pub struct SceneDrawListBuilder {
    instances: Vec<Instance>,
    floor: Option<Instance>,
}

impl SceneDrawListBuilder {
    pub fn push(mut self, instance: Instance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn floor(mut self, floor: Instance) -> Self {
        self.floor = Some(floor);
        self
    }

    pub fn build(self) -> SceneDrawList {
        SceneDrawList {
            instances: self.instances,
            floor: self.floor.unwrap_or_else(SceneDrawList::default_floor),
        }
    }
}

impl SceneDrawList {
    pub fn builder() -> SceneDrawListBuilder {
        SceneDrawListBuilder::default()
    }

    /// The standard floor: a cube flattened to 15 x 0.001 x 15, one unit
    /// below the origin.
    pub fn default_floor() -> Instance {
        let transform = Transform::from_position(Vec3::new(0.0, -1.0, 0.0))
            .with_scale(Vec3::new(15.0, 0.001, 15.0))
            .matrix();
        Instance::new(
            MeshId::CUBE,
            transform,
            Material::Textured {
                shininess: CONTAINER_SHININESS,
            },
        )
    }

    /// Ten containers, a lamp cube per point light and the parts of a loaded
    /// model at the origin, one instance per part. Every third container
    /// spins.
    pub fn containers(model_parts: &[MeshId], outline_model: bool) -> Self {
        let axis = Vec3::new(1.0, 0.3, 0.5).normalize();
        let material = Material::Textured {
            shininess: CONTAINER_SHININESS,
        };

        let mut builder = Self::builder();
        for (i, position) in CONTAINER_POSITIONS.into_iter().enumerate() {
            let angle = (i as f32 * 20.0).to_radians();
            let instance = if i % 3 == 0 {
                Instance::new(MeshId::CUBE, Mat4::from_translation(position), material).with_spin(
                    Spin {
                        axis,
                        degrees_per_second: 25.0,
                    },
                )
            } else {
                let transform = Transform::from_position(position)
                    .with_rotation(Quat::from_axis_angle(axis, angle))
                    .matrix();
                Instance::new(MeshId::CUBE, transform, material)
            };
            builder = builder.push(instance);
        }

        for position in POINT_LIGHT_POSITIONS {
            let transform = Transform::from_position(position)
                .with_scale(Vec3::splat(LAMP_SCALE))
                .matrix();
            builder = builder.push(Instance::new(
                MeshId::CUBE,
                transform,
                Material::Emissive { color: Vec3::ONE },
            ));
        }

        for &mesh in model_parts {
            let mut instance = Instance::new(
                mesh,
                Mat4::IDENTITY,
                Material::Textured {
                    shininess: MODEL_SHININESS,
                },
            );
            if outline_model {
                instance = instance.with_outline(Vec3::new(0.0, 7.25, 0.0));
            }
            builder = builder.push(instance);
        }

        builder.build()
    }

    /// Number of instances, excluding the floor.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn floor(&self) -> &Instance {
        &self.floor
    }

    fn ordered(&self) -> impl Iterator<Item = (usize, &Instance)> {
        self.instances
            .iter()
            .chain(std::iter::once(&self.floor))
            .enumerate()
    }

    fn emit(sink: &mut dyn DrawSink, kind: DrawKind, slot: usize, instance: &Instance, model: Mat4) {
        sink.draw(&InstanceDraw {
            kind,
            slot,
            mesh: instance.mesh,
            model,
            normal: normal_matrix(model),
            material: instance.material,
            outline: instance.outline,
        });
    }

    /// Issue one lit draw per instance, floor last. Returns the draw count.
    pub fn draw(&self, sink: &mut dyn DrawSink, time: f32) -> u32 {
        let mut count = 0;
        for (slot, instance) in self.ordered() {
            Self::emit(sink, DrawKind::Lit, slot, instance, instance.model_at(time));
            count += 1;
        }
        count
    }

    /// Shadow-casting draws only; emissive lamps are skipped.
    pub fn draw_depth_only(&self, sink: &mut dyn DrawSink, time: f32) -> u32 {
        let mut count = 0;
        for (slot, instance) in self.ordered() {
            if !instance.material.casts_shadow() {
                continue;
            }
            Self::emit(sink, DrawKind::DepthOnly, slot, instance, instance.model_at(time));
            count += 1;
        }
        count
    }

    pub fn outlined(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter().filter(|i| i.outline)
    }

    /// Enlarged copies of outlined instances for the stencil-masked pass.
    pub fn draw_outlines(&self, sink: &mut dyn DrawSink, time: f32) -> u32 {
        let mut count = 0;
        for (slot, instance) in self.ordered() {
            if !instance.outline {
                continue;
            }
            let pivot = instance.outline_pivot;
            let grow = Mat4::from_translation(pivot)
                * Mat4::from_scale(Vec3::splat(OUTLINE_SCALE))
                * Mat4::from_translation(-pivot);
            Self::emit(sink, DrawKind::Outline, slot, instance, instance.model_at(time) * grow);
            count += 1;
        }
        count
    }
}

impl Default for SceneDrawList {
    fn default() -> Self {
        Self::containers(&[], false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Vec<InstanceDraw>);

    impl DrawSink for Collect {
        fn draw(&mut self, draw: &InstanceDraw) {
            self.0.push(*draw);
        }
    }

    #[test]
    fn containers_scene_layout() {
        let scene = SceneDrawList::containers(&[], false);
        assert_eq!(scene.len(), 14);
        let lamps = scene
            .instances()
            .iter()
            .filter(|i| matches!(i.material, Material::Emissive { .. }))
            .count();
        assert_eq!(lamps, 4);
        assert_eq!(scene.outlined().count(), 0);
    }

    #[test]
    fn floor_is_drawn_last() {
        let scene = SceneDrawList::containers(&[MeshId(1)], true);
        let mut sink = Collect::default();
        let count = scene.draw(&mut sink, 0.0);
        assert_eq!(count as usize, scene.len() + 1);

        let last = sink.0.last().unwrap();
        assert_eq!(last.slot, scene.len());
        assert_eq!(last.model, scene.floor().transform);
        let slots: Vec<_> = sink.0.iter().map(|d| d.slot).collect();
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn normal_matrix_is_inverse_transpose_under_nonuniform_scale() {
        let model = Mat4::from_scale_rotation_translation(
            Vec3::new(15.0, 0.001, 15.0),
            Quat::from_rotation_y(0.3),
            Vec3::new(0.0, -1.0, 0.0),
        );
        let normal = normal_matrix(model);
        let expected = Mat3::from_mat4(model).inverse().transpose();
        assert!(normal.abs_diff_eq(expected, 1e-3));

        // A surface tangent stays perpendicular to the transformed normal.
        let tangent = Mat3::from_mat4(model) * Vec3::X;
        let n = normal * Vec3::Y;
        assert!(tangent.dot(n).abs() < 1e-3);
    }

    #[test]
    fn normal_recomputed_for_spinning_instances() {
        let scene = SceneDrawList::containers(&[], false);
        let mut early = Collect::default();
        let mut late = Collect::default();
        scene.draw(&mut early, 0.0);
        scene.draw(&mut late, 2.0);
        // Container 0 spins, container 1 is static.
        assert_ne!(early.0[0].normal, late.0[0].normal);
        assert_eq!(early.0[1].normal, late.0[1].normal);
        assert!(late.0[0].normal.abs_diff_eq(normal_matrix(late.0[0].model), 1e-6));
    }

    #[test]
    fn depth_only_skips_emissive_lamps() {
        let scene = SceneDrawList::containers(&[], false);
        let mut sink = Collect::default();
        let count = scene.draw_depth_only(&mut sink, 0.0);
        assert_eq!(count, 11);
        assert!(sink.0.iter().all(|d| d.kind == DrawKind::DepthOnly));
    }

    #[test]
    fn outlines_are_scaled_about_pivot() {
        let scene = SceneDrawList::containers(&[MeshId(1)], true);
        let mut sink = Collect::default();
        assert_eq!(scene.draw_outlines(&mut sink, 0.0), 1);
        let draw = sink.0[0];
        assert_eq!(draw.mesh, MeshId(1));
        assert_eq!(draw.kind, DrawKind::Outline);
        let pivot = draw.model.transform_point3(Vec3::new(0.0, 7.25, 0.0));
        assert!(pivot.abs_diff_eq(Vec3::new(0.0, 7.25, 0.0), 1e-5));
        let top = draw.model.transform_point3(Vec3::new(0.0, 8.25, 0.0));
        assert!((top.y - 8.35).abs() < 1e-4);
    }

    #[test]
    fn model_parts_share_transform_and_outline() {
        let parts = [MeshId(1), MeshId(2)];
        let scene = SceneDrawList::containers(&parts, true);
        assert_eq!(scene.len(), 16);
        let outlined: Vec<_> = scene.outlined().collect();
        assert_eq!(outlined.len(), 2);
        assert_eq!(outlined[0].mesh, MeshId(1));
        assert_eq!(outlined[1].mesh, MeshId(2));
        assert_eq!(outlined[0].transform, outlined[1].transform);
        assert_eq!(outlined[0].material, outlined[1].material);

        let mut sink = Collect::default();
        assert_eq!(scene.draw_outlines(&mut sink, 0.0), 2);
    }
}

//! Backend-agnostic frame pipeline.
//!
//! Owns the pieces of a frame that do not depend on a graphics API: render
//! target specs and their lifetime, the ordered pass list, the scene draw
//! list and lighting, and the per-frame context. Backends plug in through
//! [`RenderDevice`] and [`PassExecutor`]; [`recording`] provides one that
//! needs no GPU.
//!
//! # Invariants
//! - Passes run Shadow, Color, Resolve, Post, Present, each at most once
//!   per frame.
//! - An offscreen target is usable only after it passed validation and the
//!   device's completeness check.
//! - The draw list is fixed after setup.

mod context;
mod error;
mod lighting;
mod pipeline;
pub mod recording;
mod scene;
mod target;

pub use context::{InputOutcome, RenderContext, SPRINT_MULTIPLIER};
pub use error::RenderError;
pub use lighting::{
    Attenuation, DirectionalLight, POINT_LIGHT_COUNT, POINT_LIGHT_POSITIONS, PointLight,
    SceneLights, SpotLight,
};
pub use pipeline::{
    ClearPolicy, DrawSource, FrameInputs, FramePhase, FramePipeline, FrameStats, Pass,
    PassExecutor, PassSet, PipelineConfig, ShaderRef, TargetRef, draw_pass_geometry,
};
pub use scene::{
    CONTAINER_POSITIONS, DrawKind, DrawSink, Instance, InstanceDraw, Material, MeshId,
    OUTLINE_SCALE, SceneDrawList, SceneDrawListBuilder, Spin, normal_matrix,
};
pub use target::{
    AttachmentFormat, AttachmentKind, Attachments, ColorFormat, Completeness, DeviceLimits,
    RenderDevice, RenderTargetManager, TargetConfig, TargetHandle, TargetSet, TargetSpec,
    create_standard_targets,
};

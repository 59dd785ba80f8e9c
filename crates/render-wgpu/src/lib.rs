//! wgpu backend for the glint frame pipeline.
//!
//! [`GpuContext`] owns the surface and device and implements
//! [`glint_render::RenderDevice`], so the target manager allocates real
//! textures. [`SceneRenderer`] holds the pipelines and scene resources;
//! each frame it hands out a [`WgpuFrame`], the
//! [`glint_render::PassExecutor`] that encodes every pass into one command
//! buffer and presents on the Present phase.
//!
//! # Invariants
//! - One command encoder per frame, submitted exactly once.
//! - At most one render pass is open at a time.
//! - Per-draw uniforms are staged on the CPU and uploaded before submit.

mod device;
mod frame;
mod renderer;
mod setup;
mod shaders;
mod uniforms;

pub use device::{Attachment, GpuTarget, texture_format};
pub use frame::WgpuFrame;
pub use renderer::{MaterialTextures, MeshAsset, RendererSettings, SceneAssets, SceneRenderer};
pub use setup::{GpuContext, SetupError};
pub use shaders::{POST_SHADER, SCENE_SHADER, SHADOW_SHADER};

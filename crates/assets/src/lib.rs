//! Asset collaborators for the renderer.
//!
//! Thin I/O wrappers: the built-in cube, Wavefront OBJ import, texture
//! decoding through the `image` crate and WGSL shader loading. Nothing in
//! here touches the GPU.

mod error;
mod mesh;
mod obj;
mod shader;
mod texture;

pub use error::AssetError;
pub use mesh::{MeshData, SubMesh, Vertex};
pub use obj::{load_obj, parse_obj};
pub use shader::{ShaderSource, load_shader};
pub use texture::{TextureData, load_texture, load_texture_or_fallback};

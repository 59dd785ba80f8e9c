//! Config and asset loading for the glint viewer, shared with `glint-cli`.

pub mod assets;
pub mod config;

pub use assets::{LoadedScene, load_scene, referenced_meshes};
pub use config::{AssetConfig, ShaderPaths, ViewerConfig, WindowConfig};

use anyhow::{Context, Result, bail};
use glint_camera::CameraSettings;
use glint_render::{ColorFormat, PassSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "glint".into(),
        }
    }
}

/// Vertex/fragment WGSL replacing the built-in scene shader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    /// Defaults to `vertex` when both stages share a file.
    #[serde(default)]
    pub fragment: Option<PathBuf>,
    /// Always rejected; WGSL has no geometry stage.
    #[serde(default)]
    pub geometry: Option<PathBuf>,
}

/// Asset paths, relative to `root` unless absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub root: PathBuf,
    pub diffuse: PathBuf,
    pub specular: PathBuf,
    pub emission: PathBuf,
    pub model: Option<PathBuf>,
    pub shader: Option<ShaderPaths>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            diffuse: PathBuf::from("textures/container2.png"),
            specular: PathBuf::from("textures/container2_specular.png"),
            emission: PathBuf::from("textures/matrix.jpg"),
            model: None,
            shader: None,
        }
    }
}

impl AssetConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Viewer settings. Every field has a default, so an empty YAML file is a
/// valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub msaa_samples: u32,
    pub shadow_map_size: u32,
    pub color_format: ColorFormat,
    pub passes: PassSet,
    pub camera: CameraSettings,
    pub assets: AssetConfig,
    pub clear_color: [f32; 3],
    pub exposure: f32,
    pub gamma: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            msaa_samples: 4,
            shadow_map_size: 1024,
            color_format: ColorFormat::default(),
            passes: PassSet::default(),
            camera: CameraSettings::default(),
            assets: AssetConfig::default(),
            clear_color: [0.1, 0.15, 0.15],
            exposure: 1.0,
            gamma: 2.2,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject settings no device could satisfy before touching the GPU.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            bail!(
                "window size must be non-zero, got {}x{}",
                self.window.width,
                self.window.height
            );
        }
        if self.shadow_map_size == 0 {
            bail!("shadow map size must be non-zero");
        }
        if !self.msaa_samples.is_power_of_two() {
            bail!(
                "msaa_samples must be a power of two, got {}",
                self.msaa_samples
            );
        }
        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            bail!(
                "camera clip planes must satisfy 0 < near < far, got {} and {}",
                camera.near,
                camera.far
            );
        }
        if !(self.gamma > 0.0 && self.exposure > 0.0) {
            bail!("gamma and exposure must be positive");
        }
        if let Some(shader) = &self.assets.shader {
            if let Some(geometry) = &shader.geometry {
                bail!(
                    "geometry shader {} is not supported",
                    geometry.display()
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_round_trip_through_yaml() {
        let config = ViewerConfig::default();
        let yaml = config.to_yaml().unwrap();
        let parsed: ViewerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "msaa_samples: 8\npasses:\n  shadow: false\nwindow:\n  width: 1280").unwrap();
        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.msaa_samples, 8);
        assert!(!config.passes.shadow);
        assert!(config.passes.post_process);
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.camera, CameraSettings::default());
    }

    #[test]
    fn rejects_zero_sizes() {
        let mut config = ViewerConfig::default();
        config.window.height = 0;
        assert!(config.validate().unwrap_err().to_string().contains("non-zero"));

        let config = ViewerConfig {
            shadow_map_size: 0,
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_power_of_two_samples() {
        for samples in [0, 3, 6] {
            let config = ViewerConfig {
                msaa_samples: samples,
                ..ViewerConfig::default()
            };
            assert!(
                config.validate().is_err(),
                "{samples} samples should be rejected"
            );
        }
        let config = ViewerConfig {
            msaa_samples: 1,
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_geometry_stage() {
        let mut config = ViewerConfig::default();
        config.assets.shader = Some(ShaderPaths {
            vertex: "scene.wgsl".into(),
            fragment: None,
            geometry: Some("explode.gs".into()),
        });
        assert!(config.validate().unwrap_err().to_string().contains("geometry"));
    }

    #[test]
    fn shipped_configs_are_valid() {
        let default: ViewerConfig =
            serde_yaml::from_str(include_str!("../../../configs/default.yaml")).unwrap();
        assert_eq!(default, ViewerConfig::default());

        for text in [
            include_str!("../../../configs/low-end.yaml"),
            include_str!("../../../configs/model.yaml"),
        ] {
            let config: ViewerConfig = serde_yaml::from_str(text).unwrap();
            config.validate().unwrap();
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ViewerConfig::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("reading config"));
    }

    #[test]
    fn relative_asset_paths_join_root() {
        let assets = AssetConfig::default();
        assert_eq!(
            assets.resolve(Path::new("textures/a.png")),
            PathBuf::from("assets/textures/a.png")
        );
        let absolute = std::env::temp_dir().join("a.png");
        assert_eq!(assets.resolve(&absolute), absolute);
    }
}

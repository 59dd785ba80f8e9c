use crate::error::AssetError;
use std::path::Path;

/// WGSL source for one vertex/fragment program.
///
/// Both stages may live in the same file; when they do, `vertex` and
/// `fragment` hold the same text and the backend compiles it once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    /// A program whose stages share one WGSL module.
    pub fn combined(label: impl Into<String>, wgsl: impl Into<String>) -> Self {
        let wgsl = wgsl.into();
        Self {
            label: label.into(),
            vertex: wgsl.clone(),
            fragment: wgsl,
        }
    }

    pub fn is_combined(&self) -> bool {
        self.vertex == self.fragment
    }

    /// Single module text: the shared source, or both stages concatenated.
    pub fn module_source(&self) -> String {
        if self.is_combined() {
            self.vertex.clone()
        } else {
            format!("{}\n{}", self.vertex, self.fragment)
        }
    }
}

/// Read vertex and fragment stage sources.
///
/// A geometry stage cannot be expressed in WGSL and is rejected.
pub fn load_shader(
    vertex: impl AsRef<Path>,
    fragment: impl AsRef<Path>,
    geometry: Option<&Path>,
) -> Result<ShaderSource, AssetError> {
    let vertex = vertex.as_ref();
    let fragment = fragment.as_ref();
    if let Some(geometry) = geometry {
        return Err(AssetError::Unsupported(format!(
            "geometry shader {} (WGSL has no geometry stage)",
            geometry.display()
        )));
    }

    let read = |path: &Path| std::fs::read_to_string(path).map_err(|e| AssetError::io(path, e));
    let vertex_src = read(vertex)?;
    let fragment_src = if fragment == vertex {
        vertex_src.clone()
    } else {
        read(fragment)?
    };

    let label = stem(vertex).unwrap_or_else(|| "shader".into());
    tracing::debug!(
        "loaded shader '{label}' from {} + {}",
        vertex.display(),
        fragment.display()
    );
    Ok(ShaderSource {
        label,
        vertex: vertex_src,
        fragment: fragment_src,
    })
}

fn stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

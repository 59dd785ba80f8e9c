//! Loads the textures, optional model and optional shader named in the
//! config into backend-ready [`SceneAssets`].

use crate::config::AssetConfig;
use anyhow::{Context, Result};
use glint_assets::{SubMesh, TextureData, load_obj, load_shader, load_texture_or_fallback};
use glint_render::{MeshId, SceneDrawList};
use glint_render_wgpu::{MaterialTextures, MeshAsset, SceneAssets};

pub struct LoadedScene {
    pub assets: SceneAssets,
    pub scene: SceneDrawList,
}

pub fn load_scene(config: &AssetConfig) -> Result<LoadedScene> {
    let default_material = MaterialTextures {
        diffuse: load_texture_or_fallback(config.resolve(&config.diffuse)),
        specular: load_texture_or_fallback(config.resolve(&config.specular)),
        emission: load_texture_or_fallback(config.resolve(&config.emission)),
    };
    let mut assets = SceneAssets::new(default_material);

    if let Some(paths) = &config.shader {
        let vertex = config.resolve(&paths.vertex);
        let fragment = paths
            .fragment
            .as_ref()
            .map(|f| config.resolve(f))
            .unwrap_or_else(|| vertex.clone());
        let geometry = paths.geometry.as_ref().map(|g| config.resolve(g));
        let source = load_shader(&vertex, &fragment, geometry.as_deref())?;
        tracing::info!("using scene shader '{}'", source.label);
        assets.scene_shader = Some(source);
    }

    let mut model_parts = Vec::new();
    if let Some(path) = &config.model {
        let path = config.resolve(path);
        let data = load_obj(&path).with_context(|| format!("loading model {}", path.display()))?;
        tracing::info!(
            "loaded model '{}': {} sub-meshes, {} vertices",
            data.name,
            data.sub_meshes.len(),
            data.vertex_count()
        );
        // Each sub-mesh keeps its own material, so each becomes its own mesh.
        for sub in data.sub_meshes {
            if sub.indices.is_empty() {
                tracing::debug!("skipping empty sub-mesh '{}'", sub.name);
                continue;
            }
            let textures = part_textures(&sub);
            model_parts.push(assets.add_mesh(MeshAsset { mesh: sub, textures }));
        }
    }

    Ok(LoadedScene {
        assets,
        scene: SceneDrawList::containers(&model_parts, !model_parts.is_empty()),
    })
}

/// Textures for one model part, or `None` to use the scene default.
fn part_textures(sub: &SubMesh) -> Option<MaterialTextures> {
    let diffuse = sub.diffuse_texture.as_ref()?;
    Some(MaterialTextures {
        diffuse: load_texture_or_fallback(diffuse),
        specular: match &sub.specular_texture {
            Some(specular) => load_texture_or_fallback(specular),
            None => TextureData::solid("model_specular", [0, 0, 0, 255]),
        },
        emission: TextureData::solid("model_emission", [0, 0, 0, 255]),
    })
}

/// Ids of every mesh the scene draws, for diagnostics.
pub fn referenced_meshes(scene: &SceneDrawList) -> Vec<MeshId> {
    let mut ids: Vec<MeshId> = scene
        .instances()
        .iter()
        .chain(std::iter::once(scene.floor()))
        .map(|i| i.mesh)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_textures_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = AssetConfig {
            root: dir.path().to_path_buf(),
            ..AssetConfig::default()
        };
        let loaded = load_scene(&config).unwrap();
        let diffuse = &loaded.assets.default_material.diffuse;
        assert_eq!((diffuse.width, diffuse.height), (64, 64));
        assert_eq!(loaded.assets.meshes.len(), 1);
        assert_eq!(referenced_meshes(&loaded.scene), vec![MeshId::CUBE]);
    }

    #[test]
    fn model_becomes_an_outlined_instance() {
        let dir = tempfile::tempdir().unwrap();
        let mut obj = std::fs::File::create(dir.path().join("tri.obj")).unwrap();
        writeln!(obj, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3").unwrap();
        let config = AssetConfig {
            root: dir.path().to_path_buf(),
            model: Some("tri.obj".into()),
            ..AssetConfig::default()
        };
        let loaded = load_scene(&config).unwrap();
        assert_eq!(loaded.assets.meshes.len(), 2);
        assert!(loaded.assets.meshes[1].textures.is_none());
        assert_eq!(referenced_meshes(&loaded.scene), vec![MeshId::CUBE, MeshId(1)]);
        assert_eq!(loaded.scene.outlined().count(), 1);
    }

    #[test]
    fn each_material_gets_its_own_textured_part() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("two.mtl"),
            "newmtl a\nmap_Kd a.png\nnewmtl b\nmap_Kd b.png\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("two.obj"),
            "mtllib two.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\n\
             usemtl a\nf 1 2 3\nusemtl b\nf 2 4 3\n",
        )
        .unwrap();
        let config = AssetConfig {
            root: dir.path().to_path_buf(),
            model: Some("two.obj".into()),
            ..AssetConfig::default()
        };
        let loaded = load_scene(&config).unwrap();
        assert_eq!(loaded.assets.meshes.len(), 3);
        let labels: Vec<_> = loaded.assets.meshes[1..]
            .iter()
            .map(|m| m.textures.as_ref().unwrap().diffuse.label.clone())
            .collect();
        assert_ne!(labels[0], labels[1]);
        assert!(labels[0].contains("a.png"));
        assert!(labels[1].contains("b.png"));
        assert_eq!(
            referenced_meshes(&loaded.scene),
            vec![MeshId::CUBE, MeshId(1), MeshId(2)]
        );
        assert_eq!(loaded.scene.outlined().count(), 2);
    }

    #[test]
    fn missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = AssetConfig {
            root: dir.path().to_path_buf(),
            model: Some("nope.obj".into()),
            ..AssetConfig::default()
        };
        let err = load_scene(&config).err().unwrap();
        assert!(format!("{err:#}").contains("loading model"));
    }
}

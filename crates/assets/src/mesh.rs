use bytemuck::{Pod, Zeroable};
use std::path::PathBuf;

/// Interleaved vertex: position, normal, texture coordinate.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// One drawable piece of a mesh with its material texture paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubMesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub diffuse_texture: Option<PathBuf>,
    pub specular_texture: Option<PathBuf>,
}

/// CPU-side mesh: a list of sub-meshes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub sub_meshes: Vec<SubMesh>,
}

impl MeshData {
    /// Unit cube centred on the origin, 24 vertices and 36 indices with
    /// counter-clockwise front faces.
    pub fn cube() -> Self {
        let p = 0.5_f32;
        // Each face lists bottom-left, bottom-right, top-right, top-left as
        // seen from outside the cube.
        #[rustfmt::skip]
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0],  [[-p, -p,  p], [ p, -p,  p], [ p,  p,  p], [-p,  p,  p]]),
            ([0.0, 0.0, -1.0], [[ p, -p, -p], [-p, -p, -p], [-p,  p, -p], [ p,  p, -p]]),
            ([1.0, 0.0, 0.0],  [[ p, -p,  p], [ p, -p, -p], [ p,  p, -p], [ p,  p,  p]]),
            ([-1.0, 0.0, 0.0], [[-p, -p, -p], [-p, -p,  p], [-p,  p,  p], [-p,  p, -p]]),
            ([0.0, 1.0, 0.0],  [[-p,  p,  p], [ p,  p,  p], [ p,  p, -p], [-p,  p, -p]]),
            ([0.0, -1.0, 0.0], [[-p, -p, -p], [ p, -p, -p], [ p, -p,  p], [-p, -p,  p]]),
        ];
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in faces {
            let base = vertices.len() as u32;
            for (position, uv) in corners.into_iter().zip(uvs) {
                vertices.push(Vertex {
                    position,
                    normal,
                    uv,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self {
            name: "cube".into(),
            sub_meshes: vec![SubMesh {
                name: "cube".into(),
                vertices,
                indices,
                ..SubMesh::default()
            }],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.sub_meshes.iter().map(|s| s.vertices.len()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.sub_meshes.iter().map(|s| s.indices.len()).sum()
    }

    /// Concatenate all sub-meshes into one vertex/index list, rebasing
    /// indices. Material paths of the first sub-mesh are kept, so this only
    /// suits single-material meshes.
    pub fn merged(&self) -> SubMesh {
        let mut merged = SubMesh {
            name: self.name.clone(),
            ..SubMesh::default()
        };
        for sub in &self.sub_meshes {
            let base = merged.vertices.len() as u32;
            merged.vertices.extend_from_slice(&sub.vertices);
            merged.indices.extend(sub.indices.iter().map(|i| i + base));
            if merged.diffuse_texture.is_none() {
                merged.diffuse_texture = sub.diffuse_texture.clone();
            }
            if merged.specular_texture.is_none() {
                merged.specular_texture = sub.specular_texture.clone();
            }
        }
        merged
    }
}

//! Wavefront OBJ/MTL import.
//!
//! Supports `v`, `vt`, `vn`, polygonal `f` (fan-triangulated, negative
//! indices allowed), `o`/`g`/`usemtl` sub-mesh splits and `mtllib` with
//! `map_Kd`/`map_Ks`. Everything else is skipped.

use crate::error::AssetError;
use crate::mesh::{MeshData, SubMesh, Vertex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone)]
struct MtlMaterial {
    diffuse: Option<PathBuf>,
    specular: Option<PathBuf>,
}

/// Corner of a face: position, uv and normal indices (0-based).
type Corner = (usize, Option<usize>, Option<usize>);

/// Load an OBJ file and its material library.
pub fn load_obj(path: impl AsRef<Path>) -> Result<MeshData, AssetError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| AssetError::io(path, e))?;
    let dir = path.parent().unwrap_or(Path::new("."));
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".into());

    let mesh = parse_obj(&source, path, |mtl| {
        let mtl_path = dir.join(mtl);
        match std::fs::read_to_string(&mtl_path) {
            Ok(text) => Some((text, mtl_path)),
            Err(e) => {
                tracing::warn!("material library {} unreadable: {e}", mtl_path.display());
                None
            }
        }
    })?;

    tracing::debug!(
        "loaded {} ({} sub-meshes, {} vertices)",
        path.display(),
        mesh.sub_meshes.len(),
        mesh.vertex_count()
    );
    Ok(MeshData { name, ..mesh })
}

/// Parse OBJ text. `read_mtl` resolves a `mtllib` name to its text and path.
pub fn parse_obj(
    source: &str,
    path: &Path,
    mut read_mtl: impl FnMut(&str) -> Option<(String, PathBuf)>,
) -> Result<MeshData, AssetError> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut materials: HashMap<String, MtlMaterial> = HashMap::new();

    let mut builder = SubMeshBuilder::new("default");
    let mut finished: Vec<SubMesh> = Vec::new();

    for (line_index, raw) in source.lines().enumerate() {
        let line_no = line_index + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let parse_err = |message: String| AssetError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message,
        };

        match keyword {
            "v" => positions.push(parse_floats::<3>(parts).map_err(parse_err)?),
            "vn" => normals.push(parse_floats::<3>(parts).map_err(parse_err)?),
            "vt" => {
                let [u, v] = parse_floats::<2>(parts).map_err(parse_err)?;
                // OBJ has its origin bottom-left, textures here top-left.
                uvs.push([u, 1.0 - v]);
            }
            "f" => {
                let corners = parts
                    .map(|token| {
                        parse_corner(token, positions.len(), uvs.len(), normals.len())
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(parse_err)?;
                if corners.len() < 3 {
                    return Err(parse_err(format!(
                        "face needs at least 3 corners, got {}",
                        corners.len()
                    )));
                }
                for i in 1..corners.len() - 1 {
                    builder.triangle(
                        [corners[0], corners[i], corners[i + 1]],
                        &positions,
                        &uvs,
                        &normals,
                    );
                }
            }
            "o" | "g" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                let material = builder.material.clone();
                flush(&mut builder, &mut finished, &name);
                builder.material = material;
            }
            "usemtl" => {
                let material_name = parts.next().unwrap_or_default().to_string();
                let name = builder.name.clone();
                flush(&mut builder, &mut finished, &name);
                builder.material = materials.get(&material_name).cloned();
                if builder.material.is_none() {
                    tracing::warn!("{}:{line_no}: unknown material '{material_name}'", path.display());
                }
            }
            "mtllib" => {
                for library in parts {
                    if let Some((text, mtl_path)) = read_mtl(library) {
                        materials.extend(parse_mtl(&text, &mtl_path));
                    }
                }
            }
            _ => {}
        }
    }
    let name = builder.name.clone();
    flush(&mut builder, &mut finished, &name);

    if finished.is_empty() {
        return Err(AssetError::Parse {
            path: path.to_path_buf(),
            line: source.lines().count(),
            message: "no faces".into(),
        });
    }

    Ok(MeshData {
        name: "obj".into(),
        sub_meshes: finished,
    })
}

fn flush(builder: &mut SubMeshBuilder, finished: &mut Vec<SubMesh>, next_name: &str) {
    let done = std::mem::replace(builder, SubMeshBuilder::new(next_name));
    if let Some(sub_mesh) = done.finish() {
        finished.push(sub_mesh);
    }
}

fn parse_mtl(source: &str, path: &Path) -> HashMap<String, MtlMaterial> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut materials = HashMap::new();
    let mut current: Option<String> = None;

    for raw in source.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        let Some((keyword, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let rest = rest.trim();
        match keyword {
            "newmtl" => {
                materials.insert(rest.to_string(), MtlMaterial::default());
                current = Some(rest.to_string());
            }
            "map_Kd" | "map_Ks" => {
                let Some(material) = current.as_ref().and_then(|n| materials.get_mut(n)) else {
                    continue;
                };
                let texture = dir.join(rest);
                if keyword == "map_Kd" {
                    material.diffuse = Some(texture);
                } else {
                    material.specular = Some(texture);
                }
            }
            _ => {}
        }
    }
    materials
}

fn parse_floats<'a, const N: usize>(
    mut parts: impl Iterator<Item = &'a str>,
) -> Result<[f32; N], String> {
    let mut out = [0.0; N];
    for slot in &mut out {
        let token = parts
            .next()
            .ok_or_else(|| format!("expected {N} components"))?;
        *slot = token
            .parse()
            .map_err(|_| format!("invalid number '{token}'"))?;
    }
    Ok(out)
}

fn resolve_index(token: &str, count: usize) -> Result<usize, String> {
    let raw: i64 = token
        .parse()
        .map_err(|_| format!("invalid index '{token}'"))?;
    let resolved = match raw {
        0 => return Err("index 0 is not valid in OBJ".into()),
        n if n > 0 => n - 1,
        n => count as i64 + n,
    };
    if resolved < 0 || resolved as usize >= count {
        return Err(format!("index {raw} out of range (have {count})"));
    }
    Ok(resolved as usize)
}

fn parse_corner(
    token: &str,
    position_count: usize,
    uv_count: usize,
    normal_count: usize,
) -> Result<Corner, String> {
    let mut fields = token.split('/');
    let position = resolve_index(fields.next().unwrap_or_default(), position_count)?;
    let uv = match fields.next() {
        Some("") | None => None,
        Some(t) => Some(resolve_index(t, uv_count)?),
    };
    let normal = match fields.next() {
        Some("") | None => None,
        Some(t) => Some(resolve_index(t, normal_count)?),
    };
    Ok((position, uv, normal))
}

struct SubMeshBuilder {
    name: String,
    material: Option<MtlMaterial>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    dedup: HashMap<Corner, u32>,
}

impl SubMeshBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            material: None,
            vertices: Vec::new(),
            indices: Vec::new(),
            dedup: HashMap::new(),
        }
    }

    fn triangle(
        &mut self,
        corners: [Corner; 3],
        positions: &[[f32; 3]],
        uvs: &[[f32; 2]],
        normals: &[[f32; 3]],
    ) {
        let has_normals = corners.iter().all(|c| c.2.is_some());
        if has_normals {
            for corner in corners {
                let index = match self.dedup.get(&corner) {
                    Some(index) => *index,
                    None => {
                        let index = self.vertices.len() as u32;
                        self.vertices.push(Vertex {
                            position: positions[corner.0],
                            normal: corner.2.map(|n| normals[n]).unwrap_or([0.0, 1.0, 0.0]),
                            uv: corner.1.map(|t| uvs[t]).unwrap_or([0.0, 0.0]),
                        });
                        self.dedup.insert(corner, index);
                        index
                    }
                };
                self.indices.push(index);
            }
        } else {
            // Faceted: every corner gets the face normal, no sharing.
            let [a, b, c] = corners.map(|c| positions[c.0]);
            let normal = face_normal(a, b, c);
            for corner in corners {
                self.indices.push(self.vertices.len() as u32);
                self.vertices.push(Vertex {
                    position: positions[corner.0],
                    normal,
                    uv: corner.1.map(|t| uvs[t]).unwrap_or([0.0, 0.0]),
                });
            }
        }
    }

    fn finish(self) -> Option<SubMesh> {
        if self.indices.is_empty() {
            return None;
        }
        let material = self.material.unwrap_or_default();
        Some(SubMesh {
            name: self.name,
            vertices: self.vertices,
            indices: self.indices,
            diffuse_texture: material.diffuse,
            specular_texture: material.specular,
        })
    }
}

fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > f32::EPSILON {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 1.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const QUAD: &str = "\
# a unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    fn parse(source: &str) -> Result<MeshData, AssetError> {
        parse_obj(source, Path::new("test.obj"), |_| None)
    }

    #[test]
    fn quad_is_fan_triangulated_and_shared() {
        let mesh = parse(QUAD).unwrap();
        let sub = &mesh.sub_meshes[0];
        assert_eq!(sub.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(sub.vertices.len(), 4);
        assert_eq!(sub.vertices[0].normal, [0.0, 0.0, 1.0]);
        // v is flipped to a top-left origin.
        assert_eq!(sub.vertices[0].uv, [0.0, 1.0]);
    }

    #[test]
    fn faces_without_normals_get_face_normals() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let sub = &mesh.sub_meshes[0];
        assert_eq!(sub.vertices.len(), 3);
        for v in &sub.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn negative_indices_are_relative() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.sub_meshes[0].vertices[2].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn groups_split_sub_meshes() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\ng first\nf 1 2 3\ng second\nf 1 2 3\n";
        let mesh = parse(source).unwrap();
        let names: Vec<_> = mesh.sub_meshes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn bad_index_reports_line() {
        let err = parse("v 0 0 0\nf 1 2 3\n").unwrap_err();
        match err {
            AssetError::Parse { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("out of range"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(matches!(parse("# nothing\n"), Err(AssetError::Parse { .. })));
    }

    #[test]
    fn load_obj_reads_material_library() {
        let dir = tempfile::tempdir().unwrap();
        let mut mtl = std::fs::File::create(dir.path().join("box.mtl")).unwrap();
        writeln!(mtl, "newmtl crate\nmap_Kd crate_diffuse.png\nmap_Ks crate_spec.png").unwrap();
        let obj_path = dir.path().join("box.obj");
        std::fs::write(
            &obj_path,
            format!("mtllib box.mtl\nusemtl crate\n{QUAD}"),
        )
        .unwrap();

        let mesh = load_obj(&obj_path).unwrap();
        assert_eq!(mesh.name, "box");
        let sub = &mesh.sub_meshes[0];
        assert_eq!(sub.diffuse_texture, Some(dir.path().join("crate_diffuse.png")));
        assert_eq!(sub.specular_texture, Some(dir.path().join("crate_spec.png")));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_obj("/definitely/not/here.obj"),
            Err(AssetError::Io { .. })
        ));
    }
}

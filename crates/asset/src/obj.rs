//! OBJ importer: positions, normals, texture coordinates, objects/groups and
//! material libraries.
//!
//! Each `o`/`g` becomes a child node of the root; within an object a new mesh
//! starts whenever `usemtl` switches material after faces were emitted.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow};

use crate::{
    error::{ImportError, ImportResult},
    mtl,
    postprocess::{self, PostProcess},
    scene::{Face, Material, Scene, SceneFlags, SceneMesh},
};

const DEFAULT_OBJECT: &str = "defaultobject";
const DEFAULT_MATERIAL: &str = "DefaultMaterial";

/// Load an OBJ scene from a file path. `mtllib` files resolve relative to
/// the OBJ's directory; a missing library is logged and skipped.
pub fn load_obj_from_path(path: impl AsRef<Path>, steps: PostProcess) -> ImportResult<Scene> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data = parse_obj(BufReader::new(file))
        .with_context(|| format!("Failed to parse OBJ file: {}", path.display()))?;

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut library = Vec::new();
    for lib in &data.mtllibs {
        match mtl::load_mtl_from_path(dir.join(lib)) {
            Ok(mats) => library.extend(mats),
            Err(e) => log::warn!("Skipping material library '{}': {:#}", lib, e),
        }
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "obj".to_string());
    Ok(data.into_scene(name, library, steps))
}

/// Load an OBJ scene from a [`BufRead`] implementation. Materials named by
/// `usemtl` resolve to the default material.
pub fn load_obj_from_reader<R: BufRead>(reader: R, steps: PostProcess) -> ImportResult<Scene> {
    let data = parse_obj(reader)?;
    Ok(data.into_scene("obj".to_string(), Vec::new(), steps))
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str, steps: PostProcess) -> ImportResult<Scene> {
    load_obj_from_reader(io::Cursor::new(contents), steps)
}

/// Parse an OBJ string together with the contents of its material library.
pub fn load_obj_with_materials(
    contents: &str,
    mtl_contents: &str,
    steps: PostProcess,
) -> ImportResult<Scene> {
    let data = parse_obj(io::Cursor::new(contents))?;
    let library = mtl::load_mtl_from_str(mtl_contents)?;
    Ok(data.into_scene("obj".to_string(), library, steps))
}

/// One `v/vt/vn` corner of a face, as zero-based indices into the file-wide
/// attribute lists. Also the key for vertex deduplication within a mesh.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct FaceVertex {
    position: usize,
    tex_coord: Option<usize>,
    normal: Option<usize>,
}

#[derive(Default)]
struct MeshBuilder {
    material: Option<String>,
    unique: HashMap<FaceVertex, u32>,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    all_normals: bool,
    any_uvs: bool,
    faces: Vec<Face>,
}

impl MeshBuilder {
    fn new(material: Option<String>) -> Self {
        Self {
            material,
            all_normals: true,
            ..Self::default()
        }
    }

    fn finish(self, name: &str, material_index: usize) -> SceneMesh {
        SceneMesh {
            name: name.to_string(),
            normals: (self.all_normals && !self.positions.is_empty()).then_some(self.normals),
            tex_coords: self.any_uvs.then_some(self.uvs),
            positions: self.positions,
            faces: self.faces,
            material_index,
            ..SceneMesh::default()
        }
    }
}

struct ObjectBuilder {
    name: String,
    meshes: Vec<MeshBuilder>,
}

impl ObjectBuilder {
    fn new(name: String, material: Option<String>) -> Self {
        Self {
            name,
            meshes: vec![MeshBuilder::new(material)],
        }
    }

    fn current(&mut self) -> &mut MeshBuilder {
        if self.meshes.is_empty() {
            self.meshes.push(MeshBuilder::new(None));
        }
        let last = self.meshes.len() - 1;
        &mut self.meshes[last]
    }

    fn use_material(&mut self, material: String) {
        let mesh = self.current();
        if mesh.faces.is_empty() {
            mesh.material = Some(material);
        } else {
            self.meshes.push(MeshBuilder::new(Some(material)));
        }
    }
}

/// Parsed OBJ text before materials are resolved.
struct ObjData {
    objects: Vec<ObjectBuilder>,
    mtllibs: Vec<String>,
}

impl ObjData {
    fn into_scene(self, name: String, library: Vec<Material>, steps: PostProcess) -> Scene {
        let mut scene = Scene::new();
        scene.materials.push(Material::named(DEFAULT_MATERIAL));
        scene.materials.extend(library);

        let root = scene.add_node(None, name);
        scene.root = Some(root);

        for object in self.objects {
            let meshes: Vec<MeshBuilder> = object
                .meshes
                .into_iter()
                .filter(|m| !m.faces.is_empty())
                .collect();
            if meshes.is_empty() {
                continue;
            }
            let node = scene.add_node(Some(root), object.name.clone());
            for builder in meshes {
                let material_index = resolve_material(&scene.materials, builder.material.as_deref());
                let mut mesh = builder.finish(&object.name, material_index);
                postprocess::apply(&mut mesh, steps);
                scene.attach_mesh(node, mesh);
            }
        }

        if scene.meshes.is_empty() {
            log::warn!("OBJ contained no faces");
            scene.flags |= SceneFlags::INCOMPLETE;
        }
        scene
    }
}

fn resolve_material(materials: &[Material], name: Option<&str>) -> usize {
    let Some(name) = name else {
        return 0;
    };
    match materials.iter().skip(1).position(|m| m.name == name) {
        Some(i) => i + 1,
        None => {
            log::warn!("Unknown material '{}', using {}", name, DEFAULT_MATERIAL);
            0
        }
    }
}

/// Attribute lists shared by every object in the file.
#[derive(Default)]
struct Attributes {
    positions: Vec<[f32; 3]>,
    tex_coords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
}

impl Attributes {
    /// Find or append the mesh vertex for `corner`.
    fn vertex_index(&self, mesh: &mut MeshBuilder, corner: FaceVertex) -> Result<u32> {
        if let Some(&index) = mesh.unique.get(&corner) {
            return Ok(index);
        }
        let position = self.positions[corner.position];
        let uv = corner.tex_coord.map(|i| self.tex_coords[i]);
        let normal = corner.normal.map(|i| self.normals[i]);
        mesh.any_uvs |= uv.is_some();
        mesh.all_normals &= normal.is_some();

        let index = u32::try_from(mesh.positions.len())
            .map_err(|_| anyhow!("Mesh exceeds {} vertices", u32::MAX))?;
        mesh.positions.push(position);
        mesh.uvs.push(uv.unwrap_or_default());
        mesh.normals.push(normal.unwrap_or_default());
        mesh.unique.insert(corner, index);
        Ok(index)
    }
}

/// Tokens of one OBJ statement plus its 1-based line number for errors.
struct Statement<'a> {
    line: usize,
    tokens: std::str::SplitWhitespace<'a>,
}

impl<'a> Statement<'a> {
    fn next_token(&mut self, what: &str) -> Result<&'a str> {
        self.tokens
            .next()
            .ok_or_else(|| anyhow!("line {}: expected {}", self.line, what))
    }

    fn float(&mut self, what: &str) -> Result<f32> {
        let token = self.next_token(what)?;
        token
            .parse()
            .with_context(|| format!("line {}: bad {} '{}'", self.line, what, token))
    }

    fn vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.float("x")?, self.float("y")?, self.float("z")?])
    }

    /// Rest of the line joined by single spaces.
    fn rest(self) -> String {
        self.tokens.collect::<Vec<_>>().join(" ")
    }

    /// Parse `v`, `v/vt`, `v//vn` or `v/vt/vn`.
    fn face_vertex(&self, token: &str, attrs: &Attributes) -> Result<FaceVertex> {
        let mut fields = token.splitn(3, '/');
        let position = fields.next().unwrap_or_default();
        let optional = |field: Option<&str>, len: usize| match field {
            Some(f) if !f.is_empty() => self.index(f, len).map(Some),
            _ => Ok(None),
        };
        Ok(FaceVertex {
            position: self.index(position, attrs.positions.len())?,
            tex_coord: optional(fields.next(), attrs.tex_coords.len())?,
            normal: optional(fields.next(), attrs.normals.len())?,
        })
    }

    /// 1-based index, or negative relative to the end of the list so far.
    fn index(&self, token: &str, len: usize) -> Result<usize> {
        let raw: i64 = token
            .parse()
            .with_context(|| format!("line {}: bad index '{}'", self.line, token))?;
        let resolved = match raw {
            0 => None,
            r if r > 0 => Some(r - 1),
            r => Some(len as i64 + r),
        };
        resolved
            .filter(|&i| i >= 0 && (i as usize) < len)
            .map(|i| i as usize)
            .ok_or_else(|| anyhow!("line {}: index {} out of range 1..={}", self.line, raw, len))
    }
}

fn parse_obj<R: BufRead>(reader: R) -> Result<ObjData> {
    let mut attrs = Attributes::default();
    let mut objects = vec![ObjectBuilder::new(DEFAULT_OBJECT.to_string(), None)];
    let mut mtllibs = Vec::new();
    let mut material: Option<String> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("line {}: read failed", i + 1))?;
        let text = line.split('#').next().unwrap_or_default();
        let mut stmt = Statement {
            line: i + 1,
            tokens: text.split_whitespace(),
        };
        let Some(tag) = stmt.tokens.next() else {
            continue;
        };

        match tag {
            "v" => attrs.positions.push(stmt.vec3()?),
            "vn" => attrs.normals.push(stmt.vec3()?),
            "vt" => {
                let u = stmt.float("u")?;
                let v = if stmt.tokens.clone().next().is_some() {
                    stmt.float("v")?
                } else {
                    0.0
                };
                attrs.tex_coords.push([u, v]);
            }
            "o" | "g" => {
                let name = stmt.rest();
                let name = if name.is_empty() {
                    DEFAULT_OBJECT.to_string()
                } else {
                    name
                };
                objects.push(ObjectBuilder::new(name, material.clone()));
            }
            "usemtl" => {
                let name = stmt.next_token("material name")?.to_string();
                material = Some(name.clone());
                if let Some(object) = objects.last_mut() {
                    object.use_material(name);
                }
            }
            "mtllib" => {
                let name = stmt.rest();
                if !name.is_empty() {
                    mtllibs.push(name);
                }
            }
            "f" => {
                let corners = stmt
                    .tokens
                    .clone()
                    .map(|t| stmt.face_vertex(t, &attrs))
                    .collect::<Result<Vec<_>>>()?;
                if corners.len() < 3 {
                    log::debug!("line {}: skipping face with {} vertices", stmt.line, corners.len());
                    continue;
                }
                let Some(object) = objects.last_mut() else {
                    continue;
                };
                let mesh = object.current();
                let indices = corners
                    .into_iter()
                    .map(|c| attrs.vertex_index(mesh, c))
                    .collect::<Result<Vec<_>>>()?;
                mesh.faces.push(Face::new(indices));
            }
            // s, l, p and friends carry nothing we render.
            _ => {}
        }
    }

    Ok(ObjData { objects, mtllibs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneSource, TextureSlot};

    const TRIANGLE: &str = r#"
        v 0.0 0.0 0.0
        v 1.0 0.0 0.0
        v 0.0 1.0 0.0
        vn 0.0 0.0 1.0
        vt 0.0 0.0
        vt 1.0 0.0
        vt 0.0 1.0
        f 1/1/1 2/2/1 3/3/1
    "#;

    #[test]
    fn parse_simple_triangle() {
        let scene = load_obj_from_str(TRIANGLE, PostProcess::empty()).expect("parse triangle");
        assert!(scene.flags.is_empty());
        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces, vec![Face::new(vec![0, 1, 2])]);
        assert!(mesh.has_normals());
        assert!(mesh.has_tex_coords());
        assert_eq!(mesh.tex_coords.as_ref().unwrap()[2], [0.0, 1.0]);
    }

    #[test]
    fn default_steps_flip_uvs_and_build_tangents() {
        let scene = load_obj_from_str(TRIANGLE, PostProcess::default()).expect("parse triangle");
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.tex_coords.as_ref().unwrap()[2], [0.0, 0.0]);
        assert_eq!(mesh.tangents.as_ref().map(Vec::len), Some(3));
        assert_eq!(mesh.bitangents.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn objects_become_children_of_root() {
        let src = r#"
            v 0 0 0
            v 1 0 0
            v 1 1 0
            v 0 1 0
            o first
            f 1 2 3 4
            o second
            f 1 2 3
            g empty
        "#;
        let scene = load_obj_from_str(src, PostProcess::TRIANGULATE).expect("parse objects");
        let root = scene.root().expect("root");
        let children = scene.node_children(root);
        assert_eq!(children.len(), 2);
        assert_eq!(scene.node(children[0]).map(|n| n.name.as_str()), Some("first"));
        assert_eq!(scene.node(children[1]).map(|n| n.name.as_str()), Some("second"));
        assert_eq!(scene.node_meshes(children[0]), &[0]);
        assert_eq!(scene.meshes[0].faces.len(), 2);
        // No vn lines: normals are left to post-processing.
        assert!(!scene.meshes[0].has_normals());
        assert!(!scene.meshes[0].has_tex_coords());
    }

    #[test]
    fn usemtl_splits_meshes_and_resolves_library() {
        let obj = r#"
            mtllib scene.mtl
            v 0 0 0
            v 1 0 0
            v 0 1 0
            usemtl brick
            f 1 2 3
            usemtl nowhere
            f 3 2 1
        "#;
        let mtl = "newmtl brick\nmap_Kd brick.png\n";
        let scene = load_obj_with_materials(obj, mtl, PostProcess::empty()).expect("parse");
        assert_eq!(scene.meshes.len(), 2);
        assert_eq!(scene.meshes[0].material_index, 1);
        assert_eq!(scene.meshes[1].material_index, 0);
        assert_eq!(
            scene.material_textures(1, TextureSlot::Diffuse),
            &["brick.png".to_string()]
        );
    }

    #[test]
    fn mtllib_name_keeps_interior_spaces() {
        let data = parse_obj(io::Cursor::new("mtllib my scene.mtl\nv 0 0 0\n")).expect("parse");
        assert_eq!(data.mtllibs, vec!["my scene.mtl".to_string()]);
    }

    #[test]
    fn negative_indices_are_relative() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let scene = load_obj_from_str(src, PostProcess::empty()).expect("parse");
        assert_eq!(scene.meshes[0].vertex_count(), 3);
    }

    #[test]
    fn faceless_obj_is_incomplete() {
        let scene = load_obj_from_str("v 0 0 0\n", PostProcess::default()).expect("parse");
        assert!(scene.flags.contains(SceneFlags::INCOMPLETE));
    }

    #[test]
    fn out_of_range_index_is_a_parse_error() {
        let err = load_obj_from_str("v 0 0 0\nf 1 2 3\n", PostProcess::empty()).unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_obj_from_path("/definitely/not/here.obj", PostProcess::default()).unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }
}

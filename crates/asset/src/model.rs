//! Model import: flatten a scene graph into meshes and resolve their
//! material textures through a per-model cache.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::{ImportError, ImportResult},
    import::{self, Importer},
    mesh::{Bounds, Mesh, Texture, TextureKind, Vertex},
    postprocess::PostProcess,
    scene::{SceneFlags, SceneMesh, SceneSource},
    texture::{TextureData, TextureUploader},
};

/// How a model is imported.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportOptions {
    pub post_process: PostProcess,
    /// Texture kinds resolved from each material, in binding order.
    pub texture_kinds: Vec<TextureKind>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            post_process: PostProcess::default(),
            texture_kinds: vec![TextureKind::Diffuse],
        }
    }
}

/// Meshes of one imported scene plus every texture they reference.
#[derive(Debug)]
pub struct Model<H> {
    meshes: Vec<Mesh<H>>,
    directory: PathBuf,
    textures_loaded: Vec<Arc<Texture<H>>>,
    by_path: HashMap<String, usize>,
}

impl<H> Model<H> {
    /// Import `path` with default options.
    pub fn load<U>(path: impl AsRef<Path>, uploader: &mut U) -> ImportResult<Self>
    where
        U: TextureUploader<Handle = H>,
    {
        Self::load_with(path, uploader, &ImportOptions::default())
    }

    pub fn load_with<U>(
        path: impl AsRef<Path>,
        uploader: &mut U,
        options: &ImportOptions,
    ) -> ImportResult<Self>
    where
        U: TextureUploader<Handle = H>,
    {
        let path = path.as_ref();
        let importer = import::importer_for(path).inspect_err(|e| {
            log::error!("Cannot import {}: {}", path.display(), e);
        })?;
        Self::load_with_importer(importer.as_ref(), path, uploader, options)
    }

    pub fn load_with_importer<U>(
        importer: &dyn Importer,
        path: &Path,
        uploader: &mut U,
        options: &ImportOptions,
    ) -> ImportResult<Self>
    where
        U: TextureUploader<Handle = H>,
    {
        let scene = importer
            .read_file(path, options.post_process)
            .inspect_err(|e| log::error!("Failed to import {}: {}", path.display(), e))?;
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let model = Self::from_scene(&scene, directory, uploader, options)?;
        log::info!(
            "Loaded {}: {} meshes, {} textures",
            path.display(),
            model.meshes.len(),
            model.textures_loaded.len()
        );
        Ok(model)
    }

    /// Build a model from an already imported scene. Texture paths resolve
    /// relative to `directory`.
    pub fn from_scene<S, U>(
        scene: &S,
        directory: impl Into<PathBuf>,
        uploader: &mut U,
        options: &ImportOptions,
    ) -> ImportResult<Self>
    where
        S: SceneSource + ?Sized,
        U: TextureUploader<Handle = H>,
    {
        if scene.flags().contains(SceneFlags::INCOMPLETE) {
            log::error!("Scene import reported an incomplete scene");
            return Err(ImportError::Incomplete);
        }
        let Some(root) = scene.root() else {
            log::error!("Scene import produced no root node");
            return Err(ImportError::MissingRoot);
        };

        let mut model = Self {
            meshes: Vec::new(),
            directory: directory.into(),
            textures_loaded: Vec::new(),
            by_path: HashMap::new(),
        };

        // Pre-order: a node's meshes, then its children in source order.
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for &index in scene.node_meshes(node) {
                match scene.mesh(index) {
                    Some(src) => {
                        let mesh = model.process_mesh(src, scene, uploader, options);
                        model.meshes.push(mesh);
                    }
                    None => log::warn!("Node {} references missing mesh {}", node, index),
                }
            }
            stack.extend(scene.node_children(node).iter().rev().copied());
        }

        Ok(model)
    }

    pub fn meshes(&self) -> &[Mesh<H>] {
        &self.meshes
    }

    pub fn into_meshes(self) -> Vec<Mesh<H>> {
        self.meshes
    }

    /// Directory texture paths were resolved against.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Every texture created for this model, in load order.
    pub fn loaded_textures(&self) -> &[Arc<Texture<H>>] {
        &self.textures_loaded
    }

    pub fn texture(&self, path: &str) -> Option<&Arc<Texture<H>>> {
        self.by_path.get(path).map(|&i| &self.textures_loaded[i])
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.meshes
            .iter()
            .filter_map(Mesh::bounds)
            .reduce(|a, b| a.union(&b))
    }

    fn process_mesh<S, U>(
        &mut self,
        src: &SceneMesh,
        scene: &S,
        uploader: &mut U,
        options: &ImportOptions,
    ) -> Mesh<H>
    where
        S: SceneSource + ?Sized,
        U: TextureUploader<Handle = H>,
    {
        let attr3 = |stream: &Option<Vec<[f32; 3]>>, i: usize| {
            stream
                .as_ref()
                .and_then(|s| s.get(i).copied())
                .unwrap_or([0.0; 3])
        };

        let vertices = (0..src.vertex_count())
            .map(|i| {
                let position = src.positions[i];
                let normal = attr3(&src.normals, i);
                match src.tex_coords.as_ref() {
                    Some(uvs) => {
                        let uv = uvs.get(i).copied().unwrap_or([0.0; 2]);
                        Vertex::new(position, normal, uv)
                            .with_tangent_frame(attr3(&src.tangents, i), attr3(&src.bitangents, i))
                    }
                    None => Vertex::new(position, normal, [0.0, 0.0]),
                }
            })
            .collect();

        let indices = src
            .faces
            .iter()
            .flat_map(|f| f.indices.iter().copied())
            .collect();

        let mut textures = Vec::new();
        for &kind in &options.texture_kinds {
            for path in scene.material_textures(src.material_index, kind.source_slot()) {
                textures.push(self.load_texture(path, kind, uploader));
            }
        }

        Mesh::new(vertices, indices, textures)
    }

    /// Cached texture for `path`, decoding and uploading it on first use.
    fn load_texture<U>(&mut self, path: &str, kind: TextureKind, uploader: &mut U) -> Arc<Texture<H>>
    where
        U: TextureUploader<Handle = H>,
    {
        if let Some(&i) = self.by_path.get(path) {
            return Arc::clone(&self.textures_loaded[i]);
        }

        let filename = self.directory.join(path);
        let handle = match TextureData::load(&filename)
            .and_then(|data| uploader.upload(&data, path))
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Texture failed to load at path {}: {:#}", path, e);
                None
            }
        };

        let texture = Arc::new(Texture {
            handle,
            kind,
            path: path.to_string(),
        });
        self.by_path.insert(path.to_string(), self.textures_loaded.len());
        self.textures_loaded.push(Arc::clone(&texture));
        texture
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::scene::{Face, Material, Node, Scene};

    #[derive(Default)]
    struct CountingUploader {
        uploads: Vec<String>,
    }

    impl TextureUploader for CountingUploader {
        type Handle = u32;

        fn upload(&mut self, data: &TextureData, label: &str) -> anyhow::Result<u32> {
            assert!(data.is_valid());
            self.uploads.push(label.to_string());
            Ok(self.uploads.len() as u32)
        }
    }

    struct FailingUploader;

    impl TextureUploader for FailingUploader {
        type Handle = u32;

        fn upload(&mut self, _: &TextureData, _: &str) -> anyhow::Result<u32> {
            anyhow::bail!("device lost")
        }
    }

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("asset-model-{}-{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create fixture dir");
        dir
    }

    fn write_png(dir: &Path, name: &str) {
        image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]))
            .save(dir.join(name))
            .expect("write png");
    }

    fn tagged_mesh(tag: f32, material_index: usize) -> SceneMesh {
        SceneMesh {
            name: format!("m{tag}"),
            positions: vec![[tag, 0.0, 0.0], [tag, 1.0, 0.0], [tag, 0.0, 1.0]],
            faces: vec![Face::new(vec![0, 1, 2])],
            material_index,
            ..SceneMesh::default()
        }
    }

    fn node(meshes: Vec<usize>, children: Vec<usize>) -> Node {
        Node {
            name: String::new(),
            meshes,
            children,
        }
    }

    #[test]
    fn meshes_flatten_in_pre_order() {
        // root(m3) -> [a(m1, m0) -> [a1(m4)], b(m2)]
        let scene = Scene {
            root: Some(0),
            nodes: vec![
                node(vec![3], vec![1, 3]),
                node(vec![1, 0], vec![2]),
                node(vec![4], vec![]),
                node(vec![2], vec![]),
            ],
            meshes: (0..5).map(|i| tagged_mesh(i as f32, 0)).collect(),
            materials: vec![Material::named("default")],
            ..Scene::default()
        };
        let mut uploader = CountingUploader::default();
        let model = Model::from_scene(&scene, "", &mut uploader, &ImportOptions::default())
            .expect("model");

        let order: Vec<f32> = model
            .meshes()
            .iter()
            .map(|m| m.vertices[0].position[0])
            .collect();
        assert_eq!(order, vec![3.0, 1.0, 0.0, 4.0, 2.0]);
        assert_eq!(model.meshes()[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn shared_texture_is_uploaded_once() {
        let dir = fixture_dir("shared");
        write_png(&dir, "shared.png");
        write_png(&dir, "other.png");

        let mut first = Material::named("first");
        first.diffuse = vec!["shared.png".into()];
        let mut second = Material::named("second");
        second.diffuse = vec!["shared.png".into(), "other.png".into()];

        let scene = Scene {
            root: Some(0),
            nodes: vec![node(vec![0, 1, 2], vec![])],
            meshes: vec![tagged_mesh(0.0, 0), tagged_mesh(1.0, 1), tagged_mesh(2.0, 0)],
            materials: vec![first, second],
            ..Scene::default()
        };
        let mut uploader = CountingUploader::default();
        let model = Model::from_scene(&scene, &dir, &mut uploader, &ImportOptions::default())
            .expect("model");

        assert_eq!(uploader.uploads, vec!["shared.png", "other.png"]);
        assert_eq!(model.loaded_textures().len(), 2);
        let meshes = model.meshes();
        assert!(Arc::ptr_eq(&meshes[0].textures[0], &meshes[1].textures[0]));
        assert!(Arc::ptr_eq(&meshes[0].textures[0], &meshes[2].textures[0]));
        assert_eq!(meshes[1].textures[1].handle, Some(2));
        assert_eq!(
            meshes[1].draw_plan().binding("texture_diffuse2").map(|b| b.texture),
            Some(1)
        );
    }

    #[test]
    fn incomplete_scene_is_rejected() {
        let scene = Scene {
            flags: SceneFlags::INCOMPLETE,
            root: Some(0),
            nodes: vec![node(vec![0], vec![])],
            meshes: vec![tagged_mesh(0.0, 0)],
            ..Scene::default()
        };
        let mut uploader = CountingUploader::default();
        let err = Model::from_scene(&scene, "", &mut uploader, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ImportError::Incomplete));
    }

    #[test]
    fn rootless_scene_is_rejected() {
        let scene = Scene {
            meshes: vec![tagged_mesh(0.0, 0)],
            ..Scene::default()
        };
        let mut uploader = CountingUploader::default();
        let err = Model::from_scene(&scene, "", &mut uploader, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingRoot));
    }

    #[test]
    fn faceless_mesh_yields_empty_draw() {
        let mut empty = tagged_mesh(0.0, 0);
        empty.faces.clear();
        let scene = Scene {
            root: Some(0),
            nodes: vec![node(vec![0], vec![])],
            meshes: vec![empty],
            ..Scene::default()
        };
        let mut uploader = CountingUploader::default();
        let model = Model::from_scene(&scene, "", &mut uploader, &ImportOptions::default())
            .expect("model");
        let mesh = &model.meshes()[0];
        assert!(mesh.indices.is_empty());
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.draw_plan().index_count, 0);
    }

    #[test]
    fn unreadable_texture_leaves_null_handle() {
        let dir = fixture_dir("missing");
        let mut mat = Material::named("broken");
        mat.diffuse = vec!["nope.png".into()];
        let scene = Scene {
            root: Some(0),
            nodes: vec![node(vec![0, 1], vec![])],
            meshes: vec![tagged_mesh(0.0, 0), tagged_mesh(1.0, 0)],
            materials: vec![mat],
            ..Scene::default()
        };
        let mut uploader = CountingUploader::default();
        let model = Model::from_scene(&scene, &dir, &mut uploader, &ImportOptions::default())
            .expect("model");

        assert!(uploader.uploads.is_empty());
        assert_eq!(model.loaded_textures().len(), 1);
        let tex = model.texture("nope.png").expect("cached");
        assert!(!tex.is_loaded());
        assert!(model.meshes()[1].draw_plan().bindings.is_empty());
    }

    #[test]
    fn failed_upload_leaves_null_handle() {
        let dir = fixture_dir("failing");
        write_png(&dir, "a.png");
        let mut mat = Material::named("m");
        mat.diffuse = vec!["a.png".into()];
        let scene = Scene {
            root: Some(0),
            nodes: vec![node(vec![0], vec![])],
            meshes: vec![tagged_mesh(0.0, 0)],
            materials: vec![mat],
            ..Scene::default()
        };
        let model = Model::from_scene(&scene, &dir, &mut FailingUploader, &ImportOptions::default())
            .expect("model");
        assert!(model.meshes()[0].textures[0].handle.is_none());
    }

    #[test]
    fn non_diffuse_kinds_are_opt_in() {
        let dir = fixture_dir("kinds");
        write_png(&dir, "d.png");
        write_png(&dir, "s.png");
        let mut mat = Material::named("m");
        mat.diffuse = vec!["d.png".into()];
        mat.specular = vec!["s.png".into()];
        let scene = Scene {
            root: Some(0),
            nodes: vec![node(vec![0], vec![])],
            meshes: vec![tagged_mesh(0.0, 0)],
            materials: vec![mat],
            ..Scene::default()
        };

        let mut uploader = CountingUploader::default();
        let model = Model::from_scene(&scene, &dir, &mut uploader, &ImportOptions::default())
            .expect("model");
        assert_eq!(model.meshes()[0].textures.len(), 1);

        let options = ImportOptions {
            texture_kinds: vec![TextureKind::Diffuse, TextureKind::Specular],
            ..ImportOptions::default()
        };
        let mut uploader = CountingUploader::default();
        let model = Model::from_scene(&scene, &dir, &mut uploader, &options).expect("model");
        let plan = model.meshes()[0].draw_plan();
        assert!(plan.binding("texture_diffuse1").is_some());
        assert!(plan.binding("texture_specular1").is_some());
    }

    #[test]
    fn loads_obj_with_material_library() {
        let dir = fixture_dir("obj");
        write_png(&dir, "crate.png");
        fs::write(dir.join("box.mtl"), "newmtl crate\nmap_Kd crate.png\n").expect("mtl");
        fs::write(
            dir.join("box.obj"),
            "mtllib box.mtl\n\
             v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             o lid\nusemtl crate\nf 1/1 2/2 3/3 4/4\n\
             o base\nusemtl crate\nf 1/1 3/3 2/2\n",
        )
        .expect("obj");

        let mut uploader = CountingUploader::default();
        let model = Model::load(dir.join("box.obj"), &mut uploader).expect("load");

        assert_eq!(model.meshes().len(), 2);
        assert_eq!(model.meshes()[0].indices.len(), 6);
        assert_eq!(uploader.uploads, vec!["crate.png"]);
        assert_eq!(model.directory(), dir.as_path());

        let v = model.meshes()[0].vertices[0];
        // Flipped uv and generated +Z normal.
        assert_eq!(v.tex_coords, [0.0, 1.0]);
        assert!((v.normal[2] - 1.0).abs() < 1e-5);
        assert!((v.tangent[0] - 1.0).abs() < 1e-5);

        let bounds = model.bounds().expect("bounds");
        assert_eq!(bounds.max.to_array(), [1.0, 1.0, 0.0]);
    }

    #[test]
    fn missing_scene_file_fails() {
        let mut uploader = CountingUploader::default();
        let err = Model::load("/no/such/model.obj", &mut uploader).unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }

    struct BrokenImporter;

    impl Importer for BrokenImporter {
        fn read_file(&self, path: &Path, _: PostProcess) -> ImportResult<Scene> {
            Err(ImportError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other("disk on fire"),
            })
        }
    }

    #[test]
    fn importer_error_yields_no_model() {
        let mut uploader = CountingUploader::default();
        let err = Model::load_with_importer(
            &BrokenImporter,
            Path::new("scene.obj"),
            &mut uploader,
            &ImportOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::Io { ref path, .. } if path == Path::new("scene.obj")));
        assert!(uploader.uploads.is_empty());
    }

    #[test]
    fn unsupported_extension_fails() {
        let mut uploader = CountingUploader::default();
        let err = Model::load("/no/such/model.blend", &mut uploader).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }
}

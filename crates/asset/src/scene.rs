//! Importer-side scene graph.
//!
//! [`Scene`] is what an [`Importer`](crate::import::Importer) produces: an
//! arena of nodes, a flat list of meshes referenced by index, and materials
//! that name texture files per slot. Model building only reads it through
//! [`SceneSource`], so any importer can stand behind that trait.

use bitflags::bitflags;

bitflags! {
    /// Scene-level status reported by the importer.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SceneFlags: u32 {
        /// The importer could not produce a usable scene.
        const INCOMPLETE = 1 << 0;
    }
}

/// Index into [`Scene::nodes`].
pub type NodeId = usize;

/// Material texture slots as the importer categorises them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse,
    Specular,
    Ambient,
    Height,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: String,
    /// Indices into [`Scene::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<NodeId>,
}

/// A polygon; triangles after triangulation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Face {
    pub indices: Vec<u32>,
}

impl Face {
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }
}

/// Per-vertex streams of one mesh. Optional streams are either absent or as
/// long as `positions`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// First texture-coordinate channel.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub tangents: Option<Vec<[f32; 3]>>,
    pub bitangents: Option<Vec<[f32; 3]>>,
    pub faces: Vec<Face>,
    pub material_index: usize,
}

impl SceneMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    #[inline]
    pub fn has_tex_coords(&self) -> bool {
        self.tex_coords.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: Vec<String>,
    pub specular: Vec<String>,
    pub ambient: Vec<String>,
    pub height: Vec<String>,
}

impl Material {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Texture paths for `slot`, in declaration order.
    pub fn textures(&self, slot: TextureSlot) -> &[String] {
        match slot {
            TextureSlot::Diffuse => &self.diffuse,
            TextureSlot::Specular => &self.specular,
            TextureSlot::Ambient => &self.ambient,
            TextureSlot::Height => &self.height,
        }
    }

    pub fn textures_mut(&mut self, slot: TextureSlot) -> &mut Vec<String> {
        match slot {
            TextureSlot::Diffuse => &mut self.diffuse,
            TextureSlot::Specular => &mut self.specular,
            TextureSlot::Ambient => &mut self.ambient,
            TextureSlot::Height => &mut self.height,
        }
    }
}

/// Read-only view of an imported scene.
pub trait SceneSource {
    fn flags(&self) -> SceneFlags;
    fn root(&self) -> Option<NodeId>;
    fn node_children(&self, node: NodeId) -> &[NodeId];
    fn node_meshes(&self, node: NodeId) -> &[usize];
    fn mesh(&self, index: usize) -> Option<&SceneMesh>;
    fn material_textures(&self, material: usize, slot: TextureSlot) -> &[String];
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub flags: SceneFlags,
    pub root: Option<NodeId>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<SceneMesh>,
    pub materials: Vec<Material>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, optionally under `parent`, and return its id.
    pub fn add_node(&mut self, parent: Option<NodeId>, name: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.into(),
            ..Node::default()
        });
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.push(id);
        }
        id
    }

    /// Append a mesh and attach it to `node`. Returns the mesh index.
    pub fn attach_mesh(&mut self, node: NodeId, mesh: SceneMesh) -> usize {
        let index = self.meshes.len();
        self.meshes.push(mesh);
        if let Some(node) = self.nodes.get_mut(node) {
            node.meshes.push(index);
        }
        index
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }
}

impl SceneSource for Scene {
    fn flags(&self) -> SceneFlags {
        self.flags
    }

    fn root(&self) -> Option<NodeId> {
        self.root.filter(|&r| r < self.nodes.len())
    }

    fn node_children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn node_meshes(&self, node: NodeId) -> &[usize] {
        self.nodes.get(node).map(|n| n.meshes.as_slice()).unwrap_or(&[])
    }

    fn mesh(&self, index: usize) -> Option<&SceneMesh> {
        self.meshes.get(index)
    }

    fn material_textures(&self, material: usize, slot: TextureSlot) -> &[String] {
        self.materials
            .get(material)
            .map(|m| m.textures(slot))
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_link_to_parent_in_insertion_order() {
        let mut scene = Scene::new();
        let root = scene.add_node(None, "root");
        let a = scene.add_node(Some(root), "a");
        let b = scene.add_node(Some(root), "b");
        scene.root = Some(root);

        assert_eq!(scene.node_children(root), &[a, b]);
        assert!(scene.node_children(a).is_empty());
        assert_eq!(scene.root(), Some(root));
    }

    #[test]
    fn dangling_root_is_treated_as_missing() {
        let scene = Scene {
            root: Some(3),
            ..Scene::default()
        };
        assert_eq!(scene.root(), None);
    }

    #[test]
    fn unknown_material_has_no_textures() {
        let scene = Scene::new();
        assert!(scene.material_textures(7, TextureSlot::Diffuse).is_empty());
    }
}

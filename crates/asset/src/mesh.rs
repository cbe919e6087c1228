//! CPU-side mesh representation produced by model import.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::scene::TextureSlot;

pub const MAX_BONE_INFLUENCE: usize = 4;

/// Interleaved vertex, laid out exactly as the vertex shader reads it
/// (locations 0..=6 in field order). Values are in object space.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub bone_ids: [i32; MAX_BONE_INFLUENCE],
    pub bone_weights: [f32; MAX_BONE_INFLUENCE],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
            ..Self::default()
        }
    }

    pub fn with_tangent_frame(mut self, tangent: [f32; 3], bitangent: [f32; 3]) -> Self {
        self.tangent = tangent;
        self.bitangent = bitangent;
        self
    }
}

/// What a texture feeds in the shader. Determines the sampler name prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    pub const ALL: [TextureKind; 4] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Height,
    ];

    pub fn sampler_prefix(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "texture_diffuse",
            TextureKind::Specular => "texture_specular",
            TextureKind::Normal => "texture_normal",
            TextureKind::Height => "texture_height",
        }
    }

    /// Material slot this kind is read from. OBJ bump maps arrive in the
    /// height slot and ambient maps carry height data.
    pub fn source_slot(self) -> TextureSlot {
        match self {
            TextureKind::Diffuse => TextureSlot::Diffuse,
            TextureKind::Specular => TextureSlot::Specular,
            TextureKind::Normal => TextureSlot::Height,
            TextureKind::Height => TextureSlot::Ambient,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "diffuse" => Some(TextureKind::Diffuse),
            "specular" => Some(TextureKind::Specular),
            "normal" => Some(TextureKind::Normal),
            "height" => Some(TextureKind::Height),
            _ => None,
        }
    }
}

/// A texture shared between meshes of one model. `handle` is `None` when the
/// image could not be decoded or uploaded.
#[derive(Debug)]
pub struct Texture<H> {
    pub handle: Option<H>,
    pub kind: TextureKind,
    /// Path as written in the material; the deduplication key.
    pub path: String,
}

impl<H> Texture<H> {
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }
}

/// One sampler assignment for a draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplerBinding {
    /// Shader sampler name, e.g. `texture_diffuse1`.
    pub name: String,
    pub kind: TextureKind,
    /// 1-based number within `kind` for this mesh.
    pub number: u32,
    /// Consecutive texture unit, starting at 0 for each mesh.
    pub slot: u32,
    /// Index into [`Mesh::textures`].
    pub texture: usize,
}

/// Everything a draw call needs besides GPU objects.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawPlan {
    pub bindings: Vec<SamplerBinding>,
    pub index_count: u32,
}

impl DrawPlan {
    pub fn binding(&self, name: &str) -> Option<&SamplerBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

/// Axis-aligned bounds in object space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f32; 3]>) -> Option<Self> {
        points.into_iter().fold(None::<Bounds>, |acc, p| {
            let p = Vec3::from(*p);
            Some(match acc {
                None => Bounds { min: p, max: p },
                Some(b) => b.union(&Bounds { min: p, max: p }),
            })
        })
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }
}

/// Indexed triangle list plus the textures its material uses.
#[derive(Debug)]
pub struct Mesh<H> {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub textures: Vec<Arc<Texture<H>>>,
}

impl<H> Mesh<H> {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, textures: Vec<Arc<Texture<H>>>) -> Self {
        Self {
            vertices,
            indices,
            textures,
        }
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Number textures per kind from 1 and assign consecutive slots.
    /// Textures without a handle are neither bound nor numbered.
    pub fn draw_plan(&self) -> DrawPlan {
        let mut counters = [0u32; TextureKind::ALL.len()];
        let mut bindings = Vec::with_capacity(self.textures.len());

        for (i, texture) in self.textures.iter().enumerate() {
            if !texture.is_loaded() {
                log::debug!("Skipping unloaded texture '{}'", texture.path);
                continue;
            }
            let counter = &mut counters[texture.kind as usize];
            *counter += 1;
            bindings.push(SamplerBinding {
                name: format!("{}{}", texture.kind.sampler_prefix(), counter),
                kind: texture.kind,
                number: *counter,
                slot: bindings.len() as u32,
                texture: i,
            });
        }

        DrawPlan {
            bindings,
            index_count: self.index_count(),
        }
    }
}

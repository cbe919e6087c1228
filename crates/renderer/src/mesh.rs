//! Per-mesh GPU buffers and the vertex/material layouts they are drawn with.

use std::sync::Arc;

use asset::{Bounds, Mesh, Model, Texture, Vertex};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferDescriptor, BufferUsages,
    Device, IndexFormat, RenderPass, SamplerBindingType, ShaderStages, TextureSampleType,
    TextureViewDimension, VertexAttribute, VertexBufferLayout, VertexStepMode,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::texture::GpuTexture;

/// Locations 0..=6: position, normal, tex_coords, tangent, bitangent,
/// bone ids, bone weights.
pub const VERTEX_ATTRIBUTES: [VertexAttribute; 7] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2,
    3 => Float32x3,
    4 => Float32x3,
    5 => Sint32x4,
    6 => Float32x4
];

pub const VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &VERTEX_ATTRIBUTES,
};

/// Sampler names the model shader declares, in binding order. Sampler `i`
/// uses bindings `2i` (texture) and `2i + 1` (sampler) of the material group.
pub const MATERIAL_SAMPLERS: &[&str] = &["texture_diffuse1"];

pub fn create_material_layout(device: &Device) -> BindGroupLayout {
    let entries: Vec<BindGroupLayoutEntry> = (0..MATERIAL_SAMPLERS.len() as u32)
        .flat_map(|i| {
            [
                BindGroupLayoutEntry {
                    binding: 2 * i,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2 * i + 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect();

    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("Material BGL"),
        entries: &entries,
    })
}

/// Buffers and material bind group of one uploaded mesh.
pub struct GpuMesh {
    vertex_buf: Buffer,
    index_buf: Buffer,
    index_count: u32,
    material_bg: BindGroup,
    /// Keeps the bound textures alive as long as the bind group.
    _textures: Vec<Arc<Texture<GpuTexture>>>,
}

impl GpuMesh {
    /// Upload vertices and indices and bind the mesh's textures by sampler
    /// name. Unbound sampler names fall back to `fallback`. Fails when a
    /// buffer would exceed the device's `max_buffer_size`.
    pub fn upload(
        device: &Device,
        material_layout: &BindGroupLayout,
        mesh: Mesh<GpuTexture>,
        fallback: &GpuTexture,
    ) -> anyhow::Result<Self> {
        let max = device.limits().max_buffer_size;
        check_buffer_size("vertex", size_of_val(mesh.vertices.as_slice()), max)?;
        check_buffer_size("index", size_of_val(mesh.indices.as_slice()), max)?;

        let vertex_buf = init_buffer(
            device,
            "Mesh VB",
            bytemuck::cast_slice(&mesh.vertices),
            BufferUsages::VERTEX,
        );
        let index_buf = init_buffer(
            device,
            "Mesh IB",
            bytemuck::cast_slice(&mesh.indices),
            BufferUsages::INDEX,
        );

        let plan = mesh.draw_plan();
        let bound: Vec<&GpuTexture> = MATERIAL_SAMPLERS
            .iter()
            .map(|name| {
                plan.binding(name)
                    .and_then(|b| mesh.textures[b.texture].handle.as_ref())
                    .unwrap_or(fallback)
            })
            .collect();
        let entries: Vec<BindGroupEntry> = bound
            .iter()
            .enumerate()
            .flat_map(|(i, tex)| {
                let i = i as u32;
                [
                    BindGroupEntry {
                        binding: 2 * i,
                        resource: BindingResource::TextureView(&tex.view),
                    },
                    BindGroupEntry {
                        binding: 2 * i + 1,
                        resource: BindingResource::Sampler(&tex.sampler),
                    },
                ]
            })
            .collect();
        let material_bg = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Material BG"),
            layout: material_layout,
            entries: &entries,
        });

        Ok(Self {
            vertex_buf,
            index_buf,
            index_count: plan.index_count,
            material_bg,
            _textures: mesh.textures,
        })
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Record the draw. The material group is bound at `material_group`.
    pub fn draw(&self, rpass: &mut RenderPass<'_>, material_group: u32) {
        rpass.set_bind_group(material_group, &self.material_bg, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buf.slice(..));
        rpass.set_index_buffer(self.index_buf.slice(..), IndexFormat::Uint32);
        rpass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// All meshes of a model, uploaded once. Consumes the model. Meshes the
/// device cannot hold are logged and left out.
pub struct GpuModel {
    meshes: Vec<GpuMesh>,
    bounds: Option<Bounds>,
}

impl GpuModel {
    pub fn upload(
        device: &Device,
        material_layout: &BindGroupLayout,
        model: Model<GpuTexture>,
        fallback: &GpuTexture,
    ) -> Self {
        let bounds = model.bounds();
        let meshes = model
            .into_meshes()
            .into_iter()
            .enumerate()
            .filter_map(|(i, mesh)| {
                GpuMesh::upload(device, material_layout, mesh, fallback)
                    .inspect_err(|e| log::warn!("Skipping mesh {}: {:#}", i, e))
                    .ok()
            })
            .collect();
        Self { meshes, bounds }
    }

    pub fn meshes(&self) -> &[GpuMesh] {
        &self.meshes
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn draw(&self, rpass: &mut RenderPass<'_>, material_group: u32) {
        for mesh in &self.meshes {
            mesh.draw(rpass, material_group);
        }
    }
}

fn check_buffer_size(what: &str, bytes: usize, max: u64) -> anyhow::Result<()> {
    if bytes as u64 > max {
        anyhow::bail!("{} buffer of {} bytes exceeds device limit {}", what, bytes, max);
    }
    Ok(())
}

/// Like `create_buffer_init`, but an empty slice still yields a bindable
/// buffer so empty meshes can be drawn with a zero count.
fn init_buffer(device: &Device, label: &str, contents: &[u8], usage: BufferUsages) -> Buffer {
    if contents.is_empty() {
        return device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: wgpu::COPY_BUFFER_ALIGNMENT,
            usage,
            mapped_at_creation: false,
        });
    }
    device.create_buffer_init(&BufferInitDescriptor {
        label: Some(label),
        contents,
        usage,
    })
}

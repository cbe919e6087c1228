//! Camera uniform binding and the textured-model pipeline.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use corelib::{Mat4, Vec3};
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, BufferUsages, Device, Queue, RenderPipeline,
    TextureFormat, util::DeviceExt,
};

use crate::mesh::VERTEX_LAYOUT;

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
pub const CAMERA_GROUP: u32 = 0;
pub const MATERIAL_GROUP: u32 = 1;

/// Per-frame uniforms. Matches `Camera` in model.wgsl; 16-byte aligned.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    /// xyz = direction the light travels, w unused.
    pub light_dir: [f32; 4],
}

impl CameraUniform {
    pub fn new(view_proj: Mat4, model: Mat4, light_dir: Vec3) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            light_dir: light_dir.extend(0.0).to_array(),
        }
    }
}

/// Uniform buffer plus the group-0 bind group that exposes it.
pub struct CameraBinding {
    pub layout: BindGroupLayout,
    pub group: BindGroup,
    buffer: Buffer,
}

impl CameraBinding {
    pub fn new(device: &Device, initial: &CameraUniform) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(size_of::<CameraUniform>() as u64),
                },
                count: None,
            }],
        });
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera UBO"),
            contents: bytemuck::bytes_of(initial),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera BG"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self {
            layout,
            group,
            buffer,
        }
    }

    pub fn write(&self, queue: &Queue, uniform: &CameraUniform) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniform));
    }
}

/// Depth-tested pipeline drawing [`VERTEX_LAYOUT`] meshes into `color_format`.
/// Culling is off: imported meshes do not guarantee consistent winding.
pub fn create_model_pipeline(
    device: &Device,
    camera_layout: &BindGroupLayout,
    material_layout: &BindGroupLayout,
    color_format: TextureFormat,
) -> RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("model.wgsl"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/model.wgsl").into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Model pipeline layout"),
        bind_group_layouts: &[camera_layout, material_layout],
        push_constant_ranges: &[],
    });
    let options = wgpu::PipelineCompilationOptions::default();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Model pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            buffers: &[VERTEX_LAYOUT],
            compilation_options: options.clone(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: options,
        }),
        primitive: wgpu::PrimitiveState {
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

/// Depth attachment sized to the surface.
pub fn create_depth_view(device: &Device, width: u32, height: u32) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_uniform_matches_shader_layout() {
        assert_eq!(size_of::<CameraUniform>(), 144);
        assert_eq!(size_of::<CameraUniform>() % 16, 0);
    }

    #[test]
    fn camera_uniform_packs_columns_and_light() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let u = CameraUniform::new(Mat4::IDENTITY, model, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(u.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(u.view_proj[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(u.light_dir, [0.0, -1.0, 0.0, 0.0]);
    }
}

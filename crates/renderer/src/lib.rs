//! Renderer: wgpu device and surface, model upload and the draw loop.
//! wgpu = 26.x, winit = 0.30.x

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use asset::{Bounds, ImportOptions, Model, TextureData, TextureUploader};
use corelib::{
    Mat4, Vec3,
    camera::{CameraConfig, FlyCamera},
    transform::Transform,
};
use wgpu::{
    CommandEncoderDescriptor, Device, DeviceDescriptor, Features, Instance, InstanceDescriptor,
    Limits, LoadOp, Operations, PowerPreference, PresentMode, Queue, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipeline, StoreOp, Surface, SurfaceConfiguration, SurfaceError,
    TextureUsages, TextureView,
};
use winit::window::Window;

pub mod mesh;
pub mod pipeline;
pub mod texture;

use mesh::{GpuModel, create_material_layout};
use pipeline::{
    CAMERA_GROUP, CameraBinding, CameraUniform, MATERIAL_GROUP, create_depth_view,
    create_model_pipeline,
};
use texture::{GpuTexture, WgpuTextureUploader};

/// Viewer behaviour that is not part of the imported model.
#[derive(Clone, Copy, Debug)]
pub struct RenderConfig {
    pub camera: CameraConfig,
    /// Move the camera so the loaded model fills the view.
    pub frame_model: bool,
    /// Model spin around Y in radians per second.
    pub spin_speed: f32,
    pub light_dir: Vec3,
    pub clear_color: wgpu::Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            frame_model: true,
            spin_speed: 0.5,
            light_dir: Vec3::new(-0.3, -1.0, -0.5),
            clear_color: wgpu::Color {
                r: 0.05,
                g: 0.05,
                b: 0.08,
                a: 1.0,
            },
        }
    }
}

/// Window surface, device and everything needed to draw one model.
pub struct GpuState {
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    device: Device,
    queue: Queue,
    depth_view: TextureView,

    pipeline: RenderPipeline,
    camera_binding: CameraBinding,
    material_layout: wgpu::BindGroupLayout,
    /// Bound wherever a mesh has no texture for a sampler.
    fallback: GpuTexture,

    model: Option<GpuModel>,
    /// Model-space point the spin rotates about.
    pivot: Vec3,
    camera: FlyCamera,
    config: RenderConfig,
    start: Instant,
}

impl GpuState {
    pub async fn new(
        window: Arc<Window>,
        backends: wgpu::Backends,
        config: RenderConfig,
    ) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("Failed to create window surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No GPU adapter can present to this window")?;
        log::info!("Adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("meshview device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("Failed to open GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no formats")?;
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: Vec::new(),
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        let depth_view = create_depth_view(&device, surface_config.width, surface_config.height);

        let camera = FlyCamera::new(config.camera);
        let camera_binding = CameraBinding::new(
            &device,
            &CameraUniform::new(Mat4::IDENTITY, Mat4::IDENTITY, config.light_dir),
        );
        let material_layout = create_material_layout(&device);
        let pipeline =
            create_model_pipeline(&device, &camera_binding.layout, &material_layout, format);

        let fallback = WgpuTextureUploader::new(&device, &queue)
            .upload(&TextureData::checkerboard(64), "Fallback checkerboard")?;

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            depth_view,
            pipeline,
            camera_binding,
            material_layout,
            fallback,
            model: None,
            pivot: Vec3::ZERO,
            camera,
            config,
            start: Instant::now(),
        })
    }

    /// Import a model from disk and upload it. Replaces any current model;
    /// on failure the previous model is kept.
    pub fn load_model(&mut self, path: &Path, options: &ImportOptions) -> anyhow::Result<()> {
        let model = {
            let mut uploader = WgpuTextureUploader::new(&self.device, &self.queue);
            Model::load_with(path, &mut uploader, options)
                .with_context(|| format!("Failed to load model {}", path.display()))?
        };
        let gpu = GpuModel::upload(&self.device, &self.material_layout, model, &self.fallback);
        log::info!("Uploaded {} meshes", gpu.meshes().len());

        if let Some(bounds) = gpu.bounds() {
            self.pivot = bounds.center();
            if self.config.frame_model {
                self.frame(bounds);
            }
        }
        self.model = Some(gpu);
        Ok(())
    }

    /// Place the camera in front of `bounds`, slightly above, looking at
    /// its center.
    fn frame(&mut self, bounds: Bounds) {
        let radius = bounds.radius().max(1e-3);
        let center = bounds.center();
        self.camera.position = center + Vec3::new(0.0, radius * 0.3, radius * 2.5);
        self.camera.z_near = radius * 0.01;
        self.camera.z_far = radius * 20.0;
        self.camera.look_at(center);
        log::info!(
            "Framed model: center={:?} radius={:.3}",
            center,
            radius
        );
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(
            &self.device,
            self.surface_config.width,
            self.surface_config.height,
        );
    }

    /// Spin the model, update uniforms and draw every mesh.
    pub fn render(&mut self) -> Result<(), SurfaceError> {
        let elapsed = self.start.elapsed().as_secs_f32();
        let spin = Transform::rotation_about(
            self.pivot,
            Vec3::new(0.0, elapsed * self.config.spin_speed, 0.0),
        );
        let aspect = self.surface_config.width as f32 / self.surface_config.height as f32;
        self.camera_binding.write(
            &self.queue,
            &CameraUniform::new(
                self.camera.proj(aspect) * self.camera.view(),
                spin.matrix(),
                self.config.light_dir,
            ),
        );

        let frame = self.surface.get_current_texture()?;
        let target = frame.texture.create_view(&Default::default());
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Model frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Model pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(self.config.clear_color),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(model) = &self.model {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(CAMERA_GROUP, &self.camera_binding.group, &[]);
                model.draw(&mut pass, MATERIAL_GROUP);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Errors that [`recreate_surface`](Self::recreate_surface) recovers from.
    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.surface_config.width, self.surface_config.height);
    }
}

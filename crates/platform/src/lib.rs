//! Platform layer: windowing & event loop driving the renderer.
//!
//! - Redraw continuously while a model is shown.
//! - Proper handling of resize/scale/close.
//! - A model that fails to import ends the run with an error; nothing is
//!   rendered without one.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use asset::ImportOptions;
use renderer::{GpuState, RenderConfig};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

/// Everything needed to open the viewer.
#[derive(Clone, Debug)]
pub struct ViewerOptions {
    pub model_path: PathBuf,
    pub import: ImportOptions,
    pub render: RenderConfig,
    pub backends: wgpu::Backends,
    pub width: u32,
    pub height: u32,
}

struct Viewer {
    options: ViewerOptions,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    error: Option<anyhow::Error>,
}

impl Viewer {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let title = format!("meshview - {}", self.options.model_path.display());
        let attrs = Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(self.options.width, self.options.height));
        let window = Arc::new(event_loop.create_window(attrs)?);
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let mut gpu = pollster::block_on(GpuState::new(
            window.clone(),
            self.options.backends,
            self.options.render,
        ))?;
        gpu.load_model(&self.options.model_path, &self.options.import)?;

        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{:#}", err);
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::debug!("Resized: {}x{}", new_size.width, new_size.height);
                gpu.resize(new_size.width, new_size.height);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::info!("Scale factor changed: {:.3}", scale_factor);
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => match gpu.render() {
                Ok(()) => {}
                Err(e) if GpuState::is_surface_lost(&e) => {
                    log::warn!("Surface lost/outdated, reconfiguring");
                    gpu.recreate_surface();
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    self.fail(event_loop, anyhow!("GPU out of memory"));
                }
                Err(e) => log::warn!("Frame skipped: {:?}", e),
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Open a window, load the model and render until the window is closed.
pub fn run_viewer(options: ViewerOptions) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|e| anyhow!("Failed to create event loop: {e}"))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer {
        options,
        window: None,
        gpu: None,
        error: None,
    };
    event_loop
        .run_app(&mut viewer)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match viewer.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

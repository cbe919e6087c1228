//! Entry point for meshview.
//! Logging + CLI flags, then hands off to the platform viewer.

use std::path::PathBuf;

use anyhow::{Result, bail};
use asset::{ImportOptions, PostProcess, TextureKind};
use platform::ViewerOptions;
use renderer::RenderConfig;

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_size_args(args: &[String]) -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    let ww = w.unwrap_or(1280).max(1);
    let hh = h.unwrap_or(720).max(1);
    (ww, hh)
}

/// `--model=<path>` or the first argument that is not a flag.
fn parse_model_arg(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .find_map(|a| a.strip_prefix("--model=").map(PathBuf::from))
        .or_else(|| args.iter().find(|a| !a.starts_with("--")).map(PathBuf::from))
}

fn parse_fov_arg(args: &[String]) -> Option<f32> {
    args.iter()
        .filter_map(|a| a.strip_prefix("--fov="))
        .filter_map(|v| v.parse::<f32>().ok())
        .last()
}

fn parse_import_args(args: &[String]) -> ImportOptions {
    let mut options = ImportOptions::default();
    for arg in args {
        if let Some(list) = arg.strip_prefix("--textures=") {
            let kinds: Vec<TextureKind> = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| {
                    let kind = TextureKind::parse(s);
                    if kind.is_none() {
                        log::warn!("Unknown texture kind '{}', ignoring.", s);
                    }
                    kind
                })
                .collect();
            if !kinds.is_empty() {
                options.texture_kinds = kinds;
            }
        } else if arg == "--no-flip-uvs" {
            options.post_process.remove(PostProcess::FLIP_UVS);
        }
    }
    options
}

fn parse_options(args: &[String]) -> Result<ViewerOptions> {
    let Some(model_path) = parse_model_arg(args) else {
        bail!("usage: app <model.obj> [--gpu-backend=..] [--size=WxH] [--fov=deg] [--textures=diffuse,specular] [--no-flip-uvs]");
    };
    let (width, height) = parse_size_args(args);

    let mut render = RenderConfig::default();
    if let Some(fov) = parse_fov_arg(args) {
        render.camera.zoom = fov;
    }

    Ok(ViewerOptions {
        model_path,
        import: parse_import_args(args),
        render,
        backends: parse_backend_arg(args),
        width,
        height,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_options(&args)?;
    log::info!(
        "Starting meshview. Model: {}, backend: {:?}, window_size={}x{}, textures={:?}",
        options.model_path.display(),
        options.backends,
        options.width,
        options.height,
        options.import.texture_kinds
    );

    platform::run_viewer(options)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

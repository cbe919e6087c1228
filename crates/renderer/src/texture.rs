//! GPU textures created from decoded [`TextureData`].

use anyhow::Context;
use asset::{TextureData, TextureUploader};
use wgpu::{
    AddressMode, Device, Extent3d, FilterMode, Origin3d, Queue, Sampler, SamplerDescriptor,
    TexelCopyBufferLayout, TexelCopyTextureInfo, Texture, TextureAspect, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
};

pub const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// Sampled texture: full mip chain, linear filtering, repeat wrapping.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: Texture,
    pub view: TextureView,
    pub sampler: Sampler,
}

/// [`TextureUploader`] writing straight into a wgpu device.
pub struct WgpuTextureUploader<'a> {
    device: &'a Device,
    queue: &'a Queue,
}

impl<'a> WgpuTextureUploader<'a> {
    pub fn new(device: &'a Device, queue: &'a Queue) -> Self {
        Self { device, queue }
    }
}

impl TextureUploader for WgpuTextureUploader<'_> {
    type Handle = GpuTexture;

    fn upload(&mut self, data: &TextureData, label: &str) -> anyhow::Result<GpuTexture> {
        if !data.is_valid() {
            anyhow::bail!("Texture '{}' is empty", label);
        }
        check_dimensions(data, self.device.limits().max_texture_dimension_2d)
            .with_context(|| format!("Texture '{}' cannot be uploaded", label))?;
        let levels = data.mip_chain();

        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: data.width(),
                height: data.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (mip, level) in levels.iter().enumerate() {
            self.queue.write_texture(
                TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: mip as u32,
                    origin: Origin3d::ZERO,
                    aspect: TextureAspect::All,
                },
                level.pixels(),
                TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level.bytes_per_row()),
                    rows_per_image: Some(level.height()),
                },
                Extent3d {
                    width: level.width(),
                    height: level.height(),
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&SamplerDescriptor {
            label: Some(label),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Default::default()
        });

        log::debug!(
            "Uploaded texture '{}' {}x{} ({} mips)",
            label,
            data.width(),
            data.height(),
            levels.len()
        );
        Ok(GpuTexture {
            texture,
            view,
            sampler,
        })
    }
}

fn check_dimensions(data: &TextureData, max: u32) -> anyhow::Result<()> {
    if data.width() > max || data.height() > max {
        anyhow::bail!(
            "{}x{} exceeds the device limit of {} per side",
            data.width(),
            data.height(),
            max
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textures_larger_than_the_device_limit_are_rejected() {
        let tall = TextureData::from_rgba8(2, 16, vec![0; 2 * 16 * 4]).expect("2x16");
        assert!(check_dimensions(&tall, 16).is_ok());
        let err = check_dimensions(&tall, 8).unwrap_err();
        assert!(err.to_string().contains("2x16"));
        assert!(check_dimensions(&TextureData::checkerboard(9), 8).is_err());
    }
}

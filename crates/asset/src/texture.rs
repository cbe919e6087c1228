//! Decoded texture images and the seam that turns them into GPU handles.
//! Everything is RGBA8; the mip chain is built on the CPU.

use std::path::Path;

use anyhow::{Context, anyhow};
use image::{Rgba, RgbaImage, imageops::FilterType};

pub const BYTES_PER_PIXEL: u32 = 4;

/// An RGBA8 image ready for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    image: RgbaImage,
}

impl TextureData {
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Wrap tightly packed RGBA8 rows.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> anyhow::Result<Self> {
        let len = pixels.len();
        RgbaImage::from_raw(width, height, pixels)
            .map(Self::from_image)
            .ok_or_else(|| anyhow!("{} bytes is not a {}x{} RGBA8 image", len, width, height))
    }

    /// Decode any image format enabled on the `image` crate.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("Failed to decode image {}", path.display()))?
            .into_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!("Image {} has no pixels", path.display()));
        }
        log::debug!(
            "Decoded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self::from_image(image))
    }

    /// Grey/white checkerboard with 8-pixel cells.
    pub fn checkerboard(size: u32) -> Self {
        Self::from_image(RgbaImage::from_fn(size, size, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([128, 128, 128, 255])
            }
        }))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    #[inline]
    pub fn bytes_per_row(&self) -> u32 {
        self.width() * BYTES_PER_PIXEL
    }

    /// Non-empty images only.
    pub fn is_valid(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    /// Number of levels in a full mip chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width().max(self.height()).max(1).leading_zeros()
    }

    /// Full mip chain, level 0 first. Each level halves both dimensions
    /// (never below 1) with a triangle filter.
    pub fn mip_chain(&self) -> Vec<TextureData> {
        let mut levels = vec![self.clone()];
        let (mut w, mut h) = (self.width(), self.height());
        for _ in 1..self.mip_level_count() {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            let level = image::imageops::resize(&self.image, w, h, FilterType::Triangle);
            levels.push(Self::from_image(level));
        }
        levels
    }
}

/// Turns decoded images into renderer-owned texture handles.
pub trait TextureUploader {
    type Handle;

    /// Create a mipmapped, linear-filtered, repeat-wrapped texture.
    fn upload(&mut self, data: &TextureData, label: &str) -> anyhow::Result<Self::Handle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_every_eight_pixels() {
        let tex = TextureData::checkerboard(16);
        assert!(tex.is_valid());
        assert_eq!(tex.pixels().len(), 16 * 16 * 4);
        assert_eq!(&tex.pixels()[..4], &[255, 255, 255, 255]);
        assert_eq!(&tex.pixels()[8 * 4..8 * 4 + 4], &[128, 128, 128, 255]);
    }

    #[test]
    fn mis_sized_pixels_are_rejected() {
        assert!(TextureData::from_rgba8(2, 2, vec![0; 15]).is_err());
        let ok = TextureData::from_rgba8(2, 2, vec![0; 16]).expect("2x2");
        assert_eq!(ok.bytes_per_row(), 8);
    }

    #[test]
    fn mip_chain_halves_to_one_pixel() {
        let tex = TextureData::from_rgba8(8, 2, vec![200; 8 * 2 * 4]).expect("8x2");
        assert_eq!(tex.mip_level_count(), 4);
        let levels = tex.mip_chain();
        let dims: Vec<(u32, u32)> = levels.iter().map(|l| (l.width(), l.height())).collect();
        assert_eq!(dims, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        assert!(levels[3].pixels().iter().all(|&b| (199..=201).contains(&b)));
    }

    #[test]
    fn missing_image_fails_to_load() {
        assert!(TextureData::load("/no/such/texture.png").is_err());
    }

    #[test]
    fn empty_image_is_invalid() {
        assert!(!TextureData::from_image(RgbaImage::new(0, 0)).is_valid());
    }
}

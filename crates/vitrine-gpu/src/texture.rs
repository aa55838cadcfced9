//! External texture boundary.
//!
//! The scene-graph layer hands textures across this seam. A texture exposes
//! its metadata plus (optionally) CPU pixel data; backends get first refusal
//! via a downcast so a texture whose native representation is already
//! GPU-resident can be wrapped zero-copy.

use std::any::Any;

use crate::image::{AlphaMode, ColorState, ImageFormat};

/// Contract for externally produced textures.
pub trait Texture {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> ImageFormat;
    fn alpha_mode(&self) -> AlphaMode;
    fn color_state(&self) -> ColorState;

    /// Tightly packed pixel rows, if the texture has CPU-visible data.
    ///
    /// Returns `None` for GPU-only textures; those must be wrappable by the
    /// active backend or the upload fails.
    fn pixels(&self) -> Option<&[u8]>;

    /// Backend downcast hook for the zero-copy wrap path.
    fn as_any(&self) -> &dyn Any;
}

/// Plain CPU-memory texture.
#[derive(Debug, Clone)]
pub struct MemoryTexture {
    width: u32,
    height: u32,
    format: ImageFormat,
    alpha_mode: AlphaMode,
    color_state: ColorState,
    data: Vec<u8>,
}

impl MemoryTexture {
    /// `data` must hold `height` tightly packed rows of
    /// `width * bytes_per_pixel` bytes.
    pub fn new(
        width: u32,
        height: u32,
        format: ImageFormat,
        alpha_mode: AlphaMode,
        color_state: ColorState,
        data: Vec<u8>,
    ) -> Self {
        assert_eq!(
            data.len() as u64,
            width as u64 * height as u64 * format.bytes_per_pixel() as u64,
            "MemoryTexture data size does not match {width}x{height} {format:?}"
        );

        Self {
            width,
            height,
            format,
            alpha_mode,
            color_state,
            data,
        }
    }
}

impl Texture for MemoryTexture {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> ImageFormat {
        self.format
    }

    fn alpha_mode(&self) -> AlphaMode {
        self.alpha_mode
    }

    fn color_state(&self) -> ColorState {
        self.color_state
    }

    fn pixels(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Number of mip levels for a full chain down to 1x1.
pub(crate) fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Extent of a given mip level.
pub(crate) fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

/// Box-filter downsample of an 8-bit 4-channel image to half size.
///
/// Odd dimensions round down (the last row/column folds into the previous
/// texel pair), matching the usual mip convention. Channel order does not
/// matter to an independent per-channel average, so the same code serves the
/// RGBA and BGRA formats.
pub(crate) fn downsample_rgba8(src: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
    debug_assert_eq!(src.len() as u64, width as u64 * height as u64 * 4);

    let dst_w = (width / 2).max(1);
    let dst_h = (height / 2).max(1);
    let mut dst = vec![0u8; (dst_w * dst_h * 4) as usize];

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            // Clamp so 1-wide/1-tall sources sample the same texel twice.
            let sx0 = (dx * 2).min(width - 1);
            let sx1 = (dx * 2 + 1).min(width - 1);
            let sy0 = (dy * 2).min(height - 1);
            let sy1 = (dy * 2 + 1).min(height - 1);

            for c in 0..4u32 {
                let sum = src[((sy0 * width + sx0) * 4 + c) as usize] as u32
                    + src[((sy0 * width + sx1) * 4 + c) as usize] as u32
                    + src[((sy1 * width + sx0) * 4 + c) as usize] as u32
                    + src[((sy1 * width + sx1) * 4 + c) as usize] as u32;
                dst[((dy * dst_w + dx) * 4 + c) as usize] = ((sum + 2) / 4) as u8;
            }
        }
    }

    (dst, dst_w, dst_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_level_count_covers_full_chain() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(256, 1), 9);
        assert_eq!(mip_level_count(300, 200), 9);
    }

    #[test]
    fn mip_extent_never_reaches_zero() {
        assert_eq!(mip_extent(256, 64, 0), (256, 64));
        assert_eq!(mip_extent(256, 64, 6), (4, 1));
        assert_eq!(mip_extent(256, 64, 8), (1, 1));
    }

    #[test]
    fn downsample_averages_quads() {
        // 2x2 single-channel-ish pattern in RGBA bytes.
        let src = vec![
            0, 0, 0, 255, //
            100, 0, 0, 255, //
            100, 0, 0, 255, //
            200, 0, 0, 255,
        ];
        let (dst, w, h) = downsample_rgba8(&src, 2, 2);
        assert_eq!((w, h), (1, 1));
        // (0 + 100 + 100 + 200 + 2) / 4 = 100
        assert_eq!(&dst, &[100, 0, 0, 255]);
    }

    #[test]
    fn downsample_one_pixel_wide() {
        let src = vec![
            10, 20, 30, 255, //
            30, 40, 50, 255,
        ];
        let (dst, w, h) = downsample_rgba8(&src, 1, 2);
        assert_eq!((w, h), (1, 1));
        assert_eq!(&dst, &[20, 30, 40, 255]);
    }

    #[test]
    #[should_panic(expected = "data size does not match")]
    fn memory_texture_validates_data_size() {
        let _ = MemoryTexture::new(
            4,
            4,
            ImageFormat::Rgba8Unorm,
            AlphaMode::Premultiplied,
            ColorState::Srgb,
            vec![0u8; 3],
        );
    }
}

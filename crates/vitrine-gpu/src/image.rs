//! Image metadata shared by all backends.
//!
//! Backends wrap their native texture objects in a handle implementing
//! [`crate::backend::GpuImage`]; the metadata here is what the
//! backend-agnostic layers (frame, renderer, op list) see.

/// Pixel formats the render core deals in.
///
/// This is deliberately a small set: the formats a UI scene graph actually
/// produces, not everything the hardware can express.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ImageFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    R8Unorm,
}

impl ImageFormat {
    /// Bytes per pixel for tightly packed CPU-side data of this format.
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            ImageFormat::Rgba8Unorm
            | ImageFormat::Rgba8UnormSrgb
            | ImageFormat::Bgra8Unorm
            | ImageFormat::Bgra8UnormSrgb => 4,
            ImageFormat::Rgba16Float => 8,
            ImageFormat::R8Unorm => 1,
        }
    }

    /// True for the 8-bit-per-channel RGBA-class formats that support the CPU
    /// mipmap path.
    pub const fn is_rgba8_class(self) -> bool {
        matches!(
            self,
            ImageFormat::Rgba8Unorm
                | ImageFormat::Rgba8UnormSrgb
                | ImageFormat::Bgra8Unorm
                | ImageFormat::Bgra8UnormSrgb
        )
    }
}

/// What an image is for. Determines native usage flags and which operations
/// are valid on it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ImageUsage {
    /// Offscreen render target; may be sampled by later passes.
    RenderTarget,
    /// Sampled-only texture (uploads, atlases).
    Sampled,
    /// Member of a swapchain image set owned by a draw context.
    SwapchainTarget,
    /// CPU-readback staging image.
    Download,
}

/// Size/format/usage triple describing an image.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub usage: ImageUsage,
    /// True when the image carries a full mip chain. Level-0-only images must
    /// not allocate extra levels: samplers compute implicit LOD, and an
    /// allocated-but-never-written level reads as transparent black.
    pub mipmapped: bool,
}

impl ImageInfo {
    pub const fn new(format: ImageFormat, width: u32, height: u32, usage: ImageUsage) -> Self {
        Self {
            format,
            width,
            height,
            usage,
            mipmapped: false,
        }
    }

    /// Marks the image as carrying a full mip chain.
    pub const fn with_mipmaps(mut self) -> Self {
        self.mipmapped = true;
        self
    }

    /// Bytes per tightly packed row at mip level 0.
    pub const fn unpadded_bytes_per_row(&self) -> u32 {
        self.width * self.format.bytes_per_pixel()
    }
}

/// Alpha interpretation of externally provided texture data.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AlphaMode {
    Opaque,
    Straight,
    Premultiplied,
}

/// Color state of image contents.
///
/// The render core only distinguishes the two transfer characteristics the
/// shaders care about; wide-gamut conversion belongs to the layer above.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ColorState {
    Srgb,
    SrgbLinear,
}

impl ColorState {
    const fn to_bits(self) -> u32 {
        match self {
            ColorState::Srgb => 0,
            ColorState::SrgbLinear => 1,
        }
    }

    const fn from_bits(bits: u32) -> Self {
        match bits {
            0 => ColorState::Srgb,
            _ => ColorState::SrgbLinear,
        }
    }
}

/// Packed pair of color states (render output + alternate/sampling state).
///
/// Part of [`crate::pipeline::PipelineKey`]; kept as one small value so key
/// hashing and equality stay cheap.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ColorStates(u32);

impl ColorStates {
    pub const fn new(output: ColorState, alt: ColorState) -> Self {
        Self(output.to_bits() | (alt.to_bits() << 16))
    }

    pub const fn output(self) -> ColorState {
        ColorState::from_bits(self.0 & 0xffff)
    }

    pub const fn alt(self) -> ColorState {
        ColorState::from_bits(self.0 >> 16)
    }

    /// Raw packed value, usable as a shader specialization constant.
    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel_matches_format() {
        assert_eq!(ImageFormat::Rgba8Unorm.bytes_per_pixel(), 4);
        assert_eq!(ImageFormat::Rgba16Float.bytes_per_pixel(), 8);
        assert_eq!(ImageFormat::R8Unorm.bytes_per_pixel(), 1);
    }

    #[test]
    fn images_are_level_0_only_unless_marked() {
        let info = ImageInfo::new(ImageFormat::Rgba8Unorm, 64, 64, ImageUsage::Sampled);
        assert!(!info.mipmapped);
        assert!(info.with_mipmaps().mipmapped);
    }

    #[test]
    fn color_states_round_trip() {
        let cs = ColorStates::new(ColorState::Srgb, ColorState::SrgbLinear);
        assert_eq!(cs.output(), ColorState::Srgb);
        assert_eq!(cs.alt(), ColorState::SrgbLinear);

        let cs = ColorStates::new(ColorState::SrgbLinear, ColorState::Srgb);
        assert_eq!(cs.output(), ColorState::SrgbLinear);
        assert_eq!(cs.alt(), ColorState::Srgb);
    }

    #[test]
    fn color_states_equal_packs_equal() {
        let a = ColorStates::new(ColorState::Srgb, ColorState::Srgb);
        let b = ColorStates::new(ColorState::Srgb, ColorState::Srgb);
        assert_eq!(a, b);
    }
}

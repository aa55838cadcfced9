use std::any::Any;

use crate::backend::GpuImage;
use crate::error::GpuError;
use crate::image::{AlphaMode, ColorState, ImageFormat, ImageInfo, ImageUsage};
use crate::texture::{mip_level_count, Texture};

pub(crate) fn map_format(format: ImageFormat) -> wgpu::TextureFormat {
    match format {
        ImageFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ImageFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        ImageFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        ImageFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        ImageFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        ImageFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
    }
}

pub(crate) fn unmap_format(format: wgpu::TextureFormat) -> Option<ImageFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some(ImageFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(ImageFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Bgra8Unorm => Some(ImageFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(ImageFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgba16Float => Some(ImageFormat::Rgba16Float),
        wgpu::TextureFormat::R8Unorm => Some(ImageFormat::R8Unorm),
        _ => None,
    }
}

fn map_usage(usage: ImageUsage) -> wgpu::TextureUsages {
    match usage {
        ImageUsage::RenderTarget => {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        }
        ImageUsage::Sampled => wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        // Swapchain-backed images are drawn to, then copied into the acquired
        // surface texture at present.
        ImageUsage::SwapchainTarget => {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
        }
        ImageUsage::Download => wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
    }
}

/// wgpu texture handle.
///
/// wgpu resources are internally refcounted, so cloning the handle is cheap
/// and the texture lives until the last clone drops.
#[derive(Clone)]
pub struct WgpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    info: ImageInfo,
}

impl WgpuImage {
    pub(crate) fn create(device: &wgpu::Device, info: ImageInfo) -> Result<Self, GpuError> {
        if info.width == 0 || info.height == 0 {
            return Err(GpuError::ImageAllocation {
                info,
                reason: "zero-sized image".into(),
            });
        }

        // Only images whose levels will actually be written get a chain.
        let mip_levels = if info.mipmapped {
            mip_level_count(info.width, info.height)
        } else {
            1
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("vitrine image"),
            size: wgpu::Extent3d {
                width: info.width,
                height: info.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: map_format(info.format),
            usage: map_usage(info.usage),
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            info,
        })
    }

    pub(crate) fn wrap(texture: wgpu::Texture, info: ImageInfo) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            info,
        }
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

impl GpuImage for WgpuImage {
    fn info(&self) -> &ImageInfo {
        &self.info
    }
}

/// Render-target view stored in the device's descriptor pool.
pub struct WgpuRenderTarget {
    pub view: wgpu::TextureView,
}

/// External texture whose pixels already live in a wgpu texture.
///
/// Upload of one of these through a frame is zero-copy: the backend wraps the
/// native texture instead of staging pixel data.
pub struct WgpuTexture {
    texture: wgpu::Texture,
    format: ImageFormat,
    alpha_mode: AlphaMode,
    color_state: ColorState,
}

impl WgpuTexture {
    /// `texture` must carry `TEXTURE_BINDING` usage.
    ///
    /// Panics if the texture's format is not one the render core deals in;
    /// wrapping such a texture is a bug in the calling layer.
    pub fn new(texture: wgpu::Texture, alpha_mode: AlphaMode, color_state: ColorState) -> Self {
        let Some(format) = unmap_format(texture.format()) else {
            panic!("cannot wrap texture with unsupported format {:?}", texture.format());
        };
        Self {
            texture,
            format,
            alpha_mode,
            color_state,
        }
    }

    pub(crate) fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl Texture for WgpuTexture {
    fn width(&self) -> u32 {
        self.texture.width()
    }

    fn height(&self) -> u32 {
        self.texture.height()
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
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_tables_round_trip() {
        for format in [
            ImageFormat::Rgba8Unorm,
            ImageFormat::Rgba8UnormSrgb,
            ImageFormat::Bgra8Unorm,
            ImageFormat::Bgra8UnormSrgb,
            ImageFormat::Rgba16Float,
            ImageFormat::R8Unorm,
        ] {
            assert_eq!(unmap_format(map_format(format)), Some(format));
        }
    }

    #[test]
    fn formats_outside_the_core_are_rejected() {
        // These must come back `None` so `WgpuTexture::new` refuses to wrap
        // them instead of misreporting their format.
        assert_eq!(unmap_format(wgpu::TextureFormat::Depth32Float), None);
        assert_eq!(unmap_format(wgpu::TextureFormat::Rg8Unorm), None);
        assert_eq!(unmap_format(wgpu::TextureFormat::Rgba32Float), None);
    }
}

//! Surface attachment: swapchain configuration and presentation.
//!
//! wgpu only ever exposes the single acquired surface texture, so the
//! renderer's rotating image set is backed by our own textures; presenting
//! copies the finished backbuffer into the acquired texture. That keeps every
//! backbuffer samplable across frames (wgpu surface textures are not) and
//! makes image-set rotation uniform across backends.

use crate::backend::GpuImage;
use crate::error::GpuError;
use crate::image::{ImageFormat, ImageInfo, ImageUsage};
use crate::renderer::DrawContext;

use super::image::{unmap_format, WgpuImage};
use super::WgpuBackend;

/// Surface attachment options.
#[derive(Debug, Clone)]
pub struct SurfaceInit {
    /// Number of rotating backbuffers.
    pub buffer_count: usize,
    pub present_mode: wgpu::PresentMode,
    pub desired_maximum_frame_latency: u32,
}

impl Default for SurfaceInit {
    fn default() -> Self {
        Self {
            buffer_count: 3,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
        }
    }
}

/// Prefers an sRGB surface format the render core can express; falls back to
/// any expressible format.
fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
) -> Option<(wgpu::TextureFormat, ImageFormat)> {
    let mut fallback = None;
    for &format in &caps.formats {
        if let Some(mapped) = unmap_format(format) {
            if format.is_srgb() {
                return Some((format, mapped));
            }
            if fallback.is_none() {
                fallback = Some((format, mapped));
            }
        }
    }
    fallback
}

pub struct WgpuDrawContext<'w> {
    surface: wgpu::Surface<'w>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    format: ImageFormat,
    buffer_count: usize,
    draw_index: usize,
    needs_rebuild: bool,
}

impl<'w> WgpuDrawContext<'w> {
    pub fn new(
        backend: &WgpuBackend,
        target: impl Into<wgpu::SurfaceTarget<'w>>,
        width: u32,
        height: u32,
        init: SurfaceInit,
    ) -> Result<Self, GpuError> {
        let surface = backend
            .instance()
            .create_surface(target)
            .map_err(|err| GpuError::Surface(format!("surface creation failed: {err}")))?;

        let caps = surface.get_capabilities(backend.adapter());
        let (surface_format, format) = choose_surface_format(&caps)
            .ok_or_else(|| GpuError::Surface("no usable surface format".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        log::debug!("surface format {surface_format:?}, alpha mode {alpha_mode:?}");

        let config = wgpu::SurfaceConfiguration {
            // COPY_DST for the backbuffer copy at present.
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: init.present_mode,
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(backend.raw_device(), &config);

        Ok(Self {
            surface,
            device: backend.raw_device().clone(),
            queue: backend.raw_queue().clone(),
            config,
            format,
            buffer_count: init.buffer_count.max(1),
            draw_index: 0,
            needs_rebuild: false,
        })
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn image_format(&self) -> ImageFormat {
        self.format
    }

    fn handle_surface_error(&mut self, err: wgpu::SurfaceError) -> Result<(), GpuError> {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                log::warn!("surface {err}; reconfiguring and skipping frame");
                self.surface.configure(&self.device, &self.config);
                self.needs_rebuild = true;
                Ok(())
            }
            wgpu::SurfaceError::Timeout => {
                log::warn!("surface acquire timed out; skipping frame");
                Ok(())
            }
            wgpu::SurfaceError::OutOfMemory | wgpu::SurfaceError::Other => {
                Err(GpuError::Surface(format!("surface acquire failed: {err}")))
            }
        }
    }
}

impl DrawContext<WgpuBackend> for WgpuDrawContext<'_> {
    fn images(&mut self) -> Result<Vec<WgpuImage>, GpuError> {
        let info = ImageInfo::new(
            self.format,
            self.config.width,
            self.config.height,
            ImageUsage::SwapchainTarget,
        );
        let images = (0..self.buffer_count)
            .map(|_| WgpuImage::create(&self.device, info))
            .collect::<Result<Vec<_>, _>>()?;
        self.needs_rebuild = false;
        Ok(images)
    }

    fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    fn acquire(&mut self) -> Result<usize, GpuError> {
        self.draw_index = (self.draw_index + 1) % self.buffer_count;
        Ok(self.draw_index)
    }

    fn draw_index(&self) -> usize {
        self.draw_index
    }

    fn present(&mut self, image: &WgpuImage) -> Result<(), GpuError> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err) => return self.handle_surface_error(err),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vitrine present encoder"),
            });

        // Sizes can disagree for one frame around a resize; copy the shared
        // area.
        let extent = wgpu::Extent3d {
            width: image.width().min(surface_texture.texture.width()),
            height: image.height().min(surface_texture.texture.height()),
            depth_or_array_layers: 1,
        };
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: image.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &surface_texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            extent,
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        // Minimized windows report zero; keep the old configuration until a
        // real size arrives.
        if width == 0 || height == 0 {
            return;
        }
        if width == self.config.width && height == self.config.height {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.needs_rebuild = true;
    }
}

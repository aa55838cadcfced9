//! Per-display device: pipeline cache + descriptor pool + image factories.
//!
//! Responsibilities:
//! - own the backend (native device handle, queue, shared layouts)
//! - cache compiled pipeline state by structural key
//! - allocate/release render-target descriptor slots
//! - create images sized/flagged for their usage category
//!
//! One device exists per display; the [`DeviceRegistry`] owns that mapping
//! explicitly rather than hiding it in global state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::{Backend, BufferKind};
use crate::descriptors::{DescriptorId, DescriptorPool};
use crate::error::GpuError;
use crate::image::{ColorStates, ImageFormat, ImageInfo, ImageUsage};
use crate::pipeline::{Blend, PipelineCache, PipelineKey, ShaderFlags, ShaderKind};

/// Texture atlas edge length, matching the upstream scene-graph atlas pages.
pub const ATLAS_SIZE: u32 = 1024;

/// Per-display GPU device.
pub struct Device<B: Backend> {
    backend: B,
    pipelines: PipelineCache<B::Pipeline>,
    render_targets: DescriptorPool<B::RenderTarget>,
}

impl<B: Backend> Device<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            pipelines: PipelineCache::new(),
            render_targets: DescriptorPool::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Cached pipeline-state lookup.
    ///
    /// Misses compile through the backend with the retry ladder; total
    /// compile failure is surfaced, never swallowed. See
    /// [`PipelineCache::get_or_compile`].
    pub fn pipeline_state(
        &mut self,
        shader: ShaderKind,
        flags: ShaderFlags,
        color_states: ColorStates,
        variation: u32,
        blend: Blend,
        format: ImageFormat,
    ) -> Result<B::Pipeline, GpuError> {
        let key = PipelineKey {
            shader,
            flags,
            color_states,
            variation,
            blend,
            format,
        };

        let backend = &self.backend;
        self.pipelines
            .get_or_compile(key, |key, effort| backend.compile_pipeline(key, effort))
    }

    /// Compiles performed since device creation. Diagnostic only.
    pub fn pipeline_compile_count(&self) -> u64 {
        self.pipelines.compile_count()
    }

    /// Allocates a render-target descriptor slot for `image`.
    pub fn alloc_render_target(&mut self, image: &B::Image) -> DescriptorId {
        let view = self.backend.create_render_target(image);
        self.render_targets.alloc(view)
    }

    /// Releases a render-target descriptor slot.
    ///
    /// Alloc/free must be paired; over-freeing is asserted in the pool.
    pub fn free_render_target(&mut self, id: DescriptorId) {
        let _ = self.render_targets.free(id);
    }

    pub fn render_target(&self, id: DescriptorId) -> Option<&B::RenderTarget> {
        self.render_targets.get(id)
    }

    /// Outstanding render-target descriptor count. Diagnostic only.
    pub fn render_target_count(&self) -> usize {
        self.render_targets.live()
    }

    // ── image factories ──────────────────────────────────────────────────

    /// Offscreen render target, sampled by later passes.
    pub fn create_offscreen_image(
        &self,
        format: ImageFormat,
        width: u32,
        height: u32,
    ) -> Result<B::Image, GpuError> {
        self.backend
            .create_image(ImageInfo::new(format, width, height, ImageUsage::RenderTarget))
    }

    /// Fixed-size atlas page for small sampled content.
    pub fn create_atlas_image(&self, format: ImageFormat) -> Result<B::Image, GpuError> {
        self.backend.create_image(ImageInfo::new(
            format,
            ATLAS_SIZE,
            ATLAS_SIZE,
            ImageUsage::Sampled,
        ))
    }

    /// Sampled texture destination for CPU uploads.
    ///
    /// `mipmapped` allocates the full mip chain; the caller is then
    /// responsible for filling every level. A level-0-only upload must pass
    /// `false` so minified sampling never reads an unwritten level.
    pub fn create_upload_image(
        &self,
        format: ImageFormat,
        width: u32,
        height: u32,
        mipmapped: bool,
    ) -> Result<B::Image, GpuError> {
        let mut info = ImageInfo::new(format, width, height, ImageUsage::Sampled);
        if mipmapped {
            info = info.with_mipmaps();
        }
        self.backend.create_image(info)
    }

    /// CPU-readback staging image.
    pub fn create_download_image(
        &self,
        format: ImageFormat,
        width: u32,
        height: u32,
    ) -> Result<B::Image, GpuError> {
        self.backend
            .create_image(ImageInfo::new(format, width, height, ImageUsage::Download))
    }

    pub fn create_buffer(&self, kind: BufferKind, size: u64) -> Result<B::Buffer, GpuError> {
        self.backend.create_buffer(kind, size)
    }
}

/// Opaque display identity.
///
/// The windowing layer maps whatever it uses as a display object to a stable
/// id; the registry only needs equality and hashing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct DisplayId(pub u64);

/// Explicit display → device table.
///
/// Devices are created lazily on first use and torn down with their display.
/// Invariant: at most one device per display; every `get_for_display` for the
/// same display returns clones of the same `Rc`.
pub struct DeviceRegistry<B: Backend> {
    devices: HashMap<DisplayId, Rc<RefCell<Device<B>>>>,
}

impl<B: Backend> DeviceRegistry<B> {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
        }
    }

    /// Returns the device for `display`, creating it on first call.
    ///
    /// `create_backend` runs only on a miss; backend bring-up failure (no
    /// adapter, feature disabled) propagates and nothing is cached, so the
    /// caller can fall back to another renderer backend and retry later.
    pub fn get_for_display<F>(
        &mut self,
        display: DisplayId,
        create_backend: F,
    ) -> Result<Rc<RefCell<Device<B>>>, GpuError>
    where
        F: FnOnce() -> Result<B, GpuError>,
    {
        if let Some(device) = self.devices.get(&display) {
            return Ok(device.clone());
        }

        let backend = create_backend()?;
        log::info!("created {} device for display {display:?}", backend.name());

        let device = Rc::new(RefCell::new(Device::new(backend)));
        self.devices.insert(display, device.clone());
        Ok(device)
    }

    /// Drops the registry's reference when the display goes away.
    ///
    /// Renderers still holding the `Rc` keep the device alive until their own
    /// teardown; the registry just stops handing it out.
    pub fn remove_display(&mut self, display: DisplayId) {
        if self.devices.remove(&display).is_some() {
            log::debug!("dropped device for display {display:?}");
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl<B: Backend> Default for DeviceRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

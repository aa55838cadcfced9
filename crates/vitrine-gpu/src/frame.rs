//! One in-flight rendering pass.
//!
//! A frame owns its transient buffers and sampled-image table, tracks GPU
//! completion through a fence, and walks the op stream into the backend at
//! submit time. Dropping a frame waits out its fence so nothing it owns is
//! freed while still GPU-referenced.

use crate::backend::{
    Backend, BufferKind, Fence, GpuBuffer, GpuImage, LoadAction, PassDescriptor, SubmitArgs,
};
use crate::color::Color;
use crate::device::Device;
use crate::error::GpuError;
use crate::ops::{ImageSlot, OpList, RenderOp};
use crate::region::DeviceRect;
use crate::texture::{self, Texture};

/// Handle to a transient buffer owned by a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameBufferId(usize);

struct TransientBuffer<B: Backend> {
    buffer: B::Buffer,
    /// Submission generation this buffer was created in. Buffers from an
    /// older generation are GPU-claimed until the fence retires.
    generation: u64,
}

/// A single paint cycle's worth of GPU work.
pub struct Frame<B: Backend> {
    fence: B::Fence,
    /// Fence value of the most recent submission; 0 = nothing submitted.
    last_signaled: u64,
    /// Bumped on every submit; tags transient buffers.
    generation: u64,
    pass: Option<PendingPass<B>>,
    buffers: Vec<TransientBuffer<B>>,
    images: Vec<B::Image>,
}

struct PendingPass<B: Backend> {
    target: B::Image,
    load: LoadAction,
    damage: Option<DeviceRect>,
    opaque: Option<DeviceRect>,
}

impl<B: Backend> Frame<B> {
    pub fn new(device: &Device<B>) -> Self {
        Self {
            fence: device.backend().create_fence(),
            last_signaled: 0,
            generation: 0,
            pass: None,
            buffers: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Prepares a new pass against `target`.
    ///
    /// `clear` paints the target before the first draw; `None` keeps prior
    /// contents (partial redraw). `damage`/`opaque` are the regions the scene
    /// graph computed for this paint.
    pub fn begin(
        &mut self,
        target: &B::Image,
        clear: Option<Color>,
        damage: Option<DeviceRect>,
        opaque: Option<DeviceRect>,
    ) {
        debug_assert!(self.pass.is_none(), "Frame::begin without submitting the previous pass");

        self.pass = Some(PendingPass {
            target: target.clone(),
            load: match clear {
                Some(color) => LoadAction::Clear(color),
                None => LoadAction::Load,
            },
            damage,
            opaque,
        });
    }

    // ── transient buffers ────────────────────────────────────────────────

    pub fn create_vertex_buffer(
        &mut self,
        device: &Device<B>,
        size: u64,
    ) -> Result<FrameBufferId, GpuError> {
        self.create_buffer(device, BufferKind::Vertex, size)
    }

    pub fn create_globals_buffer(
        &mut self,
        device: &Device<B>,
        size: u64,
    ) -> Result<FrameBufferId, GpuError> {
        self.create_buffer(device, BufferKind::Globals, size)
    }

    pub fn create_storage_buffer(
        &mut self,
        device: &Device<B>,
        size: u64,
    ) -> Result<FrameBufferId, GpuError> {
        self.create_buffer(device, BufferKind::Storage, size)
    }

    fn create_buffer(
        &mut self,
        device: &Device<B>,
        kind: BufferKind,
        size: u64,
    ) -> Result<FrameBufferId, GpuError> {
        let buffer = device.create_buffer(kind, size)?;
        self.buffers.push(TransientBuffer {
            buffer,
            generation: self.generation,
        });
        Ok(FrameBufferId(self.buffers.len() - 1))
    }

    /// CPU-writable view of a transient buffer.
    ///
    /// Mapping a buffer referenced by a still-unsignaled submission is a
    /// caller bug; asserted in debug builds.
    pub fn map_buffer(&mut self, id: FrameBufferId) -> &mut [u8] {
        debug_assert!(
            self.buffers[id.0].generation == self.generation || !self.fence_busy(),
            "mapping buffer {id:?} while a submission referencing it is in flight"
        );
        self.buffers[id.0].buffer.map()
    }

    /// Flushes `used` bytes of a mapped transient buffer.
    pub fn unmap_buffer(&mut self, id: FrameBufferId, used: u64) {
        self.buffers[id.0].buffer.unmap(used);
    }

    // ── sampled images ───────────────────────────────────────────────────

    /// Adds `image` to this frame's sampled-image table.
    pub fn bind_image(&mut self, image: B::Image) -> ImageSlot {
        self.images.push(image);
        ImageSlot(self.images.len() as u32 - 1)
    }

    /// Converts an external texture into a backend image.
    ///
    /// If the texture's native representation is already resident on this
    /// backend it is wrapped without a copy; otherwise the CPU pixel data is
    /// uploaded, with a box-filtered mip chain for 8-bit RGBA-class formats
    /// when `with_mipmaps` is set.
    pub fn upload_texture(
        &mut self,
        device: &Device<B>,
        with_mipmaps: bool,
        texture: &dyn Texture,
    ) -> Result<B::Image, GpuError> {
        if let Some(image) = device.backend().try_wrap_texture(texture) {
            log::trace!(
                "wrapped {}x{} external texture zero-copy",
                texture.width(),
                texture.height()
            );
            return Ok(image);
        }

        let Some(pixels) = texture.pixels() else {
            return Err(GpuError::ImageAllocation {
                info: crate::image::ImageInfo::new(
                    texture.format(),
                    texture.width(),
                    texture.height(),
                    crate::image::ImageUsage::Sampled,
                ),
                reason: "texture is GPU-only and not wrappable by this backend".into(),
            });
        };

        let format = texture.format();
        let (width, height) = (texture.width(), texture.height());

        // The image gets a mip chain only when this path will fill every
        // level; an unfilled level would sample as transparent black.
        let mipmapped = with_mipmaps && format.is_rgba8_class();
        if with_mipmaps && !mipmapped {
            log::debug!("mipmaps requested for {format:?}; CPU path only covers 8-bit RGBA");
        }

        let image = device.create_upload_image(format, width, height, mipmapped)?;
        device.backend().upload_image(&image, 0, pixels)?;

        if mipmapped {
            let mut level_data = pixels.to_vec();
            let (mut w, mut h) = (width, height);
            for level in 1..texture::mip_level_count(width, height) {
                let (next, nw, nh) = texture::downsample_rgba8(&level_data, w, h);
                device.backend().upload_image(&image, level, &next)?;
                level_data = next;
                (w, h) = (nw, nh);
            }
        }

        Ok(image)
    }

    // ── submission ───────────────────────────────────────────────────────

    /// Walks `ops` into the backend and enqueues the fence signal.
    ///
    /// Pipelines are resolved through the device cache here (one per draw
    /// op, in op order), so a compile failure surfaces before anything is
    /// recorded.
    pub fn submit(
        &mut self,
        device: &mut Device<B>,
        vertices: FrameBufferId,
        globals: FrameBufferId,
        storage: Option<FrameBufferId>,
        ops: &OpList,
    ) -> Result<(), GpuError> {
        let Some(pending) = self.pass.take() else {
            panic!("Frame::submit without Frame::begin");
        };

        let mut pipelines = Vec::with_capacity(ops.draw_count());
        for op in ops.iter() {
            if let RenderOp::Draw(draw) = op {
                pipelines.push(device.pipeline_state(
                    draw.shader,
                    draw.flags,
                    draw.color_states,
                    draw.variation,
                    draw.blend,
                    pending.target.info().format,
                )?);
            }
        }

        let signal_value = self.last_signaled + 1;
        {
            let pass = PassDescriptor {
                target: &pending.target,
                load: pending.load,
                damage: pending.damage,
                opaque: pending.opaque,
            };
            let args = SubmitArgs {
                vertices: &self.buffers[vertices.0].buffer,
                globals: &self.buffers[globals.0].buffer,
                storage: storage.map(|id| &self.buffers[id.0].buffer),
                images: &self.images,
                pipelines: &pipelines,
            };

            device
                .backend()
                .submit_pass(&pass, ops, &args, &self.fence, signal_value)?;
        }

        self.last_signaled = signal_value;
        self.generation += 1;
        Ok(())
    }

    /// True while the most recent submission has not retired on the GPU.
    pub fn is_busy(&self) -> bool {
        self.fence_busy()
    }

    fn fence_busy(&self) -> bool {
        self.fence.completed() < self.last_signaled
    }

    /// Blocks until every submission from this frame has retired.
    ///
    /// Intended for cleanup and forced-sync paths, not the per-frame common
    /// case.
    pub fn wait(&self) {
        if self.fence_busy() {
            self.fence.wait(self.last_signaled);
        }
    }
}

impl<B: Backend> Drop for Frame<B> {
    fn drop(&mut self) {
        // Transient buffers and bound images must outlive the GPU's use of
        // them; the fence wait here is what guarantees it.
        if self.fence_busy() {
            log::trace!("frame dropped while busy; waiting for fence {}", self.last_signaled);
            self.wait();
        }
    }
}

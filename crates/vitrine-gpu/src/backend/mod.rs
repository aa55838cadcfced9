//! Backend capability seam.
//!
//! Responsibilities:
//! - define the traits every concrete backend implements (buffers, images,
//!   fences, pipeline compilation, pass submission)
//! - keep the op stream backend-agnostic: the per-op match lives in each
//!   backend's `submit_pass`
//!
//! The crate ships one concrete backend (`backend::wgpu`); tests drive the
//! same traits with a mock.

pub mod wgpu;

use crate::color::Color;
use crate::error::GpuError;
use crate::image::ImageInfo;
use crate::ops::OpList;
use crate::pipeline::{CompileEffort, PipelineKey};
use crate::region::DeviceRect;
use crate::texture::Texture;

/// Transient buffer categories a frame allocates.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    /// Per-draw vertex data.
    Vertex,
    /// Per-pass uniform data.
    Globals,
    /// Larger structured data (gradient stops, color matrices).
    Storage,
    /// CPU-readback staging.
    Download,
}

/// A block of GPU-visible memory with a CPU staging view.
///
/// No implicit synchronization: mapping a buffer still referenced by an
/// unsignaled fence is a caller bug. `Frame` enforces this for its transient
/// buffers; anyone else must track usage themselves.
pub trait GpuBuffer {
    fn size(&self) -> u64;

    /// CPU-writable staging view covering the whole buffer.
    fn map(&mut self) -> &mut [u8];

    /// Flushes the first `used` bytes written through `map` to the GPU copy
    /// and invalidates the view.
    fn unmap(&mut self, used: u64);
}

/// A GPU texture handle with its metadata.
///
/// Handles are cheap clones of a refcounted native resource; the native
/// texture is released when the last clone drops.
pub trait GpuImage: Clone {
    fn info(&self) -> &ImageInfo;

    fn width(&self) -> u32 {
        self.info().width
    }

    fn height(&self) -> u32 {
        self.info().height
    }
}

/// CPU/GPU completion fence.
///
/// The completed value increases monotonically as GPU batches retire; the CPU
/// compares it against the value it asked a submission to signal.
pub trait Fence {
    /// Highest value the GPU has signaled so far.
    fn completed(&self) -> u64;

    /// Blocks the calling thread until `completed() >= target`.
    ///
    /// A stuck fence blocks indefinitely; no timeout is modeled at this
    /// layer.
    fn wait(&self, target: u64);
}

/// How a pass treats the target's prior contents.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LoadAction {
    /// Clear to the given color before the first draw.
    Clear(Color),
    /// Keep prior contents.
    Load,
}

/// One render pass: target plus the regions the scene graph computed.
pub struct PassDescriptor<'a, B: Backend + ?Sized> {
    pub target: &'a B::Image,
    pub load: LoadAction,
    /// Area actually redrawn this pass; backends may scissor to it.
    pub damage: Option<DeviceRect>,
    /// Area known fully covered by opaque content (present-hint quality, not
    /// correctness).
    pub opaque: Option<DeviceRect>,
}

/// Resources resolved by the frame for one submission.
pub struct SubmitArgs<'a, B: Backend + ?Sized> {
    pub vertices: &'a B::Buffer,
    pub globals: &'a B::Buffer,
    pub storage: Option<&'a B::Buffer>,
    /// Frame-local sampled-image table; `ImageSlot` indexes into this.
    pub images: &'a [B::Image],
    /// One resolved pipeline per `Draw` op, in op order.
    pub pipelines: &'a [B::Pipeline],
}

/// A concrete GPU backend.
///
/// Implementations own the native device handle, command queue, and the
/// shared shader/bind layout objects (the root-signature equivalent).
pub trait Backend: Sized {
    type Buffer: GpuBuffer;
    type Image: GpuImage;
    /// Cheap-clone compiled pipeline handle.
    type Pipeline: Clone;
    type Fence: Fence;
    /// Render-target-view payload stored in the device's descriptor pool.
    type RenderTarget;

    /// Human-readable backend name for errors and logs.
    fn name(&self) -> &'static str;

    fn create_buffer(&self, kind: BufferKind, size: u64) -> Result<Self::Buffer, GpuError>;

    fn create_image(&self, info: ImageInfo) -> Result<Self::Image, GpuError>;

    /// Uploads tightly packed pixel rows to one mip level of `image`.
    fn upload_image(
        &self,
        image: &Self::Image,
        mip_level: u32,
        data: &[u8],
    ) -> Result<(), GpuError>;

    /// Creates the render-target view for an image; the device stores it in
    /// its descriptor pool.
    fn create_render_target(&self, image: &Self::Image) -> Self::RenderTarget;

    fn compile_pipeline(
        &self,
        key: &PipelineKey,
        effort: CompileEffort,
    ) -> Result<Self::Pipeline, GpuError>;

    fn create_fence(&self) -> Self::Fence;

    /// Zero-copy wrap of an external texture whose native representation is
    /// already resident on this backend. `None` falls back to the CPU upload
    /// path.
    fn try_wrap_texture(&self, texture: &dyn Texture) -> Option<Self::Image>;

    /// Records `ops` into one backend pass against `pass.target`, submits the
    /// batch, and enqueues a fence signal of `signal_value` behind it.
    ///
    /// Ops execute in program order; `args.pipelines` pairs with `Draw` ops
    /// positionally.
    fn submit_pass(
        &self,
        pass: &PassDescriptor<'_, Self>,
        ops: &OpList,
        args: &SubmitArgs<'_, Self>,
        fence: &Self::Fence,
        signal_value: u64,
    ) -> Result<(), GpuError>;
}

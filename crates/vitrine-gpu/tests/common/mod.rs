//! Mock backend for driving the device/frame/renderer layers without a GPU.
//!
//! Fences are signaled manually through the shared handles recorded in
//! [`MockState`], so tests control exactly when "the GPU" retires work.

// Each test binary uses its own slice of the mock.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vitrine_gpu::backend::{
    Backend, BufferKind, Fence, GpuBuffer, GpuImage, LoadAction, PassDescriptor, SubmitArgs,
};
use vitrine_gpu::error::GpuError;
use vitrine_gpu::image::{ImageFormat, ImageInfo, ImageUsage};
use vitrine_gpu::ops::OpList;
use vitrine_gpu::pipeline::{CompileEffort, PipelineKey};
use vitrine_gpu::renderer::DrawContext;
use vitrine_gpu::texture::Texture;

/// What a `submit_pass` call looked like.
pub struct SubmissionRecord {
    pub target: u32,
    pub load: LoadAction,
    pub draw_count: usize,
    pub pipelines: Vec<u32>,
    pub signal_value: u64,
}

#[derive(Default)]
pub struct MockState {
    next_image_id: u32,
    pub compiled_keys: Vec<(PipelineKey, CompileEffort)>,
    pub submissions: Vec<SubmissionRecord>,
    /// GPU-side copy of every buffer, in creation order.
    pub buffer_contents: Vec<Rc<RefCell<Vec<u8>>>>,
    /// Completed-value handles of every fence, in creation order.
    pub fences: Vec<Arc<AtomicU64>>,
    /// (image id, mip level, byte count) per upload.
    pub uploads: Vec<(u32, u32, usize)>,
}

impl MockState {
    pub fn next_image_id(&mut self) -> u32 {
        let id = self.next_image_id;
        self.next_image_id += 1;
        id
    }
}

#[derive(Clone)]
pub struct MockImage {
    pub id: u32,
    info: ImageInfo,
}

impl GpuImage for MockImage {
    fn info(&self) -> &ImageInfo {
        &self.info
    }
}

pub struct MockBuffer {
    staging: Vec<u8>,
    device_copy: Rc<RefCell<Vec<u8>>>,
    size: u64,
}

impl GpuBuffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn map(&mut self) -> &mut [u8] {
        &mut self.staging
    }

    fn unmap(&mut self, used: u64) {
        let mut device = self.device_copy.borrow_mut();
        device[..used as usize].copy_from_slice(&self.staging[..used as usize]);
    }
}

/// Manually signaled fence.
///
/// `wait` models a blocking wait that returns once the GPU reaches the
/// target: it raises the completed value itself, so tests never hang.
pub struct MockFence {
    completed: Arc<AtomicU64>,
}

impl Fence for MockFence {
    fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn wait(&self, target: u64) {
        self.completed.fetch_max(target, Ordering::AcqRel);
    }
}

pub struct MockRenderTarget {
    pub image_id: u32,
}

pub struct MockBackend {
    pub state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    pub fn new() -> (Self, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(MockState::default()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl Backend for MockBackend {
    type Buffer = MockBuffer;
    type Image = MockImage;
    type Pipeline = u32;
    type Fence = MockFence;
    type RenderTarget = MockRenderTarget;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn create_buffer(&self, _kind: BufferKind, size: u64) -> Result<MockBuffer, GpuError> {
        let device_copy = Rc::new(RefCell::new(vec![0u8; size as usize]));
        self.state
            .borrow_mut()
            .buffer_contents
            .push(device_copy.clone());
        Ok(MockBuffer {
            staging: vec![0u8; size as usize],
            device_copy,
            size,
        })
    }

    fn create_image(&self, info: ImageInfo) -> Result<MockImage, GpuError> {
        let id = self.state.borrow_mut().next_image_id();
        Ok(MockImage { id, info })
    }

    fn upload_image(&self, image: &MockImage, mip_level: u32, data: &[u8]) -> Result<(), GpuError> {
        self.state
            .borrow_mut()
            .uploads
            .push((image.id, mip_level, data.len()));
        Ok(())
    }

    fn create_render_target(&self, image: &MockImage) -> MockRenderTarget {
        MockRenderTarget { image_id: image.id }
    }

    fn compile_pipeline(
        &self,
        key: &PipelineKey,
        effort: CompileEffort,
    ) -> Result<u32, GpuError> {
        let mut state = self.state.borrow_mut();
        state.compiled_keys.push((*key, effort));
        Ok(state.compiled_keys.len() as u32 - 1)
    }

    fn create_fence(&self) -> MockFence {
        let completed = Arc::new(AtomicU64::new(0));
        self.state.borrow_mut().fences.push(completed.clone());
        MockFence { completed }
    }

    fn try_wrap_texture(&self, _texture: &dyn Texture) -> Option<MockImage> {
        None
    }

    fn submit_pass(
        &self,
        pass: &PassDescriptor<'_, Self>,
        ops: &OpList,
        args: &SubmitArgs<'_, Self>,
        _fence: &MockFence,
        signal_value: u64,
    ) -> Result<(), GpuError> {
        self.state.borrow_mut().submissions.push(SubmissionRecord {
            target: pass.target.id,
            load: pass.load,
            draw_count: ops.draw_count(),
            pipelines: args.pipelines.to_vec(),
            signal_value,
        });
        Ok(())
    }
}

/// Rotating-image draw context over the mock backend.
pub struct MockDrawContext {
    state: Rc<RefCell<MockState>>,
    pub buffer_count: usize,
    size: (u32, u32),
    index: usize,
    needs_rebuild: bool,
    pub presented: Rc<RefCell<Vec<u32>>>,
}

impl MockDrawContext {
    pub fn new(state: Rc<RefCell<MockState>>, buffer_count: usize, width: u32, height: u32) -> Self {
        Self {
            state,
            buffer_count,
            size: (width, height),
            index: 0,
            needs_rebuild: false,
            presented: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl DrawContext<MockBackend> for MockDrawContext {
    fn images(&mut self) -> Result<Vec<MockImage>, GpuError> {
        let mut state = self.state.borrow_mut();
        let info = ImageInfo::new(
            ImageFormat::Bgra8UnormSrgb,
            self.size.0,
            self.size.1,
            ImageUsage::SwapchainTarget,
        );
        let images = (0..self.buffer_count)
            .map(|_| MockImage {
                id: state.next_image_id(),
                info,
            })
            .collect();
        self.needs_rebuild = false;
        Ok(images)
    }

    fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    fn acquire(&mut self) -> Result<usize, GpuError> {
        self.index = (self.index + 1) % self.buffer_count;
        Ok(self.index)
    }

    fn draw_index(&self) -> usize {
        self.index
    }

    fn present(&mut self, image: &MockImage) -> Result<(), GpuError> {
        self.presented.borrow_mut().push(image.id);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != self.size {
            self.size = (width, height);
            self.needs_rebuild = true;
        }
    }
}

//! Surface-bound renderer: swapchain image rotation + frame orchestration.
//!
//! Responsibilities:
//! - bind a device and a draw context to one surface
//! - keep the swapchain-backed image set (and its render-target descriptors)
//!   synchronized with the surface, rebuilding the whole set at once when the
//!   context reports its images changed
//! - enforce begin_frame/end_frame pairing

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::Backend;
use crate::descriptors::DescriptorId;
use crate::device::Device;
use crate::error::GpuError;

/// Windowing-backend draw context: the surface half of the renderer seam.
///
/// Implementations own the native surface/swapchain. The renderer never looks
/// inside; it only consumes the image set, the rotation index, and the
/// images-updated notification.
pub trait DrawContext<B: Backend> {
    /// Current swapchain-backed image set. Called again after
    /// [`needs_rebuild`](Self::needs_rebuild) reports a change; each call
    /// returns the post-change set and clears the notification latch.
    fn images(&mut self) -> Result<Vec<B::Image>, GpuError>;

    /// True once the swapchain's image set changed (resize, buffer-count
    /// change) and the renderer must rebuild before the next frame.
    fn needs_rebuild(&self) -> bool;

    /// Advances to the next draw index and returns it.
    fn acquire(&mut self) -> Result<usize, GpuError>;

    /// Index of the image currently being drawn to.
    fn draw_index(&self) -> usize;

    /// Presents `image` to the surface.
    fn present(&mut self, image: &B::Image) -> Result<(), GpuError>;

    /// Notifies the context of a new surface size. Latches the
    /// images-updated notification.
    fn resize(&mut self, width: u32, height: u32);
}

struct SwapchainSlot<B: Backend> {
    image: B::Image,
    render_target: DescriptorId,
}

/// Orchestrates device + draw context across a surface's lifetime.
pub struct Renderer<B: Backend, C: DrawContext<B>> {
    device: Rc<RefCell<Device<B>>>,
    context: C,
    slots: Vec<SwapchainSlot<B>>,
    in_frame: bool,
}

impl<B: Backend, C: DrawContext<B>> Renderer<B, C> {
    pub fn new(device: Rc<RefCell<Device<B>>>, context: C) -> Result<Self, GpuError> {
        let mut renderer = Self {
            device,
            context,
            slots: Vec::new(),
            in_frame: false,
        };
        renderer.rebuild_images()?;
        Ok(renderer)
    }

    pub fn device(&self) -> &Rc<RefCell<Device<B>>> {
        &self.device
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Forwards a surface resize to the context. The image set rebuilds at
    /// the next `begin_frame`, not incrementally.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    /// Starts a frame: applies any pending swapchain rebuild, then acquires
    /// the next draw index.
    ///
    /// Must be paired with exactly one [`end_frame`](Self::end_frame).
    pub fn begin_frame(&mut self) -> Result<(), GpuError> {
        debug_assert!(!self.in_frame, "begin_frame while a frame is already open");

        if self.context.needs_rebuild() {
            self.rebuild_images()?;
        }

        self.context.acquire()?;
        self.in_frame = true;
        Ok(())
    }

    /// The swapchain image for the current draw index.
    ///
    /// Never returns an image from a pre-rebuild set: any pending rebuild was
    /// applied by `begin_frame` before the index was acquired.
    pub fn get_backbuffer(&self) -> &B::Image {
        debug_assert!(self.in_frame, "get_backbuffer outside begin_frame/end_frame");
        &self.slots[self.context.draw_index()].image
    }

    /// Render-target descriptor for the current backbuffer.
    pub fn backbuffer_render_target(&self) -> DescriptorId {
        debug_assert!(self.in_frame, "backbuffer_render_target outside a frame");
        self.slots[self.context.draw_index()].render_target
    }

    /// Finishes the frame and presents the current backbuffer.
    pub fn end_frame(&mut self) -> Result<(), GpuError> {
        debug_assert!(self.in_frame, "end_frame without begin_frame");
        self.in_frame = false;

        let image = &self.slots[self.context.draw_index()].image;
        self.context.present(image)
    }

    /// All-or-nothing swapchain rebuild.
    ///
    /// Every prior image's render-target descriptor is released exactly once
    /// before the new set is adopted. A frame mid-flight that still samples a
    /// stale image keeps it alive through its own handle clone; the renderer
    /// just stops handing it out.
    fn rebuild_images(&mut self) -> Result<(), GpuError> {
        let mut device = self.device.borrow_mut();

        for slot in self.slots.drain(..) {
            device.free_render_target(slot.render_target);
        }

        let images = self.context.images()?;
        log::debug!("renderer: adopted swapchain set of {} images", images.len());

        self.slots = images
            .into_iter()
            .map(|image| {
                let render_target = device.alloc_render_target(&image);
                SwapchainSlot {
                    image,
                    render_target,
                }
            })
            .collect();
        Ok(())
    }
}

impl<B: Backend, C: DrawContext<B>> Drop for Renderer<B, C> {
    fn drop(&mut self) {
        let mut device = self.device.borrow_mut();
        for slot in self.slots.drain(..) {
            device.free_render_target(slot.render_target);
        }
    }
}

//! vitrine-gpu: backend-agnostic render-op frame/device layer.
//!
//! This crate owns the GPU half of the toolkit's renderer: a per-display
//! device (pipeline cache, descriptor pool, image factories), fenced frames
//! that walk a backend-agnostic op stream, and a renderer that keeps a
//! surface's swapchain image set in sync. One concrete backend (wgpu) ships
//! here; the scene graph and widgets live in higher layers.

pub mod backend;
pub mod color;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod frame;
pub mod image;
pub mod ops;
pub mod pipeline;
pub mod region;
pub mod renderer;
pub mod texture;

pub mod logging;

pub use backend::{Backend, BufferKind, Fence, GpuBuffer, GpuImage, LoadAction};
pub use color::Color;
pub use descriptors::DescriptorId;
pub use device::{Device, DeviceRegistry, DisplayId};
pub use error::GpuError;
pub use frame::{Frame, FrameBufferId};
pub use image::{AlphaMode, ColorState, ColorStates, ImageFormat, ImageInfo, ImageUsage};
pub use ops::{DrawOp, ImageSlot, OpList, RenderOp};
pub use pipeline::{Blend, PipelineKey, ShaderFlags, ShaderKind};
pub use region::DeviceRect;
pub use renderer::{DrawContext, Renderer};
pub use texture::{MemoryTexture, Texture};

use std::ops::Range;

use crate::image::ColorStates;
use crate::pipeline::{Blend, ShaderFlags, ShaderKind};
use crate::region::DeviceRect;

/// Index into the frame-local sampled-image table.
///
/// Slots are handed out by `Frame::bind_image`; they are only meaningful for
/// the frame that produced them.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ImageSlot(pub u32);

/// One shader draw: pipeline parameters plus the vertex range it consumes.
///
/// Everything needed to resolve a pipeline through the device cache is here;
/// the backend receives the already-resolved pipeline handle alongside the op.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOp {
    pub shader: ShaderKind,
    pub flags: ShaderFlags,
    pub color_states: ColorStates,
    pub variation: u32,
    pub blend: Blend,
    /// Vertex index range within the frame's vertex buffer.
    pub vertices: Range<u32>,
    /// Sampled image for texture-class shaders. `None` binds the device's
    /// neutral fallback texture.
    pub texture: Option<ImageSlot>,
}

/// Backend-agnostic render command.
///
/// Extending the vocabulary:
/// - add a variant here
/// - handle it in every backend's `submit_pass` match
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    Draw(DrawOp),
    /// Restrict subsequent draws to `rect` (device pixels, pre-clamped by the
    /// backend to the render target).
    Scissor(DeviceRect),
}

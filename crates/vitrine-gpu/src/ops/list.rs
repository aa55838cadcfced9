use super::{DrawOp, RenderOp};

/// Recorded op stream for one pass.
///
/// Ops execute in push order on the GPU (single queue, single submission), so
/// no sorting happens here; the scene-graph layer is responsible for emitting
/// back-to-front.
///
/// Performance characteristics:
/// - `push()` is O(1)
/// - `clear()` keeps allocated capacity for reuse across frames
#[derive(Debug, Default)]
pub struct OpList {
    ops: Vec<RenderOp>,
    draw_count: usize,
}

impl OpList {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears recorded ops. Keeps allocated capacity for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.ops.clear();
        self.draw_count = 0;
    }

    #[inline]
    pub fn push(&mut self, op: RenderOp) {
        if matches!(op, RenderOp::Draw(_)) {
            self.draw_count += 1;
        }
        self.ops.push(op);
    }

    /// Convenience wrapper for the common case.
    #[inline]
    pub fn push_draw(&mut self, draw: DrawOp) {
        self.push(RenderOp::Draw(draw));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of `Draw` ops in the stream. Pipeline resolution allocates one
    /// handle per draw, in op order.
    #[inline]
    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    /// Ops in program order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &RenderOp> {
        self.ops.iter()
    }
}

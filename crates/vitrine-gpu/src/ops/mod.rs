//! Render-op stream types.
//!
//! Responsibilities:
//! - store backend-agnostic draw/state-change commands in program order
//! - keep shader/pipeline parameters as plain data so any backend can
//!   consume the same stream
//!
//! The per-backend emission switch lives in each backend's `submit_pass`,
//! not here.

mod list;
mod op;

pub use list::OpList;
pub use op::{DrawOp, ImageSlot, RenderOp};

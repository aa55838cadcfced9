//! Logging utilities.
//!
//! Centralizes logger initialization. The crate itself only uses the `log`
//! facade; this module exists so embedding applications get consistent
//! defaults (including quieting wgpu's own chatter).

mod init;

pub use init::{init_logging, LoggingConfig};

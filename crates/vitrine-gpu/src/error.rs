use crate::image::ImageInfo;
use crate::pipeline::PipelineKey;

/// Error type for device/frame/renderer operations.
///
/// Construction-time failures (no adapter, disabled backend) are recoverable by
/// the caller selecting another renderer backend; everything else indicates a
/// failed GPU operation on an otherwise healthy device.
#[derive(Debug)]
pub enum GpuError {
    /// The backend cannot be used on this display (missing hardware,
    /// unsupported feature set, or explicitly disabled).
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },
    /// A pipeline could not be compiled for `key`, even after relaxing
    /// compile effort.
    PipelineCompile { key: PipelineKey, reason: String },
    /// GPU buffer allocation failed.
    BufferAllocation { size: u64, reason: String },
    /// GPU image allocation failed.
    ImageAllocation { info: ImageInfo, reason: String },
    /// Surface/swapchain operation failed (acquire, configure, present).
    Surface(String),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuError::BackendUnavailable { backend, reason } => {
                write!(f, "GPU backend '{backend}' unavailable: {reason}")
            }
            GpuError::PipelineCompile { key, reason } => {
                write!(f, "failed to compile pipeline for {key:?}: {reason}")
            }
            GpuError::BufferAllocation { size, reason } => {
                write!(f, "failed to allocate {size}-byte GPU buffer: {reason}")
            }
            GpuError::ImageAllocation { info, reason } => {
                write!(
                    f,
                    "failed to allocate {}x{} {:?} image: {reason}",
                    info.width, info.height, info.format
                )
            }
            GpuError::Surface(reason) => write!(f, "surface error: {reason}"),
        }
    }
}

impl std::error::Error for GpuError {}

//! Error taxonomy for the rendering core.
//!
//! Recoverable failures (resource allocation, backend execution, connection
//! loss, kernel overflow) are reported through [`RenderError`]. Programmer
//! errors — an out-of-range layout age — are `debug_assert!` failures per the
//! design, not variants here.

use crate::backend::ImageFormat;

/// Errors a caller of the rendering core may need to react to.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The backend returned a null handle for `new_image`.
    #[error("backend failed to allocate a {format:?} image of size {size:?}")]
    ImageAllocationFailed {
        format: ImageFormat,
        size: (u32, u32),
    },

    /// `Backend::execute` returned `false`.
    #[error("backend reported execution failure for the current frame")]
    BackendExecutionFailed,

    /// The X connection was lost while awaiting a sync fence.
    #[error("backend connection lost while awaiting sync fence")]
    ConnectionLost,

    /// A software shadow kernel exceeded the backend's per-request image
    /// size limit.
    #[error("shadow kernel of size {requested} exceeds backend limit {limit}")]
    ShadowKernelOverflow { requested: u32, limit: u32 },
}

/// Result alias used throughout the rendering core.
pub type Result<T> = std::result::Result<T, RenderError>;

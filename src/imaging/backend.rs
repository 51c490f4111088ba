//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the slot manager
//! needs from pixels: identify (for validation) and crop (for the crop stage
//! commit).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) — pure Rust, everything
//! statically linked into the binary.

use super::params::CropParams;
use crate::types::ImageResource;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unreadable image: {0}")]
    Unreadable(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Backends must be `Sync`: validation of a batch fans out over the rayon
/// pool, and crop jobs may run on a worker thread.
pub trait ImageBackend: Sync {
    /// Decode enough of the payload to learn its pixel dimensions.
    fn identify(&self, resource: &ImageResource) -> Result<Dimensions, BackendError>;

    /// Rotate, crop, bound and re-encode. Returns the encoded bytes.
    fn crop(&self, resource: &ImageResource, params: &CropParams) -> Result<Vec<u8>, BackendError>;
}

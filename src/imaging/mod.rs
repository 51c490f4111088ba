//! Image processing — pure Rust, zero system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Rotate** | quarter turns via `image`, free angles via `imageproc` |
//! | **Crop → JPEG/PNG/WebP/AVIF** | `crop_imm` + Lanczos3 bound + `image` encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    CropTransform, bounded_output_dimensions, clamp_zoom, compute_crop_area, fit_aspect,
    normalize_rotation, rotated_bounds,
};
pub use params::{CropParams, CropRect, OutputFormat, Quality};
pub use rust_backend::{RustBackend, decodable_mime_types};

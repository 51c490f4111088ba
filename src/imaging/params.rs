//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the crop stage (which decides what image to produce) and
//! the [`backend`](super::backend) (which does the actual pixel work), so the
//! crop stage can be exercised against a mock backend.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`OutputFormat`] — Encoding of the finished crop (JPEG by default).
//! - [`CropRect`] — Pixel rectangle in the rotated canvas.
//! - [`CropParams`] — Everything one re-sampling pass needs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Build from a 0.0–1.0 fraction, the unit `crop.output_quality` is configured in.
    pub fn from_fraction(fraction: f32) -> Self {
        Self::new((fraction * 100.0).round() as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Encoding of the image produced by a crop commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl OutputFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }

    /// Whether the encoder honours [`Quality`]. PNG and WebP are written lossless.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::Avif)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Rectangle in pixel coordinates of the rotated canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Parameters for a crop re-sampling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    /// Clockwise rotation in degrees, already normalized to `[0, 360)`.
    pub rotation_degrees: f32,
    pub area: CropRect,
    pub format: OutputFormat,
    pub quality: Quality,
    /// Downscale so the longer edge does not exceed this. `None` keeps crop size.
    pub max_output_edge: Option<u32>,
}

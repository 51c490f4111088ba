//! Pure crop geometry.
//!
//! All functions here are pure and testable without any I/O or images. The
//! coordinate space is the *rotated canvas*: the source rotated about its
//! centre and placed on a canvas exactly the size of its rotated bounding box,
//! so no source pixel is cut off by the rotation.

use super::params::CropRect;

/// Normalize a rotation in degrees to `[0, 360)`.
///
/// ```
/// # use photo_slots::imaging::normalize_rotation;
/// assert_eq!(normalize_rotation(-90.0), 270.0);
/// assert_eq!(normalize_rotation(450.0), 90.0);
/// ```
pub fn normalize_rotation(degrees: f32) -> f32 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let r = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if r >= 360.0 { 0.0 } else { r }
}

/// Clamp a zoom factor into `[min, max]`. Non-finite input falls back to `min`.
pub fn clamp_zoom(zoom: f32, min: f32, max: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(min, max)
    } else {
        min
    }
}

/// Bounding box of a `width`×`height` image rotated by `degrees`.
pub fn rotated_bounds(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let rad = (normalize_rotation(degrees) as f64).to_radians();
    let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
    let (w, h) = (width as f64, height as f64);
    let bw = (w * cos + h * sin).round() as u32;
    let bh = (w * sin + h * cos).round() as u32;
    (bw.max(1), bh.max(1))
}

/// Largest `aspect` rectangle fitting inside `bounds`.
///
/// # Examples
/// ```
/// # use photo_slots::imaging::fit_aspect;
/// // 3:4 portrait inside a 1200x1200 square → 900x1200
/// assert_eq!(fit_aspect((1200, 1200), (3, 4)), (900, 1200));
/// ```
pub fn fit_aspect(bounds: (u32, u32), aspect: (u32, u32)) -> (u32, u32) {
    let (bw, bh) = bounds;
    let (aw, ah) = aspect;
    let target = aw as f64 / ah as f64;
    let current = bw as f64 / bh as f64;

    if current > target {
        // Bounds are wider: height limits
        let w = (bh as f64 * target).round() as u32;
        (w.clamp(1, bw), bh)
    } else {
        // Bounds are taller: width limits
        let h = (bw as f64 / target).round() as u32;
        (bw, h.clamp(1, bh))
    }
}

/// Interactive crop transform as set by the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropTransform {
    pub zoom: f32,
    pub rotation_degrees: f32,
    /// Offset of the crop centre as a fraction (-1.0..=1.0) of the free slack
    /// on each axis. `(0, 0)` is centred.
    pub pan: (f32, f32),
}

impl Default for CropTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            rotation_degrees: 0.0,
            pan: (0.0, 0.0),
        }
    }
}

/// Compute the crop rectangle for a source image under a transform.
///
/// The base rectangle is the largest `aspect` rectangle inside the rotated
/// canvas; zoom shrinks it around its centre; pan moves the centre within the
/// remaining slack. The result always lies inside the canvas and is at least
/// 1×1.
pub fn compute_crop_area(
    source: (u32, u32),
    transform: &CropTransform,
    aspect: (u32, u32),
) -> CropRect {
    let (cw, ch) = rotated_bounds(source.0, source.1, transform.rotation_degrees);
    let (base_w, base_h) = fit_aspect((cw, ch), aspect);

    let zoom = if transform.zoom.is_finite() && transform.zoom >= 1.0 {
        transform.zoom as f64
    } else {
        1.0
    };
    let width = ((base_w as f64 / zoom).round() as u32).clamp(1, cw);
    let height = ((base_h as f64 / zoom).round() as u32).clamp(1, ch);

    let slack_x = (cw - width) as f64 / 2.0;
    let slack_y = (ch - height) as f64 / 2.0;
    let pan_x = transform.pan.0.clamp(-1.0, 1.0) as f64;
    let pan_y = transform.pan.1.clamp(-1.0, 1.0) as f64;

    let x = (slack_x + pan_x * slack_x).round() as u32;
    let y = (slack_y + pan_y * slack_y).round() as u32;

    CropRect {
        x: x.min(cw - width),
        y: y.min(ch - height),
        width,
        height,
    }
}

/// Output dimensions after bounding the longer edge.
///
/// Returns `(width, height)` unchanged when already within the limit.
pub fn bounded_output_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge || max_edge == 0 {
        return (width, height);
    }
    let ratio = max_edge as f64 / longer as f64;
    if width >= height {
        (max_edge, ((height as f64 * ratio).round() as u32).max(1))
    } else {
        (((width as f64 * ratio).round() as u32).max(1), max_edge)
    }
}

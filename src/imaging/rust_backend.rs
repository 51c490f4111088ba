//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header decode only) |
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | Quarter-turn rotation | `image::DynamicImage::rotate90` / `rotate180` / `rotate270` |
//! | Free rotation | `imageproc::geometric_transformations::rotate_about_center` (bilinear) |
//! | Crop | `image::DynamicImage::crop_imm` |
//! | Output bound | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → JPEG / AVIF | `JpegEncoder::new_with_quality`, `AvifEncoder` (rav1e, speed 6) |
//! | Encode → PNG / WebP | `PngEncoder`, `WebPEncoder::new_lossless` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{bounded_output_dimensions, normalize_rotation, rotated_bounds};
use super::params::{CropParams, OutputFormat, Quality};
use crate::types::ImageResource;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use std::io::Cursor;
use std::sync::LazyLock;

/// MIME types whose decoders are compiled in.
///
/// AVIF is excluded: the `image` crate's `"avif"` feature only
/// enables the **encoder** (rav1e). AVIF is a valid crop *output*, never an
/// accepted upload.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("image/jpeg", ImageFormat::Jpeg),
    ("image/png", ImageFormat::Png),
    ("image/webp", ImageFormat::WebP),
];

static DECODABLE_MIME_TYPES: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(mime, _)| *mime)
        .collect()
});

/// Returns the MIME types that have working decoders compiled in.
pub fn decodable_mime_types() -> &'static [&'static str] {
    &DECODABLE_MIME_TYPES
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader over the in-memory payload. The format is sniffed from the bytes,
/// not taken from the declared MIME type.
fn reader(resource: &ImageResource) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    ImageReader::new(Cursor::new(resource.bytes()))
        .with_guessed_format()
        .map_err(BackendError::Io)
}

fn load_image(resource: &ImageResource) -> Result<DynamicImage, BackendError> {
    reader(resource)?.decode().map_err(|e| {
        BackendError::Unreadable(format!("Failed to decode {}: {}", resource.name(), e))
    })
}

/// Rotate clockwise by `degrees` onto a canvas the size of the rotated
/// bounding box. Uncovered corners are transparent.
fn rotate_onto_canvas(img: DynamicImage, degrees: f32) -> DynamicImage {
    let degrees = normalize_rotation(degrees);
    if degrees == 0.0 {
        return img;
    }
    if degrees == 90.0 {
        return img.rotate90();
    }
    if degrees == 180.0 {
        return img.rotate180();
    }
    if degrees == 270.0 {
        return img.rotate270();
    }

    let (w, h) = (img.width(), img.height());
    let (bw, bh) = rotated_bounds(w, h, degrees);

    // A thin image rotated near 45° has a bounding box narrower than itself,
    // so the working canvas must hold both before trimming to the box.
    let (cw, ch) = (w.max(bw), h.max(bh));
    let mut canvas = RgbaImage::new(cw, ch);
    image::imageops::overlay(
        &mut canvas,
        &img.to_rgba8(),
        ((cw - w) / 2) as i64,
        ((ch - h) / 2) as i64,
    );

    let rotated = rotate_about_center(
        &canvas,
        degrees.to_radians(),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    );
    DynamicImage::ImageRgba8(rotated).crop_imm((cw - bw) / 2, (ch - bh) / 2, bw, bh)
}

/// Encode to the requested output format.
fn encode(img: &DynamicImage, format: OutputFormat, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel; transparent corners become black.
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        OutputFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new(&mut buf);
            img.write_with_encoder(encoder)
        }
        OutputFormat::Webp => {
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut buf);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)
        }
        OutputFormat::Avif => {
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut buf,
                6,
                quality.value() as u8,
            );
            img.write_with_encoder(encoder)
        }
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("{format} encode failed: {e}")))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, resource: &ImageResource) -> Result<Dimensions, BackendError> {
        let (width, height) = reader(resource)?.into_dimensions().map_err(|e| {
            BackendError::Unreadable(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn crop(&self, resource: &ImageResource, params: &CropParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(resource)?;
        let canvas = rotate_onto_canvas(img, params.rotation_degrees);

        let area = params.area;
        if area.width == 0
            || area.height == 0
            || area.x + area.width > canvas.width()
            || area.y + area.height > canvas.height()
        {
            return Err(BackendError::ProcessingFailed(format!(
                "Crop area {}x{}+{}+{} outside {}x{} canvas",
                area.width,
                area.height,
                area.x,
                area.y,
                canvas.width(),
                canvas.height()
            )));
        }
        let cropped = canvas.crop_imm(area.x, area.y, area.width, area.height);

        let bounded = match params.max_output_edge {
            Some(max_edge) => {
                let (w, h) = bounded_output_dimensions(cropped.width(), cropped.height(), max_edge);
                if (w, h) == (cropped.width(), cropped.height()) {
                    cropped
                } else {
                    cropped.resize_exact(w, h, FilterType::Lanczos3)
                }
            }
            None => cropped,
        };

        encode(&bounded, params.format, params.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::CropRect;
    use crate::test_helpers::{jpeg_bytes, png_bytes};

    fn resource(name: &str, mime: &str, bytes: Vec<u8>) -> ImageResource {
        ImageResource::new(name, mime, bytes)
    }

    fn decoded_dims(bytes: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(bytes).unwrap();
        (img.width(), img.height())
    }

    fn params(rotation: f32, area: CropRect, format: OutputFormat) -> CropParams {
        CropParams {
            rotation_degrees: rotation,
            area,
            format,
            quality: Quality::new(85),
            max_output_edge: None,
        }
    }

    #[test]
    fn decodable_types_cover_common_uploads() {
        let types = decodable_mime_types();
        for expected in &["image/jpeg", "image/png", "image/webp"] {
            assert!(types.contains(expected), "expected {expected} decodable");
        }
        assert!(!types.contains(&"image/avif"));
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let backend = RustBackend::new();
        let dims = backend
            .identify(&resource("a.jpg", "image/jpeg", jpeg_bytes(200, 150)))
            .unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_sniffs_format_not_declared_mime() {
        let backend = RustBackend::new();
        // PNG bytes declared as JPEG still identify
        let dims = backend
            .identify(&resource("a.jpg", "image/jpeg", png_bytes(64, 32)))
            .unwrap();
        assert_eq!(dims, Dimensions { width: 64, height: 32 });
    }

    #[test]
    fn identify_garbage_is_unreadable() {
        let backend = RustBackend::new();
        let result = backend.identify(&resource("x.jpg", "image/jpeg", b"hello".to_vec()));
        assert!(matches!(result, Err(BackendError::Unreadable(_))));
    }

    #[test]
    fn crop_produces_exact_area_as_jpeg() {
        let backend = RustBackend::new();
        let source = resource("a.jpg", "image/jpeg", jpeg_bytes(800, 600));
        let area = CropRect { x: 175, y: 0, width: 450, height: 600 };

        let bytes = backend.crop(&source, &params(0.0, area, OutputFormat::Jpeg)).unwrap();
        assert_eq!(decoded_dims(&bytes), (450, 600));
        assert_eq!(
            image::guess_format(&bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn crop_quarter_turn_swaps_canvas() {
        let backend = RustBackend::new();
        let source = resource("a.jpg", "image/jpeg", jpeg_bytes(800, 600));
        // After 90° the canvas is 600x800, so a full-height crop is legal
        let area = CropRect { x: 0, y: 0, width: 600, height: 800 };

        let bytes = backend.crop(&source, &params(90.0, area, OutputFormat::Png)).unwrap();
        assert_eq!(decoded_dims(&bytes), (600, 800));
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn crop_free_rotation_canvas_is_bounding_box() {
        let backend = RustBackend::new();
        let source = resource("a.png", "image/png", png_bytes(100, 100));
        // 45° → 141x141 canvas; the full canvas is a valid crop
        let area = CropRect { x: 0, y: 0, width: 141, height: 141 };

        let bytes = backend.crop(&source, &params(45.0, area, OutputFormat::Png)).unwrap();
        assert_eq!(decoded_dims(&bytes), (141, 141));
    }

    #[test]
    fn crop_outside_canvas_errors() {
        let backend = RustBackend::new();
        let source = resource("a.jpg", "image/jpeg", jpeg_bytes(100, 100));
        let area = CropRect { x: 50, y: 0, width: 100, height: 100 };

        let result = backend.crop(&source, &params(0.0, area, OutputFormat::Jpeg));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn crop_respects_max_output_edge() {
        let backend = RustBackend::new();
        let source = resource("a.jpg", "image/jpeg", jpeg_bytes(600, 800));
        let mut p = params(
            0.0,
            CropRect { x: 0, y: 0, width: 600, height: 800 },
            OutputFormat::Jpeg,
        );
        p.max_output_edge = Some(400);

        let bytes = backend.crop(&source, &p).unwrap();
        assert_eq!(decoded_dims(&bytes), (300, 400));
    }

    #[test]
    fn crop_webp_output_is_webp() {
        let backend = RustBackend::new();
        let source = resource("a.jpg", "image/jpeg", jpeg_bytes(120, 160));
        let area = CropRect { x: 0, y: 0, width: 120, height: 160 };

        let bytes = backend.crop(&source, &params(0.0, area, OutputFormat::Webp)).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::WebP);
    }

    #[test]
    fn crop_avif_output_is_not_empty() {
        let backend = RustBackend::new();
        let source = resource("a.jpg", "image/jpeg", jpeg_bytes(64, 48));
        let area = CropRect { x: 0, y: 0, width: 36, height: 48 };

        let bytes = backend.crop(&source, &params(0.0, area, OutputFormat::Avif)).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn crop_unreadable_source_errors() {
        let backend = RustBackend::new();
        let source = resource("x.jpg", "image/jpeg", b"not an image".to_vec());
        let area = CropRect { x: 0, y: 0, width: 1, height: 1 };

        let result = backend.crop(&source, &params(0.0, area, OutputFormat::Jpeg));
        assert!(result.is_err());
    }
}

//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! 001 dawn.jpg (1200x1600, 412 KB)
//! 002 tiny.jpg (12 KB)
//!     Rejected: Image is too small (120x90). Minimum is 400x400 pixels.
//!
//! Checked 2 files: 1 accepted, 1 rejected
//! ```
//!
//! ## Slots
//!
//! ```text
//! Slots (2 / 5)
//! 001 dawn-crop.jpg [main]
//!     image/jpeg, 380 KB
//! 002 dusk-crop.jpg
//!     image/jpeg, 295 KB
//! 003 (empty)
//! 004 (empty)
//! 005 (empty)
//!
//! Valid
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::imaging::CropParams;
use crate::manager::ValidationState;
use crate::types::{Candidate, ImageResource};
use crate::validation::{Rejection, Verdict, human_bytes};
use serde::Serialize;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_report(candidates: &[Candidate], verdicts: &[Verdict]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut accepted = 0;

    for (i, (candidate, verdict)) in candidates.iter().zip(verdicts).enumerate() {
        let size = human_bytes(candidate.resource.byte_len());
        match verdict {
            Ok(dims) => {
                accepted += 1;
                lines.push(format!(
                    "{} {} ({}x{}, {})",
                    format_index(i + 1),
                    candidate.name(),
                    dims.width,
                    dims.height,
                    size
                ));
            }
            Err(rejection) => {
                lines.push(format!("{} {} ({})", format_index(i + 1), candidate.name(), size));
                lines.push(format!("{}Rejected: {}", indent(1), rejection));
            }
        }
    }

    let total = candidates.len();
    lines.push(String::new());
    lines.push(format!(
        "Checked {} file{}: {} accepted, {} rejected",
        total,
        if total == 1 { "" } else { "s" },
        accepted,
        total - accepted
    ));
    lines
}

pub fn print_check_report(candidates: &[Candidate], verdicts: &[Verdict]) {
    for line in format_check_report(candidates, verdicts) {
        println!("{}", line);
    }
}

// ============================================================================
// Slots
// ============================================================================

pub fn format_slots(padded: &[Option<&ImageResource>], state: &ValidationState) -> Vec<String> {
    let occupied = padded.iter().filter(|s| s.is_some()).count();
    let mut lines = vec![format!("Slots ({} / {})", occupied, padded.len())];

    for (i, slot) in padded.iter().enumerate() {
        match slot {
            Some(image) => {
                let badge = if i == 0 { " [main]" } else { "" };
                lines.push(format!("{} {}{}", format_index(i + 1), image.name(), badge));
                lines.push(format!(
                    "{}{}, {}",
                    indent(1),
                    image.mime(),
                    human_bytes(image.byte_len())
                ));
            }
            None => lines.push(format!("{} (empty)", format_index(i + 1))),
        }
        if let Some(reason) = state.errors.get(&i) {
            lines.push(format!("{}Error: {}", indent(1), reason));
        }
    }

    lines.push(String::new());
    if state.is_valid {
        lines.push("Valid".to_string());
    } else if state.is_required_but_empty {
        lines.push("Invalid: at least one photo is required".to_string());
    } else {
        lines.push(format!("Invalid: {} slot error(s)", state.errors.len()));
    }
    lines
}

pub fn print_slots(padded: &[Option<&ImageResource>], state: &ValidationState) {
    for line in format_slots(padded, state) {
        println!("{}", line);
    }
}

/// One line per rejected upload, in input order.
pub fn format_rejections(rejected: &[(String, Rejection)]) -> Vec<String> {
    rejected
        .iter()
        .map(|(name, rejection)| format!("Rejected {}: {}", name, rejection))
        .collect()
}

pub fn print_rejections(rejected: &[(String, Rejection)]) {
    for line in format_rejections(rejected) {
        println!("{}", line);
    }
}

// ============================================================================
// Crop
// ============================================================================

pub fn format_crop_result(input: &Path, output: &Path, params: &CropParams, bytes: usize) -> Vec<String> {
    let area = params.area;
    vec![
        format!("{} → {}", input.display(), output.display()),
        format!(
            "{}Area: {}x{} at ({}, {}), rotated {}°",
            indent(1),
            area.width,
            area.height,
            area.x,
            area.y,
            params.rotation_degrees
        ),
        format!(
            "{}Output: {} q{}, {}",
            indent(1),
            params.format,
            params.quality.value(),
            human_bytes(bytes as u64)
        ),
    ]
}

pub fn print_crop_result(input: &Path, output: &Path, params: &CropParams, bytes: usize) {
    for line in format_crop_result(input, output, params, bytes) {
        println!("{}", line);
    }
}

// ============================================================================
// JSON manifest
// ============================================================================

/// One occupied slot as written to the `--json` manifest.
#[derive(Debug, Serialize, PartialEq)]
pub struct SlotEntry {
    pub position: usize,
    pub name: String,
    pub mime: String,
    pub bytes: u64,
    pub sha256: String,
    pub primary: bool,
}

pub fn slot_entries(images: &[ImageResource]) -> Vec<SlotEntry> {
    images
        .iter()
        .enumerate()
        .map(|(position, image)| SlotEntry {
            position,
            name: image.name().to_string(),
            mime: image.mime().to_string(),
            bytes: image.byte_len(),
            sha256: image.digest(),
            primary: position == 0,
        })
        .collect()
}

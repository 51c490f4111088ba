//! Slot manager configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by whatever keys the user file sets; everything else keeps its
//! default.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [slots]
//! max_images = 5            # Number of photo slots
//! required = true           # At least one photo needed for the form to be valid
//! enable_crop = true        # Route every new photo through the crop dialog
//! enable_reorder = true     # Allow drag reordering / "make primary"
//! reject_duplicates = true  # Refuse a photo whose bytes are already in a slot
//!
//! [validation]
//! allowed_types = ["image/jpeg", "image/png", "image/webp"]
//! max_bytes = 5242880       # 5 MB
//! min_width = 400
//! min_height = 400
//!
//! [crop]
//! aspect_ratio = [3, 4]     # width:height
//! output_format = "jpeg"    # jpeg | png | webp | avif
//! output_quality = 0.9      # 0.0 - 1.0 (lossy formats only)
//! min_zoom = 1.0
//! max_zoom = 3.0
//! max_output_edge = 2048    # Longer edge of the committed image, in pixels
//!
//! [animation]
//! reorder_ms = 300          # How long moved tiles stay marked as animating
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Manager configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlotsConfig {
    /// Slot collection behaviour.
    pub slots: SlotSettings,
    /// Candidate acceptance rules.
    pub validation: ValidationRules,
    /// Crop dialog and output encoding.
    pub crop: CropSettings,
    /// Presentation timings.
    pub animation: AnimationSettings,
}

impl SlotsConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots.max_images == 0 {
            return Err(ConfigError::Validation(
                "slots.max_images must be at least 1".into(),
            ));
        }
        if self.validation.allowed_types.is_empty() {
            return Err(ConfigError::Validation(
                "validation.allowed_types must not be empty".into(),
            ));
        }
        if self.validation.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "validation.max_bytes must be greater than 0".into(),
            ));
        }
        if self.crop.aspect_ratio[0] == 0 || self.crop.aspect_ratio[1] == 0 {
            return Err(ConfigError::Validation(
                "crop.aspect_ratio values must be non-zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.crop.output_quality) {
            return Err(ConfigError::Validation(
                "crop.output_quality must be 0.0-1.0".into(),
            ));
        }
        if !(self.crop.min_zoom >= 1.0 && self.crop.min_zoom <= self.crop.max_zoom) {
            return Err(ConfigError::Validation(
                "crop zoom range must satisfy 1.0 <= min_zoom <= max_zoom".into(),
            ));
        }
        Ok(())
    }
}

/// Slot collection behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlotSettings {
    /// Fixed number of positions in the collection.
    pub max_images: usize,
    /// When set, an empty collection is invalid.
    pub required: bool,
    /// Route every newly added image through the crop stage before it lands.
    pub enable_crop: bool,
    /// Allow drag reordering and primary designation.
    pub enable_reorder: bool,
    /// Reject candidates whose content is already present.
    pub reject_duplicates: bool,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            max_images: 5,
            required: true,
            enable_crop: true,
            enable_reorder: true,
            reject_duplicates: true,
        }
    }
}

/// Candidate acceptance rules, checked in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationRules {
    /// Declared MIME types accepted for upload.
    pub allowed_types: Vec<String>,
    /// Byte-size ceiling.
    pub max_bytes: u64,
    /// Minimum decoded width in pixels.
    pub min_width: u32,
    /// Minimum decoded height in pixels.
    pub min_height: u32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            allowed_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            max_bytes: 5 * 1024 * 1024,
            min_width: 400,
            min_height: 400,
        }
    }
}

/// Crop dialog and output encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropSettings {
    /// Aspect ratio as `[width, height]`, e.g. `[3, 4]` for portrait photos.
    pub aspect_ratio: [u32; 2],
    /// Encoding of the committed image.
    pub output_format: OutputFormat,
    /// Lossy encoding quality as a fraction (0.0 = worst, 1.0 = best).
    pub output_quality: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Longer edge bound of the committed image. 0 disables the bound.
    pub max_output_edge: u32,
}

impl CropSettings {
    pub fn aspect(&self) -> (u32, u32) {
        (self.aspect_ratio[0], self.aspect_ratio[1])
    }

    pub fn quality(&self) -> Quality {
        Quality::from_fraction(self.output_quality)
    }

    pub fn output_edge_bound(&self) -> Option<u32> {
        (self.max_output_edge > 0).then_some(self.max_output_edge)
    }
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            aspect_ratio: [3, 4],
            output_format: OutputFormat::Jpeg,
            output_quality: 0.9,
            min_zoom: 1.0,
            max_zoom: 3.0,
            max_output_edge: 2048,
        }
    }
}

/// Presentation timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimationSettings {
    /// How long reordered positions stay in the animating set.
    pub reorder_ms: u64,
}

impl AnimationSettings {
    pub fn reorder_duration(&self) -> Duration {
        Duration::from_millis(self.reorder_ms)
    }
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self { reorder_ms: 300 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SlotsConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<SlotsConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SlotsConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<SlotsConfig, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Photo Slots Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Slot collection
# ---------------------------------------------------------------------------
[slots]
# Number of photo slots. Position 0 is the primary photo.
max_images = 5

# When true, the collection is invalid while empty.
required = true

# Route every newly added photo through the crop dialog before it lands.
enable_crop = true

# Allow drag reordering and "make primary".
enable_reorder = true

# Refuse a photo whose bytes are already in one of the slots.
reject_duplicates = true

# ---------------------------------------------------------------------------
# Upload validation (checked in this order, first failure wins)
# ---------------------------------------------------------------------------
[validation]
allowed_types = ["image/jpeg", "image/png", "image/webp"]

# Byte-size ceiling (5 MB).
max_bytes = 5242880

# Minimum decoded pixel dimensions.
min_width = 400
min_height = 400

# ---------------------------------------------------------------------------
# Crop dialog
# ---------------------------------------------------------------------------
[crop]
# Crop frame aspect ratio as [width, height].
aspect_ratio = [3, 4]

# Encoding of the committed photo: jpeg, png, webp or avif.
output_format = "jpeg"

# Lossy encoding quality, 0.0 - 1.0.
output_quality = 0.9

# Zoom slider range.
min_zoom = 1.0
max_zoom = 3.0

# Longer edge of the committed photo in pixels (0 = keep crop size).
max_output_edge = 2048

# ---------------------------------------------------------------------------
# Animation
# ---------------------------------------------------------------------------
[animation]
# How long reordered tiles stay marked as animating, in milliseconds.
reorder_ms = 300
"##
}

//! # Photo Slots
//!
//! A bounded, order-significant collection of profile photos: the "add up to
//! five pictures" widget of a dating profile, without the widget toolkit.
//!
//! Users drop files in; each one is validated, cropped to the profile aspect
//! ratio before it is stored, and lands in the first free slot. Slots can be
//! reordered by drag, and whatever sits in slot 0 is the main photo.
//!
//! # Flow
//!
//! ```text
//! files ─▶ validate ─▶ reject: error badge + notifier
//!                  └─▶ accept: crop dialog ─▶ commit ─▶ slot ─▶ on_change
//!                                          └─▶ cancel (nothing stored)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | `ImageResource`, `Candidate`, file intake |
//! | [`validation`] | Format, size and dimension checks; duplicate screening |
//! | [`preview`] | Revocable preview references (`data:` URIs) with leak accounting |
//! | [`crop`] | Crop stage state machine and re-sampling jobs |
//! | [`imaging`] | Crop geometry and the pixel backend (`image` + `imageproc`) |
//! | [`store`] | The compact slot list, error map and animating positions |
//! | [`manager`] | The façade a hosting form drives; change notification |
//! | [`grid`] | View model, gesture dispatch and Maud rendering |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Compact Storage, Padded Reads
//!
//! The store keeps only occupied slots, in order. Removal is a `Vec::remove`
//! and reorder a remove-then-insert; there are no holes to maintain. The
//! fixed-length view with empty positions is built on read.
//!
//! ## Owned Preview Handles
//!
//! A [`preview::PreviewRef`] is neither `Clone` nor `Copy`, and releasing it
//! consumes it. Each slot and the crop session own exactly one, so leaks show
//! up as a non-zero `live` count in [`preview::PreviewStats`]. Teardown
//! releases everything and reports the final counts.
//!
//! ## Crop Commit as a Job
//!
//! Committing a crop freezes the session into a [`crop::CropJob`] that owns
//! its source and parameters. It can run on a worker while the collection
//! keeps accepting edits; its result is applied only if the session it came
//! from is still current.
//!
//! ## Maud Over Template Engines
//!
//! The grid is rendered with [Maud](https://maud.lambda.xyz/): templates are
//! Rust expressions checked at compile time, and all interpolation is
//! auto-escaped, which matters when file names come from users.

pub mod config;
pub mod crop;
pub mod grid;
pub mod imaging;
pub mod manager;
pub mod output;
pub mod preview;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;

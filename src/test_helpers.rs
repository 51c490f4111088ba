//! Shared test utilities for the photo-slots test suite.
//!
//! Synthetic image payloads built with the `image` encoders, candidate
//! builders keyed to the [`MockBackend`] dimension table, and recording
//! collaborators for the manager.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let (mut manager, changes, notes) =
//!     mock_manager(SlotsConfig::default(), &[("a.jpg", 800, 800)]);
//! manager.add_batch(vec![mock_candidate("a.jpg")]);
//! manager.crop_layout();
//! manager.commit_crop();
//!
//! assert_eq!(changes.len(), 1);
//! assert!(notes.errors().is_empty());
//! ```

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use image::{ImageFormat, Rgb, RgbImage};

use crate::config::SlotsConfig;
use crate::imaging::backend::tests::MockBackend;
use crate::manager::{Notifier, SlotManager};
use crate::types::{Candidate, ImageResource, mime_for_path};

// =========================================================================
// Synthetic payloads
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    gradient(width, height).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// A decodable JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

/// A decodable PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn jpeg_candidate(name: &str, width: u32, height: u32) -> Candidate {
    Candidate::new(name, "image/jpeg", jpeg_bytes(width, height))
}

// =========================================================================
// Mock-backed resources
// =========================================================================

/// Resource whose bytes are its name, so distinct names never collide as
/// duplicates and equal names always do.
pub fn mock_resource(name: &str) -> ImageResource {
    ImageResource::new(
        name,
        mime_for_path(std::path::Path::new(name)),
        name.as_bytes().to_vec(),
    )
}

pub fn mock_candidate(name: &str) -> Candidate {
    Candidate {
        resource: mock_resource(name),
    }
}

pub fn mock_candidates(names: &[&str]) -> Vec<Candidate> {
    names.iter().map(|n| mock_candidate(n)).collect()
}

pub fn names(images: &[ImageResource]) -> Vec<String> {
    images.iter().map(|r| r.name().to_string()).collect()
}

// =========================================================================
// Recording collaborators
// =========================================================================

/// Notifier that keeps every message. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    errors: Rc<RefCell<Vec<String>>>,
    warnings: Rc<RefCell<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }

    fn warning(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}

/// Every image list handed to `on_change`, in call order.
#[derive(Clone, Default)]
pub struct ChangeLog {
    calls: Rc<RefCell<Vec<Vec<String>>>>,
}

impl ChangeLog {
    pub fn handler(&self) -> impl FnMut(&[ImageResource]) + 'static {
        let calls = Rc::clone(&self.calls);
        move |images| calls.borrow_mut().push(names(images))
    }

    pub fn names(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }
}

// =========================================================================
// Manager builders
// =========================================================================

/// Empty manager over a [`MockBackend`] that knows `dimensions`.
pub fn mock_manager(
    config: SlotsConfig,
    dimensions: &[(&str, u32, u32)],
) -> (SlotManager<MockBackend>, ChangeLog, RecordingNotifier) {
    mock_manager_with(config, dimensions, &[])
}

/// Like [`mock_manager`], mounted with `initial` images (see [`mock_resource`]).
pub fn mock_manager_with(
    config: SlotsConfig,
    dimensions: &[(&str, u32, u32)],
    initial: &[&str],
) -> (SlotManager<MockBackend>, ChangeLog, RecordingNotifier) {
    let changes = ChangeLog::default();
    let notes = RecordingNotifier::default();
    let manager = SlotManager::with_initial(
        config,
        MockBackend::with_dimensions(dimensions),
        initial.iter().map(|n| mock_resource(n)).collect(),
    )
    .with_notifier(notes.clone())
    .on_change(changes.handler());
    (manager, changes, notes)
}

//! Image resources and candidate intake.
//!
//! An [`ImageResource`] is the opaque payload a slot holds: encoded bytes, the
//! declared MIME type, and a display name. Resources are created either from a
//! user-selected file ([`Candidate`]) or as the output of the crop stage.
//!
//! Payloads are reference-counted; clones share the bytes. Identity is a
//! process-unique [`ResourceId`]. Content identity, used for duplicate
//! detection, is a SHA-256 digest.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Extension → declared MIME type.
///
/// The declared type is what the file picker reports; it is checked against
/// the allow-list before any byte is decoded.
const EXTENSION_MIME: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("avif", "image/avif"),
    ("heic", "image/heic"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("bmp", "image/bmp"),
];

/// MIME type declared for a path, judged by extension only.
///
/// Unknown extensions map to `application/octet-stream`.
pub fn mime_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|ext| {
            EXTENSION_MIME
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(ext))
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one image resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Binary image payload plus its declared MIME type.
#[derive(Clone)]
pub struct ImageResource {
    id: ResourceId,
    name: String,
    mime: String,
    bytes: Arc<[u8]>,
}

impl ImageResource {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: ResourceId::next(),
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Hex SHA-256 of the payload.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(&self.bytes[..]);
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ImageResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageResource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl PartialEq for ImageResource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ImageResource {}

/// A raw resource yielded by the file picker or a drop, not yet validated.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub resource: ImageResource,
}

impl Candidate {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            resource: ImageResource::new(name, mime, bytes),
        }
    }

    /// Read a file from disk, declaring its MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, IntakeError> {
        let bytes = std::fs::read(path).map_err(|source| IntakeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_for_path(path), bytes))
    }

    pub fn name(&self) -> &str {
        self.resource.name()
    }
}

/// Collect candidates from files and directories.
///
/// Directories are walked recursively in file-name order; hidden files are
/// skipped. Explicitly named files are always taken, whatever their extension,
/// so the validator gets to reject them with a proper reason.
pub fn collect_candidates(paths: &[PathBuf]) -> Result<Vec<Candidate>, IntakeError> {
    let mut candidates = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if entry.file_type().is_file() && !hidden {
                    candidates.push(Candidate::from_path(entry.path())?);
                }
            }
        } else {
            candidates.push(Candidate::from_path(path)?);
        }
    }
    Ok(candidates)
}

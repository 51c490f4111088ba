//! Candidate validation.
//!
//! Every candidate passes the same checks, in order, stopping at the first
//! failure:
//!
//! 1. **Format** — declared MIME type is on the allow-list.
//! 2. **Size** — byte length does not exceed the ceiling.
//! 3. **Dimensions** — decoded pixel size meets the minimum on both axes.
//!    A payload that cannot be decoded is reported as unreadable, never as
//!    "too small".
//!
//! Validation never mutates the candidate. A batch is validated in parallel on
//! the rayon pool and every candidate gets its own verdict, so one bad file
//! does not sink the others.
//!
//! Duplicate detection needs to know what the collection already holds, so
//! it lives in [`screen_duplicates`] and runs after the per-file checks.

use crate::config::ValidationRules;
use crate::imaging::{Dimensions, ImageBackend};
use crate::types::Candidate;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;

/// Why a candidate was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Declared MIME type is not accepted.
    RejectedFormat { mime: String },
    /// Payload exceeds the byte ceiling.
    RejectedSize { bytes: u64, max_bytes: u64 },
    /// Decoded image is smaller than the minimum on at least one axis.
    RejectedDimensions {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
    /// Payload could not be decoded.
    UnreadableImage,
    /// Same bytes are already in the collection or earlier in the batch.
    RejectedDuplicate,
}

impl Rejection {
    /// Short machine-friendly tag, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RejectedFormat { .. } => "format",
            Self::RejectedSize { .. } => "size",
            Self::RejectedDimensions { .. } => "dimensions",
            Self::UnreadableImage => "unreadable",
            Self::RejectedDuplicate => "duplicate",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RejectedFormat { mime } => {
                write!(f, "Unsupported file type ({mime}). Please use JPEG, PNG or WebP.")
            }
            Self::RejectedSize { bytes, max_bytes } => write!(
                f,
                "File is too large ({}). Maximum size is {}.",
                human_bytes(*bytes),
                human_bytes(*max_bytes)
            ),
            Self::RejectedDimensions {
                width,
                height,
                min_width,
                min_height,
            } => write!(
                f,
                "Image is too small ({width}x{height}). Minimum is {min_width}x{min_height} pixels."
            ),
            Self::UnreadableImage => f.write_str("Unreadable image."),
            Self::RejectedDuplicate => f.write_str("This photo has already been added."),
        }
    }
}

/// Format a byte count as `"4.2 MB"` / `"512 KB"` / `"90 B"`.
pub fn human_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{} KB", bytes / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Verdict for one candidate: decoded dimensions when accepted.
pub type Verdict = Result<Dimensions, Rejection>;

/// Validate one candidate.
pub fn validate(backend: &impl ImageBackend, candidate: &Candidate, rules: &ValidationRules) -> Verdict {
    let resource = &candidate.resource;

    if !rules
        .allowed_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(resource.mime()))
    {
        return Err(Rejection::RejectedFormat {
            mime: resource.mime().to_string(),
        });
    }

    if resource.byte_len() > rules.max_bytes {
        return Err(Rejection::RejectedSize {
            bytes: resource.byte_len(),
            max_bytes: rules.max_bytes,
        });
    }

    let dims = backend.identify(resource).map_err(|e| {
        log::debug!("{} failed to decode: {}", resource.name(), e);
        Rejection::UnreadableImage
    })?;
    if dims.width < rules.min_width || dims.height < rules.min_height {
        return Err(Rejection::RejectedDimensions {
            width: dims.width,
            height: dims.height,
            min_width: rules.min_width,
            min_height: rules.min_height,
        });
    }

    Ok(dims)
}

/// Validate a batch in parallel. Verdicts come back in input order.
pub fn validate_batch<B: ImageBackend>(
    backend: &B,
    candidates: &[Candidate],
    rules: &ValidationRules,
) -> Vec<Verdict> {
    candidates
        .par_iter()
        .map(|candidate| validate(backend, candidate, rules))
        .collect()
}

/// Turn accepted verdicts into duplicate rejections where the content is
/// already in `existing_digests` or was accepted earlier in the same batch.
pub fn screen_duplicates(
    candidates: &[Candidate],
    verdicts: &mut [Verdict],
    existing_digests: &HashSet<String>,
) {
    let mut seen = existing_digests.clone();
    for (candidate, verdict) in candidates.iter().zip(verdicts.iter_mut()) {
        if verdict.is_ok() && !seen.insert(candidate.resource.digest()) {
            *verdict = Err(Rejection::RejectedDuplicate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    fn candidate(name: &str, mime: &str, len: usize) -> Candidate {
        Candidate::new(name, mime, vec![0u8; len])
    }

    #[test]
    fn accepts_valid_candidate() {
        let backend = MockBackend::with_dimensions(&[("a.jpg", 800, 600)]);
        let verdict = validate(
            &backend,
            &candidate("a.jpg", "image/jpeg", 1000),
            &ValidationRules::default(),
        );
        assert_eq!(
            verdict,
            Ok(Dimensions {
                width: 800,
                height: 600
            })
        );
    }

    #[test]
    fn rejects_format_before_decoding() {
        let backend = MockBackend::with_dimensions(&[("a.gif", 800, 600)]);
        let verdict = validate(
            &backend,
            &candidate("a.gif", "image/gif", 1000),
            &ValidationRules::default(),
        );
        assert!(matches!(verdict, Err(Rejection::RejectedFormat { mime }) if mime == "image/gif"));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn mime_comparison_is_case_insensitive() {
        let backend = MockBackend::with_dimensions(&[("a.jpg", 800, 600)]);
        let verdict = validate(
            &backend,
            &candidate("a.jpg", "IMAGE/JPEG", 10),
            &ValidationRules::default(),
        );
        assert!(verdict.is_ok());
    }

    #[test]
    fn rejects_size_before_decoding() {
        let backend = MockBackend::with_dimensions(&[("big.jpg", 800, 600)]);
        let rules = ValidationRules {
            max_bytes: 100,
            ..ValidationRules::default()
        };
        let verdict = validate(&backend, &candidate("big.jpg", "image/jpeg", 101), &rules);
        assert_eq!(
            verdict,
            Err(Rejection::RejectedSize {
                bytes: 101,
                max_bytes: 100
            })
        );
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn size_at_ceiling_is_accepted() {
        let backend = MockBackend::with_dimensions(&[("a.jpg", 800, 600)]);
        let rules = ValidationRules {
            max_bytes: 100,
            ..ValidationRules::default()
        };
        assert!(validate(&backend, &candidate("a.jpg", "image/jpeg", 100), &rules).is_ok());
    }

    #[test]
    fn rejects_small_dimensions_on_either_axis() {
        let backend = MockBackend::with_dimensions(&[("narrow.jpg", 399, 1000), ("short.jpg", 1000, 399)]);
        let rules = ValidationRules::default();

        for name in ["narrow.jpg", "short.jpg"] {
            let verdict = validate(&backend, &candidate(name, "image/jpeg", 10), &rules);
            assert!(matches!(verdict, Err(Rejection::RejectedDimensions { .. })));
        }
    }

    #[test]
    fn minimum_dimensions_are_inclusive() {
        let backend = MockBackend::with_dimensions(&[("a.jpg", 400, 400)]);
        assert!(validate(&backend, &candidate("a.jpg", "image/jpeg", 10), &ValidationRules::default()).is_ok());
    }

    #[test]
    fn decode_failure_is_unreadable() {
        let backend = MockBackend::new();
        let verdict = validate(
            &backend,
            &candidate("broken.jpg", "image/jpeg", 10),
            &ValidationRules::default(),
        );
        assert_eq!(verdict, Err(Rejection::UnreadableImage));
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Identify("broken.jpg".into())]
        );
    }

    #[test]
    fn batch_reports_each_candidate_independently() {
        let backend = MockBackend::with_dimensions(&[("ok1.jpg", 800, 800), ("tiny.jpg", 10, 10), ("ok2.png", 500, 900)]);
        let batch = vec![
            candidate("ok1.jpg", "image/jpeg", 10),
            candidate("tiny.jpg", "image/jpeg", 10),
            candidate("doc.pdf", "application/pdf", 10),
            candidate("ok2.png", "image/png", 10),
        ];

        let verdicts = validate_batch(&backend, &batch, &ValidationRules::default());
        assert_eq!(verdicts.len(), 4);
        assert!(verdicts[0].is_ok());
        assert!(matches!(verdicts[1], Err(Rejection::RejectedDimensions { .. })));
        assert!(matches!(verdicts[2], Err(Rejection::RejectedFormat { .. })));
        assert!(verdicts[3].is_ok());
    }

    #[test]
    fn duplicates_within_batch_and_collection() {
        let batch = vec![
            Candidate::new("a.jpg", "image/jpeg", vec![1, 1]),
            Candidate::new("b.jpg", "image/jpeg", vec![1, 1]),
            Candidate::new("c.jpg", "image/jpeg", vec![2, 2]),
            Candidate::new("d.jpg", "image/jpeg", vec![3, 3]),
        ];
        let existing: HashSet<String> = [batch[3].resource.digest()].into_iter().collect();
        let dims = Dimensions {
            width: 800,
            height: 800,
        };
        let mut verdicts: Vec<Verdict> = vec![Ok(dims); 4];

        screen_duplicates(&batch, &mut verdicts, &existing);
        assert!(verdicts[0].is_ok());
        assert_eq!(verdicts[1], Err(Rejection::RejectedDuplicate));
        assert!(verdicts[2].is_ok());
        assert_eq!(verdicts[3], Err(Rejection::RejectedDuplicate));
    }

    #[test]
    fn duplicate_screen_keeps_earlier_rejections() {
        let batch = vec![Candidate::new("a.gif", "image/gif", vec![1])];
        let mut verdicts: Vec<Verdict> = vec![Err(Rejection::RejectedFormat {
            mime: "image/gif".into(),
        })];
        screen_duplicates(&batch, &mut verdicts, &HashSet::new());
        assert!(matches!(verdicts[0], Err(Rejection::RejectedFormat { .. })));
    }

    #[test]
    fn rejection_messages_are_human_readable() {
        assert_eq!(Rejection::UnreadableImage.to_string(), "Unreadable image.");
        let too_big = Rejection::RejectedSize {
            bytes: 6 * 1024 * 1024,
            max_bytes: 5 * 1024 * 1024,
        };
        assert_eq!(
            too_big.to_string(),
            "File is too large (6.0 MB). Maximum size is 5.0 MB."
        );
        assert_eq!(too_big.kind(), "size");
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(90), "90 B");
        assert_eq!(human_bytes(2048), "2 KB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}

//! Crop stage: the edit-before-commit step every new photo passes through.
//!
//! ```text
//! Closed ──open──▶ Open ──begin_commit──▶ Committing ──finish_commit──▶ Closed
//!                   │                         │
//!                   └──────── cancel ─────────┴──────────────────────▶ Closed
//! ```
//!
//! At most one session exists at a time. A session owns a preview reference
//! of its source image for the dialog; every path back to `Closed` hands that
//! reference back to the tracker.
//!
//! Commit is split into plan and execute. [`CropStage::begin_commit`] freezes
//! the transform into a [`CropJob`], which owns everything it needs and can be
//! run on any thread. Its [`CropOutcome`] is applied with
//! [`CropStage::finish_commit`]; an outcome for a session that has since been
//! cancelled is discarded.

use crate::config::CropSettings;
use crate::imaging::{
    BackendError, CropParams, CropRect, CropTransform, Dimensions, ImageBackend, clamp_zoom,
    compute_crop_area, normalize_rotation,
};
use crate::preview::{PreviewRef, PreviewTracker};
use crate::types::ImageResource;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CropError {
    #[error("A crop is already in progress")]
    Busy,
    #[error("No crop session is open")]
    NotOpen,
    #[error("Crop area has not been laid out yet")]
    NoCropArea,
    #[error("Crop failed: {0}")]
    Processing(#[from] BackendError),
}

/// Where the session's source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropKind {
    /// A freshly selected file headed for the first free position.
    New,
    /// An image already in the collection.
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropPhase {
    Closed,
    Open,
    Committing,
}

/// State of one open crop dialog.
#[derive(Debug)]
pub struct CropSession {
    id: u64,
    kind: CropKind,
    target: usize,
    source: ImageResource,
    dimensions: Dimensions,
    aspect: (u32, u32),
    transform: CropTransform,
    area: Option<CropRect>,
    preview: PreviewRef,
}

impl CropSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> CropKind {
        self.kind
    }

    /// Position the result will be written to.
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn source(&self) -> &ImageResource {
        &self.source
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn aspect(&self) -> (u32, u32) {
        self.aspect
    }

    pub fn transform(&self) -> &CropTransform {
        &self.transform
    }

    /// Crop rectangle, once the first layout pass has run.
    pub fn area(&self) -> Option<CropRect> {
        self.area
    }

    pub fn preview(&self) -> &PreviewRef {
        &self.preview
    }

    fn relayout(&mut self) {
        if self.area.is_some() {
            self.layout();
        }
    }

    fn layout(&mut self) -> CropRect {
        let area = compute_crop_area(
            (self.dimensions.width, self.dimensions.height),
            &self.transform,
            self.aspect,
        );
        self.area = Some(area);
        area
    }
}

enum CropState {
    Closed,
    Open(CropSession),
    Committing(CropSession),
}

/// A frozen crop, ready to re-sample. Owns its inputs.
#[derive(Debug, Clone)]
pub struct CropJob {
    session: u64,
    source: ImageResource,
    params: CropParams,
}

impl CropJob {
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn source(&self) -> &ImageResource {
        &self.source
    }

    pub fn params(&self) -> &CropParams {
        &self.params
    }

    /// Re-sample the source through `backend`.
    pub fn run(self, backend: &impl ImageBackend) -> CropOutcome {
        let result = backend
            .crop(&self.source, &self.params)
            .map(|bytes| {
                ImageResource::new(
                    cropped_name(self.source.name(), self.params.format.extension()),
                    self.params.format.mime(),
                    bytes,
                )
            })
            .map_err(CropError::from);
        CropOutcome {
            session: self.session,
            result,
        }
    }
}

/// Result of running a [`CropJob`].
#[derive(Debug)]
pub struct CropOutcome {
    pub session: u64,
    pub result: Result<ImageResource, CropError>,
}

/// What the caller should do with a finished commit.
#[derive(Debug)]
pub enum CommitResolution {
    /// Install `resource` at `target`.
    Apply {
        kind: CropKind,
        target: usize,
        resource: ImageResource,
    },
    /// Re-sampling failed; the collection must stay untouched.
    Failed(CropError),
    /// The session this outcome belongs to is gone.
    Stale,
}

/// `portrait.jpeg` → `portrait-crop.webp`
pub fn cropped_name(source: &str, extension: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    format!("{stem}-crop.{extension}")
}

/// The single crop dialog of a manager.
pub struct CropStage {
    settings: CropSettings,
    state: CropState,
    next_session: u64,
}

impl CropStage {
    pub fn new(settings: &CropSettings) -> Self {
        Self {
            settings: settings.clone(),
            state: CropState::Closed,
            next_session: 0,
        }
    }

    pub fn phase(&self) -> CropPhase {
        match self.state {
            CropState::Closed => CropPhase::Closed,
            CropState::Open(_) => CropPhase::Open,
            CropState::Committing(_) => CropPhase::Committing,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, CropState::Closed)
    }

    /// The live session, in either `Open` or `Committing`.
    pub fn session(&self) -> Option<&CropSession> {
        match &self.state {
            CropState::Closed => None,
            CropState::Open(s) | CropState::Committing(s) => Some(s),
        }
    }

    fn open_session(&mut self) -> Option<&mut CropSession> {
        match &mut self.state {
            CropState::Open(s) => Some(s),
            _ => None,
        }
    }

    /// Open a session for `source`, acquiring its dialog preview.
    /// Refused with [`CropError::Busy`] unless the stage is `Closed`.
    pub fn open(
        &mut self,
        previews: &mut PreviewTracker,
        kind: CropKind,
        target: usize,
        source: ImageResource,
        dimensions: Dimensions,
        aspect: (u32, u32),
    ) -> Result<u64, CropError> {
        if !self.is_closed() {
            return Err(CropError::Busy);
        }
        self.next_session += 1;
        let id = self.next_session;
        log::debug!(
            "crop session {id} opened ({kind:?}) for {} -> position {target}",
            source.name()
        );
        let preview = previews.acquire(&source);
        self.state = CropState::Open(CropSession {
            id,
            kind,
            target,
            source,
            dimensions,
            aspect,
            transform: CropTransform::default(),
            area: None,
            preview,
        });
        Ok(id)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        let (min, max) = (self.settings.min_zoom, self.settings.max_zoom);
        self.adjust(|t| t.zoom = clamp_zoom(zoom, min, max))
    }

    pub fn set_rotation(&mut self, degrees: f32) -> bool {
        self.adjust(|t| t.rotation_degrees = normalize_rotation(degrees))
    }

    /// Pan as a fraction of the free slack per axis, clamped to -1.0..=1.0.
    pub fn set_pan(&mut self, x: f32, y: f32) -> bool {
        let clamp = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        self.adjust(|t| t.pan = (clamp(x), clamp(y)))
    }

    fn adjust(&mut self, change: impl FnOnce(&mut CropTransform)) -> bool {
        match self.open_session() {
            Some(session) => {
                change(&mut session.transform);
                session.relayout();
                true
            }
            None => false,
        }
    }

    /// First (or repeated) layout pass. Returns the crop rectangle.
    pub fn layout(&mut self) -> Option<CropRect> {
        self.open_session().map(CropSession::layout)
    }

    /// Freeze the current transform into a job and move to `Committing`.
    ///
    /// Without a layout pass the commit is refused and the session stays open.
    pub fn begin_commit(&mut self) -> Result<CropJob, CropError> {
        let CropState::Open(session) = &self.state else {
            return Err(CropError::NotOpen);
        };
        let area = session.area.ok_or(CropError::NoCropArea)?;
        let job = CropJob {
            session: session.id,
            source: session.source.clone(),
            params: CropParams {
                rotation_degrees: session.transform.rotation_degrees,
                area,
                format: self.settings.output_format,
                quality: self.settings.quality(),
                max_output_edge: self.settings.output_edge_bound(),
            },
        };
        if let CropState::Open(session) = std::mem::replace(&mut self.state, CropState::Closed) {
            self.state = CropState::Committing(session);
        }
        log::debug!("crop session {} committing", job.session);
        Ok(job)
    }

    /// Close the committing session the outcome belongs to and say what to
    /// do with it.
    pub fn finish_commit(
        &mut self,
        previews: &mut PreviewTracker,
        outcome: CropOutcome,
    ) -> CommitResolution {
        let matches = matches!(&self.state, CropState::Committing(s) if s.id == outcome.session);
        if !matches {
            log::warn!("discarding crop result of stale session {}", outcome.session);
            return CommitResolution::Stale;
        }
        let CropState::Committing(session) = std::mem::replace(&mut self.state, CropState::Closed)
        else {
            return CommitResolution::Stale;
        };
        previews.release(session.preview);
        match outcome.result {
            Ok(resource) => CommitResolution::Apply {
                kind: session.kind,
                target: session.target,
                resource,
            },
            Err(e) => CommitResolution::Failed(e),
        }
    }

    /// Drop the session, if any, releasing its preview.
    pub fn cancel(&mut self, previews: &mut PreviewTracker) -> bool {
        match std::mem::replace(&mut self.state, CropState::Closed) {
            CropState::Closed => false,
            CropState::Open(session) | CropState::Committing(session) => {
                log::debug!("crop session {} cancelled", session.id);
                previews.release(session.preview);
                true
            }
        }
    }

    /// Keep the target in step with a removal. A removal at the target
    /// cancels the session. Returns `true` if it did.
    pub fn on_removed(&mut self, previews: &mut PreviewTracker, position: usize) -> bool {
        let Some(target) = self.session().map(CropSession::target) else {
            return false;
        };
        if position == target {
            return self.cancel(previews);
        }
        if position < target {
            self.retarget(target - 1);
        }
        false
    }

    /// Keep an edit session's target on its image through a splice move.
    pub fn on_moved(&mut self, from: usize, to: usize) {
        let Some(target) = self.session().map(CropSession::target) else {
            return;
        };
        let moved = if target == from {
            to
        } else if from < target && target <= to {
            target - 1
        } else if to <= target && target < from {
            target + 1
        } else {
            target
        };
        self.retarget(moved);
    }

    fn retarget(&mut self, target: usize) {
        if let CropState::Open(s) | CropState::Committing(s) = &mut self.state {
            s.target = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::OutputFormat;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    fn source() -> ImageResource {
        ImageResource::new("portrait.jpg", "image/jpeg", vec![1, 2, 3])
    }

    const DIMS: Dimensions = Dimensions {
        width: 800,
        height: 600,
    };

    fn open_stage(previews: &mut PreviewTracker, kind: CropKind, target: usize) -> CropStage {
        let mut stage = CropStage::new(&CropSettings::default());
        stage
            .open(previews, kind, target, source(), DIMS, (3, 4))
            .unwrap();
        stage
    }

    #[test]
    fn open_acquires_dialog_preview() {
        let mut previews = PreviewTracker::new();
        let stage = open_stage(&mut previews, CropKind::New, 0);

        assert_eq!(stage.phase(), CropPhase::Open);
        assert_eq!(previews.live_count(), 1);
        let session = stage.session().unwrap();
        assert!(previews.uri(session.preview()).is_some());
        assert_eq!(session.area(), None);
    }

    #[test]
    fn second_open_is_busy() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::New, 0);
        let again = stage.open(&mut previews, CropKind::Edit, 1, source(), DIMS, (3, 4));
        assert!(matches!(again, Err(CropError::Busy)));
        assert_eq!(previews.live_count(), 1);
    }

    #[test]
    fn commit_before_layout_is_refused() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::New, 0);
        assert!(matches!(stage.begin_commit(), Err(CropError::NoCropArea)));
        assert_eq!(stage.phase(), CropPhase::Open);
    }

    #[test]
    fn commit_when_closed_is_not_open() {
        let mut stage = CropStage::new(&CropSettings::default());
        assert!(matches!(stage.begin_commit(), Err(CropError::NotOpen)));
    }

    #[test]
    fn controls_clamp_and_relayout() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::New, 0);

        assert!(stage.set_zoom(10.0));
        assert_eq!(stage.session().unwrap().transform().zoom, 3.0);
        assert!(stage.set_rotation(-90.0));
        assert_eq!(stage.session().unwrap().transform().rotation_degrees, 270.0);
        assert!(stage.set_pan(5.0, -5.0));
        assert_eq!(stage.session().unwrap().transform().pan, (1.0, -1.0));
        // no area until the first layout
        assert_eq!(stage.session().unwrap().area(), None);

        stage.set_zoom(1.0);
        stage.set_rotation(0.0);
        stage.set_pan(0.0, 0.0);
        assert_eq!(
            stage.layout(),
            Some(CropRect {
                x: 175,
                y: 0,
                width: 450,
                height: 600
            })
        );

        stage.set_zoom(2.0);
        assert_eq!(stage.session().unwrap().area().unwrap().width, 225);
    }

    #[test]
    fn controls_are_ignored_when_closed() {
        let mut stage = CropStage::new(&CropSettings::default());
        assert!(!stage.set_zoom(2.0));
        assert!(!stage.set_rotation(10.0));
        assert!(!stage.set_pan(0.5, 0.5));
        assert_eq!(stage.layout(), None);
    }

    #[test]
    fn commit_round_trip_applies_and_releases() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::New, 2);
        stage.layout();

        let job = stage.begin_commit().unwrap();
        assert_eq!(stage.phase(), CropPhase::Committing);
        assert!(!stage.set_zoom(2.0));
        assert_eq!(job.params().format, OutputFormat::Jpeg);
        assert_eq!(job.params().max_output_edge, Some(2048));

        let backend = MockBackend::new();
        let outcome = job.run(&backend);
        match stage.finish_commit(&mut previews, outcome) {
            CommitResolution::Apply {
                kind,
                target,
                resource,
            } => {
                assert_eq!(kind, CropKind::New);
                assert_eq!(target, 2);
                assert_eq!(resource.name(), "portrait-crop.jpg");
                assert_eq!(resource.mime(), "image/jpeg");
                assert_eq!(resource.bytes(), b"cropped:portrait.jpg");
            }
            other => panic!("expected Apply, got {other:?}"),
        }
        assert!(stage.is_closed());
        assert_eq!(previews.live_count(), 0);
        assert!(matches!(
            backend.get_operations().as_slice(),
            [RecordedOp::Crop { .. }]
        ));
    }

    #[test]
    fn failed_commit_closes_without_result() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::Edit, 0);
        stage.layout();
        let outcome = stage.begin_commit().unwrap().run(&MockBackend::new().failing_crops());

        assert!(matches!(
            stage.finish_commit(&mut previews, outcome),
            CommitResolution::Failed(CropError::Processing(_))
        ));
        assert!(stage.is_closed());
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn outcome_of_cancelled_session_is_stale() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::Edit, 1);
        stage.layout();
        let job = stage.begin_commit().unwrap();

        assert!(stage.cancel(&mut previews));
        stage
            .open(&mut previews, CropKind::Edit, 0, source(), DIMS, (1, 1))
            .unwrap();

        let outcome = job.run(&MockBackend::new());
        assert!(matches!(
            stage.finish_commit(&mut previews, outcome),
            CommitResolution::Stale
        ));
        assert_eq!(stage.phase(), CropPhase::Open);
        stage.cancel(&mut previews);
        assert_eq!(previews.stats().live, 0);
    }

    #[test]
    fn cancel_releases_preview() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::New, 0);
        assert!(stage.cancel(&mut previews));
        assert!(!stage.cancel(&mut previews));
        assert_eq!(previews.stats().acquired, previews.stats().released);
    }

    #[test]
    fn removal_at_target_cancels() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::Edit, 2);
        assert!(stage.on_removed(&mut previews, 2));
        assert!(stage.is_closed());
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn removal_before_target_shifts_it() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::Edit, 2);
        assert!(!stage.on_removed(&mut previews, 0));
        assert_eq!(stage.session().unwrap().target(), 1);
        assert!(!stage.on_removed(&mut previews, 3));
        assert_eq!(stage.session().unwrap().target(), 1);
        stage.cancel(&mut previews);
    }

    #[test]
    fn target_follows_moves() {
        let mut previews = PreviewTracker::new();
        let mut stage = open_stage(&mut previews, CropKind::Edit, 2);

        stage.on_moved(2, 0); // target moved itself
        assert_eq!(stage.session().unwrap().target(), 0);
        stage.on_moved(3, 0); // inserted in front
        assert_eq!(stage.session().unwrap().target(), 1);
        stage.on_moved(0, 4); // item before it left
        assert_eq!(stage.session().unwrap().target(), 0);
        stage.on_moved(2, 3); // unrelated
        assert_eq!(stage.session().unwrap().target(), 0);
        stage.cancel(&mut previews);
    }

    #[test]
    fn cropped_names() {
        assert_eq!(cropped_name("a.jpeg", "webp"), "a-crop.webp");
        assert_eq!(cropped_name("dir/b.png", "jpg"), "b-crop.jpg");
        assert_eq!(cropped_name("", "jpg"), "image-crop.jpg");
    }
}

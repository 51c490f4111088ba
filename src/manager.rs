//! The slot manager: the one object a hosting form talks to.
//!
//! Composes the [`SlotStore`], the [`CropStage`] and an [`ImageBackend`], and
//! exposes the imperative contract: add, remove, remove all, reorder, make
//! primary, crop, read images and validity.
//!
//! Nothing fails past this boundary. Rejections and crop failures are
//! resolved here and surfaced through the [`Notifier`]; operations return
//! plain outcomes. After every operation that changed the occupied-image
//! list, the `on_change` handler receives the new list.
//!
//! ## Preview ownership
//!
//! The store's tracker issues one reference per occupied slot plus one for
//! the open crop session, if any. [`SlotManager::teardown`] (also run on
//! drop) cancels the session and releases everything, so the returned
//! [`PreviewStats`] always shows zero live references.

use crate::config::SlotsConfig;
use crate::crop::{
    CommitResolution, CropJob, CropKind, CropOutcome, CropPhase, CropSession, CropStage,
};
use crate::imaging::{CropRect, Dimensions, ImageBackend};
use crate::preview::PreviewStats;
use crate::store::SlotStore;
use crate::types::{Candidate, ImageResource, ResourceId};
use crate::validation::{Rejection, screen_duplicates, validate_batch};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// User-facing message sink (toasts, banners, a log).
pub trait Notifier {
    fn error(&self, message: &str);
    fn warning(&self, message: &str);
}

/// Notifier that writes to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        log::error!("{message}");
    }

    fn warning(&self, message: &str) {
        log::warn!("{message}");
    }
}

type ChangeHandler = Box<dyn FnMut(&[ImageResource])>;

/// What an `add_batch` call did with each candidate.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    /// Positions written directly (cropping disabled).
    pub added: Vec<usize>,
    /// Target of the crop session opened for the first accepted file.
    pub crop_target: Option<usize>,
    /// Candidate name and reason, in input order.
    pub rejected: Vec<(String, Rejection)>,
    /// Accepted files left for a later call (cropping enabled).
    pub deferred: Vec<String>,
    /// Accepted files that did not fit.
    pub dropped: Vec<String>,
    /// The call was refused because a crop session is active.
    pub busy: bool,
}

/// Result of committing the crop session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The cropped image now sits at `position`.
    Committed { position: usize },
    /// No open session, or no layout pass yet. The session is untouched.
    NotReady,
    /// Re-sampling failed; the collection is unchanged.
    Failed,
    /// The session was cancelled while the job ran.
    Discarded,
}

/// Derived validity, recomputed on every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationState {
    pub has_errors: bool,
    pub is_required_but_empty: bool,
    pub is_valid: bool,
    /// Position → human-readable reason.
    pub errors: BTreeMap<usize, String>,
}

impl ValidationState {
    pub fn derive(errors: &BTreeMap<usize, Rejection>, required: bool, occupied: usize) -> Self {
        let has_errors = !errors.is_empty();
        let is_required_but_empty = required && occupied == 0;
        Self {
            has_errors,
            is_required_but_empty,
            is_valid: !has_errors && !is_required_but_empty,
            errors: errors
                .iter()
                .map(|(&pos, rejection)| (pos, rejection.to_string()))
                .collect(),
        }
    }
}

/// Bounded, ordered photo slots with validation and crop-before-commit.
pub struct SlotManager<B: ImageBackend> {
    config: SlotsConfig,
    backend: B,
    store: SlotStore,
    crop: CropStage,
    notifier: Box<dyn Notifier>,
    on_change: Option<ChangeHandler>,
}

impl<B: ImageBackend> SlotManager<B> {
    pub fn new(config: SlotsConfig, backend: B) -> Self {
        Self::with_initial(config, backend, Vec::new())
    }

    /// Mount with an existing image list (e.g. the saved profile photos).
    pub fn with_initial(config: SlotsConfig, backend: B, initial: Vec<ImageResource>) -> Self {
        let store = SlotStore::with_initial(
            config.slots.max_images,
            config.animation.reorder_duration(),
            initial,
        );
        let crop = CropStage::new(&config.crop);
        Self {
            config,
            backend,
            store,
            crop,
            notifier: Box::new(LogNotifier),
            on_change: None,
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn on_change(mut self, handler: impl FnMut(&[ImageResource]) + 'static) -> Self {
        self.on_change = Some(Box::new(handler));
        self
    }

    pub fn config(&self) -> &SlotsConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // =========================================================================
    // Adding
    // =========================================================================

    /// Validate a batch and route the accepted files.
    ///
    /// With cropping enabled only the first accepted file is taken: it opens a
    /// crop session aimed at the first free position and reaches the
    /// collection only on commit. The rest are reported as deferred. With
    /// cropping disabled, accepted files fill free positions in input order
    /// and the overflow is dropped with a warning.
    pub fn add_batch(&mut self, candidates: Vec<Candidate>) -> AddOutcome {
        let mut outcome = AddOutcome::default();
        let crop_mode = self.config.slots.enable_crop;
        if crop_mode && !self.crop.is_closed() {
            log::debug!("add_batch refused: crop session active");
            outcome.busy = true;
            return outcome;
        }

        let mut verdicts = validate_batch(&self.backend, &candidates, &self.config.validation);
        if self.config.slots.reject_duplicates {
            screen_duplicates(&candidates, &mut verdicts, &self.store.digests());
        }

        let mut accepted: Vec<(Candidate, Dimensions)> = Vec::new();
        for (candidate, verdict) in candidates.into_iter().zip(verdicts) {
            match verdict {
                Ok(dims) => accepted.push((candidate, dims)),
                Err(rejection) => {
                    log::debug!("rejected {}: {}", candidate.name(), rejection);
                    outcome.rejected.push((candidate.name().to_string(), rejection));
                }
            }
        }
        log::debug!(
            "batch: {} accepted, {} rejected",
            accepted.len(),
            outcome.rejected.len()
        );

        self.clear_unplaced_errors();
        if let Some((name, rejection)) = outcome.rejected.first() {
            self.notifier.error(&format!("{name}: {rejection}"));
        }

        let before = self.snapshot();
        let mut accepted = accepted.into_iter();
        if crop_mode {
            if let Some((first, dims)) = accepted.next() {
                match self.store.first_free() {
                    Some(target) => {
                        let aspect = self.config.crop.aspect();
                        let name = first.name().to_string();
                        match self.crop.open(
                            self.store.previews_mut(),
                            CropKind::New,
                            target,
                            first.resource,
                            dims,
                            aspect,
                        ) {
                            Ok(_) => outcome.crop_target = Some(target),
                            Err(e) => {
                                log::warn!("could not open crop for {name}: {e}");
                                outcome.deferred.push(name);
                            }
                        }
                    }
                    None => outcome.dropped.push(first.name().to_string()),
                }
            }
            let rest = accepted.map(|(c, _)| c.name().to_string());
            if outcome.dropped.is_empty() {
                outcome.deferred.extend(rest);
            } else {
                outcome.dropped.extend(rest);
            }
            if !outcome.deferred.is_empty() {
                log::info!(
                    "{} accepted file(s) deferred until the crop closes",
                    outcome.deferred.len()
                );
            }
        } else {
            for (candidate, _) in accepted {
                let name = candidate.name().to_string();
                match self.store.push(candidate.resource) {
                    Some(position) => outcome.added.push(position),
                    None => outcome.dropped.push(name),
                }
            }
        }

        if !outcome.dropped.is_empty() {
            let message = format!(
                "All {} photo slots are full; {} photo(s) not added.",
                self.store.max_images(),
                outcome.dropped.len()
            );
            log::warn!("{message}");
            self.notifier.warning(&message);
        }

        // Rejections sit on the empty positions after the placed images and
        // the crop target. With no room left they are reported only through
        // the notifier and the outcome.
        let base = self.store.occupied_count() + usize::from(outcome.crop_target.is_some());
        for (k, (_, rejection)) in outcome.rejected.iter().enumerate() {
            if !self.store.set_error(base + k, rejection.clone()) {
                break;
            }
        }

        self.notify_if_changed(&before);
        outcome
    }

    /// Errors parked on empty positions belong to the previous batch.
    fn clear_unplaced_errors(&mut self) {
        let occupied = self.store.occupied_count();
        let stale: Vec<usize> = self
            .store
            .errors()
            .keys()
            .copied()
            .filter(|&p| p >= occupied)
            .collect();
        for position in stale {
            self.store.clear_error(position);
        }
    }

    // =========================================================================
    // Removing and ordering
    // =========================================================================

    /// Remove the image at `position`; later images shift left. A crop
    /// session aimed at `position` is cancelled.
    pub fn remove_at(&mut self, position: usize) -> bool {
        let before = self.snapshot();
        if self.crop.on_removed(self.store.previews_mut(), position) {
            log::debug!("crop session cancelled by removal of position {position}");
        }
        let removed = self.store.remove_at(position);
        self.notify_if_changed(&before);
        removed
    }

    /// Remove every image. Returns how many were removed.
    pub fn remove_all(&mut self) -> usize {
        let before = self.snapshot();
        self.crop.cancel(self.store.previews_mut());
        let removed = self.store.clear();
        self.notify_if_changed(&before);
        removed
    }

    /// Splice-move `from` to `to` (compact indices).
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        if !self.config.slots.enable_reorder {
            return false;
        }
        let before = self.snapshot();
        let moved = self.store.move_item(from, to, Instant::now());
        if moved {
            self.crop.on_moved(from, to);
            log::debug!("moved {from} -> {to}");
        }
        self.notify_if_changed(&before);
        moved
    }

    /// Move the image at `position` to the front.
    pub fn set_primary(&mut self, position: usize) -> bool {
        if position == 0 || self.store.get(position).is_none() {
            return false;
        }
        self.reorder(position, 0)
    }

    // =========================================================================
    // Cropping
    // =========================================================================

    /// Open the crop dialog on the image at `position`.
    pub fn open_crop_for(&mut self, position: usize) -> bool {
        let aspect = self.config.crop.aspect();
        self.open_crop_with_aspect(position, aspect)
    }

    /// Like [`open_crop_for`](Self::open_crop_for) with a one-off aspect ratio.
    pub fn open_crop_with_aspect(&mut self, position: usize, aspect: (u32, u32)) -> bool {
        if !self.config.slots.enable_crop || aspect.0 == 0 || aspect.1 == 0 {
            return false;
        }
        let Some(resource) = self.store.get(position).cloned() else {
            return false;
        };
        if !self.crop.is_closed() {
            log::debug!("open_crop_for({position}) refused: crop session active");
            return false;
        }
        let dims = match self.backend.identify(&resource) {
            Ok(dims) => dims,
            Err(e) => {
                log::warn!("cannot crop {}: {}", resource.name(), e);
                self.notifier.error(&Rejection::UnreadableImage.to_string());
                return false;
            }
        };
        self.crop
            .open(
                self.store.previews_mut(),
                CropKind::Edit,
                position,
                resource,
                dims,
                aspect,
            )
            .is_ok()
    }

    pub fn crop_phase(&self) -> CropPhase {
        self.crop.phase()
    }

    pub fn crop_session(&self) -> Option<&CropSession> {
        self.crop.session()
    }

    /// Preview URI of the image in the crop dialog.
    pub fn crop_preview_uri(&self) -> Option<&str> {
        self.crop
            .session()
            .and_then(|s| self.store.previews().uri(s.preview()))
    }

    pub fn set_crop_zoom(&mut self, zoom: f32) -> bool {
        self.crop.set_zoom(zoom)
    }

    pub fn set_crop_rotation(&mut self, degrees: f32) -> bool {
        self.crop.set_rotation(degrees)
    }

    pub fn set_crop_pan(&mut self, x: f32, y: f32) -> bool {
        self.crop.set_pan(x, y)
    }

    /// Run the dialog's layout pass.
    pub fn crop_layout(&mut self) -> Option<CropRect> {
        self.crop.layout()
    }

    /// Freeze the session into a job that may run elsewhere. Feed its outcome
    /// to [`finish_crop_commit`](Self::finish_crop_commit).
    pub fn begin_crop_commit(&mut self) -> Option<CropJob> {
        match self.crop.begin_commit() {
            Ok(job) => Some(job),
            Err(e) => {
                log::debug!("crop commit refused: {e}");
                None
            }
        }
    }

    pub fn finish_crop_commit(&mut self, outcome: CropOutcome) -> CommitOutcome {
        match self.crop.finish_commit(self.store.previews_mut(), outcome) {
            CommitResolution::Apply {
                kind,
                target,
                resource,
            } => {
                log::info!("crop committed ({kind:?}) -> position {target}");
                match self.apply_crop_result(resource, target) {
                    Some(position) => CommitOutcome::Committed { position },
                    None => CommitOutcome::Failed,
                }
            }
            CommitResolution::Failed(e) => {
                log::warn!("{e}");
                self.notifier.error(&e.to_string());
                CommitOutcome::Failed
            }
            CommitResolution::Stale => CommitOutcome::Discarded,
        }
    }

    /// Commit inline on the calling thread.
    pub fn commit_crop(&mut self) -> CommitOutcome {
        let Some(job) = self.begin_crop_commit() else {
            return CommitOutcome::NotReady;
        };
        let outcome = job.run(&self.backend);
        self.finish_crop_commit(outcome)
    }

    pub fn cancel_crop(&mut self) -> bool {
        self.crop.cancel(self.store.previews_mut())
    }

    /// Install a finished image at `position` (or the first free position if
    /// `position` is past the occupied range) and close the crop stage.
    /// Returns the position written.
    pub fn apply_crop_result(&mut self, resource: ImageResource, position: usize) -> Option<usize> {
        let before = self.snapshot();
        let written = self.store.install_at(position, resource);
        if written.is_none() {
            let message = format!("All {} photo slots are full.", self.store.max_images());
            log::warn!("{message}");
            self.notifier.warning(&message);
        }
        self.crop.cancel(self.store.previews_mut());
        self.notify_if_changed(&before);
        written
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Occupied images in order.
    pub fn images(&self) -> Vec<ImageResource> {
        self.store.images()
    }

    pub fn primary(&self) -> Option<&ImageResource> {
        self.store.primary()
    }

    /// Fixed-length view with `None` for empty positions.
    pub fn padded(&self) -> Vec<Option<&ImageResource>> {
        self.store.padded()
    }

    pub fn occupied_count(&self) -> usize {
        self.store.occupied_count()
    }

    pub fn max_images(&self) -> usize {
        self.store.max_images()
    }

    pub fn error_at(&self, position: usize) -> Option<&Rejection> {
        self.store.error_at(position)
    }

    pub fn validation_state(&self) -> ValidationState {
        ValidationState::derive(
            self.store.errors(),
            self.config.slots.required,
            self.store.occupied_count(),
        )
    }

    /// Validity check on submit: surfaces the problem through the notifier.
    pub fn check_validity(&self) -> ValidationState {
        let state = self.validation_state();
        if state.is_required_but_empty {
            self.notifier.error("Please add at least one photo.");
        } else if let Some(reason) = state.errors.values().next() {
            self.notifier.error(reason);
        }
        state
    }

    pub fn preview_uri(&self, position: usize) -> Option<&str> {
        self.store.preview_uri(position)
    }

    pub fn is_animating(&self, position: usize, now: Instant) -> bool {
        self.store.is_animating(position, now)
    }

    pub fn animating_positions(&mut self, now: Instant) -> BTreeSet<usize> {
        self.store.animating_positions(now)
    }

    pub fn preview_stats(&self) -> PreviewStats {
        self.store.preview_stats()
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Cancel any crop session and release every preview. Idempotent.
    /// Does not fire `on_change`.
    pub fn teardown(&mut self) -> PreviewStats {
        self.crop.cancel(self.store.previews_mut());
        self.store.clear();
        let stats = self.store.preview_stats();
        log::debug!(
            "teardown: {} acquired, {} released",
            stats.acquired,
            stats.released
        );
        stats
    }

    fn snapshot(&self) -> Vec<ResourceId> {
        self.store.images().iter().map(ImageResource::id).collect()
    }

    fn notify_if_changed(&mut self, before: &[ResourceId]) {
        if self.snapshot() == before {
            return;
        }
        let images = self.store.images();
        if let Some(handler) = self.on_change.as_mut() {
            handler(&images);
        }
    }
}

impl<B: ImageBackend> Drop for SlotManager<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

//! The slot collection.
//!
//! Internally the collection is *compact*: a `Vec` of occupied slots, in
//! order, never longer than `max_images`. The fixed-length view with empty
//! positions is produced on read by [`SlotStore::padded`]. Position 0, when
//! occupied, is the primary image; there is no separate flag.
//!
//! Every slot owns the [`PreviewRef`] for its resource. Any path that drops a
//! slot (removal, replacement, clear) releases that reference through the
//! store's [`PreviewTracker`] first, so the tracker's live count always equals
//! the number of occupied slots plus any crop-preview the manager holds.

use crate::preview::{PreviewRef, PreviewStats, PreviewTracker};
use crate::types::ImageResource;
use crate::validation::Rejection;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::{Duration, Instant};

/// One occupied position.
#[derive(Debug)]
struct Slot {
    resource: ImageResource,
    preview: PreviewRef,
}

/// Positions currently playing a reorder transition.
///
/// Each mark expires on its own after `duration`; callers pass `now` so the
/// set can be driven deterministically.
#[derive(Debug, Clone)]
pub struct AnimatingPositions {
    duration: Duration,
    expiry: BTreeMap<usize, Instant>,
}

impl AnimatingPositions {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            expiry: BTreeMap::new(),
        }
    }

    pub fn mark(&mut self, positions: &[usize], now: Instant) {
        let until = now + self.duration;
        for &p in positions {
            self.expiry.insert(p, until);
        }
    }

    pub fn contains(&self, position: usize, now: Instant) -> bool {
        self.expiry.get(&position).is_some_and(|&until| now < until)
    }

    /// Positions still animating at `now`. Expired marks are dropped.
    pub fn active(&mut self, now: Instant) -> BTreeSet<usize> {
        self.expiry.retain(|_, until| now < *until);
        self.expiry.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.expiry.clear();
    }
}

/// Ordered, bounded collection of image slots.
pub struct SlotStore {
    max_images: usize,
    slots: Vec<Slot>,
    previews: PreviewTracker,
    errors: BTreeMap<usize, Rejection>,
    animating: AnimatingPositions,
}

impl SlotStore {
    pub fn new(max_images: usize, animation: Duration) -> Self {
        Self {
            max_images,
            slots: Vec::with_capacity(max_images),
            previews: PreviewTracker::new(),
            errors: BTreeMap::new(),
            animating: AnimatingPositions::new(animation),
        }
    }

    /// Seed from an externally supplied list. Entries past `max_images` are
    /// dropped with a warning.
    pub fn with_initial(max_images: usize, animation: Duration, initial: Vec<ImageResource>) -> Self {
        let mut store = Self::new(max_images, animation);
        let supplied = initial.len();
        for resource in initial.into_iter().take(max_images) {
            store.push(resource);
        }
        if supplied > max_images {
            log::warn!(
                "{} initial images supplied for {} slots; dropped {}",
                supplied,
                max_images,
                supplied - max_images
            );
        }
        store
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.max_images
    }

    /// Earliest empty position, or `None` when full.
    pub fn first_free(&self) -> Option<usize> {
        (!self.is_full()).then_some(self.slots.len())
    }

    pub fn get(&self, position: usize) -> Option<&ImageResource> {
        self.slots.get(position).map(|s| &s.resource)
    }

    pub fn primary(&self) -> Option<&ImageResource> {
        self.get(0)
    }

    /// Fixed-length view: exactly `max_images` entries, `None` for empty.
    pub fn padded(&self) -> Vec<Option<&ImageResource>> {
        let mut view: Vec<Option<&ImageResource>> =
            self.slots.iter().map(|s| Some(&s.resource)).collect();
        view.resize(self.max_images, None);
        view
    }

    /// Occupied images in order, empties filtered out.
    pub fn images(&self) -> Vec<ImageResource> {
        self.slots.iter().map(|s| s.resource.clone()).collect()
    }

    pub fn digests(&self) -> HashSet<String> {
        self.slots.iter().map(|s| s.resource.digest()).collect()
    }

    pub fn preview_uri(&self, position: usize) -> Option<&str> {
        self.slots
            .get(position)
            .and_then(|s| self.previews.uri(&s.preview))
    }

    /// Append at the first free position. Returns the position, or `None`
    /// when full (the resource is dropped).
    pub fn push(&mut self, resource: ImageResource) -> Option<usize> {
        let position = self.first_free()?;
        let preview = self.previews.acquire(&resource);
        self.slots.push(Slot { resource, preview });
        self.errors.remove(&position);
        Some(position)
    }

    /// Install `resource` at `position`, replacing what is there. A position
    /// past the occupied range lands at the first free position instead.
    /// Returns the position actually written, or `None` when a new slot was
    /// needed and the store is full.
    pub fn install_at(&mut self, position: usize, resource: ImageResource) -> Option<usize> {
        if position >= self.slots.len() {
            return self.push(resource);
        }
        // Old reference goes back before the new one is issued.
        let old = self.slots.remove(position);
        self.previews.release(old.preview);
        let preview = self.previews.acquire(&resource);
        self.slots.insert(position, Slot { resource, preview });
        self.errors.remove(&position);
        Some(position)
    }

    /// Remove the slot at `position`, shifting later slots left.
    /// Returns `false` (no-op) for an empty position.
    ///
    /// Rejections parked on empty positions are dropped with the removal:
    /// the positions they were shown on no longer line up with the grid.
    pub fn remove_at(&mut self, position: usize) -> bool {
        self.errors.remove(&position);
        if position >= self.slots.len() {
            return false;
        }
        let slot = self.slots.remove(position);
        self.previews.release(slot.preview);
        let occupied = self.slots.len();
        self.errors.retain(|&p, _| p < occupied);
        true
    }

    /// Splice-move the slot at `from` to `to` (remove then insert, not swap).
    /// Both must be occupied positions. Marks both as animating.
    pub fn move_item(&mut self, from: usize, to: usize, now: Instant) -> bool {
        let len = self.slots.len();
        if from == to || from >= len || to >= len {
            return false;
        }
        let slot = self.slots.remove(from);
        self.slots.insert(to, slot);
        self.animating.mark(&[from, to], now);
        true
    }

    /// Drop every slot and error. Returns how many slots were occupied.
    pub fn clear(&mut self) -> usize {
        let removed = self.slots.len();
        let references: Vec<PreviewRef> = self.slots.drain(..).map(|s| s.preview).collect();
        self.previews.release_all(references);
        self.errors.clear();
        self.animating.clear();
        removed
    }

    // -------------------------------------------------------------------------
    // Validation errors
    // -------------------------------------------------------------------------

    /// Park a rejection on an empty position. Occupied positions hold
    /// accepted images and never carry one; returns `false` for those and
    /// for positions past the end.
    pub fn set_error(&mut self, position: usize, rejection: Rejection) -> bool {
        if position < self.slots.len() || position >= self.max_images {
            return false;
        }
        self.errors.insert(position, rejection);
        true
    }

    pub fn clear_error(&mut self, position: usize) -> Option<Rejection> {
        self.errors.remove(&position)
    }

    pub fn error_at(&self, position: usize) -> Option<&Rejection> {
        self.errors.get(&position)
    }

    pub fn errors(&self) -> &BTreeMap<usize, Rejection> {
        &self.errors
    }

    // -------------------------------------------------------------------------
    // Previews and animation
    // -------------------------------------------------------------------------

    pub fn previews(&self) -> &PreviewTracker {
        &self.previews
    }

    pub fn previews_mut(&mut self) -> &mut PreviewTracker {
        &mut self.previews
    }

    pub fn preview_stats(&self) -> PreviewStats {
        self.previews.stats()
    }

    pub fn is_animating(&self, position: usize, now: Instant) -> bool {
        self.animating.contains(position, now)
    }

    pub fn animating_positions(&mut self, now: Instant) -> BTreeSet<usize> {
        self.animating.active(now)
    }
}

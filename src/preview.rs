//! Preview references.
//!
//! A [`PreviewRef`] is a revocable handle the renderer uses to show an image
//! without persisting it anywhere: it resolves to a `data:` URI through the
//! [`PreviewTracker`] that issued it.
//!
//! Handles are neither `Clone` nor `Copy`. `release` consumes the
//! handle, so a released reference cannot be resolved or released twice, and
//! the tracker's counters make leaks observable: after every owner has let go,
//! `acquired == released` and nothing is live.

use crate::types::{ImageResource, ResourceId};
use base64::Engine;
use std::collections::HashMap;

/// Owned handle to a live preview. Must be handed back with
/// [`PreviewTracker::release`].
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "a preview reference leaks unless released"]
pub struct PreviewRef {
    id: u64,
}

impl PreviewRef {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Acquire/release counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    pub acquired: u64,
    pub released: u64,
    pub live: usize,
}

struct LivePreview {
    resource: ResourceId,
    uri: String,
}

/// Issues and revokes preview references for one manager.
#[derive(Default)]
pub struct PreviewTracker {
    next_id: u64,
    live: HashMap<u64, LivePreview>,
    acquired: u64,
    released: u64,
}

impl PreviewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a reference rendering `resource`.
    pub fn acquire(&mut self, resource: &ImageResource) -> PreviewRef {
        self.next_id += 1;
        let id = self.next_id;
        let encoded = base64::engine::general_purpose::STANDARD.encode(resource.bytes());
        self.live.insert(
            id,
            LivePreview {
                resource: resource.id(),
                uri: format!("data:{};base64,{}", resource.mime(), encoded),
            },
        );
        self.acquired += 1;
        log::trace!("preview {id} acquired for {}", resource.id());
        PreviewRef { id }
    }

    /// Revoke a reference. The URI it resolved to is dropped.
    pub fn release(&mut self, reference: PreviewRef) {
        if self.live.remove(&reference.id).is_some() {
            self.released += 1;
            log::trace!("preview {} released", reference.id);
        } else {
            // Only reachable with a handle from a different tracker.
            log::warn!("release of unknown preview {}", reference.id);
        }
    }

    pub fn release_all(&mut self, references: impl IntoIterator<Item = PreviewRef>) {
        for reference in references {
            self.release(reference);
        }
    }

    /// Renderable URI for a live reference.
    pub fn uri(&self, reference: &PreviewRef) -> Option<&str> {
        self.live.get(&reference.id).map(|p| p.uri.as_str())
    }

    /// Resource a live reference was acquired for.
    pub fn resource_of(&self, reference: &PreviewRef) -> Option<ResourceId> {
        self.live.get(&reference.id).map(|p| p.resource)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn stats(&self) -> PreviewStats {
        PreviewStats {
            acquired: self.acquired,
            released: self.released,
            live: self.live.len(),
        }
    }
}

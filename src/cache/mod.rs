//! Artifact cache: exact-match, one active slot per artifact kind.
//!
//! The workload is "did the user change anything since last time", not
//! general-purpose caching, so a single-slot-per-kind cache with exact key
//! equality suffices and keeps memory bounded. Entries carry the generation
//! of the render that produced them so a late, superseded result can
//! populate an empty slot but never clobber a newer one.


use rustc_hash::FxHashMap;

use crate::core::{Artifact, ArtifactKind, Generation};
use crate::document::{ContentHash, RenderOptions};

/// Composite identity of a computed artifact.
///
/// Structural equality over all three parts: same text hashed under
/// different options (or for a different kind) is a different artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderKey {
    pub content: ContentHash,
    pub options: RenderOptions,
    pub kind: ArtifactKind,
}

impl RenderKey {
    pub fn new(content: ContentHash, options: RenderOptions, kind: ArtifactKind) -> Self {
        Self {
            content,
            options,
            kind,
        }
    }
}

struct CacheEntry {
    key: RenderKey,
    artifact: Artifact,
    generation: Generation,
}

/// One active entry per artifact kind, replaced only by equal-or-newer
/// generations. All access happens on the engine task; no interior locking.
#[derive(Default)]
pub struct ArtifactCache {
    slots: FxHashMap<ArtifactKind, CacheEntry>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored artifact only on an exact key match.
    pub fn get(&self, key: &RenderKey) -> Option<&Artifact> {
        let entry = self.slots.get(&key.kind)?;
        (entry.key == *key).then_some(&entry.artifact)
    }

    /// Store `artifact` under `key`, replacing the kind's slot.
    ///
    /// A result from a superseded request may fill the slot, but never
    /// replaces an entry a newer request already wrote.
    pub fn put(&mut self, key: RenderKey, artifact: Artifact, generation: Generation) {
        if let Some(existing) = self.slots.get(&key.kind)
            && existing.generation > generation
        {
            return;
        }
        self.slots.insert(
            key.kind,
            CacheEntry {
                key,
                artifact,
                generation,
            },
        );
    }

    /// Drop every slot (document cleared or replaced wholesale).
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

//! Persistent session state.
//!
//! A session survives restarts through a namespaced key→string map:
//!
//! ```text
//! current            -> store key of the active document
//! doc.<key>.record   -> SessionRecord JSON (key = server id, or "local")
//! ```
//!
//! The flat single-document scheme of older builds (`content` / `cursor` /
//! `view` keys) is import-only: read once when no `current` pointer exists,
//! migrated into a keyed record, then ignored.
//!
//! The store must never block editing. Backends report write failures; the
//! store logs once and degrades to the in-memory backend for the rest of
//! the session.

mod file;
mod memory;
#[cfg(test)]
mod tests;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ArtifactKind;

const KEY_CURRENT: &str = "current";
const LEGACY_CONTENT: &str = "content";
const LEGACY_CURSOR: &str = "cursor";
const LEGACY_VIEW: &str = "view";

/// Current record schema version.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Storage backend boundary: a durable key→string map.
///
/// Implementations must tolerate being empty or partially populated;
/// interpretation of values is entirely the store's concern.
pub trait KvBackend: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&mut self, key: &str) -> Result<(), SessionError>;
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;

    /// Full contents, used to carry state over when degrading to memory.
    fn snapshot(&self) -> Vec<(String, String)>;
}

// ============================================================================
// session record
// ============================================================================

/// The persisted snapshot of editing state.
///
/// Every field defaults: a record written by an older or newer build loads
/// with whatever it has rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub schema: u32,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cursor_start: usize,
    #[serde(default)]
    pub cursor_end: usize,
    #[serde(default)]
    pub active_view: Option<String>,
    /// Unix seconds of the last save.
    #[serde(default)]
    pub saved_at: u64,
}

impl SessionRecord {
    /// Stamp the schema version and save time.
    pub fn touch(&mut self) {
        self.schema = SCHEMA_VERSION;
        self.saved_at = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
    }

    /// The restored active view, if it names a known kind.
    pub fn active_view_kind(&self) -> Option<ArtifactKind> {
        self.active_view
            .as_deref()
            .and_then(ArtifactKind::from_label)
    }
}

// ============================================================================
// store
// ============================================================================

/// Session store over a swappable backend, with write-failure degradation.
pub struct SessionStore {
    backend: Box<dyn KvBackend>,
    degraded: bool,
}

impl SessionStore {
    pub fn new(backend: Box<dyn KvBackend>) -> Self {
        Self {
            backend,
            degraded: false,
        }
    }

    /// Purely in-memory store (tests, or persistence disabled).
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Whether a write failure has forced in-memory-only operation.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Write through the backend; on failure, degrade to memory (keeping
    /// everything readable so far) and continue. Editing never blocks on
    /// persistence.
    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            self.degrade(&e);
            let _ = self.backend.set(key, value);
        }
    }

    fn degrade(&mut self, error: &SessionError) {
        if self.degraded {
            return;
        }
        crate::log!(
            "session";
            "persistence unavailable ({}), continuing in memory only",
            error
        );
        let snapshot = self.backend.snapshot();
        self.backend = Box::new(MemoryBackend::from_snapshot(snapshot));
        self.degraded = true;
    }

    // ------------------------------------------------------------------------
    // records
    // ------------------------------------------------------------------------

    fn record_key(doc_key: &str) -> String {
        format!("doc.{doc_key}.record")
    }

    /// Persist `record` under `doc_key` and point `current` at it.
    pub fn save_record(&mut self, doc_key: &str, record: &SessionRecord) {
        match serde_json::to_string(record) {
            Ok(json) => {
                self.write(&Self::record_key(doc_key), &json);
                self.write(KEY_CURRENT, doc_key);
            }
            Err(e) => crate::debug!("session"; "record encode failed: {}", e),
        }
    }

    /// Load a record; absent or corrupt data yields `None`, never an error.
    pub fn load_record(&self, doc_key: &str) -> Option<SessionRecord> {
        let raw = self.backend.get(&Self::record_key(doc_key))?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                crate::debug!("session"; "discarding corrupt record for {}: {}", doc_key, e);
                None
            }
        }
    }

    /// Restore the active session: the `current` pointer's record, or a
    /// one-shot import of legacy flat keys when no pointer exists.
    pub fn restore(&mut self) -> Option<SessionRecord> {
        if let Some(current) = self.backend.get(KEY_CURRENT) {
            return self.load_record(&current);
        }
        self.import_legacy()
    }

    /// Move a record to a new key (local identity confirmed by the server).
    pub fn reassign(&mut self, from_key: &str, to_key: &str) {
        if let Some(mut record) = self.load_record(from_key) {
            record.document_id = Some(to_key.to_string());
            self.save_record(to_key, &record);
        }
        let _ = self.backend.remove(&Self::record_key(from_key));
    }

    /// Drop a document's record; clears `current` if it pointed there.
    pub fn clear_document(&mut self, doc_key: &str) {
        let _ = self.backend.remove(&Self::record_key(doc_key));
        if self.backend.get(KEY_CURRENT).as_deref() == Some(doc_key) {
            let _ = self.backend.remove(KEY_CURRENT);
        }
    }

    /// Store keys of every known document record.
    pub fn document_keys(&self) -> Vec<String> {
        self.backend
            .keys_with_prefix("doc.")
            .into_iter()
            .filter_map(|k| {
                k.strip_prefix("doc.")
                    .and_then(|rest| rest.strip_suffix(".record"))
                    .map(str::to_string)
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // legacy import
    // ------------------------------------------------------------------------

    /// Import the flat single-document scheme of older builds, if present.
    fn import_legacy(&mut self) -> Option<SessionRecord> {
        let content = self.backend.get(LEGACY_CONTENT)?;

        let (cursor_start, cursor_end) = self
            .backend
            .get(LEGACY_CURSOR)
            .and_then(|raw| parse_cursor(&raw))
            .unwrap_or((0, 0));

        let mut record = SessionRecord {
            content,
            cursor_start,
            cursor_end,
            active_view: self.backend.get(LEGACY_VIEW),
            ..Default::default()
        };
        record.touch();

        crate::log!("session"; "imported legacy session state");
        self.save_record("local", &record);
        Some(record)
    }
}

/// Legacy cursor format: `start,end`.
fn parse_cursor(raw: &str) -> Option<(usize, usize)> {
    let (start, end) = raw.split_once(',')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

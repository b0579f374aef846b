//! Engine input events and exchange-completion messages.
//!
//! ```text
//! editor surface --EngineEvent--> SyncEngine <--Resolved-- spawned exchanges
//! ```

use tokio::sync::oneshot;

use crate::cache::RenderKey;
use crate::core::{Artifact, ArtifactKind, Generation, PartialArtifacts};
use crate::document::{DocumentId, DocumentMeta, RenderRequest};
use crate::remote::{CreatedDocument, RenderFailure};

/// Events crossing the editor/view capability boundary into the engine.
#[derive(Debug)]
pub enum EngineEvent {
    /// The editor surface's content changed (every keystroke).
    ContentChanged(String),
    /// Cursor/selection moved. Cheap scalar persistence, last write wins.
    SelectionChanged { start: usize, end: usize },
    /// A derived-output view became visible (tab switch).
    ViewActivated(ArtifactKind),
    /// Start a fresh document, registering it with the service.
    NewDocument(DocumentMeta),
    /// Discard the current document entirely.
    Clear,
    /// Point-in-time state snapshot for hosts (and tests).
    Status(oneshot::Sender<EngineStatus>),
    /// Flush session state and stop the loop.
    Shutdown,
}

/// Completion of a spawned network exchange.
///
/// Exchanges are never cancelled; every one eventually lands here and is
/// judged against the latest generation of its family.
pub(super) enum Resolved {
    Preview {
        generation: Generation,
        request: RenderRequest,
        outcome: Result<PartialArtifacts, RenderFailure>,
    },
    Image {
        generation: Generation,
        key: RenderKey,
        outcome: Result<Artifact, RenderFailure>,
    },
    Created {
        outcome: Result<CreatedDocument, RenderFailure>,
    },
}

/// Observable engine state, answered through [`EngineEvent::Status`].
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub document_id: DocumentId,
    pub content: String,
    pub cursor: (usize, usize),
    pub active_view: ArtifactKind,
    pub is_clean: bool,
    pub store_degraded: bool,
}

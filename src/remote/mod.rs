//! Remote render service boundary.
//!
//! The engine never parses notation itself - every derived artifact comes
//! from one request/response exchange against the remote parsing/engraving
//! service. This module owns the typed seam:
//!
//! - `RenderService` - the capability trait the engine calls (and tests
//!   fake)
//! - `HttpRenderService` - the production implementation over HTTP
//! - `RenderFailure` - the three-way failure taxonomy the engine reacts to
//!
//! One call maps to exactly one network exchange. No retries happen here;
//! the engine's debounce path is the only retry mechanism.

mod http;

pub use http::HttpRenderService;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{Artifact, PartialArtifacts};
use crate::document::{ContentSnapshot, DocumentMeta, ExportFormat, RenderOptions};

/// Why an exchange failed, in the three categories the engine treats
/// differently.
#[derive(Debug, Clone, Error)]
pub enum RenderFailure {
    /// Service unreachable or the exchange timed out. Non-fatal; the next
    /// edit retries naturally.
    #[error("service unreachable: {0}")]
    Transport(String),

    /// The service answered with something we cannot interpret. A bug
    /// signal, not a user error.
    #[error("unexpected service response: {0}")]
    Protocol(String),

    /// The service validly rejected the input (e.g. unparseable notation).
    /// Expected and frequent; shown per view as the rejection reason.
    #[error("{0}")]
    Application(String),
}

impl RenderFailure {
    pub const fn is_application(&self) -> bool {
        matches!(self, Self::Application(_))
    }
}

/// Result of creating a document on the service.
#[derive(Debug, Clone)]
pub struct CreatedDocument {
    /// Server-issued identity, fixed from here on.
    pub id: String,
    /// Formats the service rendered as part of creation, if any.
    pub initial: PartialArtifacts,
}

/// Result of the export exchange.
#[derive(Debug, Clone)]
pub struct ExportPayload {
    pub format: ExportFormat,
    pub content: String,
}

/// The remote service boundary the engine drives.
///
/// Implementations perform a single attempt per call and must map every
/// failure into [`RenderFailure`] - nothing here panics or retries.
#[async_trait]
pub trait RenderService: Send + Sync {
    /// Primary preview exchange: parse + derive the cheap artifact set.
    async fn render_preview(
        &self,
        snapshot: &ContentSnapshot,
        options: &RenderOptions,
    ) -> Result<PartialArtifacts, RenderFailure>;

    /// Expensive engrave exchange: notation to score image. Independent of
    /// the preview exchange and materially slower.
    async fn render_image(
        &self,
        snapshot: &ContentSnapshot,
        options: &RenderOptions,
    ) -> Result<Artifact, RenderFailure>;

    /// Document lifecycle: register a new document, obtaining its identity.
    async fn create_document(&self, meta: &DocumentMeta) -> Result<CreatedDocument, RenderFailure>;

    /// Export the snapshot to a target format.
    async fn export_document(
        &self,
        snapshot: &ContentSnapshot,
        options: &RenderOptions,
        format: ExportFormat,
    ) -> Result<ExportPayload, RenderFailure>;
}

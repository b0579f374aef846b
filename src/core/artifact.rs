//! Derived-output vocabulary.
//!
//! An artifact is anything the remote service derives from notation text:
//! the structured document tree, rhythm analysis, engraving source,
//! renderable score data, a plain-text reconstruction, or the engraved
//! score image. The image is the expensive one - it is produced by a
//! separate, slower exchange and generated lazily.

use serde::{Deserialize, Serialize};

/// The kinds of derived output a document can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Structured document tree (JSON).
    Tree,
    /// Rhythm analysis of the content lines.
    Rhythm,
    /// Engraving source text (LilyPond).
    Source,
    /// Renderable score data (VexFlow-shaped JSON).
    Score,
    /// Plain-text reconstruction of the input.
    Text,
    /// Engraved score image (SVG). Expensive; generated lazily.
    Image,
}

impl ArtifactKind {
    /// Every kind, in display order.
    pub const ALL: [Self; 6] = [
        Self::Tree,
        Self::Rhythm,
        Self::Source,
        Self::Score,
        Self::Text,
        Self::Image,
    ];

    /// Kinds served by the primary preview exchange (everything but Image).
    pub const PREVIEW: [Self; 5] = [
        Self::Tree,
        Self::Rhythm,
        Self::Source,
        Self::Score,
        Self::Text,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Rhythm => "rhythm",
            Self::Source => "source",
            Self::Score => "score",
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// Parse a stored view name back into a kind.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single computed artifact payload.
///
/// Structured kinds (tree, score) carry JSON; the rest carry text.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Json(serde_json::Value),
    Text(String),
}

impl Artifact {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Text(_) => None,
        }
    }
}

/// The preview exchange's result set: any subset of kinds may be absent.
///
/// Field shapes mirror the service response - one optional slot per kind,
/// never a partial mixture within a slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialArtifacts {
    pub tree: Option<serde_json::Value>,
    pub rhythm: Option<String>,
    pub source: Option<String>,
    pub score: Option<serde_json::Value>,
    pub text: Option<String>,
}

impl PartialArtifacts {
    /// Look up one kind, converting to the unified payload type.
    ///
    /// `Image` is never present here - it belongs to the engrave exchange.
    pub fn get(&self, kind: ArtifactKind) -> Option<Artifact> {
        match kind {
            ArtifactKind::Tree => self.tree.clone().map(Artifact::Json),
            ArtifactKind::Rhythm => self.rhythm.clone().map(Artifact::Text),
            ArtifactKind::Source => self.source.clone().map(Artifact::Text),
            ArtifactKind::Score => self.score.clone().map(Artifact::Json),
            ArtifactKind::Text => self.text.clone().map(Artifact::Text),
            ArtifactKind::Image => None,
        }
    }

    /// Kinds actually present in this result.
    pub fn present(&self) -> Vec<ArtifactKind> {
        ArtifactKind::PREVIEW
            .into_iter()
            .filter(|k| self.get(*k).is_some())
            .collect()
    }
}

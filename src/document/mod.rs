//! Document identity, render options, and content snapshots.
//!
//! A document is the unit of editing state: notation text plus the options
//! it renders under. Identity starts out local (`Pending`) and becomes
//! `Assigned` once the remote service acknowledges creation - local content
//! for an assigned identity is a cache, never the source of truth.

mod hash;

pub use hash::ContentHash;

use serde::{Deserialize, Serialize};

// ============================================================================
// identity
// ============================================================================

/// Stable document identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DocumentId {
    /// Local-only, not yet confirmed by the service.
    #[default]
    Pending,
    /// Server-issued identifier; fixed once assigned.
    Assigned(String),
}

impl DocumentId {
    /// Key segment used by the session store (`doc.<key>.record`).
    pub fn store_key(&self) -> &str {
        match self {
            Self::Pending => "local",
            Self::Assigned(id) => id,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }
}

// ============================================================================
// render options
// ============================================================================

/// Notation system the content is written in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum System {
    /// Detect per stave from the content itself.
    #[default]
    Auto,
    Number,
    Western,
    Sargam,
    Bhatkhande,
    Tabla,
}

impl System {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Number => "number",
            Self::Western => "western",
            Self::Sargam => "sargam",
            Self::Bhatkhande => "bhatkhande",
            Self::Tabla => "tabla",
        }
    }
}

impl std::str::FromStr for System {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "number" => Ok(Self::Number),
            "western" => Ok(Self::Western),
            "sargam" => Ok(Self::Sargam),
            "bhatkhande" => Ok(Self::Bhatkhande),
            "tabla" => Ok(Self::Tabla),
            other => Err(format!("unknown notation system: {other}")),
        }
    }
}

/// Rendering configuration captured with every render request.
///
/// Part of every cache key: two renders of identical text under different
/// options are different artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Notation system to parse under.
    #[serde(default)]
    pub system: System,
}

// ============================================================================
// snapshots
// ============================================================================

/// An immutable copy of the content at the moment a render was triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSnapshot {
    text: String,
    hash: ContentHash,
}

impl ContentSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = ContentHash::of(&text);
        Self { text, hash }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Content + configuration captured atomically at the moment a render is
/// triggered. Immutable once constructed; the unit of cache identity and
/// staleness comparison.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub snapshot: ContentSnapshot,
    pub options: RenderOptions,
}

// ============================================================================
// document
// ============================================================================

/// The live editing state the engine owns.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    /// Last-known-good rendering configuration.
    pub options: RenderOptions,
}

impl Document {
    pub fn with_options(options: RenderOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Snapshot content + options atomically for a render request.
    pub fn snapshot(&self) -> ContentSnapshot {
        ContentSnapshot::new(self.content.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Metadata sent when creating a document on the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub system: System,
}

/// Target formats for the export exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Lilypond,
    Musicxml,
    Text,
}

impl ExportFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lilypond => "lilypond",
            Self::Musicxml => "musicxml",
            Self::Text => "text",
        }
    }
}

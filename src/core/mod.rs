//! Core types - pure abstractions shared across the codebase.

mod artifact;
mod generation;
mod state;

pub use artifact::{Artifact, ArtifactKind, PartialArtifacts};
pub use generation::Generation;
pub use state::{is_shutdown, register_shutdown_tx, setup_shutdown_handler};

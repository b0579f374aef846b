//! View update dispatch - pure projection of render outcomes.
//!
//! Given a resolved render, every output view is updated independently:
//! present artifact data is shown, absent kinds get an explicit
//! "not available" placeholder, and a rejection puts the reason text on
//! every view. No caching and no decision logic lives here; the engine
//! decides *whether* a result may touch the views, this module decides
//! nothing.


use crate::core::{Artifact, ArtifactKind, PartialArtifacts};
use crate::remote::RenderFailure;

/// Why a view has no data to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The document is empty; nothing has been rendered.
    EnterContent,
    /// The last result did not include this artifact kind.
    NotAvailable,
    /// The expensive artifact is being generated.
    Computing,
}

impl Placeholder {
    pub const fn message(self) -> &'static str {
        match self {
            Self::EnterContent => "enter notation to see a preview",
            Self::NotAvailable => "not available for this input",
            Self::Computing => "computing...",
        }
    }
}

/// What a view is told to display.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewContent {
    Data(Artifact),
    Placeholder(Placeholder),
    Error(String),
}

/// Capability interface the presentation layer implements.
///
/// Concrete surfaces may be tabs in a GUI, files in a preview directory,
/// or a recording stub in tests - the engine does not care.
pub trait ViewSurface: Send {
    fn show(&mut self, kind: ArtifactKind, content: &ViewContent);
}

/// Projects render outcomes onto a [`ViewSurface`], one kind at a time.
pub struct ViewDispatcher {
    surface: Box<dyn ViewSurface>,
}

impl ViewDispatcher {
    pub fn new(surface: Box<dyn ViewSurface>) -> Self {
        Self { surface }
    }

    /// Apply a successful preview result: data where present, an explicit
    /// placeholder where absent. Never leaves a preview view showing a
    /// prior render once a newer result for its generation has resolved.
    pub fn apply_success(&mut self, artifacts: &PartialArtifacts) {
        for kind in ArtifactKind::PREVIEW {
            let content = match artifacts.get(kind) {
                Some(artifact) => ViewContent::Data(artifact),
                None => ViewContent::Placeholder(Placeholder::NotAvailable),
            };
            self.surface.show(kind, &content);
        }
    }

    /// Apply a rejection: every view carries the exact reason text.
    pub fn apply_failure(&mut self, failure: &RenderFailure) {
        let content = ViewContent::Error(failure.to_string());
        for kind in ArtifactKind::ALL {
            self.surface.show(kind, &content);
        }
    }

    /// Empty document: every view shows the enter-content placeholder.
    pub fn apply_empty(&mut self) {
        let content = ViewContent::Placeholder(Placeholder::EnterContent);
        for kind in ArtifactKind::ALL {
            self.surface.show(kind, &content);
        }
    }

    /// Update the image view alone (lazy engrave path).
    pub fn show_image(&mut self, content: &ViewContent) {
        self.surface.show(ArtifactKind::Image, content);
    }
}

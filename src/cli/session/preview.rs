//! Preview directory: a filesystem projection of the view boundary.
//!
//! One file per artifact kind. Data overwrites the file; placeholders and
//! errors remove it, so the directory never shows content the views have
//! moved past.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::{Artifact, ArtifactKind};
use crate::views::{ViewContent, ViewSurface};

pub(super) struct PreviewDir {
    dir: PathBuf,
    /// Last rejection shown, to avoid re-emitting one status line per view.
    last_error: Option<String>,
}

impl PreviewDir {
    pub(super) fn create(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            last_error: None,
        })
    }

    fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        let name = match kind {
            ArtifactKind::Tree => "tree.json",
            ArtifactKind::Rhythm => "rhythm.txt",
            ArtifactKind::Source => "source.ly",
            ArtifactKind::Score => "score.json",
            ArtifactKind::Text => "text.txt",
            ArtifactKind::Image => "score.svg",
        };
        self.dir.join(name)
    }

    fn clear_error(&mut self) {
        if self.last_error.take().is_some() {
            let _ = fs::remove_file(self.dir.join("error.txt"));
        }
    }

    fn write_artifact(&self, path: &Path, artifact: &Artifact) -> io::Result<()> {
        match artifact {
            Artifact::Json(value) => {
                let json = serde_json::to_string_pretty(value)
                    .map_err(|e| io::Error::other(e.to_string()))?;
                fs::write(path, json)
            }
            Artifact::Text(text) => fs::write(path, text),
        }
    }
}

impl ViewSurface for PreviewDir {
    fn show(&mut self, kind: ArtifactKind, content: &ViewContent) {
        let path = self.artifact_path(kind);
        match content {
            ViewContent::Data(artifact) => {
                self.clear_error();
                match self.write_artifact(&path, artifact) {
                    Ok(()) => crate::debug!("views"; "wrote {}", path.display()),
                    Err(e) => crate::log!("views"; "write failed for {}: {}", kind, e),
                }
            }
            ViewContent::Placeholder(placeholder) => {
                let _ = fs::remove_file(&path);
                crate::debug!("views"; "{}: {}", kind, placeholder.message());
            }
            ViewContent::Error(reason) => {
                let _ = fs::remove_file(&path);
                if self.last_error.as_deref() != Some(reason.as_str()) {
                    self.last_error = Some(reason.clone());
                    let _ = fs::write(self.dir.join("error.txt"), reason);
                    crate::logger::status_error("notation rejected", reason);
                }
            }
        }
    }
}

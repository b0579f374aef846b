//! File watcher: turns file changes into content-changed events.

use std::path::Path;

use anyhow::Result;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::engine::EngineHandle;

/// Watch `file` and forward its contents to the engine on every change.
///
/// The parent directory is watched rather than the file itself: most
/// editors save via rename-and-replace, which silently drops a direct
/// file watch. Burst coalescing is the engine's job, not ours.
pub(super) fn spawn(file: &Path, handle: EngineHandle) -> Result<RecommendedWatcher> {
    let target = file.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else { return };

        match event.kind {
            // Metadata-only changes (mtime/chmod noise) are not edits
            EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return,
            EventKind::Create(_) | EventKind::Modify(_) => {}
            _ => return,
        }
        if !event.paths.iter().any(|p| p == &target) {
            return;
        }

        match std::fs::read_to_string(&target) {
            Ok(content) => handle.content_changed(content),
            // Mid-rename reads fail transiently; the next event retries
            Err(e) => crate::debug!("watch"; "re-read failed: {}", e),
        }
    })?;

    let dir = file.parent().unwrap_or(Path::new("."));
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    crate::debug!("watch"; "watching {}", dir.display());
    Ok(watcher)
}

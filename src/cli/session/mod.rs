//! Live session command.
//!
//! A headless implementation of the engine's capability boundaries:
//!
//! ```text
//! notation file --(notify)--> SyncEngine --(ViewSurface)--> preview dir
//!                                  |
//!                            session store
//! ```
//!
//! The watched file *is* the editor surface: every change to it becomes a
//! content-changed event, and the derived views are projected as files in
//! a preview directory. Session state (content, cursor, active view)
//! persists across runs in the session store.

mod preview;
mod watch;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::StudioConfig;
use crate::document::System;
use crate::engine::SyncEngine;
use crate::remote::HttpRenderService;
use crate::session::{FileBackend, SessionStore};

use preview::PreviewDir;

pub fn run(
    file: &Path,
    system: Option<System>,
    no_persist: bool,
    config: &StudioConfig,
) -> Result<()> {
    let file = file
        .canonicalize()
        .with_context(|| format!("cannot open {}", file.display()))?;
    let content =
        fs::read_to_string(&file).with_context(|| format!("cannot read {}", file.display()))?;

    let mut engine_opts = config.engine_options();
    if let Some(system) = system {
        engine_opts.render.system = system;
    }

    let service = Arc::new(HttpRenderService::new(
        &config.service.url,
        config.preview_timeout(),
        config.engrave_timeout(),
    )?);

    let store = if no_persist || !config.session.persist {
        SessionStore::in_memory()
    } else {
        SessionStore::new(Box::new(FileBackend::open(config.store_path_for(&file))?))
    };

    let preview_dir = config.preview_dir_for(&file);
    let surface = PreviewDir::create(&preview_dir)
        .with_context(|| format!("cannot create {}", preview_dir.display()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let (engine, handle) = SyncEngine::new(service, store, Box::new(surface), engine_opts);
    let engine_task = runtime.spawn(engine.run());

    // The file's current contents are the surface's truth; the engine
    // ignores the echo if they match the restored session.
    handle.content_changed(content);

    // Watcher must outlive the blocking wait below
    let _watcher = watch::spawn(&file, handle.clone())?;

    let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
    crate::core::register_shutdown_tx(shutdown_tx);

    crate::log!("session"; "live preview: {} -> {}", file.display(), preview_dir.display());
    crate::log!("session"; "press Ctrl+C to stop");

    // Park until Ctrl+C, then let the engine flush session state
    let _ = shutdown_rx.recv();
    handle.shutdown();
    let _ = runtime.block_on(engine_task);
    crate::log!("session"; "session saved");
    Ok(())
}

//! Preview Synchronization Engine.
//!
//! The orchestrator that keeps the document, the derived-output views, and
//! the remote service converged:
//!
//! ```text
//! edits --> Debouncer --> RenderService --> ViewDispatcher
//!              |               |                  ^
//!              |          ArtifactCache ----------+
//!              +--- SessionStore (persist on every keystroke)
//! ```
//!
//! One task owns every piece of mutable state; the only suspension points
//! are the event channels and the debounce deadline. Network exchanges run
//! in spawned tasks and report back with their generation - they are never
//! cancelled, only superseded: views always converge to the most recently
//! initiated request that has resolved, regardless of network reordering.

mod messages;
mod state;
#[cfg(test)]
mod tests;

pub use messages::{EngineEvent, EngineStatus};
pub use state::SyncState;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::cache::{ArtifactCache, RenderKey};
use crate::core::{ArtifactKind, Generation};
use crate::document::{Document, DocumentId, DocumentMeta, RenderOptions, RenderRequest};
use crate::remote::{RenderFailure, RenderService};
use crate::schedule::{Channel, Debouncer};
use crate::session::{SessionRecord, SessionStore};
use crate::views::{Placeholder, ViewContent, ViewDispatcher, ViewSurface};

use messages::Resolved;

/// Engine tuning knobs, normally taken from `[preview]` config.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Quiescence window for the live preview channel.
    pub preview_delay: Duration,
    /// Quiescence window for the expensive engrave channel.
    pub engrave_delay: Duration,
    /// Rendering configuration for new documents.
    pub render: RenderOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            preview_delay: Duration::from_millis(300),
            engrave_delay: Duration::from_millis(5000),
            render: RenderOptions::default(),
        }
    }
}

/// What a fired debounce channel should do.
#[derive(Debug, Clone, Copy)]
enum RenderTask {
    Preview,
    Engrave,
}

/// Cloneable sender half of the engine: the capability interface the
/// editor surface and presentation layer call against.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    pub fn content_changed(&self, content: impl Into<String>) {
        let _ = self.tx.send(EngineEvent::ContentChanged(content.into()));
    }

    pub fn selection_changed(&self, start: usize, end: usize) {
        let _ = self.tx.send(EngineEvent::SelectionChanged { start, end });
    }

    pub fn view_activated(&self, kind: ArtifactKind) {
        let _ = self.tx.send(EngineEvent::ViewActivated(kind));
    }

    pub fn new_document(&self, meta: DocumentMeta) {
        let _ = self.tx.send(EngineEvent::NewDocument(meta));
    }

    pub fn clear(&self) {
        let _ = self.tx.send(EngineEvent::Clear);
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(EngineEvent::Shutdown);
    }

    /// Point-in-time engine state; `None` if the engine has stopped.
    pub async fn status(&self) -> Option<EngineStatus> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(EngineEvent::Status(tx)).ok()?;
        rx.await.ok()
    }
}

/// The synchronization engine. Construct with [`SyncEngine::new`], then
/// drive with [`SyncEngine::run`] on a tokio runtime.
pub struct SyncEngine {
    events: mpsc::UnboundedReceiver<EngineEvent>,
    resolved_tx: mpsc::UnboundedSender<Resolved>,
    resolved_rx: mpsc::UnboundedReceiver<Resolved>,

    service: Arc<dyn RenderService>,
    store: SessionStore,
    dispatcher: ViewDispatcher,
    cache: ArtifactCache,
    debounce: Debouncer<RenderTask>,
    opts: EngineOptions,

    document: Document,
    cursor: (usize, usize),
    active_view: ArtifactKind,
    state: SyncState,

    /// Issues generation numbers for every initiated exchange.
    counter: Generation,
    /// Latest generation initiated per exchange family. The supersede rule
    /// compares within a family - preview and engrave drive disjoint views
    /// and must not suppress each other.
    latest_preview: Option<Generation>,
    latest_image: Option<Generation>,
    /// Key of the engrave exchange currently in flight, if any.
    inflight_image: Option<RenderKey>,
    /// A create-document exchange is in flight.
    creating: bool,
}

impl SyncEngine {
    /// Build an engine and its handle. Restores the persisted session:
    /// the editor surface is populated from the session record, and a
    /// non-empty restore immediately becomes dirty and schedules a first
    /// render - local content is a cache, not the source of truth, until
    /// the service has seen it.
    pub fn new(
        service: Arc<dyn RenderService>,
        mut store: SessionStore,
        surface: Box<dyn ViewSurface>,
        opts: EngineOptions,
    ) -> (Self, EngineHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();

        let mut dispatcher = ViewDispatcher::new(surface);
        let mut document = Document::with_options(opts.render.clone());
        let mut cursor = (0, 0);
        let mut active_view = ArtifactKind::Tree;
        let mut debounce = Debouncer::new();
        let mut state = SyncState::Clean;

        match store.restore() {
            Some(record) => {
                if let Some(id) = record.document_id.clone() {
                    document.id = DocumentId::Assigned(id);
                }
                cursor = (record.cursor_start, record.cursor_end);
                if let Some(kind) = record.active_view_kind() {
                    active_view = kind;
                }
                document.content = record.content;
                if document.is_empty() {
                    dispatcher.apply_empty();
                } else {
                    crate::debug!("engine"; "restored session ({} bytes)", document.content.len());
                    state = SyncState::Dirty;
                    debounce.schedule(Channel::Preview, opts.preview_delay, RenderTask::Preview);
                }
            }
            None => dispatcher.apply_empty(),
        }

        let engine = Self {
            events: event_rx,
            resolved_tx,
            resolved_rx,
            service,
            store,
            dispatcher,
            cache: ArtifactCache::new(),
            debounce,
            opts,
            document,
            cursor,
            active_view,
            state,
            counter: Generation::default(),
            latest_preview: None,
            latest_image: None,
            inflight_image: None,
            creating: false,
        };

        (engine, EngineHandle { tx: event_tx })
    }

    /// Event loop. Returns when a shutdown event arrives or every handle
    /// is dropped.
    pub async fn run(mut self) {
        loop {
            let deadline = self.debounce.next_deadline();
            tokio::select! {
                biased;

                event = self.events.recv() => {
                    // A closed channel (every handle dropped) stops the
                    // loop the same way an explicit shutdown does.
                    let Some(event) = event else { break };
                    if !self.on_event(event) {
                        break;
                    }
                }

                Some(resolved) = self.resolved_rx.recv() => {
                    self.on_resolved(resolved);
                }

                _ = sleep_until(deadline) => {
                    for (_, task) in self.debounce.take_due(Instant::now()) {
                        self.on_fire(task);
                    }
                }
            }
        }
        crate::debug!("engine"; "stopped");
    }

    // ------------------------------------------------------------------------
    // input events
    // ------------------------------------------------------------------------

    /// Returns `false` when the loop should stop.
    fn on_event(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::ContentChanged(content) => self.on_content_changed(content),
            EngineEvent::SelectionChanged { start, end } => {
                self.cursor = (start, end);
                self.persist();
            }
            EngineEvent::ViewActivated(kind) => self.on_view_activated(kind),
            EngineEvent::NewDocument(meta) => self.on_new_document(meta),
            EngineEvent::Clear => self.on_clear(),
            EngineEvent::Status(reply) => {
                let _ = reply.send(self.status());
            }
            EngineEvent::Shutdown => {
                self.persist();
                return false;
            }
        }
        true
    }

    fn on_content_changed(&mut self, content: String) {
        // Editor surfaces may echo unchanged content (focus events, file
        // watchers re-reading); that is not an edit.
        if content == self.document.content {
            return;
        }

        self.document.content = content;
        self.persist();

        if self.document.is_empty() {
            // Emptiness is authoritative: nothing to render, and any
            // in-flight result for the old content must not resurface.
            self.debounce.cancel(Channel::Preview);
            self.debounce.cancel(Channel::Engrave);
            self.supersede_inflight();
            self.state = SyncState::Clean;
            self.dispatcher.apply_empty();
            return;
        }

        self.state.mark_dirty();
        self.debounce
            .schedule(Channel::Preview, self.opts.preview_delay, RenderTask::Preview);

        // The engrave exchange is tab-triggered: edits only refresh it
        // while its view is actually visible.
        if self.active_view == ArtifactKind::Image {
            self.refresh_image_view();
        }
    }

    fn on_view_activated(&mut self, kind: ArtifactKind) {
        self.active_view = kind;
        self.persist();

        if kind == ArtifactKind::Image && !self.document.is_empty() {
            self.refresh_image_view();
        }
    }

    /// Cache-first lazy path for the engraved image: an exact cache hit is
    /// applied with no network call; otherwise show "computing" and let
    /// the engrave channel coalesce the request.
    fn refresh_image_view(&mut self) {
        let key = self.image_key();
        if let Some(artifact) = self.cache.get(&key) {
            let artifact = artifact.clone();
            self.dispatcher.show_image(&ViewContent::Data(artifact));
            return;
        }

        self.dispatcher
            .show_image(&ViewContent::Placeholder(Placeholder::Computing));
        self.debounce
            .schedule(Channel::Engrave, self.opts.engrave_delay, RenderTask::Engrave);
    }

    fn on_new_document(&mut self, meta: DocumentMeta) {
        self.replace_document(Document::with_options(RenderOptions {
            system: meta.system,
        }));

        if self.creating {
            return;
        }
        self.creating = true;

        let service = Arc::clone(&self.service);
        let tx = self.resolved_tx.clone();
        tokio::spawn(async move {
            let outcome = service.create_document(&meta).await;
            let _ = tx.send(Resolved::Created { outcome });
        });
    }

    fn on_clear(&mut self) {
        let key = self.document.id.store_key().to_string();
        self.store.clear_document(&key);
        self.replace_document(Document::with_options(self.opts.render.clone()));
    }

    /// Swap in a fresh document, dropping everything tied to the old one.
    fn replace_document(&mut self, document: Document) {
        self.debounce.cancel(Channel::Preview);
        self.debounce.cancel(Channel::Engrave);
        self.supersede_inflight();
        self.cache.clear();

        self.document = document;
        self.cursor = (0, 0);
        self.state = SyncState::Clean;
        self.dispatcher.apply_empty();
        self.persist();
    }

    /// Invalidate every in-flight exchange by issuing a generation that
    /// will never resolve. Late results may still populate the cache; they
    /// can no longer touch the views.
    fn supersede_inflight(&mut self) {
        let fence = self.counter.bump();
        if self.latest_preview.is_some() {
            self.latest_preview = Some(fence);
        }
        if self.latest_image.is_some() {
            self.latest_image = Some(fence);
        }
        self.inflight_image = None;
    }

    // ------------------------------------------------------------------------
    // debounce firings
    // ------------------------------------------------------------------------

    fn on_fire(&mut self, task: RenderTask) {
        match task {
            RenderTask::Preview => self.fire_preview(),
            RenderTask::Engrave => self.fire_engrave(),
        }
    }

    fn fire_preview(&mut self) {
        if self.document.is_empty() {
            return;
        }

        let request = RenderRequest {
            snapshot: self.document.snapshot(),
            options: self.document.options.clone(),
        };
        let generation = self.counter.bump();
        self.latest_preview = Some(generation);
        self.state.mark_pending(generation);
        crate::debug!("engine"; "preview {} ({})", generation, request.snapshot.hash());

        let service = Arc::clone(&self.service);
        let tx = self.resolved_tx.clone();
        tokio::spawn(async move {
            let outcome = service
                .render_preview(&request.snapshot, &request.options)
                .await;
            let _ = tx.send(Resolved::Preview {
                generation,
                request,
                outcome,
            });
        });
    }

    fn fire_engrave(&mut self) {
        if self.document.is_empty() {
            return;
        }

        let key = self.image_key();
        if let Some(artifact) = self.cache.get(&key) {
            // Resolved while the debounce was pending
            let artifact = artifact.clone();
            self.dispatcher.show_image(&ViewContent::Data(artifact));
            return;
        }
        if self.inflight_image.as_ref() == Some(&key) {
            // The same content is already being engraved
            return;
        }

        let request = RenderRequest {
            snapshot: self.document.snapshot(),
            options: self.document.options.clone(),
        };
        let generation = self.counter.bump();
        self.latest_image = Some(generation);
        self.inflight_image = Some(key.clone());
        crate::debug!("engine"; "engrave {} ({})", generation, request.snapshot.hash());

        let service = Arc::clone(&self.service);
        let tx = self.resolved_tx.clone();
        tokio::spawn(async move {
            let outcome = service
                .render_image(&request.snapshot, &request.options)
                .await;
            let _ = tx.send(Resolved::Image {
                generation,
                key,
                outcome,
            });
        });
    }

    // ------------------------------------------------------------------------
    // exchange completions
    // ------------------------------------------------------------------------

    fn on_resolved(&mut self, resolved: Resolved) {
        match resolved {
            Resolved::Preview {
                generation,
                request,
                outcome,
            } => self.on_preview_resolved(generation, request, outcome),
            Resolved::Image {
                generation,
                key,
                outcome,
            } => self.on_image_resolved(generation, key, outcome),
            Resolved::Created { outcome } => self.on_created(outcome),
        }
    }

    fn on_preview_resolved(
        &mut self,
        generation: Generation,
        request: RenderRequest,
        outcome: Result<crate::core::PartialArtifacts, RenderFailure>,
    ) {
        let current = self.latest_preview == Some(generation);

        match outcome {
            Ok(artifacts) => {
                // Cache population happens even for superseded results -
                // the work is done, and the cache's generation rule keeps
                // older data from displacing newer entries.
                for kind in ArtifactKind::PREVIEW {
                    if let Some(artifact) = artifacts.get(kind) {
                        let key = RenderKey::new(
                            request.snapshot.hash(),
                            request.options.clone(),
                            kind,
                        );
                        self.cache.put(key, artifact, generation);
                    }
                }

                if !current {
                    crate::debug!("engine"; "preview {} superseded", generation);
                    return;
                }

                self.dispatcher.apply_success(&artifacts);
                self.sync_image_view();
                self.state.mark_resolved(true);
                crate::logger::status_success(&format!(
                    "preview updated ({} artifacts)",
                    artifacts.present().len()
                ));
            }
            Err(failure) if failure.is_application() => {
                if !current {
                    return;
                }
                // Expected and frequent: the notation itself is invalid.
                // Every view carries the reason; only an edit clears it.
                self.dispatcher.apply_failure(&failure);
                self.state.mark_resolved(true);
            }
            Err(failure) => {
                if !current {
                    return;
                }
                self.report_degraded("preview", &failure);
                // Content is still unrendered; the next edit's debounce is
                // the retry path - no automatic background retry.
                self.state.mark_resolved(false);
            }
        }
    }

    fn on_image_resolved(
        &mut self,
        generation: Generation,
        key: RenderKey,
        outcome: Result<crate::core::Artifact, RenderFailure>,
    ) {
        if self.inflight_image.as_ref() == Some(&key) {
            self.inflight_image = None;
        }
        let current = self.latest_image == Some(generation);

        match outcome {
            Ok(artifact) => {
                self.cache.put(key.clone(), artifact.clone(), generation);
                if !current {
                    crate::debug!("engine"; "engrave {} superseded", generation);
                    return;
                }
                // Repaint only if the image view still shows this content
                if key == self.image_key() {
                    self.dispatcher.show_image(&ViewContent::Data(artifact));
                    crate::logger::status_success("score image updated");
                }
            }
            Err(failure) if failure.is_application() => {
                if current && key == self.image_key() {
                    self.dispatcher
                        .show_image(&ViewContent::Error(failure.to_string()));
                }
            }
            Err(failure) => {
                if current {
                    self.report_degraded("engrave", &failure);
                }
            }
        }
    }

    fn on_created(&mut self, outcome: Result<crate::remote::CreatedDocument, RenderFailure>) {
        self.creating = false;

        match outcome {
            Ok(created) => {
                let old_key = self.document.id.store_key().to_string();
                self.document.id = DocumentId::Assigned(created.id.clone());
                self.store.reassign(&old_key, &created.id);
                crate::log!("engine"; "document registered as {}", created.id);

                // Creation may include pre-rendered formats; show them only
                // if nothing has been typed since.
                if self.document.is_empty() && !created.initial.present().is_empty() {
                    self.dispatcher.apply_success(&created.initial);
                }
            }
            Err(failure) => {
                // Degraded mode: identity stays local, editing continues.
                crate::logger::status_warning(&format!(
                    "document not registered, working locally ({failure})"
                ));
            }
        }
    }

    // ------------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------------

    /// Reconcile the image view after a preview resolved. The preview
    /// exchange never carries the image, but the view must not keep
    /// content the render generation has moved past: a still-valid cached
    /// engraving stays, an engraving under way stays "computing", anything
    /// else is explicitly not available.
    fn sync_image_view(&mut self) {
        let key = self.image_key();
        if let Some(artifact) = self.cache.get(&key) {
            let artifact = artifact.clone();
            self.dispatcher.show_image(&ViewContent::Data(artifact));
        } else if self.inflight_image.as_ref() == Some(&key)
            || self.debounce.is_pending(Channel::Engrave)
        {
            self.dispatcher
                .show_image(&ViewContent::Placeholder(Placeholder::Computing));
        } else {
            self.dispatcher
                .show_image(&ViewContent::Placeholder(Placeholder::NotAvailable));
        }
    }

    fn image_key(&self) -> RenderKey {
        RenderKey::new(
            crate::document::ContentHash::of(&self.document.content),
            self.document.options.clone(),
            ArtifactKind::Image,
        )
    }

    /// Transport failures are a status line, protocol failures a bug
    /// signal; neither touches the views or the document.
    fn report_degraded(&self, exchange: &str, failure: &RenderFailure) {
        match failure {
            RenderFailure::Transport(reason) => {
                crate::logger::status_warning(&format!("{exchange} unavailable: {reason}"));
            }
            other => {
                crate::log!("engine"; "{} exchange misbehaved: {}", exchange, other);
                crate::logger::status_warning(&format!("{exchange} failed unexpectedly"));
            }
        }
    }

    /// Write the session record. Runs on every keystroke; the store
    /// degrades internally rather than ever blocking an edit.
    fn persist(&mut self) {
        let mut record = SessionRecord {
            document_id: match &self.document.id {
                DocumentId::Assigned(id) => Some(id.clone()),
                DocumentId::Pending => None,
            },
            content: self.document.content.clone(),
            cursor_start: self.cursor.0,
            cursor_end: self.cursor.1,
            active_view: Some(self.active_view.label().to_string()),
            ..Default::default()
        };
        record.touch();
        let key = self.document.id.store_key().to_string();
        self.store.save_record(&key, &record);
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            document_id: self.document.id.clone(),
            content: self.document.content.clone(),
            cursor: self.cursor,
            active_view: self.active_view,
            is_clean: self.state.is_clean(),
            store_degraded: self.store.is_degraded(),
        }
    }
}

/// Sleep until the debounce deadline, or forever when nothing is pending.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::time::sleep;

use super::{EngineHandle, EngineOptions, SyncEngine};
use crate::core::{Artifact, ArtifactKind, PartialArtifacts};
use crate::document::{ContentSnapshot, DocumentId, DocumentMeta, ExportFormat, RenderOptions};
use crate::remote::{CreatedDocument, ExportPayload, RenderFailure, RenderService};
use crate::session::{FileBackend, KvBackend, MemoryBackend, SessionStore};
use crate::views::tests::RecordingSurface;
use crate::views::{Placeholder, ViewContent};

// ============================================================================
// scripted fake service
// ============================================================================

struct Scripted<T> {
    delay: Duration,
    outcome: Result<T, RenderFailure>,
}

/// Fake remote service: records every call, replays scripted outcomes in
/// order, and falls back to a fast canned success.
#[derive(Default)]
struct FakeService {
    preview_calls: Mutex<Vec<String>>,
    image_calls: Mutex<Vec<String>>,
    preview_script: Mutex<VecDeque<Scripted<PartialArtifacts>>>,
    image_script: Mutex<VecDeque<Scripted<Artifact>>>,
    create_script: Mutex<VecDeque<Result<CreatedDocument, RenderFailure>>>,
}

impl FakeService {
    fn push_preview(&self, delay_ms: u64, outcome: Result<PartialArtifacts, RenderFailure>) {
        self.preview_script.lock().push_back(Scripted {
            delay: Duration::from_millis(delay_ms),
            outcome,
        });
    }

    fn push_create(&self, outcome: Result<CreatedDocument, RenderFailure>) {
        self.create_script.lock().push_back(outcome);
    }

    /// Canned success carrying only the tree artifact, tagged with the
    /// input so tests can tell results apart.
    fn tree_for(text: &str) -> PartialArtifacts {
        PartialArtifacts {
            tree: Some(serde_json::json!({ "input": text })),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RenderService for FakeService {
    async fn render_preview(
        &self,
        snapshot: &ContentSnapshot,
        _options: &RenderOptions,
    ) -> Result<PartialArtifacts, RenderFailure> {
        self.preview_calls.lock().push(snapshot.text().to_string());
        let scripted = self.preview_script.lock().pop_front();
        match scripted {
            Some(s) => {
                sleep(s.delay).await;
                s.outcome
            }
            None => {
                sleep(Duration::from_millis(10)).await;
                Ok(Self::tree_for(snapshot.text()))
            }
        }
    }

    async fn render_image(
        &self,
        snapshot: &ContentSnapshot,
        _options: &RenderOptions,
    ) -> Result<Artifact, RenderFailure> {
        self.image_calls.lock().push(snapshot.text().to_string());
        let scripted = self.image_script.lock().pop_front();
        match scripted {
            Some(s) => {
                sleep(s.delay).await;
                s.outcome
            }
            None => {
                sleep(Duration::from_millis(20)).await;
                Ok(Artifact::Text(format!("<svg>{}</svg>", snapshot.text())))
            }
        }
    }

    async fn create_document(&self, _meta: &DocumentMeta) -> Result<CreatedDocument, RenderFailure> {
        sleep(Duration::from_millis(10)).await;
        self.create_script.lock().pop_front().unwrap_or_else(|| {
            Ok(CreatedDocument {
                id: "doc-1".into(),
                initial: PartialArtifacts::default(),
            })
        })
    }

    async fn export_document(
        &self,
        snapshot: &ContentSnapshot,
        _options: &RenderOptions,
        format: ExportFormat,
    ) -> Result<ExportPayload, RenderFailure> {
        Ok(ExportPayload {
            format,
            content: format!("export:{}", snapshot.text()),
        })
    }
}

// ============================================================================
// harness
// ============================================================================

struct Harness {
    service: Arc<FakeService>,
    surface: RecordingSurface,
    handle: EngineHandle,
    task: tokio::task::JoinHandle<()>,
}

fn start_with(service: Arc<FakeService>, store: SessionStore) -> Harness {
    let surface = RecordingSurface::default();
    let (engine, handle) = SyncEngine::new(
        service.clone(),
        store,
        Box::new(surface.clone()),
        EngineOptions::default(),
    );
    let task = tokio::spawn(engine.run());
    Harness {
        service,
        surface,
        handle,
        task,
    }
}

fn start(store: SessionStore) -> Harness {
    start_with(Arc::new(FakeService::default()), store)
}

fn tree_input(content: &ViewContent) -> Option<String> {
    match content {
        ViewContent::Data(Artifact::Json(v)) => {
            v.get("input").and_then(|s| s.as_str()).map(str::to_string)
        }
        _ => None,
    }
}

// ============================================================================
// scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_empty_input_never_renders() {
    let h = start(SessionStore::in_memory());
    h.handle.content_changed("   \n ");
    sleep(Duration::from_secs(2)).await;

    assert!(h.service.preview_calls.lock().is_empty());
    for kind in ArtifactKind::ALL {
        assert_eq!(
            h.surface.last_for(kind),
            Some(ViewContent::Placeholder(Placeholder::EnterContent))
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce_into_one_render() {
    let h = start(SessionStore::in_memory());

    // Keystrokes every 50ms, well inside the 300ms window
    for text in ["| 1", "| 1 2", "| 1 2 3", "| 1 2 3 |"] {
        h.handle.content_changed(text);
        sleep(Duration::from_millis(50)).await;
    }
    sleep(Duration::from_millis(500)).await;

    assert_eq!(
        *h.service.preview_calls.lock(),
        ["| 1 2 3 |"],
        "one render, with the last edit's content"
    );
    assert_eq!(
        tree_input(&h.surface.last_for(ArtifactKind::Tree).unwrap()),
        Some("| 1 2 3 |".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_partial_success_shows_placeholders_not_errors() {
    let h = start(SessionStore::in_memory());
    h.handle.content_changed("| 1 2 |");
    sleep(Duration::from_millis(400)).await;

    // The canned result carries only the tree artifact
    assert!(tree_input(&h.surface.last_for(ArtifactKind::Tree).unwrap()).is_some());
    for kind in [
        ArtifactKind::Rhythm,
        ArtifactKind::Source,
        ArtifactKind::Score,
        ArtifactKind::Text,
    ] {
        assert_eq!(
            h.surface.last_for(kind),
            Some(ViewContent::Placeholder(Placeholder::NotAvailable)),
            "{kind} must show the not-available placeholder"
        );
    }
    // The image is not part of the preview exchange: a placeholder, never
    // an error and never stale content
    assert_eq!(
        h.surface.last_for(ArtifactKind::Image),
        Some(ViewContent::Placeholder(Placeholder::NotAvailable))
    );

    let status = h.handle.status().await.unwrap();
    assert!(status.is_clean);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_never_overwrites_newer_one() {
    let service = Arc::new(FakeService::default());
    // First request resolves slowly, second quickly: G2 lands before G1
    service.push_preview(1000, Ok(FakeService::tree_for("FIRST")));
    service.push_preview(10, Ok(FakeService::tree_for("SECOND")));
    let h = start_with(service, SessionStore::in_memory());

    h.handle.content_changed("first edit");
    sleep(Duration::from_millis(310)).await; // G1 fires, in flight for 1s

    h.handle.content_changed("second edit");
    sleep(Duration::from_millis(350)).await; // G2 fires and resolves

    assert_eq!(
        tree_input(&h.surface.last_for(ArtifactKind::Tree).unwrap()),
        Some("SECOND".to_string())
    );

    // Let G1 resolve late; its side effects on the views are suppressed
    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.service.preview_calls.lock().len(), 2);
    assert_eq!(
        tree_input(&h.surface.last_for(ArtifactKind::Tree).unwrap()),
        Some("SECOND".to_string()),
        "a superseded result must not drive the views"
    );

    let status = h.handle.status().await.unwrap();
    assert!(status.is_clean);
}

#[tokio::test(start_paused = true)]
async fn test_application_failure_shows_reason_and_returns_clean() {
    let service = Arc::new(FakeService::default());
    service.push_preview(
        10,
        Err(RenderFailure::Application(
            "unexpected token at position 4".into(),
        )),
    );
    let h = start_with(service, SessionStore::in_memory());

    h.handle.content_changed("| bad token |");
    sleep(Duration::from_millis(400)).await;

    for kind in ArtifactKind::ALL {
        assert_eq!(
            h.surface.last_for(kind),
            Some(ViewContent::Error("unexpected token at position 4".into())),
            "{kind} must carry the exact rejection reason"
        );
    }

    let status = h.handle.status().await.unwrap();
    assert!(status.is_clean, "a rejection settles the document");

    // No automatic retry: the error display stays until the next edit
    sleep(Duration::from_secs(10)).await;
    assert_eq!(h.service.preview_calls.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_keeps_views_and_retries_on_next_edit() {
    let service = Arc::new(FakeService::default());
    service.push_preview(10, Err(RenderFailure::Transport("connection refused".into())));
    let h = start_with(service, SessionStore::in_memory());

    h.handle.content_changed("| 1 |");
    sleep(Duration::from_millis(400)).await;

    // Views untouched: still the startup placeholder, never an error
    assert_eq!(
        h.surface.last_for(ArtifactKind::Tree),
        Some(ViewContent::Placeholder(Placeholder::EnterContent))
    );
    let status = h.handle.status().await.unwrap();
    assert!(!status.is_clean, "content is still unrendered");

    // No background retry...
    sleep(Duration::from_secs(10)).await;
    assert_eq!(h.service.preview_calls.lock().len(), 1);

    // ...but the next edit goes through the normal debounce path
    h.handle.content_changed("| 1 2 |");
    sleep(Duration::from_millis(400)).await;
    assert_eq!(h.service.preview_calls.lock().len(), 2);
    assert_eq!(
        tree_input(&h.surface.last_for(ArtifactKind::Tree).unwrap()),
        Some("| 1 2 |".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_image_is_lazy_and_cached() {
    let h = start(SessionStore::in_memory());
    h.handle.content_changed("| S R |");
    sleep(Duration::from_millis(400)).await;

    // Edits alone never trigger the engrave exchange
    assert!(h.service.image_calls.lock().is_empty());

    // Activation: computing placeholder, then one engrave after its window
    h.handle.view_activated(ArtifactKind::Image);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(
        h.surface.last_for(ArtifactKind::Image),
        Some(ViewContent::Placeholder(Placeholder::Computing))
    );

    sleep(Duration::from_millis(5100)).await;
    assert_eq!(*h.service.image_calls.lock(), ["| S R |"]);
    assert_eq!(
        h.surface.last_for(ArtifactKind::Image),
        Some(ViewContent::Data(Artifact::Text("<svg>| S R |</svg>".into())))
    );

    // Re-activation with unchanged content is served from cache
    h.handle.view_activated(ArtifactKind::Tree);
    h.handle.view_activated(ArtifactKind::Image);
    sleep(Duration::from_secs(6)).await;
    assert_eq!(h.service.image_calls.lock().len(), 1, "cache hit, no new call");
    assert_eq!(
        h.surface.last_for(ArtifactKind::Image),
        Some(ViewContent::Data(Artifact::Text("<svg>| S R |</svg>".into())))
    );
}

#[tokio::test(start_paused = true)]
async fn test_double_activation_coalesces_to_one_engrave() {
    let h = start(SessionStore::in_memory());
    h.handle.content_changed("| X |");
    sleep(Duration::from_millis(400)).await;

    h.handle.view_activated(ArtifactKind::Image);
    sleep(Duration::from_millis(100)).await;
    h.handle.view_activated(ArtifactKind::Image);
    sleep(Duration::from_secs(10)).await;

    assert_eq!(h.service.image_calls.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_edit_while_image_view_active_refreshes_it() {
    let h = start(SessionStore::in_memory());
    h.handle.content_changed("| A |");
    sleep(Duration::from_millis(400)).await;
    h.handle.view_activated(ArtifactKind::Image);
    sleep(Duration::from_millis(5100)).await;
    assert_eq!(*h.service.image_calls.lock(), ["| A |"]);

    // Editing with the image view visible schedules a refresh on the
    // slower engrave window
    h.handle.content_changed("| B |");
    sleep(Duration::from_millis(1)).await;
    assert_eq!(
        h.surface.last_for(ArtifactKind::Image),
        Some(ViewContent::Placeholder(Placeholder::Computing))
    );

    sleep(Duration::from_millis(5100)).await;
    assert_eq!(*h.service.image_calls.lock(), ["| A |", "| B |"]);
    assert_eq!(
        h.surface.last_for(ArtifactKind::Image),
        Some(ViewContent::Data(Artifact::Text("<svg>| B |</svg>".into())))
    );
}

#[tokio::test(start_paused = true)]
async fn test_session_round_trip_across_engine_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");

    {
        let store = SessionStore::new(Box::new(FileBackend::open(&path).unwrap()));
        let h = start(store);
        h.handle.content_changed("| S R G M |");
        h.handle.selection_changed(3, 7);
        sleep(Duration::from_millis(1)).await;
        h.handle.shutdown();
        h.task.await.unwrap();
    }

    // A fresh engine over the same store reproduces the session
    let store = SessionStore::new(Box::new(FileBackend::open(&path).unwrap()));
    let h = start(store);
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.content, "| S R G M |");
    assert_eq!(status.cursor, (3, 7));

    // A restored non-empty session is dirty and schedules a first render
    sleep(Duration::from_millis(400)).await;
    assert_eq!(*h.service.preview_calls.lock(), ["| S R G M |"]);
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_session_record_falls_back_to_defaults() {
    let mut backend = MemoryBackend::new();
    backend.set("current", "local").unwrap();
    backend.set("doc.local.record", "{definitely not json").unwrap();

    let h = start(SessionStore::new(Box::new(backend)));
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.content, "");
    assert_eq!(status.cursor, (0, 0));
    assert_eq!(
        h.surface.last_for(ArtifactKind::Tree),
        Some(ViewContent::Placeholder(Placeholder::EnterContent))
    );
}

#[tokio::test(start_paused = true)]
async fn test_new_document_gains_server_identity() {
    let h = start(SessionStore::in_memory());
    h.handle.new_document(DocumentMeta::default());
    sleep(Duration::from_millis(50)).await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.document_id, DocumentId::Assigned("doc-1".into()));
}

#[tokio::test(start_paused = true)]
async fn test_new_document_creation_failure_degrades_to_local() {
    let service = Arc::new(FakeService::default());
    service.push_create(Err(RenderFailure::Transport("offline".into())));
    let h = start_with(service, SessionStore::in_memory());

    h.handle.new_document(DocumentMeta::default());
    sleep(Duration::from_millis(50)).await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.document_id, DocumentId::Pending, "identity stays local");

    // Editing is never blocked by the failed registration
    h.handle.content_changed("| 1 2 |");
    sleep(Duration::from_millis(400)).await;
    assert_eq!(*h.service.preview_calls.lock(), ["| 1 2 |"]);
}

#[tokio::test(start_paused = true)]
async fn test_clearing_content_cancels_pending_render() {
    let h = start(SessionStore::in_memory());
    h.handle.content_changed("| 1 2 |");
    sleep(Duration::from_millis(100)).await;

    // Deleted before the debounce window elapsed
    h.handle.content_changed("");
    sleep(Duration::from_secs(2)).await;

    assert!(h.service.preview_calls.lock().is_empty());
    assert_eq!(
        h.surface.last_for(ArtifactKind::Tree),
        Some(ViewContent::Placeholder(Placeholder::EnterContent))
    );
}

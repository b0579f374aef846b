//! HTTP implementation of the render service boundary.
//!
//! Wire shapes follow the notation service's REST API: a tagged
//! success/failure envelope with one optional field per artifact kind.
//!
//! | Exchange | Route            | Notes                               |
//! |----------|------------------|-------------------------------------|
//! | preview  | `/api/parse`     | cheap artifact set, short timeout   |
//! | engrave  | `/api/engrave`   | SVG image, long timeout, never      |
//! |          |                  | blocks the preview exchange         |
//! | create   | `/api/documents` | issues the document identity        |
//! | export   | `/api/export`    | snapshot to target format           |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CreatedDocument, ExportPayload, RenderFailure, RenderService};
use crate::core::{Artifact, PartialArtifacts};
use crate::document::{ContentSnapshot, DocumentMeta, ExportFormat, RenderOptions};

pub struct HttpRenderService {
    http: reqwest::Client,
    base: String,
    preview_timeout: Duration,
    engrave_timeout: Duration,
}

impl HttpRenderService {
    pub fn new(
        base: impl Into<String>,
        preview_timeout: Duration,
        engrave_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Ok(Self {
            http,
            base,
            preview_timeout,
            engrave_timeout,
        })
    }

    /// POST `body` to `route` and decode the JSON envelope.
    async fn exchange<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        route: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<R, RenderFailure> {
        let url = format!("{}{}", self.base, route);
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderFailure::Protocol(format!(
                "{} returned {}",
                route, status
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| RenderFailure::Protocol(format!("{}: {}", route, e)))
    }
}

/// Classify a reqwest error: timeouts and connection problems are
/// transport failures, everything else is a protocol bug signal.
fn transport_failure(e: reqwest::Error) -> RenderFailure {
    if e.is_timeout() {
        RenderFailure::Transport("request timed out".into())
    } else if e.is_connect() || e.is_request() {
        RenderFailure::Transport(e.to_string())
    } else {
        RenderFailure::Protocol(e.to_string())
    }
}

/// Unwrap the service's success/error envelope into the application
/// failure category.
fn check_envelope(success: bool, error: Option<String>) -> Result<(), RenderFailure> {
    if success {
        Ok(())
    } else {
        Err(RenderFailure::Application(
            error.unwrap_or_else(|| "service rejected the input".into()),
        ))
    }
}

// ============================================================================
// wire types
// ============================================================================

#[derive(Serialize)]
struct ParseRequest<'a> {
    input: &'a str,
    system: &'a str,
    formats: Vec<&'static str>,
}

#[derive(Deserialize)]
struct ParseResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    tree: Option<serde_json::Value>,
    #[serde(default)]
    rhythm: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    score: Option<serde_json::Value>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct EngraveRequest<'a> {
    input: &'a str,
    system: &'a str,
}

#[derive(Deserialize)]
struct EngraveResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    svg: Option<String>,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    #[serde(flatten)]
    meta: &'a DocumentMeta,
}

#[derive(Deserialize)]
struct CreateResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    tree: Option<serde_json::Value>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Serialize)]
struct ExportRequest<'a> {
    input: &'a str,
    system: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
struct ExportResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// RenderService impl
// ============================================================================

#[async_trait]
impl RenderService for HttpRenderService {
    async fn render_preview(
        &self,
        snapshot: &ContentSnapshot,
        options: &RenderOptions,
    ) -> Result<PartialArtifacts, RenderFailure> {
        let request = ParseRequest {
            input: snapshot.text(),
            system: options.system.as_str(),
            formats: vec!["tree", "rhythm", "source", "score", "text"],
        };
        let response: ParseResponse = self
            .exchange("/api/parse", &request, self.preview_timeout)
            .await?;
        check_envelope(response.success, response.error)?;

        Ok(PartialArtifacts {
            tree: response.tree,
            rhythm: response.rhythm,
            source: response.source,
            score: response.score,
            text: response.text,
        })
    }

    async fn render_image(
        &self,
        snapshot: &ContentSnapshot,
        options: &RenderOptions,
    ) -> Result<Artifact, RenderFailure> {
        let request = EngraveRequest {
            input: snapshot.text(),
            system: options.system.as_str(),
        };
        let response: EngraveResponse = self
            .exchange("/api/engrave", &request, self.engrave_timeout)
            .await?;
        check_envelope(response.success, response.error)?;

        match response.svg {
            Some(svg) => Ok(Artifact::Text(svg)),
            None => Err(RenderFailure::Protocol(
                "engrave succeeded without an image".into(),
            )),
        }
    }

    async fn create_document(&self, meta: &DocumentMeta) -> Result<CreatedDocument, RenderFailure> {
        let request = CreateRequest { meta };
        let response: CreateResponse = self
            .exchange("/api/documents", &request, self.preview_timeout)
            .await?;
        check_envelope(response.success, response.error)?;

        let id = response.id.ok_or_else(|| {
            RenderFailure::Protocol("create succeeded without an identity".into())
        })?;

        Ok(CreatedDocument {
            id,
            initial: PartialArtifacts {
                tree: response.tree,
                source: response.source,
                ..Default::default()
            },
        })
    }

    async fn export_document(
        &self,
        snapshot: &ContentSnapshot,
        options: &RenderOptions,
        format: ExportFormat,
    ) -> Result<ExportPayload, RenderFailure> {
        let request = ExportRequest {
            input: snapshot.text(),
            system: options.system.as_str(),
            format: format.as_str(),
        };
        let response: ExportResponse = self
            .exchange("/api/export", &request, self.engrave_timeout)
            .await?;
        check_envelope(response.success, response.error)?;

        match response.content {
            Some(content) => Ok(ExportPayload { format, content }),
            None => Err(RenderFailure::Protocol(
                "export succeeded without content".into(),
            )),
        }
    }
}

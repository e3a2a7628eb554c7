//! HTTP surface for Gridweave.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /ingest` – Run the full pipeline over one document: analysis,
//!   table normalization, chunk assembly, and embedding. Accepts raw text or
//!   base64 content plus optional metadata (`source_uri`) and returns the
//!   produced chunks alongside any per-table warnings.
//! - `GET /metrics` – Observe document, chunk, and table counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery
//!   by tools/hosts.

use crate::metrics::MetricsSnapshot;
use crate::pipeline::{IngestMetadata, PipelineApi, PipelineError};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the ingestion API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/ingest", post(ingest_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Request body for the `POST /ingest` endpoint.
#[derive(Deserialize)]
struct IngestRequest {
    /// Raw markdown/text content, mutually exclusive with `content_base64`.
    #[serde(default)]
    text: Option<String>,
    /// Base64-encoded binary document, mutually exclusive with `text`.
    #[serde(default)]
    content_base64: Option<String>,
    /// MIME type of the document (defaults to `text/markdown`).
    #[serde(default)]
    content_type: Option<String>,
    /// Optional source URI (file path or URL) used for stable chunk ids.
    #[serde(default)]
    source_uri: Option<String>,
}

/// Success response for the `POST /ingest` endpoint.
#[derive(Serialize)]
struct IngestResponse {
    /// Chunks that completed through embedding.
    chunks: Vec<crate::pipeline::Chunk>,
    /// Warnings keyed by table or chunk id.
    warnings: Vec<crate::pipeline::PipelineWarning>,
}

/// Ingest a document through the full pipeline.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError>
where
    S: PipelineApi,
{
    let IngestRequest {
        text,
        content_base64,
        content_type,
        source_uri,
    } = request;

    let document = match (text, content_base64) {
        (Some(text), None) => text.into_bytes(),
        (None, Some(encoded)) => BASE64
            .decode(encoded.as_bytes())
            .map_err(|error| AppError::BadRequest(format!("invalid base64 content: {error}")))?,
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "provide either text or content_base64, not both".into(),
            ));
        }
        (None, None) => {
            return Err(AppError::BadRequest(
                "one of text or content_base64 is required".into(),
            ));
        }
    };
    let content_type = content_type.unwrap_or_else(|| "text/markdown".to_string());
    let metadata = IngestMetadata { source_uri };

    let outcome = service
        .process_document(document, &content_type, metadata)
        .await?;
    tracing::info!(
        chunks = outcome.chunks.len(),
        warnings = outcome.warnings.len(),
        "Ingest request completed"
    );
    Ok(Json(IngestResponse {
        chunks: outcome.chunks,
        warnings: outcome.warnings,
    }))
}

/// Return a concise metrics snapshot with document, chunk, and table counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Result<Json<MetricsSnapshot>, AppError>
where
    S: PipelineApi,
{
    Ok(Json(service.metrics_snapshot()))
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ingest",
                method: "POST",
                path: "/ingest",
                description: "Analyze a document, normalize complex tables, assemble table-aware chunks, and embed them. Response returns { \"chunks\": [...], \"warnings\": [...] }.",
                request_example: Some(json!({
                    "text": "# Report\nDocument contents",
                    "content_type": "text/markdown",
                    "source_uri": "https://example.org/report.pdf"
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return document, chunk, and table counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Pipeline(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
            }
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self::Pipeline(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::metrics::MetricsSnapshot;
    use crate::pipeline::{
        Chunk, ChunkType, DocumentOutcome, IngestMetadata, PipelineApi, PipelineError,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[tokio::test]
    async fn commands_catalog_exposes_ingest_endpoint() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let ingest = commands
            .iter()
            .find(|cmd| cmd.name == "ingest")
            .expect("ingest command present");

        assert_eq!(ingest.method, "POST");
        assert_eq!(ingest.path, "/ingest");
        assert!(ingest.description.to_lowercase().contains("table"));
        assert!(commands.len() >= 2);
    }

    #[tokio::test]
    async fn ingest_route_accepts_text_payload() {
        let service = Arc::new(StubPipelineService::new());
        let app = create_router(service.clone());

        let payload = json!({
            "text": "Document body",
            "content_type": "text/markdown",
            "source_uri": "https://example.org/doc"
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["chunks"].as_array().map(|a| a.len()), Some(1));
        assert_eq!(json["chunks"][0]["chunk_type"], "text");

        let calls = service.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.document, b"Document body");
        assert_eq!(call.content_type, "text/markdown");
        assert_eq!(
            call.metadata.source_uri.as_deref(),
            Some("https://example.org/doc")
        );
    }

    #[tokio::test]
    async fn ingest_route_decodes_base64_payload() {
        let service = Arc::new(StubPipelineService::new());
        let app = create_router(service.clone());

        let payload = json!({
            "content_base64": "JVBERg==",
            "content_type": "application/pdf"
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let calls = service.recorded_calls().await;
        assert_eq!(calls[0].document, b"%PDF");
        assert_eq!(calls[0].content_type, "application/pdf");
    }

    #[tokio::test]
    async fn ingest_route_rejects_missing_content() {
        let service = Arc::new(StubPipelineService::new());
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "source_uri": "x" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_route_serializes_snapshot() {
        let service = Arc::new(StubPipelineService::new());
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["documents_processed"], 7);
        assert_eq!(json["tables_normalized"], 3);
    }

    #[derive(Clone, Debug)]
    struct IngestCall {
        document: Vec<u8>,
        content_type: String,
        metadata: IngestMetadata,
    }

    struct StubPipelineService {
        calls: Arc<Mutex<Vec<IngestCall>>>,
    }

    impl StubPipelineService {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        async fn recorded_calls(&self) -> Vec<IngestCall> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl PipelineApi for StubPipelineService {
        async fn process_document(
            &self,
            document: Vec<u8>,
            content_type: &str,
            metadata: IngestMetadata,
        ) -> Result<DocumentOutcome, PipelineError> {
            let mut guard = self.calls.lock().await;
            guard.push(IngestCall {
                document,
                content_type: content_type.to_string(),
                metadata,
            });
            Ok(DocumentOutcome {
                chunks: vec![Chunk {
                    chunk_id: "abc".into(),
                    content: "Document body".into(),
                    headers: vec![],
                    page: Some(1),
                    related_images: vec![],
                    related_files: vec![],
                    table_ids: vec![],
                    table_header_hierarchies: vec![],
                    quality_confidence: None,
                    ocr_engine: None,
                    chunk_type: ChunkType::Text,
                    content_vector: vec![0.0; 4],
                }],
                warnings: vec![],
            })
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_processed: 7,
                chunks_produced: 12,
                tables_normalized: 3,
                tables_degraded: 1,
            }
        }
    }
}

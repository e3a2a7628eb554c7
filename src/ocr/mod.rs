//! Table structure recognition via a multimodal OCR endpoint.
//!
//! Complex tables are re-read from their page image by a vision model that
//! returns cell-level structure: positions, spans, roles, and confidence.
//! The HTTP adapter posts the image as a base64 data URI and decodes the
//! cell list straight into the pipeline's cell type.

use crate::pipeline::types::Cell;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors raised during table structure recognition.
#[derive(Debug, Error)]
pub enum TableOcrError {
    /// Endpoint was unreachable or refused the request.
    #[error("Table OCR provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Endpoint returned an error response.
    #[error("Table recognition failed: {0}")]
    RecognitionFailed(String),
    /// Response body could not be parsed.
    #[error("Malformed table OCR response: {0}")]
    InvalidResponse(String),
}

/// Cell-level structure recovered from a table image.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognizedTable {
    /// Recognized cells with positions, spans, and roles.
    pub cells: Vec<Cell>,
    /// Overall recognition confidence reported by the engine.
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Interface implemented by table structure recognition backends.
#[async_trait]
pub trait TableOcrClient: Send + Sync {
    /// Recover cell structure from a rendered table image.
    async fn recognize_table(&self, image: &[u8]) -> Result<RecognizedTable, TableOcrError>;

    /// Engine identifier recorded on chunks built from this backend.
    fn engine_name(&self) -> &str;
}

/// HTTP adapter for vision endpoints accepting a JSON-posted image.
pub struct HttpTableOcrClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
    engine: String,
}

impl HttpTableOcrClient {
    /// Construct a client for the given endpoint.
    pub fn new(base_url: String, api_key: Option<String>, model: Option<String>) -> Self {
        let http = Client::builder()
            .user_agent("gridweave/table-ocr")
            .build()
            .expect("Failed to construct reqwest::Client for table OCR");
        let engine = model.clone().unwrap_or_else(|| "table-ocr".to_string());
        Self {
            http,
            base_url,
            api_key,
            model,
            engine,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/table/analyze", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TableOcrClient for HttpTableOcrClient {
    async fn recognize_table(&self, image: &[u8]) -> Result<RecognizedTable, TableOcrError> {
        let mut payload = json!({
            "image": format!("data:image/png;base64,{}", BASE64.encode(image)),
        });
        if let Some(model) = &self.model {
            payload["model"] = json!(model);
        }

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|error| {
            TableOcrError::ProviderUnavailable(format!(
                "failed to reach table OCR at {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TableOcrError::RecognitionFailed(format!(
                "table OCR returned {status}: {body}"
            )));
        }

        let table: RecognizedTable = response.json().await.map_err(|error| {
            TableOcrError::InvalidResponse(format!("failed to decode table OCR response: {error}"))
        })?;

        tracing::debug!(
            cells = table.cells.len(),
            confidence = ?table.confidence,
            "Table structure recognized"
        );
        Ok(table)
    }

    fn engine_name(&self) -> &str {
        &self.engine
    }
}

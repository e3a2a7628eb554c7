//! Document analysis: layout-aware conversion of source documents to
//! markdown with detected table regions.
//!
//! The HTTP client posts the document as a base64 data URI and expects the
//! provider to return the full markdown rendering plus one entry per
//! detected table, carrying the extracted markup and optional geometry.

use crate::pipeline::types::BoundingBox;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors raised while analyzing a document.
#[derive(Debug, Error)]
pub enum AnalysisClientError {
    /// Endpoint was unreachable or refused the request.
    #[error("Document analysis provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Endpoint returned an error response.
    #[error("Document analysis failed: {0}")]
    AnalysisFailed(String),
    /// Response body could not be parsed.
    #[error("Malformed analysis response: {0}")]
    InvalidResponse(String),
}

/// One table detected during document analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectedTable {
    /// Extracted table markup exactly as it appears in the markdown.
    #[serde(alias = "html")]
    pub markup: String,
    /// URL of the rendered table image, when the provider captured one.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Table position on its page.
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    /// One-based page the table was detected on.
    #[serde(default)]
    pub page_number: Option<u32>,
}

/// Result of analyzing one document.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentAnalysis {
    /// Full markdown rendering of the document.
    #[serde(alias = "content")]
    pub markdown: String,
    /// Tables detected in the document, in reading order.
    #[serde(default)]
    pub tables: Vec<DetectedTable>,
}

/// Interface implemented by document analysis backends.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Convert a document to markdown and detect its tables.
    async fn analyze_document(
        &self,
        document: &[u8],
        content_type: &str,
    ) -> Result<DocumentAnalysis, AnalysisClientError>;
}

/// HTTP adapter for vision endpoints accepting a JSON-posted document.
pub struct HttpAnalysisClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAnalysisClient {
    /// Construct a client for the given endpoint.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .user_agent("gridweave/analysis")
            .build()
            .expect("Failed to construct reqwest::Client for document analysis");
        Self {
            http,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/vision/document/analyze",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze_document(
        &self,
        document: &[u8],
        content_type: &str,
    ) -> Result<DocumentAnalysis, AnalysisClientError> {
        let payload = json!({
            "file": format!("data:{content_type};base64,{}", BASE64.encode(document)),
        });

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|error| {
            AnalysisClientError::ProviderUnavailable(format!(
                "failed to reach analysis provider at {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisClientError::AnalysisFailed(format!(
                "analysis provider returned {status}: {body}"
            )));
        }

        let analysis: DocumentAnalysis = response.json().await.map_err(|error| {
            AnalysisClientError::InvalidResponse(format!(
                "failed to decode analysis response: {error}"
            ))
        })?;

        tracing::debug!(
            tables = analysis.tables.len(),
            markdown_bytes = analysis.markdown.len(),
            "Document analysis completed"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn decodes_markdown_and_tables() {
        let server = MockServer::start_async().await;
        let client = HttpAnalysisClient::new(server.base_url(), Some("key".into()));

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/vision/document/analyze")
                    .header("authorization", "Bearer key")
                    .body_contains("data:application/pdf;base64,");
                then.status(200).json_body(json!({
                    "content": "# Report\n<table><tr><td>x</td></tr></table>",
                    "tables": [{
                        "html": "<table><tr><td>x</td></tr></table>",
                        "image_url": "https://blobs/report/t0.png",
                        "page_number": 2,
                        "bounding_box": {"x": 10.0, "y": 20.0, "width": 100.0, "height": 50.0}
                    }]
                }));
            })
            .await;

        let analysis = client
            .analyze_document(b"%PDF-1.7", "application/pdf")
            .await
            .expect("analysis");

        mock.assert();
        assert!(analysis.markdown.starts_with("# Report"));
        assert_eq!(analysis.tables.len(), 1);
        assert_eq!(analysis.tables[0].page_number, Some(2));
        assert_eq!(
            analysis.tables[0].image_url.as_deref(),
            Some("https://blobs/report/t0.png")
        );
    }

    #[tokio::test]
    async fn table_list_defaults_to_empty() {
        let server = MockServer::start_async().await;
        let client = HttpAnalysisClient::new(server.base_url(), None);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/vision/document/analyze");
                then.status(200).json_body(json!({ "content": "plain text" }));
            })
            .await;

        let analysis = client
            .analyze_document(b"text", "text/plain")
            .await
            .expect("analysis");
        assert!(analysis.tables.is_empty());
    }

    #[tokio::test]
    async fn error_status_surfaces_failure() {
        let server = MockServer::start_async().await;
        let client = HttpAnalysisClient::new(server.base_url(), None);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/vision/document/analyze");
                then.status(500).body("boom");
            })
            .await;

        let error = client
            .analyze_document(b"doc", "application/pdf")
            .await
            .expect_err("error");
        assert!(matches!(error, AnalysisClientError::AnalysisFailed(_)));
    }
}

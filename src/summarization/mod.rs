//! Abstractions for generating semantic table summaries via local providers.
//!
//! Summarization is optional; when no provider is configured the pipeline
//! falls back to a deterministic extractive summary built from the table
//! headers. The Ollama-backed client mirrors the embedding adapter by
//! issuing HTTP requests directly to the runtime.

use crate::config::{SummarizationProvider, get_config};
use crate::pipeline::types::HeaderHierarchy;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors surfaced while attempting abstractive summarization.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider was explicitly disabled or unreachable.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Table context handed to the summarization provider.
#[derive(Debug, Clone)]
pub struct TableSummaryRequest {
    /// Fully qualified model identifier understood by the provider.
    pub model: String,
    /// Pipe-markdown rendering of the normalized table.
    pub table_markdown: String,
    /// Header hierarchy keyed by column index.
    pub header_hierarchy: HeaderHierarchy,
    /// Maximum word budget requested by the caller.
    pub max_words: usize,
}

impl TableSummaryRequest {
    fn prompt(&self) -> String {
        let columns = self
            .header_hierarchy
            .values()
            .map(|path| path.join(" > "))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Summarize the following table in at most {} words. Describe what the \
             table measures and any notable values. Columns: {columns}\n\n{}",
            self.max_words, self.table_markdown
        )
    }
}

/// Interface implemented by abstractive summarization providers.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Generate a concise semantic summary of a normalized table.
    async fn summarize_table(
        &self,
        request: TableSummaryRequest,
    ) -> Result<String, SummarizationClientError>;
}

/// Deterministic summary assembled from the header hierarchy, used when no
/// provider is configured or the provider degrades.
pub fn extractive_summary(hierarchy: &HeaderHierarchy, row_count: usize) -> String {
    let columns = hierarchy
        .values()
        .map(|path| path.join(" > "))
        .collect::<Vec<_>>()
        .join(", ");
    if columns.is_empty() {
        format!("Table with {row_count} data rows.")
    } else {
        format!("Table with {row_count} data rows and columns: {columns}.")
    }
}

/// Build a summarization client based on configuration.
pub fn get_summarization_client() -> Option<Box<dyn SummarizationClient + Send + Sync>> {
    let config = get_config();
    match config.summarization_provider {
        SummarizationProvider::None => None,
        SummarizationProvider::Ollama => {
            let base_url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Some(Box::new(OllamaSummarizationClient::new(base_url)))
        }
    }
}

struct OllamaSummarizationClient {
    http: Client,
    base_url: String,
}

impl OllamaSummarizationClient {
    fn new(base_url: String) -> Self {
        let http = Client::builder()
            .user_agent("gridweave/summary")
            .build()
            .expect("Failed to construct reqwest::Client for summarization");
        Self { http, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl SummarizationClient for OllamaSummarizationClient {
    async fn summarize_table(
        &self,
        request: TableSummaryRequest,
    ) -> Result<String, SummarizationClientError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt(),
            "stream": false,
            "options": {
                // Lower temperature for deterministic summaries.
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SummarizationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(SummarizationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

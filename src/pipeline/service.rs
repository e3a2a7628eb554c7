//! Pipeline service coordinating analysis, table normalization, chunk
//! assembly, and embedding.

use crate::{
    analysis::{AnalysisClient, DocumentAnalysis, HttpAnalysisClient},
    config::get_config,
    embedding::{EmbeddingClient, get_embedding_client},
    metrics::{MetricsSnapshot, PipelineMetrics},
    ocr::{HttpTableOcrClient, TableOcrClient},
    pipeline::{
        assemble::{self, AssembleOptions},
        classify, grid, headers, markers, render, splitter,
        types::{
            DocumentOutcome, IngestMetadata, NormalizedTable, PipelineError, PipelineWarning,
            TableRegion,
        },
    },
    storage::{ArtifactStore, FsArtifactStore},
    summarization::{
        SummarizationClient, TableSummaryRequest, extractive_summary, get_summarization_client,
    },
};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Coordinates the full document pipeline: analysis, marker substitution,
/// concurrent table normalization, chunk assembly, and embedding.
///
/// The service owns long-lived handles to every provider so the HTTP
/// surface reuses the same components across requests. Construct it once
/// near process start and share it through an `Arc`.
pub struct PipelineService {
    analysis_client: Box<dyn AnalysisClient>,
    ocr_client: Box<dyn TableOcrClient>,
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    summarization_client: Option<Box<dyn SummarizationClient + Send + Sync>>,
    artifact_store: Box<dyn ArtifactStore>,
    metrics: Arc<PipelineMetrics>,
    token_counter: splitter::TokenCounter,
}

/// Abstraction over the pipeline used by external surfaces.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Run the full pipeline over one document.
    async fn process_document(
        &self,
        document: Vec<u8>,
        content_type: &str,
        metadata: IngestMetadata,
    ) -> Result<DocumentOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl PipelineService {
    /// Build a new pipeline service from the loaded configuration.
    pub fn new() -> Self {
        let config = get_config();
        tracing::info!("Initializing pipeline providers");
        let analysis_client = Box::new(HttpAnalysisClient::new(
            config.analysis_url.clone(),
            config.analysis_api_key.clone(),
        ));
        let ocr_client = Box::new(HttpTableOcrClient::new(
            config.table_ocr_url.clone(),
            config.table_ocr_api_key.clone(),
            None,
        ));
        let artifact_store = Box::new(FsArtifactStore::new(config.artifact_dir.clone()));
        let token_counter = splitter::build_token_counter(&config.embedding_model);
        tracing::info!("Pipeline providers initialized");

        Self {
            analysis_client,
            ocr_client,
            embedding_client: get_embedding_client(),
            summarization_client: get_summarization_client(),
            artifact_store,
            metrics: Arc::new(PipelineMetrics::new()),
            token_counter,
        }
    }

    /// Build a pipeline service from explicit provider handles.
    pub fn with_clients(
        analysis_client: Box<dyn AnalysisClient>,
        ocr_client: Box<dyn TableOcrClient>,
        embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
        summarization_client: Option<Box<dyn SummarizationClient + Send + Sync>>,
        artifact_store: Box<dyn ArtifactStore>,
        token_counter: splitter::TokenCounter,
    ) -> Self {
        Self {
            analysis_client,
            ocr_client,
            embedding_client,
            summarization_client,
            artifact_store,
            metrics: Arc::new(PipelineMetrics::new()),
            token_counter,
        }
    }

    /// Run the full pipeline over one document.
    ///
    /// Analysis failure is fatal for the document; every later failure
    /// degrades only the table or chunk it concerns and is reported through
    /// [`DocumentOutcome::warnings`].
    pub async fn process_document(
        &self,
        document: Vec<u8>,
        content_type: &str,
        metadata: IngestMetadata,
    ) -> Result<DocumentOutcome, PipelineError> {
        let config = get_config();
        tracing::info!(
            content_type,
            bytes = document.len(),
            source = ?metadata.source_uri,
            "Processing document"
        );

        let analysis = self.analyze_with_retry(&document, content_type).await?;
        let regions = mint_regions(&analysis);
        let (marked, map, mut warnings) = markers::substitute(&analysis.markdown, regions);

        let complex: Vec<TableRegion> = map
            .regions()
            .filter(|region| {
                classify::is_complex(&region.source_markup, config.table_header_cell_fraction)
            })
            .cloned()
            .collect();
        tracing::debug!(
            detected = map.len(),
            complex = complex.len(),
            "Tables classified"
        );

        // The marker map is complete before any table work begins; tables
        // then normalize independently under the configured bound.
        let results: Vec<_> = stream::iter(complex)
            .map(|region| async move { self.normalize_table(region).await })
            .buffer_unordered(config.table_concurrency)
            .collect()
            .await;

        let mut tables = BTreeMap::new();
        for result in results {
            match result {
                Ok((table, table_warnings)) => {
                    warnings.extend(table_warnings);
                    tables.insert(table.table_id.clone(), table);
                }
                Err((table_id, reason)) => {
                    tracing::warn!(table_id = %table_id, reason = %reason, "Table degraded");
                    warnings.push(PipelineWarning::TableDegraded { table_id, reason });
                }
            }
        }

        let options = AssembleOptions {
            source: metadata
                .source_uri
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            max_tokens: config.chunk_max_tokens,
            overlap: config.chunk_token_overlap,
            counter: self.token_counter.clone(),
            ocr_engine: (!tables.is_empty())
                .then(|| self.ocr_client.engine_name().to_string()),
        };
        let (drafts, assemble_warnings) = assemble::assemble(&marked, &map, &tables, &options)
            .map_err(|error| PipelineError::Chunking(error.to_string()))?;
        warnings.extend(assemble_warnings);

        let mut chunks = Vec::with_capacity(drafts.len());
        for draft in drafts {
            match self
                .embedding_client
                .generate_embeddings(vec![draft.content.clone()])
                .await
            {
                Ok(mut vectors) => match vectors.pop() {
                    Some(vector) => chunks.push(draft.into_chunk(vector)),
                    None => warnings.push(PipelineWarning::ChunkEmbeddingFailed {
                        chunk_id: draft.chunk_id,
                        reason: "provider returned no vector".to_string(),
                    }),
                },
                Err(error) => {
                    tracing::warn!(chunk_id = %draft.chunk_id, error = %error, "Chunk embedding failed");
                    warnings.push(PipelineWarning::ChunkEmbeddingFailed {
                        chunk_id: draft.chunk_id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        let degraded = warnings
            .iter()
            .filter(|warning| matches!(warning, PipelineWarning::TableDegraded { .. }))
            .count();
        self.metrics
            .record_document(chunks.len() as u64, tables.len() as u64, degraded as u64);
        tracing::info!(
            chunks = chunks.len(),
            normalized_tables = tables.len(),
            degraded_tables = degraded,
            warnings = warnings.len(),
            "Document processed"
        );

        Ok(DocumentOutcome { chunks, warnings })
    }

    async fn analyze_with_retry(
        &self,
        document: &[u8],
        content_type: &str,
    ) -> Result<DocumentAnalysis, PipelineError> {
        let max_attempts = get_config().analysis_max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .analysis_client
                .analyze_document(document, content_type)
                .await
            {
                Ok(analysis) => return Ok(analysis),
                Err(error) if attempt < max_attempts => {
                    tracing::warn!(attempt, error = %error, "Document analysis attempt failed");
                }
                Err(error) => return Err(PipelineError::Analysis(error)),
            }
        }
    }

    /// Normalize one complex table: fetch its image, recognize structure,
    /// render artifacts, and summarize.
    async fn normalize_table(
        &self,
        region: TableRegion,
    ) -> Result<(NormalizedTable, Vec<PipelineWarning>), (String, String)> {
        let config = get_config();
        let table_id = region.table_id.clone();
        let degrade = |reason: String| (table_id.clone(), reason);

        let image_reference = region
            .image_reference
            .as_deref()
            .ok_or_else(|| degrade("no table image available".to_string()))?;
        let image = self
            .artifact_store
            .fetch_artifact(image_reference)
            .await
            .map_err(|error| degrade(error.to_string()))?;

        let recognized = self
            .ocr_client
            .recognize_table(&image)
            .await
            .map_err(|error| degrade(error.to_string()))?;
        let grid = grid::normalize(&recognized.cells).map_err(|error| degrade(error.to_string()))?;
        let hierarchy = headers::build_hierarchy(&grid, &recognized.cells);
        let rendered = render::render(
            &grid,
            &hierarchy,
            &recognized.cells,
            config.default_cell_confidence,
        );

        let mut warnings = Vec::new();
        let data_rows = grid.rows() - headers::header_row_count(&grid, &recognized.cells);
        let semantic_summary = match &self.summarization_client {
            Some(client) => {
                let request = TableSummaryRequest {
                    model: config.summarization_model.clone().unwrap_or_default(),
                    table_markdown: rendered.markdown.clone(),
                    header_hierarchy: hierarchy.clone(),
                    max_words: 120,
                };
                match client.summarize_table(request).await {
                    Ok(summary) => summary,
                    Err(error) => {
                        // Summary is enrichment, not structural data; the
                        // table proceeds with an empty one.
                        tracing::warn!(table_id = %table_id, error = %error, "Table summary unavailable");
                        warnings.push(PipelineWarning::SummaryUnavailable {
                            table_id: table_id.clone(),
                            reason: error.to_string(),
                        });
                        String::new()
                    }
                }
            }
            None => extractive_summary(&hierarchy, data_rows),
        };

        let artifact_urls = self
            .publish_artifacts(&table_id, &recognized, &rendered, &hierarchy, &semantic_summary)
            .await;

        Ok((
            NormalizedTable {
                table_id,
                grid,
                header_hierarchy: hierarchy,
                markdown: rendered.markdown,
                csv_bytes: rendered.csv_bytes,
                schema: rendered.schema,
                semantic_summary,
                quality_confidence: rendered.quality_confidence,
                artifact_urls,
            },
            warnings,
        ))
    }

    /// Write the per-table artifact set; individual write failures are
    /// logged and skipped so a slow disk never degrades the table itself.
    async fn publish_artifacts(
        &self,
        table_id: &str,
        recognized: &crate::ocr::RecognizedTable,
        rendered: &render::RenderedTable,
        hierarchy: &crate::pipeline::types::HeaderHierarchy,
        semantic_summary: &str,
    ) -> Vec<String> {
        let ocr_json = serde_json::json!({
            "cells": recognized.cells,
            "confidence": recognized.confidence,
        });
        let schema_json = serde_json::to_vec(&rendered.schema).unwrap_or_default();
        let semantic_json = serde_json::json!({
            "header_hierarchy": hierarchy,
            "summary": semantic_summary,
        });

        let artifacts: [(String, Vec<u8>); 5] = [
            (format!("{table_id}.ocr.json"), ocr_json.to_string().into_bytes()),
            (format!("{table_id}.csv"), rendered.csv_bytes.clone()),
            (format!("{table_id}.md"), rendered.markdown.clone().into_bytes()),
            (format!("{table_id}.schema.json"), schema_json),
            (
                format!("{table_id}.semantic.json"),
                semantic_json.to_string().into_bytes(),
            ),
        ];

        let mut urls = Vec::with_capacity(artifacts.len());
        for (name, bytes) in artifacts {
            match self.artifact_store.store_artifact(&name, &bytes).await {
                Ok(url) => urls.push(url),
                Err(error) => {
                    tracing::warn!(table_id, artifact = %name, error = %error, "Artifact write failed");
                }
            }
        }
        urls
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Assign run-scoped ids to the tables detected by analysis.
fn mint_regions(analysis: &DocumentAnalysis) -> Vec<TableRegion> {
    analysis
        .tables
        .iter()
        .map(|table| TableRegion {
            table_id: uuid::Uuid::new_v4().to_string(),
            source_markup: table.markup.clone(),
            image_reference: table.image_url.clone(),
            bounding_box: table.bounding_box,
            page_number: table.page_number,
        })
        .collect()
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn process_document(
        &self,
        document: Vec<u8>,
        content_type: &str,
        metadata: IngestMetadata,
    ) -> Result<DocumentOutcome, PipelineError> {
        PipelineService::process_document(self, document, content_type, metadata).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        PipelineService::metrics_snapshot(self)
    }
}

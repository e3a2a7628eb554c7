//! Core data types and error definitions for the table-aware pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A table detected during document analysis.
///
/// Regions are immutable once created; one exists per detected table. The
/// `table_id` is minted by the pipeline run and scopes all derived state
/// (markers, normalized tables, artifacts) to that run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRegion {
    /// Identifier unique within the owning pipeline run.
    pub table_id: String,
    /// Raw HTML/markdown fragment as emitted by the analysis provider.
    pub source_markup: String,
    /// Reference to the cropped table image, when the provider produced one.
    pub image_reference: Option<String>,
    /// Bounding box of the table on its page, in provider units.
    pub bounding_box: Option<BoundingBox>,
    /// One-based page number the table was detected on.
    pub page_number: Option<u32>,
}

/// Axis-aligned rectangle in provider coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width of the rectangle.
    pub width: f64,
    /// Height of the rectangle.
    pub height: f64,
}

/// Role assigned to a cell by the OCR provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellRole {
    /// Cell belongs to a header row group.
    Header,
    /// Cell carries table data.
    Data,
}

impl Default for CellRole {
    fn default() -> Self {
        Self::Data
    }
}

/// A single cell reported by the table OCR provider.
///
/// A cell occupies the rectangle `[row, row + rowspan) x [col, col + colspan)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Zero-based row of the cell's top-left corner.
    pub row: usize,
    /// Zero-based column of the cell's top-left corner.
    pub col: usize,
    /// Number of rows the cell spans; at least 1.
    #[serde(default = "default_span")]
    pub rowspan: usize,
    /// Number of columns the cell spans; at least 1.
    #[serde(default = "default_span")]
    pub colspan: usize,
    /// Text content recognized for the cell.
    #[serde(default)]
    pub text: String,
    /// Header or data role.
    #[serde(default)]
    pub role: CellRole,
    /// Per-cell recognition confidence in `[0, 1]`, when reported.
    #[serde(default)]
    pub confidence: Option<f32>,
}

fn default_span() -> usize {
    1
}

/// Dense rectangular grid of cell text derived from sparse, spanning cells.
///
/// After normalization every coordinate in `[0, rows) x [0, cols)` is
/// populated, possibly with an empty string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<String>,
}

impl Grid {
    pub(crate) fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![String::new(); rows * cols],
        }
    }

    /// Number of rows in the grid.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns in the grid.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Text at the given coordinate. Panics when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> &str {
        &self.cells[row * self.cols + col]
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, text: &str) {
        self.cells[row * self.cols + col] = text.to_string();
    }

    /// Borrow one full row of the grid.
    pub fn row(&self, row: usize) -> &[String] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }
}

/// Per-column ordered header labels from outermost to innermost.
pub type HeaderHierarchy = BTreeMap<usize, Vec<String>>;

/// Inferred primitive type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Values parse as numbers.
    Number,
    /// Values parse as calendar dates.
    Date,
    /// Free-form text, the default.
    String,
}

/// Schema entry for a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Display name, taken from the innermost header label.
    pub name: String,
    /// Inferred primitive type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Typed schema derived from the normalized grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// One entry per grid column, in column order.
    pub columns: Vec<ColumnSchema>,
}

/// Fully normalized representation of one complex table.
///
/// Written once per table id during a pipeline run and referenced from
/// chunks and the marker restoration step.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    /// Identifier shared with the originating [`TableRegion`].
    pub table_id: String,
    /// Dense grid recovered from OCR cells.
    pub grid: Grid,
    /// Per-column header label paths.
    pub header_hierarchy: HeaderHierarchy,
    /// Pipe-table rendering used when restoring markers.
    pub markdown: String,
    /// CSV rendering of the full grid.
    pub csv_bytes: Vec<u8>,
    /// Per-column inferred schema.
    pub schema: TableSchema,
    /// Semantic summary produced by the summarization capability; empty when
    /// summarization was unavailable.
    pub semantic_summary: String,
    /// Mean per-cell OCR confidence.
    pub quality_confidence: f32,
    /// URLs of the published artifacts for this table.
    pub artifact_urls: Vec<String>,
}

/// Classification of a produced chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// Plain text segment without restored tables.
    Text,
    /// Segment containing at least one normalized table.
    TableEnriched,
}

/// A retrieval-ready unit of document text with structural metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// Stable identifier derived from the source URI and chunk ordinal.
    pub chunk_id: String,
    /// Restored chunk content.
    pub content: String,
    /// Heading breadcrumb tracked by the splitter.
    pub headers: Vec<String>,
    /// One-based page number attributed to the chunk, when known.
    pub page: Option<u32>,
    /// Table image references for tables restored into this chunk.
    pub related_images: Vec<String>,
    /// Artifact URLs for tables restored into this chunk.
    pub related_files: Vec<String>,
    /// Ids of tables referenced by this chunk.
    pub table_ids: Vec<String>,
    /// Header hierarchies of the referenced tables, in `table_ids` order.
    pub table_header_hierarchies: Vec<HeaderHierarchy>,
    /// Minimum quality confidence over the referenced normalized tables.
    pub quality_confidence: Option<f32>,
    /// Identifier of the OCR engine that recognized the referenced tables.
    pub ocr_engine: Option<String>,
    /// Text or table-enriched.
    pub chunk_type: ChunkType,
    /// Embedding vector for the restored content.
    pub content_vector: Vec<f32>,
}

/// OCR input produced zero rows or zero columns.
#[derive(Debug, Error)]
#[error("malformed table: resolved to {rows} rows x {cols} cols")]
pub struct MalformedTableError {
    /// Resolved row count.
    pub rows: usize,
    /// Resolved column count.
    pub cols: usize,
}

/// Document-fatal pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The analysis provider failed for the whole document; nothing proceeds.
    #[error("document analysis failed: {0}")]
    Analysis(#[from] crate::analysis::AnalysisClientError),
    /// Segmentation rejected the configured token budget.
    #[error("chunk assembly failed: {0}")]
    Chunking(String),
}

/// Non-fatal findings accumulated during a pipeline run.
///
/// Warnings are keyed by table id or chunk id so callers can attribute
/// partial failures; a document response always pairs its chunks with this
/// list.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// A detected table's markup could not be located in the document text.
    RegionNotFound {
        /// Table whose markup was missing.
        table_id: String,
    },
    /// OCR or normalization failed; the table fell back to original markup.
    TableDegraded {
        /// Affected table.
        table_id: String,
        /// Human-readable cause.
        reason: String,
    },
    /// Summarization failed; the table carries an empty semantic summary.
    SummaryUnavailable {
        /// Affected table.
        table_id: String,
        /// Human-readable cause.
        reason: String,
    },
    /// A marker survived restoration, indicating a data-integrity defect.
    UnresolvedMarker {
        /// Table id encoded in the dangling marker.
        table_id: String,
    },
    /// Embedding failed for one chunk; the chunk is excluded from output.
    ChunkEmbeddingFailed {
        /// Affected chunk.
        chunk_id: String,
        /// Human-readable cause.
        reason: String,
    },
}

/// Result of processing one document: completed chunks plus any warnings.
///
/// Partial success is a valid outcome; callers must consult `warnings` to
/// learn about degraded tables or dropped chunks.
#[derive(Debug, Serialize)]
pub struct DocumentOutcome {
    /// Chunks that completed through embedding.
    pub chunks: Vec<Chunk>,
    /// Warnings keyed by table or chunk id.
    pub warnings: Vec<PipelineWarning>,
}

/// Optional metadata supplied with an ingest request.
#[derive(Debug, Default, Clone)]
pub struct IngestMetadata {
    /// URI of the source document, used to derive stable chunk ids.
    pub source_uri: Option<String>,
}

//! Table-aware ingestion pipeline: analysis, normalization, and chunk assembly.

pub mod assemble;
pub mod classify;
pub mod grid;
pub mod headers;
pub mod markers;
pub mod pages;
pub mod render;
mod service;
pub mod splitter;
pub mod types;

pub use service::{PipelineApi, PipelineService};
pub use types::{
    Chunk, ChunkType, DocumentOutcome, IngestMetadata, MalformedTableError, NormalizedTable,
    PipelineError, PipelineWarning, TableRegion,
};

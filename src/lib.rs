#![deny(missing_docs)]

//! Core library for the Gridweave ingestion server.

/// Document analysis provider abstraction and adapters.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Table OCR provider abstraction and adapters.
pub mod ocr;
/// Table-aware document processing pipeline.
pub mod pipeline;
/// Artifact storage abstraction.
pub mod storage;
/// Summarization client abstraction and adapters.
pub mod summarization;

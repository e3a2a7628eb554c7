//! Chunk assembly: segmentation, marker restoration, and metadata
//! enrichment.
//!
//! Assembly is a pure function of the marked document, the marker map, and
//! the normalized-table arena; it runs only after every referenced table has
//! completed, so no chunk can be finalized with a dangling marker.

use super::markers::{self, MarkerMap};
use super::pages;
use super::splitter::{self, SplitterError, TokenCounter};
use super::types::{Chunk, ChunkType, HeaderHierarchy, NormalizedTable, PipelineWarning};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Parameters controlling segmentation and chunk identity.
pub struct AssembleOptions {
    /// Source URI used to derive stable chunk ids.
    pub source: String,
    /// Maximum token budget per chunk.
    pub max_tokens: usize,
    /// Sliding token overlap for oversized segments.
    pub overlap: usize,
    /// Token counter shared with the splitter.
    pub counter: TokenCounter,
    /// Identifier of the OCR engine behind the normalized tables.
    pub ocr_engine: Option<String>,
}

/// A chunk awaiting its embedding vector.
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    /// Stable identifier derived from the source URI and chunk ordinal.
    pub chunk_id: String,
    /// Restored chunk content.
    pub content: String,
    /// Heading breadcrumb for the segment.
    pub headers: Vec<String>,
    /// Page attributed to the chunk.
    pub page: Option<u32>,
    /// Image references of tables restored into this chunk.
    pub related_images: Vec<String>,
    /// Artifact URLs of tables restored into this chunk.
    pub related_files: Vec<String>,
    /// Every table id referenced by the segment.
    pub table_ids: Vec<String>,
    /// Header hierarchies of the normalized tables among `table_ids`.
    pub table_header_hierarchies: Vec<HeaderHierarchy>,
    /// Minimum quality confidence over the referenced normalized tables.
    pub quality_confidence: Option<f32>,
    /// OCR engine identifier, set when a normalized table is present.
    pub ocr_engine: Option<String>,
    /// Text or table-enriched.
    pub chunk_type: ChunkType,
}

impl ChunkDraft {
    /// Attach the embedding vector, producing a terminal [`Chunk`].
    pub fn into_chunk(self, content_vector: Vec<f32>) -> Chunk {
        Chunk {
            chunk_id: self.chunk_id,
            content: self.content,
            headers: self.headers,
            page: self.page,
            related_images: self.related_images,
            related_files: self.related_files,
            table_ids: self.table_ids,
            table_header_hierarchies: self.table_header_hierarchies,
            quality_confidence: self.quality_confidence,
            ocr_engine: self.ocr_engine,
            chunk_type: self.chunk_type,
            content_vector,
        }
    }
}

/// Segment the marked document, restore tables per segment, and enrich
/// each resulting chunk with structural metadata.
pub fn assemble(
    marked_markdown: &str,
    map: &MarkerMap,
    tables: &BTreeMap<String, NormalizedTable>,
    options: &AssembleOptions,
) -> Result<(Vec<ChunkDraft>, Vec<PipelineWarning>), SplitterError> {
    let numbered = pages::number_page_breaks(marked_markdown);
    let segments = splitter::split_markdown(
        &numbered,
        options.max_tokens,
        options.overlap,
        &options.counter,
    )?;

    let mut drafts = Vec::with_capacity(segments.len());
    let mut warnings = Vec::new();
    let mut current_page = 1u32;

    for (ordinal, segment) in segments.into_iter().enumerate() {
        current_page = pages::update_page(&segment.content, current_page);
        let page = pages::chunk_page(&segment.content, current_page);

        let table_ids = markers::markers_in(&segment.content);
        let (content, restore_warnings) = markers::restore(&segment.content, map, tables);
        warnings.extend(restore_warnings);

        let related_images = table_ids
            .iter()
            .filter_map(|id| map.region(id))
            .filter_map(|region| region.image_reference.clone())
            .collect();

        let normalized: Vec<&NormalizedTable> = table_ids
            .iter()
            .filter_map(|id| tables.get(id))
            .collect();

        let related_files = normalized
            .iter()
            .flat_map(|table| table.artifact_urls.iter().cloned())
            .collect();
        let table_header_hierarchies = normalized
            .iter()
            .map(|table| table.header_hierarchy.clone())
            .collect();
        // Minimum over the referenced tables surfaces the worst case.
        let quality_confidence = normalized
            .iter()
            .map(|table| table.quality_confidence)
            .fold(None, |acc: Option<f32>, value| {
                Some(acc.map_or(value, |current| current.min(value)))
            });

        let chunk_type = if normalized.is_empty() {
            ChunkType::Text
        } else {
            ChunkType::TableEnriched
        };

        drafts.push(ChunkDraft {
            chunk_id: chunk_id(&options.source, ordinal),
            content,
            headers: segment.headers,
            page: Some(page),
            related_images,
            related_files,
            table_ids,
            table_header_hierarchies,
            quality_confidence,
            ocr_engine: if matches!(chunk_type, ChunkType::TableEnriched) {
                options.ocr_engine.clone()
            } else {
                None
            },
            chunk_type,
        });
    }

    Ok((drafts, warnings))
}

/// Stable digest of `source|ordinal`, stable across pipeline restarts.
fn chunk_id(source: &str, ordinal: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"|");
    hasher.update(ordinal.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::markers::{marker_for, substitute};
    use crate::pipeline::splitter::whitespace_counter;
    use crate::pipeline::types::{Grid, TableRegion, TableSchema};

    fn options() -> AssembleOptions {
        AssembleOptions {
            source: "https://example.org/report.pdf".into(),
            max_tokens: 100,
            overlap: 0,
            counter: whitespace_counter(),
            ocr_engine: Some("pixtral".into()),
        }
    }

    fn region(table_id: &str, markup: &str, image: Option<&str>) -> TableRegion {
        TableRegion {
            table_id: table_id.into(),
            source_markup: markup.into(),
            image_reference: image.map(Into::into),
            bounding_box: None,
            page_number: None,
        }
    }

    fn normalized(table_id: &str, markdown: &str, confidence: f32) -> NormalizedTable {
        NormalizedTable {
            table_id: table_id.into(),
            grid: Grid::new(1, 1),
            header_hierarchy: HeaderHierarchy::from([(0, vec!["H".to_string()])]),
            markdown: markdown.into(),
            csv_bytes: Vec::new(),
            schema: TableSchema { columns: vec![] },
            semantic_summary: String::new(),
            quality_confidence: confidence,
            artifact_urls: vec![format!("artifacts/{table_id}.csv")],
        }
    }

    #[test]
    fn table_enriched_only_for_normalized_tables() {
        let simple = r#"<table border="1"><tr><th>a</th></tr><tr><td>1</td></tr></table>"#;
        let complex = r#"<table><tr><td rowspan="2">x</td></tr></table>"#;
        let markdown = format!("# One\nintro {simple}\n# Two\noutro {complex}");
        let regions = vec![
            region("simple", simple, None),
            region("complex", complex, Some("img/complex.png")),
        ];
        let (marked, map, _) = substitute(&markdown, regions);

        let mut tables = BTreeMap::new();
        tables.insert(
            "complex".to_string(),
            normalized("complex", "| H |\n| --- |\n| x |", 0.8),
        );

        let (drafts, warnings) = assemble(&marked, &map, &tables, &options()).expect("assemble");
        assert!(warnings.is_empty());
        assert_eq!(drafts.len(), 2);

        let simple_chunk = &drafts[0];
        assert_eq!(simple_chunk.chunk_type, ChunkType::Text);
        assert!(simple_chunk.content.contains(simple));
        assert_eq!(simple_chunk.table_ids, vec!["simple"]);
        assert!(simple_chunk.related_files.is_empty());
        assert!(simple_chunk.quality_confidence.is_none());
        assert!(simple_chunk.ocr_engine.is_none());

        let complex_chunk = &drafts[1];
        assert_eq!(complex_chunk.chunk_type, ChunkType::TableEnriched);
        assert!(complex_chunk.content.contains("| H |"));
        assert_eq!(complex_chunk.related_images, vec!["img/complex.png"]);
        assert_eq!(complex_chunk.related_files, vec!["artifacts/complex.csv"]);
        assert_eq!(complex_chunk.quality_confidence, Some(0.8));
        assert_eq!(complex_chunk.ocr_engine.as_deref(), Some("pixtral"));
        assert_eq!(complex_chunk.table_header_hierarchies.len(), 1);
    }

    #[test]
    fn quality_is_minimum_over_referenced_tables() {
        let first = "<table><tr><td>1</td></tr></table>";
        let second = "<table><tr><td>2</td></tr></table>";
        let markdown = format!("both {first} and {second} together");
        let regions = vec![region("t1", first, None), region("t2", second, None)];
        let (marked, map, _) = substitute(&markdown, regions);

        let mut tables = BTreeMap::new();
        tables.insert("t1".to_string(), normalized("t1", "| a |", 0.9));
        tables.insert("t2".to_string(), normalized("t2", "| b |", 0.6));

        let (drafts, _) = assemble(&marked, &map, &tables, &options()).expect("assemble");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].quality_confidence, Some(0.6));
        assert_eq!(drafts[0].table_ids, vec!["t1", "t2"]);
    }

    #[test]
    fn chunk_ids_are_stable_across_runs() {
        let markdown = "# A\nfirst\n# B\nsecond";
        let map = MarkerMap::default();
        let tables = BTreeMap::new();
        let (one, _) = assemble(markdown, &map, &tables, &options()).expect("assemble");
        let (two, _) = assemble(markdown, &map, &tables, &options()).expect("assemble");
        assert_eq!(one[0].chunk_id, two[0].chunk_id);
        assert_ne!(one[0].chunk_id, one[1].chunk_id);
    }

    #[test]
    fn page_breaks_attribute_pages_to_chunks() {
        let markdown = "# A\npage one text\n<!-- PageBreak -->\n# B\npage two text";
        let map = MarkerMap::default();
        let tables = BTreeMap::new();
        let (drafts, _) = assemble(markdown, &map, &tables, &options()).expect("assemble");
        assert_eq!(drafts[0].page, Some(1));
        assert_eq!(drafts[1].page, Some(2));
    }

    #[test]
    fn unresolved_marker_surfaces_warning() {
        let markdown = format!("text {}", marker_for("ghost"));
        let (drafts, warnings) =
            assemble(&markdown, &MarkerMap::default(), &BTreeMap::new(), &options())
                .expect("assemble");
        assert!(drafts[0].content.contains("gridweave-table:ghost"));
        assert!(matches!(
            warnings.as_slice(),
            [PipelineWarning::UnresolvedMarker { table_id }] if table_id == "ghost"
        ));
    }
}

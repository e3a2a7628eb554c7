//! Marker substitution: swapping table markup for opaque placeholder tokens.
//!
//! Markers form a temporary cross-reference between the document text and
//! the structured table data evolving alongside it. The mapping is an
//! explicit id-keyed side table so restoration is a pure lookup; it is
//! fully constructed before any concurrent table work begins and never
//! mutated afterwards.

use super::types::{NormalizedTable, PipelineWarning, TableRegion};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Marker tokens avoid heading and whitespace characters so the
/// heading-aware splitter treats them as atomic.
const MARKER_OPEN: &str = "[[gridweave-table:";
const MARKER_CLOSE: &str = "]]";

fn marker_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\[gridweave-table:([0-9A-Za-z_-]+)\]\]").expect("valid marker pattern")
    })
}

/// Render the marker token for a table id.
pub fn marker_for(table_id: &str) -> String {
    format!("{MARKER_OPEN}{table_id}{MARKER_CLOSE}")
}

/// Immutable id-keyed side table built during substitution.
#[derive(Debug, Default)]
pub struct MarkerMap {
    regions: BTreeMap<String, TableRegion>,
}

impl MarkerMap {
    /// Look up the region recorded for a table id.
    pub fn region(&self, table_id: &str) -> Option<&TableRegion> {
        self.regions.get(table_id)
    }

    /// Iterate over all recorded regions.
    pub fn regions(&self) -> impl Iterator<Item = &TableRegion> {
        self.regions.values()
    }

    /// Number of markers placed in the document.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// True when no markers were placed.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Replace each region's source markup with a marker token.
///
/// The first unconsumed occurrence of each region's markup is replaced, in
/// region order. A region whose markup cannot be located produces a
/// [`PipelineWarning::RegionNotFound`] and no marker.
pub fn substitute(
    markdown: &str,
    regions: Vec<TableRegion>,
) -> (String, MarkerMap, Vec<PipelineWarning>) {
    let mut text = markdown.to_string();
    let mut map = MarkerMap::default();
    let mut warnings = Vec::new();

    for region in regions {
        match text.find(&region.source_markup) {
            Some(position) => {
                let marker = marker_for(&region.table_id);
                text.replace_range(position..position + region.source_markup.len(), &marker);
                map.regions.insert(region.table_id.clone(), region);
            }
            None => {
                tracing::warn!(table_id = %region.table_id, "Table markup not found in document");
                warnings.push(PipelineWarning::RegionNotFound {
                    table_id: region.table_id,
                });
            }
        }
    }

    (text, map, warnings)
}

/// Table ids referenced by markers present in `text`, in document order.
pub fn markers_in(text: &str) -> Vec<String> {
    marker_pattern()
        .captures_iter(text)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Replace markers with the best available rendering for each table.
///
/// Normalized tables contribute their markdown; tables without a normalized
/// entry silently fall back to the original source markup. Markers whose id
/// is absent from the map are left in place and reported as data-integrity
/// warnings; they must never be shipped silently.
pub fn restore(
    text: &str,
    map: &MarkerMap,
    tables: &BTreeMap<String, NormalizedTable>,
) -> (String, Vec<PipelineWarning>) {
    let mut restored = text.to_string();

    for table_id in markers_in(text) {
        let Some(region) = map.region(&table_id) else {
            continue;
        };
        let replacement = tables
            .get(&table_id)
            .map(|table| table.markdown.as_str())
            .unwrap_or(region.source_markup.as_str());
        restored = restored.replace(&marker_for(&table_id), replacement);
    }

    let warnings = markers_in(&restored)
        .into_iter()
        .map(|table_id| {
            tracing::warn!(table_id = %table_id, "Unresolved table marker in restored output");
            PipelineWarning::UnresolvedMarker { table_id }
        })
        .collect();

    (restored, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{
        Grid, HeaderHierarchy, TableSchema,
    };

    fn region(table_id: &str, markup: &str) -> TableRegion {
        TableRegion {
            table_id: table_id.into(),
            source_markup: markup.into(),
            image_reference: None,
            bounding_box: None,
            page_number: None,
        }
    }

    fn normalized(table_id: &str, markdown: &str) -> NormalizedTable {
        NormalizedTable {
            table_id: table_id.into(),
            grid: Grid::new(1, 1),
            header_hierarchy: HeaderHierarchy::new(),
            markdown: markdown.into(),
            csv_bytes: Vec::new(),
            schema: TableSchema { columns: vec![] },
            semantic_summary: String::new(),
            quality_confidence: 1.0,
            artifact_urls: Vec::new(),
        }
    }

    #[test]
    fn round_trip_reproduces_original_markdown() {
        let markdown = "intro\n<table><tr><td>a</td></tr></table>\noutro";
        let regions = vec![region("t1", "<table><tr><td>a</td></tr></table>")];
        let (marked, map, warnings) = substitute(markdown, regions);
        assert!(warnings.is_empty());
        assert!(marked.contains(&marker_for("t1")));

        let (restored, warnings) = restore(&marked, &map, &BTreeMap::new());
        assert!(warnings.is_empty());
        assert_eq!(restored, markdown);
    }

    #[test]
    fn restore_prefers_normalized_markdown() {
        let markdown = "before [[x]] <table><tr><td>raw</td></tr></table> after";
        let regions = vec![region("t1", "<table><tr><td>raw</td></tr></table>")];
        let (marked, map, _) = substitute(markdown, regions);

        let mut tables = BTreeMap::new();
        tables.insert("t1".to_string(), normalized("t1", "| a |\n| --- |"));
        let (restored, warnings) = restore(&marked, &map, &tables);
        assert!(warnings.is_empty());
        assert!(restored.contains("| a |"));
        assert!(!restored.contains("raw"));
    }

    #[test]
    fn first_unconsumed_occurrence_wins_for_duplicates() {
        let markup = "<table><tr><td>x</td></tr></table>";
        let markdown = format!("{markup}\nmiddle\n{markup}");
        let regions = vec![region("t1", markup), region("t2", markup)];
        let (marked, _, warnings) = substitute(&markdown, regions);
        assert!(warnings.is_empty());
        let positions = markers_in(&marked);
        assert_eq!(positions, vec!["t1".to_string(), "t2".to_string()]);
    }

    #[test]
    fn missing_markup_yields_warning() {
        let (_, map, warnings) = substitute("no tables here", vec![region("t1", "<table></table>")]);
        assert!(map.is_empty());
        assert!(matches!(
            warnings.as_slice(),
            [PipelineWarning::RegionNotFound { table_id }] if table_id == "t1"
        ));
    }

    #[test]
    fn dangling_marker_is_reported_not_dropped() {
        let text = format!("content {}", marker_for("ghost"));
        let (restored, warnings) = restore(&text, &MarkerMap::default(), &BTreeMap::new());
        assert!(restored.contains(&marker_for("ghost")));
        assert!(matches!(
            warnings.as_slice(),
            [PipelineWarning::UnresolvedMarker { table_id }] if table_id == "ghost"
        ));
    }
}

//! Artifact rendering: markdown, CSV, schema, and quality scoring.

use super::headers::header_row_count;
use super::types::{
    Cell, ColumnSchema, ColumnType, Grid, HeaderHierarchy, TableSchema,
};
use chrono::NaiveDate;

/// Structural renderings derived from a normalized grid.
///
/// The semantic summary is attached separately by the pipeline service
/// because it requires a provider call; everything here is pure.
#[derive(Debug, Clone)]
pub struct RenderedTable {
    /// Pipe-table markdown with a single header row.
    pub markdown: String,
    /// CSV rendering of every grid row.
    pub csv_bytes: Vec<u8>,
    /// Per-column inferred schema.
    pub schema: TableSchema,
    /// Mean per-cell OCR confidence.
    pub quality_confidence: f32,
}

const SCHEMA_SAMPLE_ROWS: usize = 10;
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

/// Render all structural artifacts for a normalized table.
///
/// `default_confidence` substitutes for cells whose confidence the OCR
/// provider did not report, keeping the mean conservative instead of
/// skewing it upward.
pub fn render(
    grid: &Grid,
    hierarchy: &HeaderHierarchy,
    cells: &[Cell],
    default_confidence: f32,
) -> RenderedTable {
    let header_rows = header_row_count(grid, cells);
    let headers = display_headers(grid, hierarchy);

    RenderedTable {
        markdown: to_markdown(grid, &headers, header_rows),
        csv_bytes: to_csv_bytes(grid),
        schema: infer_schema(grid, &headers, header_rows),
        quality_confidence: mean_confidence(cells, default_confidence),
    }
}

/// Single displayed header label per column: the innermost hierarchy entry.
/// The full hierarchy is preserved separately and never flattened into the
/// visible markdown.
fn display_headers(grid: &Grid, hierarchy: &HeaderHierarchy) -> Vec<String> {
    (0..grid.cols())
        .map(|col| {
            hierarchy
                .get(&col)
                .and_then(|path| path.last())
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

fn to_markdown(grid: &Grid, headers: &[String], header_rows: usize) -> String {
    let mut lines = Vec::with_capacity(grid.rows() + 2);
    lines.push(format!(
        "| {} |",
        headers
            .iter()
            .map(|label| escape_pipes(label))
            .collect::<Vec<_>>()
            .join(" | ")
    ));
    lines.push(format!("|{}|", vec![" --- "; grid.cols()].join("|")));

    for row in header_rows..grid.rows() {
        let rendered = grid
            .row(row)
            .iter()
            .map(|text| escape_pipes(text))
            .collect::<Vec<_>>()
            .join(" | ");
        lines.push(format!("| {rendered} |"));
    }

    lines.join("\n")
}

fn escape_pipes(text: &str) -> String {
    text.replace('|', "\\|")
}

fn to_csv_bytes(grid: &Grid) -> Vec<u8> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in 0..grid.rows() {
        // Serializing strings into an in-memory buffer cannot fail.
        writer
            .write_record(grid.row(row))
            .expect("csv write to Vec<u8>");
    }
    writer.into_inner().expect("csv flush to Vec<u8>")
}

/// Infer a primitive type per column by sampling non-empty data cells.
///
/// Precedence is numeric over date over string; a type must win a simple
/// majority of the sampled values, and ties default to string.
fn infer_schema(grid: &Grid, headers: &[String], header_rows: usize) -> TableSchema {
    let sample_end = grid.rows().min(header_rows + SCHEMA_SAMPLE_ROWS);
    let columns = (0..grid.cols())
        .map(|col| {
            let mut numeric = 0usize;
            let mut dates = 0usize;
            let mut total = 0usize;
            for row in header_rows..sample_end {
                let value = grid.get(row, col).trim();
                if value.is_empty() {
                    continue;
                }
                total += 1;
                if parses_as_number(value) {
                    numeric += 1;
                } else if parses_as_date(value) {
                    dates += 1;
                }
            }

            let column_type = if total > 0 && numeric * 2 > total {
                ColumnType::Number
            } else if total > 0 && dates * 2 > total {
                ColumnType::Date
            } else {
                ColumnType::String
            };

            let name = headers
                .get(col)
                .filter(|label| !label.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("column_{col}"));

            ColumnSchema { name, column_type }
        })
        .collect();

    TableSchema { columns }
}

fn parses_as_number(value: &str) -> bool {
    value.replace(',', "").parse::<f64>().is_ok()
}

fn parses_as_date(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|format| NaiveDate::parse_from_str(value, format).is_ok())
}

fn mean_confidence(cells: &[Cell], default_confidence: f32) -> f32 {
    if cells.is_empty() {
        return default_confidence;
    }
    let sum: f32 = cells
        .iter()
        .map(|cell| cell.confidence.unwrap_or(default_confidence))
        .sum();
    sum / cells.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::grid::normalize;
    use crate::pipeline::headers::build_hierarchy;
    use crate::pipeline::types::CellRole;

    fn cell(
        row: usize,
        col: usize,
        colspan: usize,
        text: &str,
        role: CellRole,
        confidence: Option<f32>,
    ) -> Cell {
        Cell {
            row,
            col,
            rowspan: 1,
            colspan,
            text: text.into(),
            role,
            confidence,
        }
    }

    fn rendered(cells: &[Cell]) -> RenderedTable {
        let grid = normalize(cells).expect("grid");
        let hierarchy = build_hierarchy(&grid, cells);
        render(&grid, &hierarchy, cells, 0.5)
    }

    #[test]
    fn spanning_header_renders_single_header_row() {
        let cells = vec![
            cell(0, 0, 2, "Header", CellRole::Header, None),
            cell(1, 0, 1, "a", CellRole::Data, None),
            cell(1, 1, 1, "b", CellRole::Data, None),
        ];
        let table = rendered(&cells);
        let lines: Vec<&str> = table.markdown.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "| Header | Header |");
        assert_eq!(lines[2], "| a | b |");
    }

    #[test]
    fn markdown_escapes_pipes_in_cells() {
        let cells = vec![
            cell(0, 0, 1, "Name", CellRole::Header, None),
            cell(1, 0, 1, "a|b", CellRole::Data, None),
        ];
        let table = rendered(&cells);
        assert!(table.markdown.contains("a\\|b"));
    }

    #[test]
    fn csv_covers_every_grid_row() {
        let cells = vec![
            cell(0, 0, 1, "h", CellRole::Header, None),
            cell(0, 1, 1, "i", CellRole::Header, None),
            cell(1, 0, 1, "1", CellRole::Data, None),
            cell(1, 1, 1, "2", CellRole::Data, None),
        ];
        let table = rendered(&cells);
        let text = String::from_utf8(table.csv_bytes).expect("utf8 csv");
        assert_eq!(text.trim(), "h,i\n1,2");
    }

    #[test]
    fn schema_prefers_numeric_then_date_then_string() {
        let cells = vec![
            cell(0, 0, 1, "Amount", CellRole::Header, None),
            cell(0, 1, 1, "When", CellRole::Header, None),
            cell(0, 2, 1, "Notes", CellRole::Header, None),
            cell(1, 0, 1, "1,200", CellRole::Data, None),
            cell(1, 1, 1, "2024-02-01", CellRole::Data, None),
            cell(1, 2, 1, "ok", CellRole::Data, None),
            cell(2, 0, 1, "3.5", CellRole::Data, None),
            cell(2, 1, 1, "2024-03-01", CellRole::Data, None),
            cell(2, 2, 1, "7", CellRole::Data, None),
        ];
        let table = rendered(&cells);
        assert_eq!(table.schema.columns[0].column_type, ColumnType::Number);
        assert_eq!(table.schema.columns[0].name, "Amount");
        assert_eq!(table.schema.columns[1].column_type, ColumnType::Date);
        assert_eq!(table.schema.columns[2].column_type, ColumnType::String);
    }

    #[test]
    fn missing_confidence_defaults_conservatively() {
        let cells = vec![
            cell(0, 0, 1, "a", CellRole::Data, Some(0.9)),
            cell(0, 1, 1, "b", CellRole::Data, Some(0.95)),
            cell(0, 2, 1, "c", CellRole::Data, None),
        ];
        let table = rendered(&cells);
        assert!((table.quality_confidence - 0.7833).abs() < 1e-3);
    }
}

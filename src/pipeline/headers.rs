//! Header hierarchy inference over normalized grids.

use super::types::{Cell, CellRole, Grid, HeaderHierarchy};

/// Count the leading rows that are predominantly composed of header cells.
///
/// The vote uses the original cell roles, not grid text: a row counts as a
/// header row when header-role cells cover at least half of its columns.
/// Counting stops at the first non-header row.
pub fn header_row_count(grid: &Grid, cells: &[Cell]) -> usize {
    let cols = grid.cols();
    if cols == 0 {
        return 0;
    }

    let mut header_cols_per_row = vec![0usize; grid.rows()];
    for cell in cells {
        if cell.role != CellRole::Header {
            continue;
        }
        for r in cell.row..(cell.row + cell.rowspan.max(1)).min(grid.rows()) {
            let covered = cell.colspan.max(1).min(cols.saturating_sub(cell.col));
            header_cols_per_row[r] += covered;
        }
    }

    header_cols_per_row
        .iter()
        .take_while(|&&covered| covered * 2 >= cols)
        .count()
}

/// Build the per-column header label paths, outermost to innermost.
///
/// A spanning header contributes its label to every column it covers, and
/// consecutive duplicate labels within a column collapse to one occurrence.
/// When no header rows are detected every column maps to an empty path,
/// signaling a flat table downstream.
pub fn build_hierarchy(grid: &Grid, cells: &[Cell]) -> HeaderHierarchy {
    let header_rows = header_row_count(grid, cells);
    let mut hierarchy = HeaderHierarchy::new();

    for col in 0..grid.cols() {
        let mut path: Vec<String> = Vec::new();
        for row in 0..header_rows {
            let label = grid.get(row, col).trim();
            if label.is_empty() {
                continue;
            }
            if path.last().map(String::as_str) != Some(label) {
                path.push(label.to_string());
            }
        }
        hierarchy.insert(col, path);
    }

    hierarchy
}

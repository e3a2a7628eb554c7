//! Grid normalization: dense rectangular expansion of sparse, spanning cells.

use super::types::{Cell, Grid, MalformedTableError};

/// Convert a sparse cell list into a dense rectangular grid.
///
/// Dimensions are resolved from the maximum extent of the cell rectangles.
/// Cells are processed in the order provided by the OCR capability; when two
/// rectangles overlap, the later cell's text wins at the contested
/// coordinates. This is a deterministic tie-break for noisy OCR output, not
/// an error. Coordinates no cell claims stay empty strings so downstream
/// renderers always see a rectangular table.
pub fn normalize(cells: &[Cell]) -> Result<Grid, MalformedTableError> {
    let mut rows = 0;
    let mut cols = 0;
    for cell in cells {
        rows = rows.max(cell.row + cell.rowspan.max(1));
        cols = cols.max(cell.col + cell.colspan.max(1));
    }

    if rows == 0 || cols == 0 {
        return Err(MalformedTableError { rows, cols });
    }

    let mut grid = Grid::new(rows, cols);
    for cell in cells {
        let text = cell.text.trim();
        for r in cell.row..(cell.row + cell.rowspan.max(1)).min(rows) {
            for c in cell.col..(cell.col + cell.colspan.max(1)).min(cols) {
                grid.set(r, c, text);
            }
        }
    }

    Ok(grid)
}

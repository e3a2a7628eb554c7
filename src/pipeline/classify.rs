//! Complexity classification for detected tables.
//!
//! Deep structural recovery costs extra provider calls, so it is reserved
//! for tables whose extracted markup shows signs the analysis provider
//! cannot represent faithfully: merged cells, multi-row headers, missing
//! border styling, or header-dense layouts. Everything else passes through
//! with its original markup.

use regex::Regex;
use std::sync::OnceLock;

fn span_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:rowspan|colspan)\s*=\s*"?(\d+)"#).expect("valid span pattern")
    })
}

fn table_tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<table\b[^>]*>").expect("valid table tag pattern"))
}

fn row_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<tr\b.*?</tr>").expect("valid row pattern"))
}

/// Decide whether a table needs OCR-based structural reconstruction.
///
/// Any single signal marks the table complex:
/// - a `rowspan` or `colspan` attribute greater than 1,
/// - more than one header row (`<thead>` groups or leading all-`<th>` rows),
/// - absence of visible border styling on the `<table>` tag,
/// - header cells exceeding `header_cell_fraction` of all cells.
///
/// Markup without a `<table>` element (e.g. a pipe table) is always simple;
/// those renderings cannot express merged cells.
pub fn is_complex(source_markup: &str, header_cell_fraction: f32) -> bool {
    if !source_markup.to_lowercase().contains("<table") {
        return false;
    }

    has_merged_cells(source_markup)
        || header_row_groups(source_markup) > 1
        || is_borderless(source_markup)
        || header_cell_ratio(source_markup) > header_cell_fraction
}

fn has_merged_cells(markup: &str) -> bool {
    span_pattern()
        .captures_iter(markup)
        .filter_map(|captures| captures[1].parse::<usize>().ok())
        .any(|span| span > 1)
}

/// Number of header rows: `<thead>` row groups when present, otherwise the
/// count of leading rows consisting solely of `<th>` cells.
fn header_row_groups(markup: &str) -> usize {
    let lower = markup.to_lowercase();
    let thead_rows = lower.matches("<thead").count();
    if thead_rows > 1 {
        return thead_rows;
    }

    row_pattern()
        .find_iter(markup)
        .take_while(|row| {
            let row = row.as_str().to_lowercase();
            row.contains("<th") && !row.contains("<td")
        })
        .count()
        .max(thead_rows)
}

/// A table is borderless when its tag carries no `border` attribute (or
/// `border="0"`) and no border styling. Analysis providers emit bare
/// `<table>` tags for exactly the layouts they struggled to delineate.
fn is_borderless(markup: &str) -> bool {
    let Some(tag) = table_tag_pattern().find(markup) else {
        return false;
    };
    let tag = tag.as_str().to_lowercase();

    let has_border_attr = tag.contains("border=") && !tag.contains("border=\"0\"");
    let has_border_style = tag.contains("style") && tag.contains("border") && !tag.contains("none");
    !has_border_attr && !has_border_style
}

fn header_cell_ratio(markup: &str) -> f32 {
    let lower = markup.to_lowercase();
    let th = lower.matches("<th").count() - lower.matches("<thead").count();
    let td = lower.matches("<td").count();
    let total = th + td;
    if total == 0 {
        return 0.0;
    }
    th as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRACTION: f32 = 0.4;

    #[test]
    fn rowspan_marks_complex() {
        let markup = r#"<table border="1"><tr><td rowspan="2">a</td><td>b</td></tr><tr><td>c</td></tr></table>"#;
        assert!(is_complex(markup, FRACTION));
    }

    #[test]
    fn unit_spans_stay_simple() {
        let markup = r#"<table border="1"><tr><td colspan="1">a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>"#;
        assert!(!is_complex(markup, FRACTION));
    }

    #[test]
    fn multiple_header_rows_mark_complex() {
        let markup = r#"<table border="1"><tr><th>a</th><th>b</th></tr><tr><th>c</th><th>d</th></tr><tr><td>1</td><td>2</td></tr></table>"#;
        assert!(is_complex(markup, FRACTION));
    }

    #[test]
    fn borderless_table_marks_complex() {
        let markup = "<table><tr><td>a</td><td>b</td></tr></table>";
        assert!(is_complex(markup, FRACTION));
    }

    #[test]
    fn header_dense_table_marks_complex() {
        let markup = r#"<table border="1"><tr><th>a</th><th>b</th><th>c</th></tr><tr><td>1</td><td>2</td><td>3</td></tr></table>"#;
        assert!(is_complex(markup, FRACTION));
    }

    #[test]
    fn bordered_single_header_table_is_simple() {
        let markup = r#"<table border="1"><tr><th>name</th><th>age</th></tr><tr><td>ada</td><td>36</td></tr><tr><td>alan</td><td>41</td></tr><tr><td>edsger</td><td>72</td></tr></table>"#;
        assert!(!is_complex(markup, FRACTION));
    }

    #[test]
    fn pipe_table_is_always_simple() {
        let markup = "| a | b |\n| --- | --- |\n| 1 | 2 |";
        assert!(!is_complex(markup, FRACTION));
    }
}

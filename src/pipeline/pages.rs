//! Page-break numbering and per-chunk page attribution.
//!
//! Analysis providers emit anonymous `<!-- PageBreak -->` comments. Before
//! splitting, each one is numbered so page positions survive segmentation;
//! afterwards, each chunk is attributed to the page most of its content
//! falls on.

use regex::Regex;
use std::sync::OnceLock;

const PAGE_BREAK: &str = "<!-- PageBreak -->";

fn numbered_break_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"PageBreak(\d{5})").expect("valid page break pattern"))
}

/// Replace each anonymous page break with a sequentially numbered one.
pub fn number_page_breaks(content: &str) -> String {
    let mut numbered = content.to_string();
    let mut index = 1;
    while let Some(position) = numbered.find(PAGE_BREAK) {
        let replacement = format!("<!-- PageBreak{index:05} -->");
        numbered.replace_range(position..position + PAGE_BREAK.len(), &replacement);
        index += 1;
    }
    numbered
}

/// Advance the running page counter past the breaks seen in this chunk.
pub fn update_page(content: &str, current_page: u32) -> u32 {
    let last = numbered_break_pattern()
        .captures_iter(content)
        .filter_map(|captures| captures[1].parse::<u32>().ok())
        .last();
    match last {
        Some(page) if page >= current_page => page + 1,
        _ => current_page,
    }
}

/// Attribute a page number to a chunk.
///
/// When a numbered break sits in the first half of the chunk, most of the
/// content lies after it, so the chunk belongs to the following page;
/// otherwise it belongs to the break's own page. Chunks without a break
/// inherit the running page counter.
pub fn chunk_page(content: &str, current_page: u32) -> u32 {
    let Some(found) = numbered_break_pattern().captures(content) else {
        return current_page;
    };
    let Ok(page) = found[1].parse::<u32>() else {
        return current_page;
    };
    let position = found.get(0).map(|m| m.start()).unwrap_or(0);
    if content.is_empty() || (position as f64) / (content.len() as f64) < 0.5 {
        page + 1
    } else {
        page
    }
}

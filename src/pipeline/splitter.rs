//! Heading-aware markdown segmentation with token budgets.
//!
//! Splitting happens in two passes. The first walks ATX headings (levels
//! 1-6), starting a new segment at each heading while tracking the heading
//! breadcrumb; segment order always matches document order, so this pass is
//! single-threaded. The second pass re-splits any segment that exceeds the
//! token budget, using `semchunk` with an optional sliding token overlap.
//! Token counting prefers `tiktoken` encodings and falls back to whitespace
//! counting for models without a published tokenizer.

use semchunk_rs::Chunker;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model};

/// Shared token counting closure.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Errors produced while segmenting a document.
#[derive(Debug, Error)]
pub enum SplitterError {
    /// Segmentation was configured with an impossible token budget.
    #[error("chunk token budget must be greater than zero")]
    InvalidTokenBudget,
}

/// One contiguous piece of the document with its heading breadcrumb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment text, headings included.
    pub content: String,
    /// Heading titles from outermost to innermost level.
    pub headers: Vec<String>,
}

/// Build a token counter for the given model.
///
/// Unknown models fall back to whitespace counting; the fallback is logged
/// once at `warn` so ingestion keeps flowing.
pub fn build_token_counter(model: &str) -> TokenCounter {
    match resolve_encoding(model) {
        Some(encoding) => {
            let encoding = Arc::new(encoding);
            Arc::new(move |segment: &str| encoding.encode_ordinary(segment).len())
        }
        None => {
            tracing::warn!(model, "Tokenizer unavailable; using whitespace counter");
            whitespace_counter()
        }
    }
}

fn resolve_encoding(model: &str) -> Option<CoreBPE> {
    let target = model.trim();
    if target.is_empty() {
        return cl100k_base().ok();
    }
    match get_bpe_from_model(target) {
        Ok(encoding) => Some(encoding),
        Err(error) => {
            tracing::debug!(model, error = %error, "Model tokenizer lookup failed");
            cl100k_base().ok()
        }
    }
}

pub(crate) fn whitespace_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

/// Split markdown into heading-scoped, token-bounded segments.
pub fn split_markdown(
    content: &str,
    max_tokens: usize,
    overlap: usize,
    counter: &TokenCounter,
) -> Result<Vec<Segment>, SplitterError> {
    if max_tokens == 0 {
        return Err(SplitterError::InvalidTokenBudget);
    }
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let segments = split_headings(content);
    let mut bounded = Vec::with_capacity(segments.len());
    for segment in segments {
        bounded.extend(bound_segment(segment, max_tokens, overlap, counter));
    }
    Ok(bounded)
}

/// First pass: heading-scoped segmentation with breadcrumb tracking.
fn split_headings(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut breadcrumb: BTreeMap<usize, String> = BTreeMap::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_headers: Vec<String> = Vec::new();
    let mut current_has_body = false;

    for line in content.lines() {
        if let Some((level, title)) = parse_heading(line) {
            if current_has_body && !current.is_empty() {
                segments.push(Segment {
                    content: current.join("\n"),
                    headers: current_headers.clone(),
                });
                current.clear();
            }
            breadcrumb.insert(level, title);
            breadcrumb.retain(|&l, _| l <= level);
            current_headers = breadcrumb.values().cloned().collect();
            current.push(line);
            current_has_body = false;
        } else {
            if !line.trim().is_empty() {
                current_has_body = true;
            }
            current.push(line);
        }
    }

    if !current.is_empty() {
        segments.push(Segment {
            content: current.join("\n"),
            headers: current_headers,
        });
    }

    segments
        .into_iter()
        .filter(|segment| !segment.content.trim().is_empty())
        .collect()
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_start();
    let level = trimmed.bytes().take_while(|&b| b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        return None;
    }
    Some((level, rest.trim().to_string()))
}

/// Second pass: enforce the token budget on one segment.
fn bound_segment(
    segment: Segment,
    max_tokens: usize,
    overlap: usize,
    counter: &TokenCounter,
) -> Vec<Segment> {
    if counter(&segment.content) <= max_tokens {
        return vec![segment];
    }

    let counter_for_chunker = counter.clone();
    let chunker = Chunker::new(
        max_tokens,
        Box::new(move |text: &str| counter_for_chunker.as_ref()(text)),
    );
    let pieces = chunker.chunk(&segment.content);

    let effective_overlap = overlap.min(max_tokens.saturating_sub(1));
    let mut bounded = Vec::with_capacity(pieces.len());
    let mut previous: Option<String> = None;
    for piece in pieces {
        let content = match (&previous, effective_overlap) {
            (Some(prior), overlap) if overlap > 0 => {
                overlap_join(prior, &piece, overlap, max_tokens, counter)
            }
            _ => piece.clone(),
        };
        bounded.push(Segment {
            content,
            headers: segment.headers.clone(),
        });
        previous = Some(piece);
    }
    bounded
}

/// Prefix `current` with the trailing words of `previous`, then trim from
/// the front so the result stays within the token budget.
fn overlap_join(
    previous: &str,
    current: &str,
    overlap: usize,
    max_tokens: usize,
    counter: &TokenCounter,
) -> String {
    let tail = tail_words(previous, overlap, counter);
    let combined = if tail.is_empty() {
        current.to_string()
    } else {
        format!("{tail} {current}")
    };
    trim_front_to_budget(&combined, max_tokens, counter)
}

fn tail_words(text: &str, token_limit: usize, counter: &TokenCounter) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut start = words.len();
    while start > 0 {
        let candidate = words[start - 1..].join(" ");
        if counter(&candidate) > token_limit {
            break;
        }
        start -= 1;
    }
    words[start..].join(" ")
}

fn trim_front_to_budget(text: &str, budget: usize, counter: &TokenCounter) -> String {
    if counter(text) <= budget {
        return text.to_string();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    for skip in 1..words.len() {
        let candidate = words[skip..].join(" ");
        if counter(&candidate) <= budget {
            return candidate;
        }
    }
    String::new()
}

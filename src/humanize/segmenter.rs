//! Paragraph segmentation.
//!
//! Splits a document into ordered, non-blank chunks small enough to rewrite
//! independently. Paragraphs come from blank-line boundaries (or single line
//! breaks when the document has none); paragraphs over
//! [`LONG_PARAGRAPH_CHARS`] are regrouped sentence by sentence into chunks of
//! roughly [`TARGET_CHUNK_CHARS`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Paragraphs longer than this (in characters) are split at sentences.
pub const LONG_PARAGRAPH_CHARS: usize = 500;

/// Soft upper bound for a regrouped chunk, in characters.
pub const TARGET_CHUNK_CHARS: usize = 300;

static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static PERIOD_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s+").expect("valid regex"));

/// One paragraph-sized piece of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in the document, starting at 0.
    pub index: usize,
    pub text: String,
}

/// Split `text` into ordered, trimmed, non-blank chunks.
///
/// Returns an empty list for blank input.
pub fn segment(text: &str) -> Vec<Chunk> {
    split_paragraphs(text)
        .into_iter()
        .flat_map(|para| {
            if para.chars().count() > LONG_PARAGRAPH_CHARS {
                group_sentences(para)
            } else {
                vec![para.to_string()]
            }
        })
        .filter(|piece| !piece.trim().is_empty())
        .enumerate()
        .map(|(index, text)| Chunk { index, text })
        .collect()
}

/// Trimmed, non-empty paragraphs of `text`.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut pieces: Vec<&str> = BLANK_LINE.split(text).collect();
    if pieces.len() == 1 {
        pieces = text.split('\n').collect();
    }
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Split at sentence boundaries: a period, then whitespace, then an ASCII
/// upper-case letter. The whitespace between sentences is dropped.
fn split_sentences(para: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for gap in PERIOD_GAP.find_iter(para) {
        let next_is_upper = para[gap.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase());
        if next_is_upper {
            // the period stays with the sentence it ends
            sentences.push(&para[start..gap.start() + 1]);
            start = gap.end();
        }
    }
    sentences.push(&para[start..]);
    sentences
}

/// Greedily pack the sentences of `para` into chunks of about
/// [`TARGET_CHUNK_CHARS`]. A single sentence longer than the target becomes
/// its own oversized chunk.
fn group_sentences(para: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for sentence in split_sentences(para) {
        let sentence_chars = sentence.chars().count();
        if !current.is_empty() && current_chars + sentence_chars > TARGET_CHUNK_CHARS {
            chunks.push(current.trim().to_string());
            current.clear();
            current_chars = 0;
        }
        current.push_str(sentence);
        current.push(' ');
        current_chars += sentence_chars + 1;
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }
    chunks
}

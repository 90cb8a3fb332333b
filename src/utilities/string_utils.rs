//! Text sanitizing helpers.
//!
//! User input is sanitized before it reaches a prompt, and model output is
//! sanitized before it is returned. A Rust `&str` cannot hold a surrogate code
//! point, so orphaned surrogates reach us in one of three forms: raw UTF-16
//! units, ill-formed UTF-8 bytes, or the U+FFFD replacement character left
//! behind by a lossy decoder (the form parser decodes this way). Each form
//! has an entry point below; all of them funnel into [`sanitize_text`].

/// Replacement character produced by lossy decoders for undecodable input.
const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Whether `c` survives sanitizing.
fn is_transmittable(c: char) -> bool {
    if c == REPLACEMENT_CHAR {
        return false;
    }
    !c.is_control() || c.is_whitespace()
}

/// Strip control characters (other than whitespace) and replacement
/// characters from `text`.
///
/// Idempotent: `sanitize_text(&sanitize_text(s)) == sanitize_text(s)`.
pub fn sanitize_text(text: &str) -> String {
    text.chars().filter(|c| is_transmittable(*c)).collect()
}

/// Decode UTF-16 units, dropping unpaired surrogates, then sanitize.
pub fn sanitize_utf16(units: &[u16]) -> String {
    let decoded: String = char::decode_utf16(units.iter().copied())
        .filter_map(Result::ok)
        .collect();
    sanitize_text(&decoded)
}

/// Decode possibly ill-formed UTF-8 bytes, dropping undecodable sequences
/// (including encoded surrogates), then sanitize.
pub fn sanitize_bytes(bytes: &[u8]) -> String {
    sanitize_text(&String::from_utf8_lossy(bytes))
}

/// Whether `text` has no non-whitespace content.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

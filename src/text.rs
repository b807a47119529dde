//! Text normalization
//!
//! Produces the compact text forms stored in element semantics: Unicode NFC,
//! ASCII whitespace runs collapsed to a single space, trimmed, and capped at
//! 100 characters with a truncation marker.

use crate::types::TextContent;
use unicode_normalization::UnicodeNormalization;

/// Character cap applied to both the raw and the normalized form.
pub const MAX_TEXT_LENGTH: usize = 100;

/// Marker appended when a form was truncated.
const TRUNCATION_MARKER: char = '…';

/// Normalize a text fragment: NFC, collapse ASCII whitespace runs, trim, cap.
pub fn normalize_text(input: &str) -> String {
    let nfc: String = input.nfc().collect();
    let mut out = String::with_capacity(nfc.len());
    let mut in_whitespace = false;
    for c in nfc.chars() {
        if c.is_ascii_whitespace() {
            in_whitespace = true;
        } else {
            if in_whitespace && !out.is_empty() {
                out.push(' ');
            }
            in_whitespace = false;
            out.push(c);
        }
    }
    cap_length(out)
}

/// Build the stored text record from raw direct-child text. Returns `None`
/// when nothing but whitespace is present.
pub fn text_content(raw: &str) -> Option<TextContent> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = normalize_text(trimmed);
    if normalized.is_empty() {
        return None;
    }
    Some(TextContent {
        raw: cap_length(trimmed.to_string()),
        normalized,
    })
}

/// Cap a string at [`MAX_TEXT_LENGTH`] characters, appending the marker when
/// anything was cut.
fn cap_length(s: String) -> String {
    if s.chars().count() <= MAX_TEXT_LENGTH {
        return s;
    }
    let mut capped: String = s.chars().take(MAX_TEXT_LENGTH).collect();
    capped.push(TRUNCATION_MARKER);
    capped
}

//! Canonical comparison keys for titles and names.
//!
//! Every label comparison in the crate goes through [`normalize`]; new suffix
//! patterns are added to the marker lists here, once, rather than per caller.

/// Trailing edition/format markers, matched case-insensitively and anchored
/// to the end of the label. Stripped before the genre markers.
const EDITION_MARKERS: [&str; 4] = [
    "(unabridged)",
    "[unabridged]",
    "[tantor]",
    "(audible audio edition)",
];

/// Trailing genre-label markers, stripped after the edition markers.
const GENRE_MARKERS: [&str; 2] = [": a novel", ": a memoir"];

/// Turn a raw label into its canonical comparison key.
///
/// Lower-cased, punctuation dropped, known trailing edition and genre markers
/// removed, whitespace collapsed. Total and idempotent; empty input yields
/// the empty string.
pub fn normalize(raw: &str) -> String {
    let mut label = raw.trim();

    // Markers can stack ("Title (Unabridged) [Tantor]"), so strip until the
    // end of the label is stable.
    label = strip_markers(label, &EDITION_MARKERS);
    label = strip_markers(label, &GENRE_MARKERS);

    let mut cleaned = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
            cleaned.push(c);
        }
    }

    cleaned
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize an optional label; absent input is treated as empty.
pub fn normalize_opt(raw: Option<&str>) -> String {
    raw.map(normalize).unwrap_or_default()
}

fn strip_markers<'a>(mut label: &'a str, markers: &[&str]) -> &'a str {
    loop {
        let mut stripped = false;
        for marker in markers {
            if let Some(rest) = strip_suffix_ci(label, marker) {
                label = rest.trim_end();
                stripped = true;
            }
        }
        if !stripped {
            return label;
        }
    }
}

/// ASCII case-insensitive suffix strip that never splits a multi-byte
/// character.
fn strip_suffix_ci<'a>(label: &'a str, suffix: &str) -> Option<&'a str> {
    let n = suffix.len();
    if label.len() < n || !label.is_char_boundary(label.len() - n) {
        return None;
    }
    if label[label.len() - n..].eq_ignore_ascii_case(suffix) {
        Some(&label[..label.len() - n])
    } else {
        None
    }
}

//! Metric and label name sanitization for the text exposition format.
//!
//! Invalid characters are replaced with `_` one character at a time, so the
//! output always has the same number of characters as the input.

const REPLACEMENT: char = '_';

/// Sanitize a metric name to `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn metric_name(raw: &str) -> String {
    raw.chars()
        .enumerate()
        .map(|(i, c)| {
            let ok = c.is_ascii_alphabetic() || c == '_' || c == ':' || (i > 0 && c.is_ascii_digit());
            if ok {
                c
            } else {
                REPLACEMENT
            }
        })
        .collect()
}

/// Sanitize a label key to `[a-zA-Z_][a-zA-Z0-9_]*`.
///
/// A leading run of two or more underscores collapses to one: the `__`
/// prefix is reserved for internal labels.
pub fn label_key(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let ok = c.is_ascii_alphabetic() || c == '_' || (i > 0 && c.is_ascii_digit());
            if ok {
                c
            } else {
                REPLACEMENT
            }
        })
        .collect();

    let rest = replaced.trim_start_matches(REPLACEMENT);
    if replaced.len() - rest.len() >= 2 {
        format!("{REPLACEMENT}{rest}")
    } else {
        replaced
    }
}

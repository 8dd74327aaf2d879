//! Text normalization helpers shared by search and export.

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}

/// Fold text for case-insensitive substring search.
pub fn fold_search_text<T: AsRef<str>>(text: T) -> String {
    normalize_inline_whitespace(text).to_lowercase()
}

/// Returns `true` when `haystack` contains the already-folded `needle`.
///
/// An empty needle matches everything.
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || fold_search_text(haystack).contains(needle)
}

//! Canonical variable naming.
//!
//! Vensim allows spaces, mixed case and quoting in variable names; XMILE
//! tends toward underscores. Every lookup key in the IR uses the canonical
//! form produced here, while the original spelling is kept for display.

/// Canonicalize a raw variable name: strip quotes, trim, collapse internal
/// whitespace runs to a single `_`, lowercase.
pub fn canonical(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('"').trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_sep = false;
    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            if !last_was_sep && !out.is_empty() {
                out.push('_');
                last_was_sep = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            last_was_sep = false;
        }
    }
    out
}

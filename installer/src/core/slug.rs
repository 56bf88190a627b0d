//! Slug and key derivation from human-readable titles.

use deunicode::deunicode;

/// Derive a URL-safe slug: transliterate to ASCII, lowercase, drop everything
/// that is not alphanumeric, and join words with single hyphens.
///
/// The output never has leading, trailing, or consecutive hyphens, so applying
/// `slugify` to its own output is a no-op.
pub fn slugify(input: &str) -> String {
    join_words(input, '-')
}

/// Derive a machine field key (`snake_case`) from a title.
pub fn key_from_title(title: &str) -> String {
    join_words(title, '_')
}

/// Derive a display title from a machine key: `published_at` -> `Published At`.
pub fn title_from_key(key: &str) -> String {
    key.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_words(input: &str, separator: char) -> String {
    let ascii = deunicode(input);
    let mut out = String::with_capacity(ascii.len());
    let mut pending_separator = false;
    for ch in ascii.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push(separator);
            }
            pending_separator = false;
            out.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_separator = true;
        }
    }
    out
}

//! Text normalization helpers.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());
static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_-]+").unwrap());

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Collapse runs of whitespace to single spaces, keeping the edges.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").into_owned()
}

/// Like [`normalize_whitespace`] but `None` for empty results.
pub fn non_empty(s: &str) -> Option<String> {
    let normalized = normalize_whitespace(s);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Lowercase, strip non-word characters, join words with single dashes.
pub fn slugify(s: &str) -> String {
    let lowered = s.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    DASHES
        .replace_all(stripped.trim(), "-")
        .trim_matches('-')
        .to_string()
}

/// Remove the first matching prefix, compared case-insensitively.
pub fn strip_prefix_ci<'a>(s: &'a str, prefixes: &[&str]) -> &'a str {
    let trimmed = s.trim_start();
    for prefix in prefixes {
        if let Some(head) = trimmed.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return trimmed[prefix.len()..].trim_start();
            }
        }
    }
    trimmed
}

/// Uppercase the first alphabetic character, leaving everything else.
pub fn capitalize_first_alpha(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut done = false;
    for c in s.chars() {
        if !done && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// Whether a string has nothing worth translating.
pub fn is_untranslatable(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || !t.chars().any(|c| c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(
            slugify("Hercules plane landed in Nuuk Wednesday"),
            "hercules-plane-landed-in-nuuk-wednesday"
        );
        assert_eq!(slugify("  Dear   Trump!  "), "dear-trump");
        assert_eq!(slugify("a -- b"), "a-b");
        assert_eq!(slugify("Kære Trump"), "kære-trump");
    }

    #[test]
    fn test_strip_prefix_ci() {
        assert_eq!(strip_prefix_ci("Foto: Leiff Josefsen", &["foto:", "assi:"]), "Leiff Josefsen");
        assert_eq!(strip_prefix_ci("ASSI: Ane", &["foto:", "assi:"]), "Ane");
        assert_eq!(strip_prefix_ci("Ane", &["foto:", "assi:"]), "Ane");
    }

    #[test]
    fn test_capitalize_first_alpha() {
        assert_eq!(capitalize_first_alpha("  «hello»"), "  «Hello»");
        assert_eq!(capitalize_first_alpha("123"), "123");
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(normalize_whitespace(" a \n\t b "), "a b");
        assert_eq!(non_empty("   "), None);
        assert!(is_untranslatable(" 2026 "));
        assert!(!is_untranslatable("Nuuk"));
    }
}

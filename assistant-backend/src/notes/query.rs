//! Full-text query sanitization.
//!
//! User queries never reach the FTS5 `MATCH` operator verbatim: quotes,
//! statement separators, comment markers, FTS operators and DDL/DML keywords
//! are stripped first, and each surviving token is quoted so the index only
//! ever sees plain terms.

use once_cell::sync::Lazy;
use regex::Regex;

/// Quotes, `;`, comment markers (`--`, `/*`, `*/`) and FTS operator characters.
static DISALLOWED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["';\-*/^$+?{}\[\]()|\\]"#).expect("static regex"));

static SQL_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(DROP|DELETE|UPDATE|INSERT|ALTER|CREATE|MATCH)\b").expect("static regex")
});

/// Strip disallowed characters and keywords, then normalize whitespace.
///
/// An empty return value means nothing searchable is left.
pub fn sanitize_fts_query(query: &str) -> String {
    let without_chars = DISALLOWED_CHARS.replace_all(query, " ");
    let without_keywords = SQL_KEYWORDS.replace_all(&without_chars, " ");
    without_keywords.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn a sanitized query into an FTS5 expression.
///
/// Every token is wrapped in double quotes so leftover punctuation and the
/// FTS5 keywords `AND`/`OR`/`NOT`/`NEAR` are matched literally. Tokens are
/// joined with spaces, which FTS5 treats as AND. Tokens without any
/// alphanumeric character are dropped. Returns `None` when nothing is left.
pub fn build_match_expression(sanitized: &str) -> Option<String> {
    let terms: Vec<String> = sanitized
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", t))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_query_unchanged() {
        assert_eq!(sanitize_fts_query("buy milk"), "buy milk");
        assert_eq!(sanitize_fts_query("  buy   milk \n"), "buy milk");
    }

    #[test]
    fn test_injection_attempt_is_neutralized() {
        let sanitized = sanitize_fts_query("\"; DROP TABLE notes; --");
        assert_eq!(sanitized, "TABLE notes");
        assert!(!sanitized.contains(';'));
        assert!(!sanitized.to_uppercase().contains("DROP"));
    }

    #[test]
    fn test_keywords_removed_case_insensitively() {
        assert_eq!(sanitize_fts_query("delete Insert update alter create match"), "");
        assert_eq!(sanitize_fts_query("drop the Drop"), "the");
    }

    #[test]
    fn test_keywords_inside_words_survive() {
        assert_eq!(sanitize_fts_query("dropbox updates"), "dropbox updates");
        assert_eq!(sanitize_fts_query("recreate"), "recreate");
    }

    #[test]
    fn test_fts_operators_stripped() {
        assert_eq!(sanitize_fts_query("milk* (eggs | bread)"), "milk eggs bread");
        assert_eq!(sanitize_fts_query("^start end$ a+b? {x} [y] c\\d"), "start end a b x y c d");
        assert_eq!(sanitize_fts_query("/* comment */"), "comment");
    }

    #[test]
    fn test_only_operators_yields_empty() {
        assert_eq!(sanitize_fts_query("\"'; -- /* */ ^$*+?{}[]()|\\"), "");
        assert_eq!(sanitize_fts_query("   "), "");
    }

    #[test]
    fn test_match_expression_quotes_terms() {
        assert_eq!(build_match_expression("buy milk").unwrap(), "\"buy\" \"milk\"");
        assert_eq!(build_match_expression("cats OR dogs").unwrap(), "\"cats\" \"OR\" \"dogs\"");
    }

    #[test]
    fn test_match_expression_drops_punctuation_only_terms() {
        assert_eq!(build_match_expression("milk , .").unwrap(), "\"milk\"");
        assert!(build_match_expression(", . :").is_none());
        assert!(build_match_expression("").is_none());
    }
}

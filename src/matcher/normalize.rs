//! Escape-sequence normalization applied before matching.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// A backslash followed by one of `\ r n t ' "`.
#[allow(clippy::expect_used)]
static ESCAPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\\([\\rnt'"])"#).expect("escape regex is valid") // Static pattern, safe to panic
});

/// Collapses literal backslash escapes into the characters they stand for.
///
/// Some upstream content embeds double-escaped strings (`\"`, `\n`), which
/// hide the quote boundaries the extraction pattern relies on. `\n`, `\r`
/// and `\t` become the control characters, `\\` becomes a single backslash
/// and `\'` / `\"` become the bare quote. Text without escapes is returned
/// borrowed.
///
/// # Examples
///
/// ```
/// use img2local_core::unbackslash;
///
/// assert_eq!(unbackslash(r#"src=\"//img.example.com/a.png\""#), r#"src="//img.example.com/a.png""#);
/// assert_eq!(unbackslash(r"a\nb"), "a\nb");
/// ```
#[must_use]
pub fn unbackslash(text: &str) -> Cow<'_, str> {
    ESCAPE_PATTERN.replace_all(text, |caps: &Captures<'_>| match &caps[1] {
        "n" => "\n".to_string(),
        "r" => "\r".to_string(),
        "t" => "\t".to_string(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbackslash_control_characters() {
        assert_eq!(unbackslash(r"line1\nline2\r\tend"), "line1\nline2\r\tend");
    }

    #[test]
    fn test_unbackslash_quotes_and_backslash() {
        assert_eq!(unbackslash(r#"\"a\" \'b\' c\\d"#), r#""a" 'b' c\d"#);
    }

    #[test]
    fn test_unbackslash_leaves_unknown_escapes() {
        assert_eq!(unbackslash(r"\d+\w"), r"\d+\w");
    }

    #[test]
    fn test_unbackslash_borrows_when_nothing_to_do() {
        assert!(matches!(unbackslash("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_unbackslash_is_single_pass() {
        // `\\n` is an escaped backslash followed by `n`, not a newline.
        assert_eq!(unbackslash(r"\\n"), r"\n");
    }
}

//! Detection and extraction of remote asset references in source text.
//!
//! Two patterns drive matching:
//!
//! - the **detection** pattern is a loose existence test; a file is only
//!   considered for rewriting when it matches at least once
//! - the **extraction** pattern is applied globally and delimits each
//!   reference span: an optional leading token (`src=`, `src={`, `url(`,
//!   optionally preceded by a quote), opening quotes, the URL body and the
//!   closing token
//!
//! The URL body is `http:`, `https:` or protocol-relative `//`, a host with
//! an `img.` or `media.` label, then everything up to the first whitespace,
//! quote, comma, semicolon, `>`, `)` or `}`.
//!
//! This is a heuristic text transform, not a parser.

mod normalize;

use std::ops::Range;

use regex::{Captures, Regex};
use tracing::trace;

pub use normalize::unbackslash;

use crate::config::{ConfigError, Options, compile_pattern};

/// Loose existence test for remote asset URLs.
pub const DEFAULT_DETECT_PATTERN: &str =
    r#"(?:https?:)?//(?:[A-Za-z0-9-]+\.)*?(?:img|media)\.[^\s'"`,;]+"#;

/// Capturing pattern that delimits a full reference span.
///
/// Named groups: `lead`, `quote`, `url`, `trail`. Custom patterns only need
/// to produce matches; when they lack a `url` group the URL is located inside
/// the span with the detection pattern.
pub const DEFAULT_EXTRACT_PATTERN: &str = r#"(?P<lead>src=\{?|['"`]?url\()?(?P<quote>['"`]*)(?P<url>(?:https?:)?//(?:[A-Za-z0-9-]+\.)*?(?:img|media)\.[^\s'"`,;>)}]+)(?P<trail>['"`]*\)?['"`]*\}?)"#;

/// One matched occurrence of a remote asset inside a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference<'t> {
    /// The text this reference replaces.
    pub span: &'t str,
    /// Byte range of `span` in the scanned text.
    pub range: Range<usize>,
    /// The remote URL as written.
    pub url: &'t str,
}

/// Compiled detection and extraction patterns.
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    detect: Regex,
    extract: Regex,
}

impl Default for AssetMatcher {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(DEFAULT_DETECT_PATTERN, DEFAULT_EXTRACT_PATTERN)
            .expect("default asset patterns are valid") // Static patterns, safe to panic
    }
}

impl AssetMatcher {
    /// Compiles a matcher from explicit patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] if either pattern fails to compile.
    pub fn new(detect: &str, extract: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            detect: compile_pattern("detect_pattern", detect)?,
            extract: compile_pattern("extract_pattern", extract)?,
        })
    }

    /// Compiles the patterns configured in `options`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] if either pattern fails to compile.
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        Self::new(&options.detect_pattern, &options.extract_pattern)
    }

    /// Returns true when `text` contains at least one candidate URL.
    #[must_use]
    pub fn detects(&self, text: &str) -> bool {
        self.detect.is_match(text)
    }

    /// Lazily yields every reference span in `text`, left to right.
    ///
    /// Calling this again on the same text restarts the scan.
    pub fn references<'m, 't>(
        &'m self,
        text: &'t str,
    ) -> impl Iterator<Item = AssetReference<'t>> + 'm
    where
        't: 'm,
    {
        self.extract
            .captures_iter(text)
            .filter_map(move |caps| self.reference_from(text, &caps))
    }

    fn reference_from<'t>(&self, text: &'t str, caps: &Captures<'t>) -> Option<AssetReference<'t>> {
        let whole = caps.get(0)?;
        let range = whole.start()..balanced_end(caps, whole.end());
        let range = if caps.name("lead").is_none() {
            enclosing_require(text, range)
        } else {
            range
        };
        let span = &text[range.clone()];

        let url = match caps.name("url") {
            Some(url) => url.as_str(),
            None => self.detect.find(span)?.as_str(),
        };
        if url.is_empty() {
            trace!(span, "extraction match without URL, skipped");
            return None;
        }

        trace!(span, url, "matched asset reference");
        Some(AssetReference { span, range, url })
    }
}

/// Trims the closing token so it only closes what the leading token opened.
///
/// A `)` belongs to the span only after `url(`, a `}` only after `src={`;
/// otherwise `load("//img…")` would lose its parenthesis.
fn balanced_end(caps: &Captures<'_>, end: usize) -> usize {
    let Some(trail) = caps.name("trail") else {
        return end;
    };
    let lead = caps.name("lead").map_or("", |m| m.as_str());

    let mut keep = trail.as_str().len();
    if !lead.contains('(')
        && let Some(paren) = trail.as_str().find(')')
    {
        keep = keep.min(paren);
    }
    if !lead.contains('{')
        && let Some(brace) = trail.as_str().find('}')
    {
        keep = keep.min(brace);
    }
    trail.start() + keep
}

/// Widens `range` to the whole `require(...)` call when the reference is
/// its only argument, so the call is replaced instead of wrapped again.
fn enclosing_require(text: &str, range: Range<usize>) -> Range<usize> {
    const CALL: &str = "require(";
    if text[..range.start].ends_with(CALL) && text[range.end..].starts_with(')') {
        range.start - CALL.len()..range.end + 1
    } else {
        range
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spans(text: &str) -> Vec<(String, String)> {
        AssetMatcher::default()
            .references(text)
            .map(|r| (r.span.to_string(), r.url.to_string()))
            .collect()
    }

    #[test]
    fn test_detects_protocol_relative_and_absolute() {
        let matcher = AssetMatcher::default();
        assert!(matcher.detects("a = '//img.example.com/a.png'"));
        assert!(matcher.detects("https://media.example.com/v.mp4"));
        assert!(matcher.detects("http://cdn.img.example.com/a.png"));
        assert!(!matcher.detects("https://www.example.com/image.png"));
        assert!(!matcher.detects("./assets/images/a.png"));
    }

    #[test]
    fn test_src_attribute_span() {
        let found = spans(r#"<img src="//img.example.com/a/b.png" />"#);
        assert_eq!(
            found,
            vec![(
                r#"src="//img.example.com/a/b.png""#.to_string(),
                "//img.example.com/a/b.png".to_string()
            )]
        );
    }

    #[test]
    fn test_self_closing_tag_slash_not_consumed() {
        let found = spans(r#"<img src="//img.example.com/b.png"/>"#);
        assert_eq!(found[0].0, r#"src="//img.example.com/b.png""#);
    }

    #[test]
    fn test_jsx_expression_src_span_includes_braces() {
        let found = spans(r#"<img src={"https://img.example.com/b.png"} />"#);
        assert_eq!(found[0].0, r#"src={"https://img.example.com/b.png"}"#);
        assert_eq!(found[0].1, "https://img.example.com/b.png");
    }

    #[test]
    fn test_css_url_span() {
        let found = spans("background: url('//media.example.com/x/y.jpg');");
        assert_eq!(found[0].0, "url('//media.example.com/x/y.jpg')");
        assert_eq!(found[0].1, "//media.example.com/x/y.jpg");
    }

    #[test]
    fn test_unquoted_css_url_span() {
        let found = spans("background: url(//media.example.com/y.jpg) no-repeat;");
        assert_eq!(found[0].0, "url(//media.example.com/y.jpg)");
    }

    #[test]
    fn test_quoted_url_value_in_script() {
        let found = spans(r#"style={{ backgroundImage: "url('//img.example.com/bg.png')" }}"#);
        assert_eq!(found[0].0, r#""url('//img.example.com/bg.png')""#);
    }

    #[test]
    fn test_require_call_becomes_the_span() {
        let found = spans(r#"const a = require("//img.example.com/a.png");"#);
        assert_eq!(
            found,
            vec![(
                r#"require("//img.example.com/a.png")"#.to_string(),
                "//img.example.com/a.png".to_string()
            )]
        );
    }

    #[test]
    fn test_other_call_keeps_parenthesis_outside_span() {
        let found = spans(r#"load("//img.example.com/a.png");"#);
        assert_eq!(found[0].0, r#""//img.example.com/a.png""#);
    }

    #[test]
    fn test_body_stops_at_delimiters() {
        let found = spans(r#"list = ["//img.example.com/a.png","//img.example.com/b.png"];"#);
        let urls: Vec<_> = found.iter().map(|(_, url)| url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["//img.example.com/a.png", "//img.example.com/b.png"]
        );
    }

    #[test]
    fn test_references_is_restartable() {
        let matcher = AssetMatcher::default();
        let text = "a('//img.x.com/1.png'); b('//media.x.com/2.png');";
        assert_eq!(matcher.references(text).count(), 2);
        assert_eq!(matcher.references(text).count(), 2);
    }

    #[test]
    fn test_custom_extract_pattern_without_url_group_uses_detection() {
        let matcher =
            AssetMatcher::new(DEFAULT_DETECT_PATTERN, r#"['"]//img\.[^'"]+['"]"#).unwrap();
        let refs: Vec<_> = matcher.references("x = '//img.a.com/q.png';").collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].span, "'//img.a.com/q.png'");
        assert_eq!(refs[0].url, "//img.a.com/q.png");
    }

    #[test]
    fn test_range_points_at_span() {
        let text = "x = '//img.a.com/q.png';";
        let reference = AssetMatcher::default().references(text).next().unwrap();
        assert_eq!(&text[reference.range.clone()], reference.span);
    }
}

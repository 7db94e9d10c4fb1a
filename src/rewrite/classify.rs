//! Choosing the replacement for a matched reference.
//!
//! Classification is plain substring containment on the raw span: `src` is
//! checked before `url`, and the order matters for spans containing both.

use super::FileKind;

/// Replacement shapes, one per usage context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteTemplate {
    /// JSX attribute: `src={require('<path>')}`.
    SrcImport,
    /// Inline style value: `` `url(${require('<path>')})` ``.
    TemplateUrl,
    /// Bare expression: `require('<path>')`.
    BareImport,
    /// Style sheet value: `url('<path>')`.
    CssUrl,
}

/// Picks the template for `span` inside a file of `kind`.
///
/// Returns `None` for [`FileKind::Other`] and for unquoted script spans,
/// which sit inside a string or template literal.
#[must_use]
pub fn classify(kind: FileKind, span: &str) -> Option<RewriteTemplate> {
    match kind {
        FileKind::Script if !span.contains(['\'', '"', '`']) => None,
        FileKind::Script if span.contains("src") => Some(RewriteTemplate::SrcImport),
        FileKind::Script if span.contains("url") => Some(RewriteTemplate::TemplateUrl),
        FileKind::Script => Some(RewriteTemplate::BareImport),
        FileKind::Stylesheet => Some(RewriteTemplate::CssUrl),
        FileKind::Other => None,
    }
}

impl RewriteTemplate {
    /// Renders the replacement text for a relative import path.
    #[must_use]
    pub fn render(self, relative_path: &str) -> String {
        match self {
            Self::SrcImport => format!("src={{require('{relative_path}')}}"),
            Self::TemplateUrl => format!("`url(${{require('{relative_path}')}})`"),
            Self::BareImport => format!("require('{relative_path}')"),
            Self::CssUrl => format!("url('{relative_path}')"),
        }
    }
}

//! The per-file rewrite pass.
//!
//! - [`classify`] picks the replacement template for a matched span
//! - [`resolve`] derives the local filename and relative import path
//! - [`engine`] ties matching, classification, resolution and the download
//!   queue together for one file

pub mod classify;
mod engine;
pub mod resolve;

use std::path::Path;

pub use classify::{RewriteTemplate, classify};
pub use engine::{RewriteEngine, RewriteError, RewriteOutcome};
pub use resolve::{ResolvedAsset, asset_filename, canonical_url, relative_import_path, resolve};

/// Type tag of a source file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// JavaScript / TypeScript sources, rewritten to `require(...)` forms.
    Script,
    /// Style sheets, rewritten to CSS `url(...)`.
    Stylesheet,
    /// Anything else. Matched for reporting, never rewritten.
    Other,
}

impl FileKind {
    /// Tags `path` by its (case-insensitive) extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return Self::Other;
        };
        match extension.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" => Self::Script,
            "less" | "css" | "scss" => Self::Stylesheet,
            _ => Self::Other,
        }
    }

    /// Whether references in this kind of file can be rewritten.
    #[must_use]
    pub fn is_rewritable(self) -> bool {
        !matches!(self, Self::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_path(Path::new("a/index.js")), FileKind::Script);
        assert_eq!(FileKind::from_path(Path::new("a/App.TSX")), FileKind::Script);
        assert_eq!(FileKind::from_path(Path::new("a/style.less")), FileKind::Stylesheet);
        assert_eq!(FileKind::from_path(Path::new("a/style.css")), FileKind::Stylesheet);
        assert_eq!(FileKind::from_path(Path::new("a/data.json")), FileKind::Other);
        assert_eq!(FileKind::from_path(Path::new("a/Makefile")), FileKind::Other);
    }

    #[test]
    fn test_only_other_is_not_rewritable() {
        assert!(FileKind::Script.is_rewritable());
        assert!(FileKind::Stylesheet.is_rewritable());
        assert!(!FileKind::Other.is_rewritable());
    }
}

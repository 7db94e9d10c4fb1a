//! Local names for remote assets. Pure functions, no filesystem access.

use std::path::{Component, Path};

/// Local identity of one matched URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// Local filename; the dedup key.
    pub filename: String,
    /// `./`-prefixed POSIX path from the referencing file to the asset.
    pub relative_path: String,
    /// URL to fetch, scheme forced to https.
    pub download_url: String,
}

/// Derives the filename, relative import path and download URL for `url`
/// referenced from `source_file`, with assets stored in `asset_dir`.
///
/// Returns `None` when the URL has no final path segment.
#[must_use]
pub fn resolve(url: &str, source_file: &Path, asset_dir: &Path) -> Option<ResolvedAsset> {
    let filename = asset_filename(url)?;
    Some(ResolvedAsset {
        relative_path: relative_import_path(source_file, asset_dir, filename),
        filename: filename.to_string(),
        download_url: canonical_url(url),
    })
}

/// Text after the last `/` or `\`, without query string or fragment.
///
/// ```
/// use img2local_core::rewrite::asset_filename;
///
/// assert_eq!(asset_filename("//img.example.com/a/b.png?x=1"), Some("b.png"));
/// assert_eq!(asset_filename("//img.example.com/a/"), None);
/// ```
#[must_use]
pub fn asset_filename(url: &str) -> Option<&str> {
    let tail = url.rsplit(['/', '\\']).next().unwrap_or(url);
    let name = tail.split(['?', '#']).next().unwrap_or(tail);
    (!name.is_empty()).then_some(name)
}

/// `https:` followed by the URL with its own scheme removed.
#[must_use]
pub fn canonical_url(url: &str) -> String {
    let rest = url
        .strip_prefix("https:")
        .or_else(|| url.strip_prefix("http:"))
        .unwrap_or(url);
    format!("https:{rest}")
}

/// `./<dir from source_file's directory to asset_dir>/<filename>` with
/// forward slashes on every platform.
#[must_use]
pub fn relative_import_path(source_file: &Path, asset_dir: &Path, filename: &str) -> String {
    let from_dir = source_file.parent().unwrap_or(Path::new(""));
    let relative = pathdiff::diff_paths(asset_dir, from_dir).unwrap_or_else(|| asset_dir.to_path_buf());

    let segments: Vec<_> = relative
        .components()
        .filter_map(|component| match component {
            Component::CurDir => None,
            other => Some(other.as_os_str().to_string_lossy()),
        })
        .collect();

    if segments.is_empty() {
        format!("./{filename}")
    } else {
        format!("./{}/{filename}", segments.join("/"))
    }
}

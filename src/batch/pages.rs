//! Package and page enumeration.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::BatchError;
use crate::config::Options;

/// `<workspace>/<entry_path>/<fake>` for each fake package, then
/// `<workspace>/<entry_path>` itself.
#[must_use]
pub fn package_roots(options: &Options, workspace: &Path) -> Vec<PathBuf> {
    // `./src/pages/` -> `src/pages`
    let relative: PathBuf = options
        .entry_path
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    let entry = workspace.join(relative);
    options
        .fake_packages
        .iter()
        .map(|fake| entry.join(fake))
        .chain(std::iter::once(entry.clone()))
        .collect()
}

/// Every page of every package root.
///
/// # Errors
///
/// Returns [`BatchError::Enumerate`] if a package root cannot be listed, or
/// [`BatchError::Config`] if the exclusion pattern is invalid.
pub fn all_pages(options: &Options, workspace: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut pages = Vec::new();
    for package in package_roots(options, workspace) {
        pages.extend(pages_in_package(&package, options)?);
    }
    Ok(pages)
}

/// Immediate subdirectories of `package` whose names neither match the
/// exclusion pattern nor name a fake package, sorted by name.
///
/// # Errors
///
/// Returns [`BatchError::Enumerate`] if `package` cannot be listed, or
/// [`BatchError::Config`] if the exclusion pattern is invalid.
pub fn pages_in_package(package: &Path, options: &Options) -> Result<Vec<PathBuf>, BatchError> {
    let ignore = options.ignore_page_regex()?;
    let enumerate_error = |source| BatchError::Enumerate {
        path: package.to_path_buf(),
        source,
    };

    let mut pages = Vec::new();
    for entry in fs::read_dir(package).map_err(enumerate_error)? {
        let entry = entry.map_err(enumerate_error)?;
        if !entry.file_type().map_err(enumerate_error)?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if ignore.is_match(&name) || options.fake_packages.iter().any(|fake| *fake == name) {
            debug!(page = %name, "skipping excluded directory");
            continue;
        }
        pages.push(entry.path());
    }
    pages.sort();
    Ok(pages)
}

//! Summary of a finished batch.

use crate::download::DownloadStats;

/// Counts collected while scanning plus the download statistics.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Pages scanned.
    pub pages: usize,
    /// Pages lacking the entry file (scanned anyway).
    pub pages_missing_entry: usize,
    /// Files visited.
    pub files_scanned: usize,
    /// Files written back with substitutions.
    pub files_rewritten: usize,
    /// Files skipped because they could not be read or formatted.
    pub files_failed: usize,
    /// References replaced by local paths.
    pub references_rewritten: usize,
    /// References found in file types that are never rewritten.
    pub references_unsupported: usize,
    /// Unique assets queued for download.
    pub assets_queued: usize,
    /// Download statistics after the queue drained.
    pub downloads: DownloadStats,
}

impl BatchReport {
    /// Filenames whose download failed; references to them dangle.
    #[must_use]
    pub fn dangling_assets(&self) -> Vec<String> {
        self.downloads.failed_assets()
    }

    /// True when every file and every asset was handled.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0 && self.downloads.failed() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_report_is_clean() {
        let report = BatchReport::default();
        assert!(report.is_clean());
        assert!(report.dangling_assets().is_empty());
    }

    #[test]
    fn test_failed_file_makes_report_unclean() {
        let report = BatchReport {
            files_failed: 1,
            ..BatchReport::default()
        };
        assert!(!report.is_clean());
    }
}

//! Completion banner and run summary.

use img2local_core::BatchReport;

/// Command that discards every change made by the run.
pub(crate) const REVERT_COMMAND: &str = "git checkout -f && git clean -d -f";

/// Printed after every run, including failed ones.
pub(crate) fn completion_banner() -> String {
    format!(
        "i2l finished.\n\
         Rewriting is regex-based: inspect the changes with `git diff` and `git status`.\n\
         To undo everything, run `{REVERT_COMMAND}`."
    )
}

pub(crate) fn summary_lines(report: &BatchReport) -> Vec<String> {
    let downloads = &report.downloads;
    let mut lines = vec![
        format!(
            "Scanned {} page(s), {} file(s); rewrote {} file(s), {} reference(s).",
            report.pages, report.files_scanned, report.files_rewritten, report.references_rewritten
        ),
        format!(
            "Images: {} queued, {} downloaded, {} already present, {} failed ({} retries).",
            report.assets_queued,
            downloads.completed(),
            downloads.skipped(),
            downloads.failed(),
            downloads.retried()
        ),
    ];

    if report.pages_missing_entry > 0 {
        lines.push(format!(
            "{} page(s) had no entry file; check the arguments.",
            report.pages_missing_entry
        ));
    }
    if report.files_failed > 0 {
        lines.push(format!(
            "{} file(s) could not be read or formatted and were left untouched.",
            report.files_failed
        ));
    }
    if report.references_unsupported > 0 {
        lines.push(format!(
            "{} reference(s) found in unsupported file types were left as is.",
            report.references_unsupported
        ));
    }
    let dangling = report.dangling_assets();
    if !dangling.is_empty() {
        lines.push(format!(
            "Missing images (references point at files that do not exist): {}",
            dangling.join(", ")
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_mentions_diff_and_revert() {
        let banner = completion_banner();
        assert!(banner.contains("git diff"));
        assert!(banner.contains("git status"));
        assert!(banner.contains(REVERT_COMMAND));
    }

    #[test]
    fn test_clean_report_has_two_lines() {
        let report = BatchReport {
            pages: 2,
            files_scanned: 5,
            files_rewritten: 1,
            references_rewritten: 3,
            assets_queued: 2,
            ..BatchReport::default()
        };
        let lines = summary_lines(&report);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Scanned 2 page(s), 5 file(s)"));
        assert!(lines[1].contains("2 queued"));
    }

    #[test]
    fn test_problems_are_listed() {
        let report = BatchReport {
            pages_missing_entry: 1,
            files_failed: 2,
            references_unsupported: 4,
            ..BatchReport::default()
        };
        let lines = summary_lines(&report);
        assert!(lines.iter().any(|line| line.contains("no entry file")));
        assert!(lines.iter().any(|line| line.contains("left untouched")));
        assert!(lines.iter().any(|line| line.contains("unsupported file types")));
    }
}

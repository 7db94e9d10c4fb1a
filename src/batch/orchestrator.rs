//! Scan pages, then drain the download queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use walkdir::WalkDir;

use super::{BatchError, BatchReport};
use crate::config::Options;
use crate::download::{AssetFetcher, DownloadEvent, DownloadScheduler, RetryPolicy};
use crate::format::SourceFormatter;
use crate::matcher::AssetMatcher;
use crate::rewrite::{RewriteEngine, RewriteOutcome};

/// Runs the rewrite pass over pages and materializes their assets.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use img2local_core::{BatchOrchestrator, HttpClient, Options, PassthroughFormatter, all_pages};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let options = Options::default();
/// let pages = all_pages(&options, Path::new("."))?;
/// let orchestrator = BatchOrchestrator::new(
///     options,
///     Arc::new(PassthroughFormatter),
///     Arc::new(HttpClient::new()?),
/// )?;
/// let report = orchestrator.run(&pages).await?;
/// println!("rewrote {} files", report.files_rewritten);
/// # Ok(())
/// # }
/// ```
pub struct BatchOrchestrator {
    options: Options,
    engine: RewriteEngine,
    fetcher: Arc<dyn AssetFetcher>,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("options", &self.options)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl BatchOrchestrator {
    /// Validates `options` and compiles its patterns.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Config`] for invalid options.
    pub fn new(
        options: Options,
        formatter: Arc<dyn SourceFormatter>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Result<Self, BatchError> {
        options.validate()?;
        let engine = RewriteEngine::new(AssetMatcher::from_options(&options)?, formatter);
        let retry_policy = RetryPolicy::with_max_attempts(options.max_attempts);
        Ok(Self {
            options,
            engine,
            fetcher,
            retry_policy,
        })
    }

    /// Replaces the retry policy derived from the options.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The validated options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Rewrites every file of every page and queues their assets without
    /// fetching anything.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Write`] when a rewritten file cannot be written
    /// back; files already rewritten stay rewritten. Read and format errors
    /// are logged and counted instead.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn prepare(&self, pages: &[PathBuf]) -> Result<PreparedBatch, BatchError> {
        let mut scheduler = DownloadScheduler::new(
            Arc::clone(&self.fetcher),
            self.options.download_concurrency,
            self.retry_policy.clone(),
            self.options.task_timeout(),
        )?;
        let mut report = BatchReport::default();

        for page in pages {
            self.scan_page(page, &mut scheduler, &mut report)?;
        }
        report.assets_queued = scheduler.len();

        info!(
            pages = report.pages,
            files = report.files_scanned,
            rewritten = report.files_rewritten,
            failed = report.files_failed,
            assets = report.assets_queued,
            "scan complete"
        );
        Ok(PreparedBatch { scheduler, report })
    }

    /// [`prepare`](Self::prepare) followed by [`PreparedBatch::download`].
    ///
    /// # Errors
    ///
    /// See [`prepare`](Self::prepare) and [`PreparedBatch::download`].
    pub async fn run(&self, pages: &[PathBuf]) -> Result<BatchReport, BatchError> {
        self.prepare(pages)?.download().await
    }

    fn scan_page(
        &self,
        page: &Path,
        scheduler: &mut DownloadScheduler,
        report: &mut BatchReport,
    ) -> Result<(), BatchError> {
        report.pages += 1;
        if !page.join(&self.options.entry_file).is_file() {
            report.pages_missing_entry += 1;
            error!(
                page = %page.display(),
                entry_file = %self.options.entry_file,
                "page has no entry file; check the arguments or the project layout"
            );
        }

        let asset_dir = page.join(&self.options.output_dir);
        for entry in WalkDir::new(page).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(page = %page.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            report.files_scanned += 1;
            match self.engine.process(entry.path(), &asset_dir, scheduler) {
                Ok(RewriteOutcome::NoMatch) => {}
                Ok(RewriteOutcome::Unsupported { references }) => {
                    report.references_unsupported += references;
                }
                Ok(RewriteOutcome::Rewritten { references, .. }) => {
                    report.files_rewritten += 1;
                    report.references_rewritten += references;
                }
                Err(e) if e.is_fatal() => return Err(BatchError::Write(e)),
                Err(e) => {
                    error!(error = %e, "file skipped");
                    report.files_failed += 1;
                }
            }
        }
        Ok(())
    }
}

/// Pages scanned, downloads held.
#[derive(Debug)]
pub struct PreparedBatch {
    scheduler: DownloadScheduler,
    report: BatchReport,
}

impl PreparedBatch {
    /// Number of unique assets waiting to be downloaded.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.scheduler.len()
    }

    /// Scan counts so far; download stats are still empty.
    #[must_use]
    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    /// One event per settled asset once [`download`](Self::download) runs.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DownloadEvent> {
        self.scheduler.subscribe()
    }

    /// Releases the queue and waits for every asset to settle.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Scheduler`] if the scheduler itself fails.
    /// Failed downloads are reported in [`BatchReport::downloads`].
    pub async fn download(self) -> Result<BatchReport, BatchError> {
        let mut report = self.report;
        report.downloads = self.scheduler.start().wait().await?;

        let dangling = report.dangling_assets();
        if !dangling.is_empty() {
            warn!(
                count = dangling.len(),
                assets = ?dangling,
                "some assets could not be downloaded; their references point at missing files"
            );
        }
        Ok(report)
    }
}

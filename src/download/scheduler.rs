//! Deduplicating, bounded-concurrency download scheduler.
//!
//! Assets are submitted while source files are being rewritten and nothing is
//! fetched until [`DownloadScheduler::start`] is called, so the queue size is
//! known before the first download begins.
//!
//! # Dedup
//!
//! The registry is keyed by local filename for the whole run. The first
//! submission of a filename wins; later submissions for the same directory are
//! suppressed, and submissions for another page's asset directory are recorded
//! as extra destinations that receive a copy of the downloaded file.
//!
//! # Concurrency Model
//!
//! - A driver task walks the queue in submission order
//! - A semaphore permit is acquired before spawning each download task
//! - Permits are released when the task settles (RAII)
//! - Each attempt is bounded by the per-task timeout
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use img2local_core::download::{DownloadScheduler, HttpClient, RemoteAsset, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Arc::new(HttpClient::new()?);
//! let mut scheduler =
//!     DownloadScheduler::new(fetcher, 10, RetryPolicy::default(), Duration::from_secs(5))?;
//! scheduler.submit(RemoteAsset::new(
//!     "logo.png",
//!     "https://img.example.com/logo.png",
//!     "src/pages/home/assets/images",
//! ));
//! let stats = scheduler.start().wait().await?;
//! println!("Downloaded: {}, Failed: {}", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::constants::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::fetcher::AssetFetcher;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::DownloadError;

/// Error type for scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    /// The driver task panicked or was cancelled.
    #[error("download driver stopped: {0}")]
    Driver(String),
}

/// A remote file to materialize under a page's asset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    /// Local filename, the dedup key.
    pub filename: String,
    /// Canonical (https) download URL.
    pub url: String,
    /// Directory the file is written into.
    pub target_dir: PathBuf,
}

impl RemoteAsset {
    /// Creates a new asset description.
    pub fn new(
        filename: impl Into<String>,
        url: impl Into<String>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
            target_dir: target_dir.into(),
        }
    }

    /// Full path of the downloaded file.
    #[must_use]
    pub fn destination(&self) -> PathBuf {
        self.target_dir.join(&self.filename)
    }
}

/// Lifecycle of a registered asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    /// Registered, scheduler not started or waiting for a permit.
    Pending,
    /// A task owns the asset.
    InFlight,
    /// Every destination holds the file.
    Succeeded,
    /// Attempts exhausted or a local error occurred.
    Failed,
}

/// Result of [`DownloadScheduler::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// First time this filename was seen; a download task was queued.
    Queued,
    /// Already queued for the same directory; nothing changed.
    Duplicate,
    /// Already queued for another directory; this one receives a copy.
    ExtraDestination,
}

/// How one queued asset settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Fetched over the network.
    Downloaded {
        /// Bytes written to the primary destination.
        bytes: u64,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Every destination already existed, or was filled from a local copy.
    AlreadyPresent,
    /// The asset could not be materialized; references to it dangle.
    Failed {
        /// Attempts used.
        attempts: u32,
        /// Last error, rendered.
        error: String,
    },
}

/// Emitted once per settled asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEvent {
    /// The asset's filename.
    pub filename: String,
    /// How it settled.
    pub outcome: DownloadOutcome,
}

/// Statistics from a scheduler run.
///
/// Uses atomic counters for thread-safe updates from concurrent download
/// tasks.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
    failed_assets: Mutex<Vec<String>>,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of assets fetched over the network.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of assets already on disk.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns the number of failed assets.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the total number of settled assets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.skipped() + self.failed()
    }

    /// Returns the number of retry attempts made.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Filenames of failed assets, in settlement order.
    #[must_use]
    pub fn failed_assets(&self) -> Vec<String> {
        self.failed_assets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failed(&self, filename: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.failed_assets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(filename.to_string());
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Self {
        Self {
            completed: AtomicUsize::new(self.completed()),
            skipped: AtomicUsize::new(self.skipped()),
            failed: AtomicUsize::new(self.failed()),
            retried: AtomicUsize::new(self.retried()),
            failed_assets: Mutex::new(self.failed_assets()),
        }
    }
}

#[derive(Debug)]
struct AssetEntry {
    asset: RemoteAsset,
    extra_dirs: Vec<PathBuf>,
    state: AssetState,
}

/// Work handed to one download task.
#[derive(Debug)]
struct Job {
    asset: RemoteAsset,
    destinations: Vec<PathBuf>,
}

/// Shared state cloned into every download task.
#[derive(Clone)]
struct Worker {
    fetcher: Arc<dyn AssetFetcher>,
    retry_policy: RetryPolicy,
    task_timeout: Duration,
    registry: Arc<DashMap<String, AssetEntry>>,
    stats: Arc<DownloadStats>,
    events: Option<mpsc::UnboundedSender<DownloadEvent>>,
}

/// Held queue of unique assets; see the module docs.
pub struct DownloadScheduler {
    worker: Worker,
    concurrency: usize,
    order: Vec<String>,
}

impl std::fmt::Debug for DownloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadScheduler")
            .field("concurrency", &self.concurrency)
            .field("queued", &self.order.len())
            .finish_non_exhaustive()
    }
}

impl DownloadScheduler {
    /// Creates a held scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConcurrency`] if `concurrency` is
    /// outside 1-100.
    #[instrument(level = "debug", skip(fetcher, retry_policy))]
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        concurrency: usize,
        retry_policy: RetryPolicy,
        task_timeout: Duration,
    ) -> Result<Self, SchedulerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(SchedulerError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            task_timeout_ms = task_timeout.as_millis(),
            "creating download scheduler"
        );

        Ok(Self {
            worker: Worker {
                fetcher,
                retry_policy,
                task_timeout,
                registry: Arc::new(DashMap::new()),
                stats: Arc::new(DownloadStats::new()),
                events: None,
            },
            concurrency,
            order: Vec::new(),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns a receiver of one [`DownloadEvent`] per settled asset.
    ///
    /// Only the most recent subscriber receives events. The channel closes
    /// once the run has drained.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DownloadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.worker.events = Some(tx);
        rx
    }

    /// Registers an asset, first-seen-wins by filename.
    pub fn submit(&mut self, asset: RemoteAsset) -> Submission {
        match self.worker.registry.entry(asset.filename.clone()) {
            Entry::Vacant(vacant) => {
                debug!(filename = %asset.filename, url = %asset.url, "queued asset");
                self.order.push(asset.filename.clone());
                vacant.insert(AssetEntry {
                    asset,
                    extra_dirs: Vec::new(),
                    state: AssetState::Pending,
                });
                Submission::Queued
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.asset.url != asset.url {
                    debug!(
                        filename = %asset.filename,
                        kept = %entry.asset.url,
                        ignored = %asset.url,
                        "different URLs share one filename"
                    );
                }
                if entry.asset.target_dir == asset.target_dir
                    || entry.extra_dirs.contains(&asset.target_dir)
                {
                    Submission::Duplicate
                } else {
                    entry.extra_dirs.push(asset.target_dir);
                    Submission::ExtraDestination
                }
            }
        }
    }

    /// Number of unique assets queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true when nothing was queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Current state of a registered asset.
    #[must_use]
    pub fn state(&self, filename: &str) -> Option<AssetState> {
        self.worker.registry.get(filename).map(|entry| entry.state)
    }

    /// Releases the held queue. Must be called within a Tokio runtime.
    #[must_use = "the returned handle must be awaited to drain the queue"]
    pub fn start(self) -> DrainHandle {
        let total = self.order.len();
        info!(total, concurrency = self.concurrency, "starting downloads");
        let stats = Arc::clone(&self.worker.stats);
        let registry = Arc::clone(&self.worker.registry);
        let driver = tokio::spawn(self.drive());
        DrainHandle {
            driver,
            stats,
            registry,
            total,
        }
    }

    async fn drive(self) -> Result<(), SchedulerError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(self.order.len());

        for filename in &self.order {
            // Blocks while `concurrency` tasks are in flight
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::SemaphoreClosed)?;

            let Some(job) = self.worker.claim(filename) else {
                continue;
            };
            let worker = self.worker.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                worker.run(job).await;
            }));
        }

        debug!(
            task_count = handles.len(),
            "waiting for downloads to complete"
        );
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
            }
        }
        Ok(())
    }
}

/// Handle to a started scheduler.
#[derive(Debug)]
pub struct DrainHandle {
    driver: JoinHandle<Result<(), SchedulerError>>,
    stats: Arc<DownloadStats>,
    registry: Arc<DashMap<String, AssetEntry>>,
    total: usize,
}

impl DrainHandle {
    /// Number of unique assets in this run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Waits until the queue is empty and every task has settled.
    ///
    /// Individual download failures do not make this fail; they are counted
    /// in the returned stats.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if the driver itself stopped abnormally.
    pub async fn wait(self) -> Result<DownloadStats, SchedulerError> {
        self.driver
            .await
            .map_err(|e| SchedulerError::Driver(e.to_string()))??;

        let stats = Arc::try_unwrap(self.stats).unwrap_or_else(|shared| shared.snapshot());
        info!(
            completed = stats.completed(),
            skipped = stats.skipped(),
            failed = stats.failed(),
            retried = stats.retried(),
            assets = self.registry.len(),
            "downloads drained"
        );
        Ok(stats)
    }
}

impl Worker {
    fn claim(&self, filename: &str) -> Option<Job> {
        let mut entry = self.registry.get_mut(filename)?;
        entry.state = AssetState::InFlight;
        let mut destinations = vec![entry.asset.destination()];
        destinations.extend(
            entry
                .extra_dirs
                .iter()
                .map(|dir| dir.join(&entry.asset.filename)),
        );
        Some(Job {
            asset: entry.asset.clone(),
            destinations,
        })
    }

    #[instrument(skip_all, fields(filename = %job.asset.filename, url = %job.asset.url))]
    async fn run(&self, job: Job) {
        let outcome = self.materialize(&job).await;

        let state = match &outcome {
            DownloadOutcome::Downloaded { bytes, attempts } => {
                info!(bytes, attempts, "asset downloaded");
                self.stats.increment_completed();
                AssetState::Succeeded
            }
            DownloadOutcome::AlreadyPresent => {
                debug!("asset already on disk");
                self.stats.increment_skipped();
                AssetState::Succeeded
            }
            DownloadOutcome::Failed { attempts, error } => {
                warn!(attempts, %error, "asset download failed; references to it dangle");
                self.stats.record_failed(&job.asset.filename);
                AssetState::Failed
            }
        };

        if let Some(mut entry) = self.registry.get_mut(&job.asset.filename) {
            entry.state = state;
        }
        if let Some(events) = &self.events {
            let _ = events.send(DownloadEvent {
                filename: job.asset.filename,
                outcome,
            });
        }
    }

    async fn materialize(&self, job: &Job) -> DownloadOutcome {
        let mut present = None;
        let mut missing = Vec::new();
        for destination in &job.destinations {
            if tokio::fs::try_exists(destination).await.unwrap_or(false) {
                present.get_or_insert(destination);
            } else {
                missing.push(destination);
            }
        }

        // Local copy when another page already holds the file
        if let Some(source) = present {
            return match copy_into(source, &missing).await {
                Ok(()) => DownloadOutcome::AlreadyPresent,
                Err(e) => DownloadOutcome::Failed {
                    attempts: 0,
                    error: e.to_string(),
                },
            };
        }

        let Some((primary, extras)) = missing.split_first() else {
            return DownloadOutcome::AlreadyPresent;
        };
        match self.download_with_retry(&job.asset.url, primary).await {
            Ok((bytes, attempts)) => match copy_into(primary, extras).await {
                Ok(()) => DownloadOutcome::Downloaded { bytes, attempts },
                Err(e) => DownloadOutcome::Failed {
                    attempts,
                    error: e.to_string(),
                },
            },
            Err((e, attempts)) => DownloadOutcome::Failed {
                attempts,
                error: e.to_string(),
            },
        }
    }

    /// Fetches with the retry policy, each attempt bounded by the task timeout.
    async fn download_with_retry(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<(u64, u32), (DownloadError, u32)> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting download");

            let result =
                match tokio::time::timeout(self.task_timeout, self.fetcher.fetch(url, destination))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        // The cancelled fetch may have left a partial file
                        let _ = tokio::fs::remove_file(destination).await;
                        Err(DownloadError::timeout(url))
                    }
                };

            let error = match result {
                Ok(bytes) => return Ok((bytes, attempt)),
                Err(e) => e,
            };

            match self
                .retry_policy
                .should_retry(classify_error(&error), attempt)
            {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    warn!(
                        url,
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying download"
                    );
                    self.stats.increment_retried();
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url, %reason, "not retrying download");
                    return Err((error, attempt));
                }
            }
        }
    }
}

async fn copy_into(source: &Path, destinations: &[&PathBuf]) -> Result<(), DownloadError> {
    for destination in destinations {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }
        tokio::fs::copy(source, destination)
            .await
            .map_err(|e| DownloadError::io(destination.as_path(), e))?;
        debug!(from = %source.display(), to = %destination.display(), "copied asset");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;

    /// Writes a fixed body; fails the first `failures` calls with a 503.
    #[derive(Default)]
    struct FakeFetcher {
        failures: u32,
        calls: AtomicU32,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl AssetFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if call <= self.failures {
                return Err(DownloadError::http_status(url, 503));
            }
            tokio::fs::create_dir_all(destination.parent().unwrap())
                .await
                .unwrap();
            tokio::fs::write(destination, b"img").await.unwrap();
            Ok(3)
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(5),
            2.0,
        )
        .without_jitter()
    }

    fn scheduler(fetcher: &Arc<FakeFetcher>, max_attempts: u32) -> DownloadScheduler {
        let fetcher: Arc<dyn AssetFetcher> = Arc::clone(fetcher) as Arc<dyn AssetFetcher>;
        DownloadScheduler::new(
            fetcher,
            4,
            fast_policy(max_attempts),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_scheduler_rejects_invalid_concurrency() {
        let fetcher: Arc<dyn AssetFetcher> = Arc::new(FakeFetcher::default());
        for value in [0, 101] {
            let result = DownloadScheduler::new(
                Arc::clone(&fetcher),
                value,
                RetryPolicy::default(),
                Duration::from_secs(1),
            );
            assert!(matches!(
                result,
                Err(SchedulerError::InvalidConcurrency { value: v }) if v == value
            ));
        }
    }

    #[test]
    fn test_submit_dedups_by_filename() {
        let fetcher = Arc::new(FakeFetcher::default());
        let mut scheduler = scheduler(&fetcher, 3);

        let first = RemoteAsset::new("a.png", "https://img.x.com/1/a.png", "/p1/assets");
        let same_dir = RemoteAsset::new("a.png", "https://img.x.com/2/a.png", "/p1/assets");
        let other_dir = RemoteAsset::new("a.png", "https://img.x.com/1/a.png", "/p2/assets");

        assert_eq!(scheduler.submit(first), Submission::Queued);
        assert_eq!(scheduler.submit(same_dir), Submission::Duplicate);
        assert_eq!(scheduler.submit(other_dir.clone()), Submission::ExtraDestination);
        assert_eq!(scheduler.submit(other_dir), Submission::Duplicate);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.state("a.png"), Some(AssetState::Pending));
    }

    #[tokio::test]
    async fn test_nothing_fetched_before_start() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let mut scheduler = scheduler(&fetcher, 3);
        scheduler.submit(RemoteAsset::new("a.png", "https://img.x.com/a.png", temp.path()));

        tokio::task::yield_now().await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

        let stats = scheduler.start().wait().await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.completed(), 1);
    }

    #[tokio::test]
    async fn test_extra_destination_gets_copy_without_second_fetch() {
        let temp = TempDir::new().unwrap();
        let first_dir = temp.path().join("home/assets/images");
        let second_dir = temp.path().join("about/assets/images");
        let fetcher = Arc::new(FakeFetcher::default());
        let mut scheduler = scheduler(&fetcher, 3);

        scheduler.submit(RemoteAsset::new("a.png", "https://img.x.com/a.png", &first_dir));
        scheduler.submit(RemoteAsset::new("a.png", "https://img.x.com/a.png", &second_dir));
        let stats = scheduler.start().wait().await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.completed(), 1);
        assert_eq!(std::fs::read(first_dir.join("a.png")).unwrap(), b"img");
        assert_eq!(std::fs::read(second_dir.join("a.png")).unwrap(), b"img");
    }

    #[tokio::test]
    async fn test_existing_file_skips_network() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.png"), b"old").unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let mut scheduler = scheduler(&fetcher, 3);
        let mut events = scheduler.subscribe();

        scheduler.submit(RemoteAsset::new("a.png", "https://img.x.com/a.png", temp.path()));
        let stats = scheduler.start().wait().await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(stats.skipped(), 1);
        assert_eq!(std::fs::read(temp.path().join("a.png")).unwrap(), b"old");
        let event = events.recv().await.unwrap();
        assert_eq!(event.outcome, DownloadOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_then_succeeds() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher {
            failures: 1,
            ..FakeFetcher::default()
        });
        let mut scheduler = scheduler(&fetcher, 3);
        let mut events = scheduler.subscribe();

        scheduler.submit(RemoteAsset::new("a.png", "https://img.x.com/a.png", temp.path()));
        let stats = scheduler.start().wait().await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.retried(), 1);
        assert!(temp.path().join("a.png").exists());
        let event = events.recv().await.unwrap();
        assert_eq!(
            event.outcome,
            DownloadOutcome::Downloaded {
                bytes: 3,
                attempts: 2
            }
        );
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_retry_logged_at_warn_with_next_attempt() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher {
            failures: 1,
            ..FakeFetcher::default()
        });
        let mut scheduler = scheduler(&fetcher, 3);
        scheduler.submit(RemoteAsset::new("a.png", "https://img.x.com/a.png", temp.path()));
        let stats = scheduler.start().wait().await.unwrap();

        assert_eq!(stats.retried(), 1);
        let output = logs.contents();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("retrying download"), "{output}");
        assert!(output.contains("attempt=2"), "{output}");
        assert!(output.contains("max_attempts=3"), "{output}");
        assert!(output.contains("https://img.x.com/a.png"), "{output}");
    }

    #[tokio::test]
    async fn test_exhausted_retries_counted_not_fatal() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher {
            failures: u32::MAX,
            ..FakeFetcher::default()
        });
        let mut scheduler = scheduler(&fetcher, 2);
        let mut events = scheduler.subscribe();

        scheduler.submit(RemoteAsset::new("a.png", "https://img.x.com/a.png", temp.path()));
        scheduler.submit(RemoteAsset::new("b.png", "https://img.x.com/b.png", temp.path()));
        let stats = scheduler.start().wait().await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
        assert_eq!(stats.failed(), 2);
        let mut failed = stats.failed_assets();
        failed.sort();
        assert_eq!(failed, vec!["a.png".to_string(), "b.png".to_string()]);

        let mut settled = 0;
        while let Some(event) = events.recv().await {
            assert!(matches!(
                event.outcome,
                DownloadOutcome::Failed { attempts: 2, .. }
            ));
            settled += 1;
        }
        assert_eq!(settled, 2);
    }

    #[tokio::test]
    async fn test_timeout_treated_as_retryable_failure() {
        let temp = TempDir::new().unwrap();
        let fetcher: Arc<dyn AssetFetcher> = Arc::new(FakeFetcher {
            delay: Some(Duration::from_millis(200)),
            ..FakeFetcher::default()
        });
        let mut scheduler =
            DownloadScheduler::new(fetcher, 1, fast_policy(2), Duration::from_millis(20)).unwrap();

        scheduler.submit(RemoteAsset::new("a.png", "https://img.x.com/a.png", temp.path()));
        let stats = scheduler.start().wait().await.unwrap();

        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.retried(), 1);
        assert!(!temp.path().join("a.png").exists());
    }

    #[test]
    fn test_scheduler_error_display() {
        let msg = SchedulerError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains("100"));
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::asset_store::{AssetStore, BatchReport};
use crate::batch::BatchProcessor;
use crate::capture::{CaptureOutcome, CaptureScheduler, RequestInfo};
use crate::clock::Clock;
use crate::config::MirrorConfig;
use crate::downloader::{HttpFetcher, RetryPolicy};
use crate::error::{MirrorError, StoreError};
use crate::file_manager::FileManager;
use crate::page_rewriter::PageRewriter;
use crate::scheduler::{Job, Scheduler, StoreScheduler};
use crate::staleness::{Freshness, StalenessPolicy};
use crate::store::{keys, KeyValueStore, KeyValueStoreExt};

/// Snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorStatus {
    pub enabled: bool,
    pub static_root: PathBuf,
    pub pages: usize,
    pub pending_assets: usize,
    pub downloaded_assets: usize,
    pub failed_assets: usize,
    pub tree_size_bytes: u64,
}

/// Entry point for hosts: wires the collaborators together and exposes the
/// capture, batch and administration operations.
pub struct StaticMirror {
    config: MirrorConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    files: FileManager,
    assets: Arc<AssetStore>,
    capture: CaptureScheduler,
    batch: BatchProcessor,
}

impl StaticMirror {
    pub fn new(
        config: MirrorConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        fetcher: Arc<dyn HttpFetcher>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, MirrorError> {
        let site = config.site()?;
        let files = FileManager::new(&config.output_dir).map_err(|source| MirrorError::Io {
            path: config.output_dir.clone(),
            source,
        })?;

        let assets = Arc::new(
            AssetStore::new(site.clone(), files.clone(), store.clone(), fetcher, scheduler)
                .with_retry_policy(RetryPolicy::from(&config.fetch))
                .with_batch_config(config.batch.clone()),
        );
        let capture = CaptureScheduler::new(
            PageRewriter::new(site),
            assets.clone(),
            files.clone(),
            clock.clone(),
            StalenessPolicy::new(config.generator_version.clone(), config.cache_ttl()),
        );
        let batch = BatchProcessor::new(assets.clone(), config.batch.clone());

        Ok(Self {
            config,
            store,
            clock,
            files,
            assets,
            capture,
            batch,
        })
    }

    /// Unreadable state counts as disabled.
    pub fn is_enabled(&self) -> bool {
        self.store.get_or(keys::ENABLED, false).unwrap_or_else(|e| {
            warn!(error = %e, "could not read enabled flag");
            false
        })
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.store.set_value(keys::ENABLED, &enabled)?;
        info!(enabled, "static mirror toggled");
        Ok(())
    }

    pub fn enable(&self) -> Result<(), StoreError> {
        self.set_enabled(true)
    }

    pub fn disable(&self) -> Result<(), StoreError> {
        self.set_enabled(false)
    }

    /// Post-render hook: captures `html` for `request_path` when enabled and
    /// the stored copy is stale.
    pub fn capture(&self, html: &str, request_path: &str) -> CaptureOutcome {
        if !self.is_enabled() {
            return CaptureOutcome::Disabled;
        }
        self.capture.capture(html, request_path)
    }

    /// Like [`StaticMirror::capture`], after checking that the request is an
    /// anonymous GET for a cacheable page.
    pub fn handle_response(&self, request: &RequestInfo, html: &str) -> CaptureOutcome {
        if !self.is_enabled() {
            return CaptureOutcome::Disabled;
        }
        self.capture.handle(request, html)
    }

    pub fn freshness(&self, request_path: &str) -> Freshness {
        self.capture.freshness(request_path)
    }

    pub async fn process_pending_batch(&self, max_n: usize) -> Result<BatchReport, MirrorError> {
        Ok(self.batch.process_interactive(Some(max_n)).await?)
    }

    pub async fn process_all(
        &self,
        max_n: usize,
        on_batch: impl FnMut(&BatchReport),
    ) -> Result<BatchReport, MirrorError> {
        Ok(self.batch.drain_all(max_n, on_batch).await?)
    }

    pub async fn run_job(&self, job: Job) -> Result<BatchReport, MirrorError> {
        Ok(self.batch.run_job(job).await?)
    }

    /// Runs every job `scheduler` reports as due.
    pub async fn run_due_jobs(
        &self,
        scheduler: &StoreScheduler,
    ) -> Result<Vec<(Job, BatchReport)>, MirrorError> {
        let mut reports = Vec::new();
        for job in scheduler.take_due()? {
            reports.push((job, self.run_job(job).await?));
        }
        Ok(reports)
    }

    /// Wipes the static tree and all asset state. Returns whether both
    /// succeeded.
    pub fn clear_all(&self) -> bool {
        let cleared = self
            .files
            .clear()
            .map_err(|source| MirrorError::Io {
                path: self.files.base_dir().to_path_buf(),
                source,
            })
            .and_then(|()| self.assets.clear_state().map_err(MirrorError::from));
        match cleared {
            Ok(()) => {
                info!(root = %self.files.base_dir().display(), "static mirror cleared");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to clear static mirror");
                false
            }
        }
    }

    /// `<output_dir>-<timestamp>.zip`, next to the static root.
    pub fn default_archive_path(&self) -> PathBuf {
        let stem = self
            .config
            .output_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "static-site".to_string());
        let name = format!("{stem}-{}.zip", self.clock.now().format("%Y-%m-%d-%H-%M-%S"));
        self.config.output_dir.with_file_name(name)
    }

    /// Packs the static tree into a ZIP file at `dest` and returns its path.
    pub fn create_archive(&self, dest: &Path) -> Result<PathBuf, MirrorError> {
        let files = self.files.write_archive(dest)?;
        info!(archive = %dest.display(), files, "static mirror archived");
        Ok(dest.to_path_buf())
    }

    pub fn static_tree_root(&self) -> &Path {
        self.files.base_dir()
    }

    pub fn asset_root(&self) -> PathBuf {
        self.assets.asset_root()
    }

    /// Number of captured pages.
    pub fn file_count(&self) -> usize {
        self.files.html_file_count()
    }

    pub fn tree_size_bytes(&self) -> u64 {
        self.files.tree_size_bytes()
    }

    pub fn pending_count(&self) -> Result<usize, StoreError> {
        self.assets.pending_count()
    }

    pub fn downloaded_count(&self) -> Result<usize, StoreError> {
        self.assets.downloaded_count()
    }

    pub fn status(&self) -> Result<MirrorStatus, StoreError> {
        Ok(MirrorStatus {
            enabled: self.is_enabled(),
            static_root: self.static_tree_root().to_path_buf(),
            pages: self.file_count(),
            pending_assets: self.assets.pending_count()?,
            downloaded_assets: self.assets.downloaded_count()?,
            failed_assets: self.assets.failed_count()?,
            tree_size_bytes: self.tree_size_bytes(),
        })
    }
}

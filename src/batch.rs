//! Interactive and background entry points over the asset drain.

use std::sync::Arc;

use tracing::info;

use crate::asset_store::{AssetStore, BatchReport};
use crate::config::BatchConfig;
use crate::error::AssetError;
use crate::scheduler::Job;

pub struct BatchProcessor {
    assets: Arc<AssetStore>,
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(assets: Arc<AssetStore>, config: BatchConfig) -> Self {
        Self { assets, config }
    }

    /// One small batch for a "process now" request; `None` uses the
    /// configured interactive size.
    pub async fn process_interactive(&self, max_n: Option<usize>) -> Result<BatchReport, AssetError> {
        let max_n = max_n.unwrap_or(self.config.interactive_size).max(1);
        self.assets.drain_batch(max_n).await
    }

    /// Deferred job body. The drain re-arms the job while a backlog remains.
    pub async fn run_background(&self) -> Result<BatchReport, AssetError> {
        let report = self.assets.drain_batch(self.config.background_size.max(1)).await?;
        info!(
            processed = report.processed,
            failed = report.failed,
            remaining = report.remaining,
            "background asset job finished"
        );
        Ok(report)
    }

    pub async fn run_job(&self, job: Job) -> Result<BatchReport, AssetError> {
        match job {
            Job::ProcessAssets => self.run_background().await,
        }
    }

    /// Drains in batches of `max_n` until the queue is empty or a batch
    /// makes no progress. `on_batch` sees every batch report. Returns totals,
    /// with `remaining` taken from the last batch.
    pub async fn drain_all(
        &self,
        max_n: usize,
        mut on_batch: impl FnMut(&BatchReport),
    ) -> Result<BatchReport, AssetError> {
        let mut total = BatchReport {
            remaining: self.assets.pending_count()?,
            ..BatchReport::default()
        };

        while total.remaining > 0 {
            let report = self.assets.drain_batch(max_n.max(1)).await?;
            on_batch(&report);
            total.processed += report.processed;
            total.failed += report.failed;
            total.remaining = report.remaining;
            if report.processed == 0 && report.failed == 0 {
                break;
            }
        }
        Ok(total)
    }
}

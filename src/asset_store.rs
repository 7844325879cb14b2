//! Localizes same-origin resources into the flat `assets/` directory.
//!
//! Durable state lives in the key-value store: the pending queue (ordered,
//! deduplicated), the downloaded set, per-URL failure counts and the asset
//! name registry shared with the page rewriter. Read-modify-write cycles on
//! that state are serialized by `state_lock`, which is never held across an
//! `.await`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{BatchConfig, FetchConfig};
use crate::downloader::{fetch_with_retry, HttpFetcher, RetryPolicy};
use crate::error::{AssetError, StoreError};
use crate::file_manager::{FileManager, ASSETS_DIR};
use crate::payload::{rewrite_references, scan_stylesheet, PayloadReference, ScriptScanner};
use crate::scheduler::{Job, Scheduler};
use crate::store::{keys, KeyValueStore, KeyValueStoreExt};
use crate::url_resolver::{self, asset_key, is_same_origin, AssetNames, ResourceType};

/// Outcome of one bounded drain of the pending queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// URLs now stored locally.
    pub processed: usize,
    /// URLs that failed in this batch, whether dropped or re-queued.
    pub failed: usize,
    /// Pending URLs left after the batch.
    pub remaining: usize,
}

pub struct AssetStore {
    site: Url,
    files: FileManager,
    store: Arc<dyn KeyValueStore>,
    fetcher: Arc<dyn HttpFetcher>,
    scheduler: Arc<dyn Scheduler>,
    scripts: ScriptScanner,
    retry: RetryPolicy,
    batch: BatchConfig,
    state_lock: Mutex<()>,
}

impl AssetStore {
    pub fn new(
        site: Url,
        files: FileManager,
        store: Arc<dyn KeyValueStore>,
        fetcher: Arc<dyn HttpFetcher>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            scripts: ScriptScanner::new(&site),
            site,
            files,
            store,
            fetcher,
            scheduler,
            retry: RetryPolicy::from(&FetchConfig::default()),
            batch: BatchConfig::default(),
            state_lock: Mutex::new(()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn files(&self) -> &FileManager {
        &self.files
    }

    pub fn asset_root(&self) -> PathBuf {
        self.files.assets_dir()
    }

    /// Runs `f` against the persisted name registry, saving any new claims.
    pub fn with_names<R>(&self, f: impl FnOnce(&mut AssetNames) -> R) -> Result<R, StoreError> {
        let _guard = self.state_lock.lock();
        let mut names: AssetNames = self.store.get_or(keys::ASSET_NAMES, AssetNames::new())?;
        let claimed = names.len();
        let result = f(&mut names);
        // Claims are only ever added.
        if names.len() != claimed {
            self.store.set_value(keys::ASSET_NAMES, &names)?;
        }
        Ok(result)
    }

    pub fn pending(&self) -> Result<Vec<String>, StoreError> {
        self.store.get_or(keys::PENDING_ASSETS, Vec::new())
    }

    pub fn pending_count(&self) -> Result<usize, StoreError> {
        Ok(self.pending()?.len())
    }

    pub fn downloaded_count(&self) -> Result<usize, StoreError> {
        Ok(self.downloaded()?.len())
    }

    pub fn is_downloaded(&self, url: &str) -> Result<bool, StoreError> {
        Ok(self.downloaded()?.contains(url))
    }

    /// URLs waiting for another batch run after failing.
    pub fn failed_count(&self) -> Result<usize, StoreError> {
        Ok(self.failures()?.len())
    }

    fn downloaded(&self) -> Result<BTreeSet<String>, StoreError> {
        self.store.get_or(keys::DOWNLOADED_ASSETS, BTreeSet::new())
    }

    fn failures(&self) -> Result<BTreeMap<String, u32>, StoreError> {
        self.store.get_or(keys::FAILED_ASSETS, BTreeMap::new())
    }

    /// Adds URLs to the pending queue and makes sure a background job will
    /// drain it. Returns how many URLs were new.
    pub fn queue<I, S>(&self, urls: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (added, pending_len) = {
            let _guard = self.state_lock.lock();
            let mut pending = self.pending()?;
            let downloaded = self.downloaded()?;
            let mut failures = self.failures()?;
            let mut known: HashSet<String> = pending.iter().cloned().collect();

            let mut added = 0;
            for url in urls {
                let url = url.as_ref();
                if downloaded.contains(url) || !known.insert(url.to_string()) {
                    continue;
                }
                // Rediscovery gives a failed URL a fresh start.
                failures.remove(url);
                pending.push(url.to_string());
                added += 1;
            }

            if added > 0 {
                self.store.set_value(keys::PENDING_ASSETS, &pending)?;
                self.store.set_value(keys::FAILED_ASSETS, &failures)?;
            }
            (added, pending.len())
        };

        if pending_len > 0 && !self.scheduler.is_scheduled(Job::ProcessAssets)? {
            self.scheduler
                .defer(Job::ProcessAssets, self.batch.initial_delay())?;
        }
        if added > 0 {
            debug!(added, pending = pending_len, "assets queued");
        }
        Ok(added)
    }

    /// Local path of `url`, fetching and rewriting it (and everything it
    /// references) when it is not stored yet.
    pub async fn ensure_local(&self, url: &str) -> Result<PathBuf, AssetError> {
        let parsed = Url::parse(url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| AssetError::InvalidUrl(url.to_string()))?;

        let mut visiting = HashSet::new();
        let name = self.localize(asset_key(&parsed), &mut visiting).await?;
        Ok(self.files.assets_dir().join(name))
    }

    fn localize<'a>(
        &'a self,
        key: String,
        visiting: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<String, AssetError>> {
        async move {
            let name = self.with_names(|names| names.local_name(&key))?;
            let relative = Path::new(ASSETS_DIR).join(&name);

            if self.files.exists(&relative) && self.is_downloaded(&key)? {
                debug!(url = %key, name = %name, "asset already local");
                return Ok(name);
            }
            if !visiting.insert(key.clone()) {
                debug!(url = %key, "asset already in progress further up the chain");
                return Ok(name);
            }

            let response = fetch_with_retry(self.fetcher.as_ref(), &key, self.retry)
                .await
                .map_err(|source| AssetError::Fetch {
                    url: key.clone(),
                    source,
                })?;

            let kind = payload_kind(&name, response.content_type.as_deref());
            let body = match kind {
                ResourceType::Stylesheet | ResourceType::Script => {
                    match String::from_utf8(response.body) {
                        Ok(text) if kind == ResourceType::Stylesheet => {
                            self.rewrite_stylesheet(&text, &key, visiting).await.into_bytes()
                        }
                        Ok(text) => self.rewrite_script(&text, visiting).await.into_bytes(),
                        Err(e) => e.into_bytes(),
                    }
                }
                _ => response.body,
            };

            self.files
                .write_atomic(&relative, &body)
                .map_err(|source| AssetError::Io {
                    path: relative.clone(),
                    source,
                })?;
            self.mark_downloaded(&key)?;
            info!(url = %key, name = %name, bytes = body.len(), "asset stored");
            Ok(name)
        }
        .boxed()
    }

    /// References resolve against the stylesheet's own URL and become bare
    /// filenames, since every asset shares one directory.
    async fn rewrite_stylesheet(
        &self,
        css: &str,
        own_url: &str,
        visiting: &mut HashSet<String>,
    ) -> String {
        let Ok(base) = Url::parse(own_url) else {
            return css.to_string();
        };
        let refs = scan_stylesheet(css);
        let mut targets = self
            .localize_references(&refs, &base, visiting, |name| name.to_string())
            .await;
        rewrite_references(css, &refs, |r| targets.remove(&r.range.start))
    }

    async fn rewrite_script(&self, js: &str, visiting: &mut HashSet<String>) -> String {
        let refs = self.scripts.scan(js);
        let mut targets = self
            .localize_references(&refs, &self.site, visiting, |name| format!("/{ASSETS_DIR}/{name}"))
            .await;
        rewrite_references(js, &refs, |r| targets.remove(&r.range.start))
    }

    /// Localizes each same-origin reference, keyed by its start offset.
    /// Failures leave the reference as it was.
    async fn localize_references(
        &self,
        refs: &[PayloadReference],
        base: &Url,
        visiting: &mut HashSet<String>,
        render: impl Fn(&str) -> String,
    ) -> HashMap<usize, String> {
        let mut targets = HashMap::new();
        for reference in refs {
            let Some(url) = url_resolver::absolute(&reference.raw, base) else {
                continue;
            };
            if !is_same_origin(&url, &self.site) {
                continue;
            }
            let fragment = url.fragment().map(|f| format!("#{f}")).unwrap_or_default();
            match self.localize(asset_key(&url), visiting).await {
                Ok(name) => {
                    targets.insert(reference.range.start, format!("{}{}", render(&name), fragment));
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "nested reference left unrewritten");
                }
            }
        }
        targets
    }

    fn mark_downloaded(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.state_lock.lock();
        let mut downloaded = self.downloaded()?;
        if downloaded.insert(key.to_string()) {
            self.store.set_value(keys::DOWNLOADED_ASSETS, &downloaded)?;
        }
        Ok(())
    }

    /// Removes `url` from the pending queue once its outcome is known.
    /// A failed URL goes to the back of the queue while it has batch runs left.
    fn settle(&self, url: &str, succeeded: bool) -> Result<bool, StoreError> {
        let _guard = self.state_lock.lock();
        let mut pending = self.pending()?;
        let mut failures = self.failures()?;
        pending.retain(|p| p != url);

        let mut requeued = false;
        if succeeded {
            failures.remove(url);
        } else {
            let runs = failures.get(url).copied().unwrap_or(0) + 1;
            if runs <= self.batch.failed_asset_retries {
                failures.insert(url.to_string(), runs);
                pending.push(url.to_string());
                requeued = true;
            } else {
                failures.remove(url);
            }
        }

        self.store.set_value(keys::PENDING_ASSETS, &pending)?;
        self.store.set_value(keys::FAILED_ASSETS, &failures)?;
        Ok(requeued)
    }

    /// Processes up to `max_n` pending URLs, front first. Each URL leaves the
    /// queue only after its fetch has succeeded or definitively failed. A
    /// follow-up job is scheduled while a backlog remains.
    pub async fn drain_batch(&self, max_n: usize) -> Result<BatchReport, AssetError> {
        let batch: Vec<String> = self.pending()?.into_iter().take(max_n).collect();
        let mut report = BatchReport::default();

        for url in &batch {
            let succeeded = match self.ensure_local(url).await {
                Ok(path) => {
                    debug!(url = %url, path = %path.display(), "asset localized");
                    report.processed += 1;
                    true
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "asset failed");
                    report.failed += 1;
                    false
                }
            };
            if self.settle(url, succeeded)? {
                debug!(url = %url, "failed asset re-queued");
            }
        }

        report.remaining = self.pending_count()?;
        if report.remaining > 0 {
            self.scheduler
                .defer(Job::ProcessAssets, self.batch.reschedule_delay())?;
        }
        if !batch.is_empty() {
            info!(
                processed = report.processed,
                failed = report.failed,
                remaining = report.remaining,
                "asset batch finished"
            );
        }
        Ok(report)
    }

    /// Forgets every queued, downloaded, failed and named asset.
    pub fn clear_state(&self) -> Result<(), StoreError> {
        let _guard = self.state_lock.lock();
        for key in [
            keys::PENDING_ASSETS,
            keys::DOWNLOADED_ASSETS,
            keys::FAILED_ASSETS,
            keys::ASSET_NAMES,
        ] {
            self.store.delete(key)?;
        }
        Ok(())
    }
}

/// Stylesheet or script by declared content type, else by filename.
fn payload_kind(name: &str, content_type: Option<&str>) -> ResourceType {
    let sniffed = content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .and_then(|mime| {
            let subtype = mime.subtype();
            if mime.type_() == mime::TEXT && subtype == mime::CSS {
                Some(ResourceType::Stylesheet)
            } else if subtype == mime::JAVASCRIPT
                || matches!(subtype.as_str(), "x-javascript" | "ecmascript")
            {
                Some(ResourceType::Script)
            } else {
                None
            }
        });
    sniffed.unwrap_or_else(|| ResourceType::of_filename(name))
}

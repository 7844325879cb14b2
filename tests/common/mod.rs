#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use static_mirror::{
    Clock, FetchError, FetchResponse, FixedClock, HttpFetcher, KeyValueStore, MemoryStore,
    MirrorConfig, StaticMirror, StoreScheduler,
};

pub const SITE: &str = "https://example.com/";

/// Serves per-URL response sequences. The last response of a sequence
/// repeats; unknown URLs are 404s.
#[derive(Default)]
pub struct ScriptedSite {
    scripts: Mutex<HashMap<String, VecDeque<FetchResponse>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, content_type: &str, body: &str) {
        self.script(url, vec![ok(content_type, body)]);
    }

    pub fn script(&self, url: &str, responses: Vec<FetchResponse>) {
        self.scripts
            .lock()
            .insert(url.to_string(), responses.into_iter().collect());
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HttpFetcher for ScriptedSite {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchResponse, FetchError> {
        *self.calls.lock().entry(url.to_string()).or_insert(0) += 1;
        let mut scripts = self.scripts.lock();
        let Some(queue) = scripts.get_mut(url) else {
            return Ok(status(404));
        };
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(response.unwrap_or_else(|| status(404)))
    }
}

pub fn ok(content_type: &str, body: &str) -> FetchResponse {
    FetchResponse {
        status: 200,
        content_type: Some(content_type.to_string()),
        body: body.as_bytes().to_vec(),
    }
}

pub fn status(code: u16) -> FetchResponse {
    FetchResponse {
        status: code,
        content_type: None,
        body: Vec::new(),
    }
}

pub fn config(output_dir: &Path) -> MirrorConfig {
    let mut config = MirrorConfig {
        site_url: SITE.to_string(),
        output_dir: output_dir.join("static"),
        generator_version: "1.0.0".to_string(),
        ..MirrorConfig::default()
    };
    config.fetch.max_retries = 2;
    config.fetch.retry_backoff_ms = 1;
    config
}

pub struct Harness {
    pub mirror: StaticMirror,
    pub site: Arc<ScriptedSite>,
    pub clock: Arc<FixedClock>,
    pub store: Arc<dyn KeyValueStore>,
    pub scheduler: Arc<StoreScheduler>,
}

impl Harness {
    pub fn new(config: MirrorConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: MirrorConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let site = ScriptedSite::new();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let scheduler = Arc::new(StoreScheduler::new(store.clone(), clock_dyn.clone()));
        let mirror = StaticMirror::new(
            config,
            store.clone(),
            clock_dyn,
            site.clone(),
            scheduler.clone(),
        )
        .unwrap();
        mirror.enable().unwrap();
        Self {
            mirror,
            site,
            clock,
            store,
            scheduler,
        }
    }
}

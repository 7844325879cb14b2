//! Deferred background jobs.
//!
//! The mirror never runs its own timer loop. It records "run this job later"
//! through a [`Scheduler`] and the host decides when due jobs execute (a cron
//! tick, the `static-mirror cron` command, a task runner).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::store::{keys, KeyValueStore, KeyValueStoreExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    /// Drain a background-sized batch of pending assets.
    ProcessAssets,
}

#[cfg_attr(test, mockall::automock)]
pub trait Scheduler: Send + Sync {
    /// Schedules `job` to run after `delay`. A job already scheduled keeps its
    /// earlier due time.
    fn defer(&self, job: Job, delay: Duration) -> Result<(), StoreError>;

    fn is_scheduled(&self, job: Job) -> Result<bool, StoreError>;
}

/// Keeps due times in the key-value store so they survive restarts.
pub struct StoreScheduler {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl StoreScheduler {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn jobs(&self) -> Result<BTreeMap<Job, DateTime<Utc>>, StoreError> {
        self.store.get_or(keys::SCHEDULED_JOBS, BTreeMap::new())
    }

    fn save(&self, jobs: &BTreeMap<Job, DateTime<Utc>>) -> Result<(), StoreError> {
        if jobs.is_empty() {
            self.store.delete(keys::SCHEDULED_JOBS)
        } else {
            self.store.set_value(keys::SCHEDULED_JOBS, jobs)
        }
    }

    pub fn due_at(&self, job: Job) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.jobs()?.get(&job).copied())
    }

    /// Removes and returns every job whose due time has passed.
    pub fn take_due(&self) -> Result<Vec<Job>, StoreError> {
        let now = self.clock.now();
        let mut jobs = self.jobs()?;
        let due: Vec<Job> = jobs
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(job, _)| *job)
            .collect();
        if !due.is_empty() {
            jobs.retain(|job, _| !due.contains(job));
            self.save(&jobs)?;
        }
        Ok(due)
    }
}

impl Scheduler for StoreScheduler {
    fn defer(&self, job: Job, delay: Duration) -> Result<(), StoreError> {
        let mut jobs = self.jobs()?;
        if jobs.contains_key(&job) {
            return Ok(());
        }
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        let at = self.clock.now() + delay;
        debug!(?job, %at, "job scheduled");
        jobs.insert(job, at);
        self.save(&jobs)
    }

    fn is_scheduled(&self, job: Job) -> Result<bool, StoreError> {
        Ok(self.jobs()?.contains_key(&job))
    }
}

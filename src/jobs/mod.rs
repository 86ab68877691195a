//! Upload job tracking.
//!
//! Jobs live behind the [`JobStore`] trait so the process-local table can be swapped for a
//! shared store when more than one server instance runs.

mod forwarder;

pub use forwarder::{Forwarder, UploadedFile};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{JobStatus, UploadJob};

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// JobStore defines the upload job table.
///
/// `complete` and `fail` only act on jobs still processing: they return `Ok(false)` for a
/// job that already reached a terminal state and `Error::NotFound` for an unknown ID.
pub trait JobStore: Send + Sync {
    fn create(&self, job: UploadJob) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UploadJob>>;
    fn complete(&self, id: &str, result: Value) -> Result<bool>;
    fn fail(&self, id: &str, message: &str) -> Result<bool>;
    /// Fails every job that has been processing longer than `max_age`.
    fn expire_stale(&self, max_age: chrono::Duration) -> Result<usize>;
}

/// In-memory job table for single-instance deployments. Jobs are never evicted.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, UploadJob>>,
}

impl MemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, UploadJob>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn finish<F>(&self, id: &str, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut UploadJob),
    {
        let mut jobs = self.jobs();
        let job = jobs.get_mut(id).ok_or(Error::NotFound)?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        apply(job);
        Ok(true)
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, job: UploadJob) -> Result<()> {
        let mut jobs = self.jobs();
        if jobs.contains_key(&job.id) {
            return Err(Error::AlreadyExists);
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<UploadJob>> {
        Ok(self.jobs().get(id).cloned())
    }

    fn complete(&self, id: &str, result: Value) -> Result<bool> {
        self.finish(id, |job| {
            job.status = JobStatus::Completed;
            job.result = Some(result);
        })
    }

    fn fail(&self, id: &str, message: &str) -> Result<bool> {
        self.finish(id, |job| {
            job.status = JobStatus::Error;
            job.message = Some(message.to_string());
        })
    }

    fn expire_stale(&self, max_age: chrono::Duration) -> Result<usize> {
        let cutoff = Utc::now() - max_age;
        let mut expired = 0;
        for job in self.jobs().values_mut() {
            if job.status == JobStatus::Processing && job.created_at < cutoff {
                job.status = JobStatus::Error;
                job.message = Some("processing timed out".to_string());
                expired += 1;
            }
        }
        Ok(expired)
    }
}

/// Periodically fails jobs that never received a completion signal.
pub fn spawn_sweeper(jobs: Arc<dyn JobStore>, timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let max_age =
            chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::days(365));
        let period = SWEEP_INTERVAL.min(timeout).max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match jobs.expire_stale(max_age) {
                Ok(0) => {}
                Ok(n) => tracing::warn!("Expired {n} upload job(s) stuck in processing"),
                Err(e) => tracing::error!("Failed to sweep upload jobs: {e}"),
            }
        }
    })
}

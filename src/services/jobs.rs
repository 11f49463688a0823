// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tracked background sync jobs.
//!
//! Each full sync runs on its own task. The registry keeps the latest job
//! per athlete so callers can poll its status or cancel it.

use crate::db::ActivityStore;
use crate::error::{AppError, Result};
use crate::services::sync::{CacheSynchronizer, CancelSignal, SyncReport};
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Lifecycle of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Point-in-time view of a job, returned to HTTP callers.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: u64,
    pub athlete_id: u64,
    pub status: JobStatus,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct JobEntry {
    snapshot: JobSnapshot,
    cancel: watch::Sender<bool>,
}

/// Registry of sync jobs, at most one running per athlete.
#[derive(Clone)]
pub struct SyncJobs {
    synchronizer: Arc<CacheSynchronizer>,
    jobs: Arc<DashMap<u64, JobEntry>>,
    next_job_id: Arc<AtomicU64>,
}

impl SyncJobs {
    pub fn new(synchronizer: Arc<CacheSynchronizer>) -> Self {
        Self {
            synchronizer,
            jobs: Arc::new(DashMap::new()),
            next_job_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Start a full sync for `athlete_id` on a new task.
    ///
    /// If a job for the athlete is already running, its snapshot is
    /// returned and no task is started.
    pub fn spawn_sync(&self, athlete_id: u64) -> (JobSnapshot, Option<JoinHandle<()>>) {
        let (cancel_tx, cancel) = CancelSignal::pair();
        let snapshot = JobSnapshot {
            job_id: self.next_job_id.fetch_add(1, Ordering::SeqCst),
            athlete_id,
            status: JobStatus::Running,
            started_at: format_utc_rfc3339(Utc::now()),
            finished_at: None,
            report: None,
            error: None,
        };
        let entry = JobEntry {
            snapshot: snapshot.clone(),
            cancel: cancel_tx,
        };

        match self.jobs.entry(athlete_id) {
            Entry::Occupied(mut existing) => {
                if existing.get().snapshot.status == JobStatus::Running {
                    tracing::info!(athlete_id, "Sync already running, not starting another");
                    return (existing.get().snapshot.clone(), None);
                }
                existing.insert(entry);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        tracing::info!(athlete_id, job_id = snapshot.job_id, "Sync job started");

        let synchronizer = self.synchronizer.clone();
        let jobs = self.jobs.clone();
        let job_id = snapshot.job_id;
        let task = tokio::spawn(async move {
            let result = synchronizer.sync_user(athlete_id, &cancel).await;
            finish_job(&jobs, athlete_id, job_id, result);
        });

        (snapshot, Some(task))
    }

    /// Start a sync for every athlete with a stored credential.
    pub async fn spawn_all(&self, store: &dyn ActivityStore) -> Result<usize> {
        let athlete_ids = store.list_athlete_ids().await?;
        let mut started = 0;
        for athlete_id in athlete_ids {
            if self.spawn_sync(athlete_id).1.is_some() {
                started += 1;
            }
        }
        tracing::info!(started, "Queued sync jobs for all athletes");
        Ok(started)
    }

    /// Latest job for an athlete.
    pub fn status(&self, athlete_id: u64) -> Option<JobSnapshot> {
        self.jobs.get(&athlete_id).map(|e| e.snapshot.clone())
    }

    /// Ask a running job to stop at the next activity boundary.
    pub fn cancel(&self, athlete_id: u64) -> bool {
        match self.jobs.get(&athlete_id) {
            Some(entry) if entry.snapshot.status == JobStatus::Running => {
                entry.cancel.send_replace(true);
                tracing::info!(athlete_id, job_id = entry.snapshot.job_id, "Sync cancellation requested");
                true
            }
            _ => false,
        }
    }
}

fn finish_job(
    jobs: &DashMap<u64, JobEntry>,
    athlete_id: u64,
    job_id: u64,
    result: Result<SyncReport>,
) {
    let Some(mut entry) = jobs.get_mut(&athlete_id) else {
        return;
    };
    if entry.snapshot.job_id != job_id {
        return;
    }

    let snapshot = &mut entry.snapshot;
    snapshot.finished_at = Some(format_utc_rfc3339(Utc::now()));
    match result {
        Ok(report) => {
            snapshot.status = JobStatus::Succeeded;
            snapshot.report = Some(report);
        }
        Err(AppError::Cancelled) => {
            snapshot.status = JobStatus::Cancelled;
        }
        Err(e) => {
            if e.needs_reauthorization() {
                tracing::warn!(athlete_id, error = %e, "Sync failed, athlete must re-authorize");
            } else {
                tracing::error!(athlete_id, error = %e, "Sync failed");
            }
            snapshot.status = JobStatus::Failed;
            snapshot.error = Some(e.to_string());
        }
    }
}

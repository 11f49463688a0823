// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity cache synchronization.
//!
//! Two paths keep the local cache in line with Strava:
//! 1. Full reconciliation: list every activity, fetch details for the
//!    ones never seen, and patch renamed ones.
//! 2. Incremental upsert: apply a single activity pushed by a webhook.

use crate::db::{ActivityStore, UpsertOutcome};
use crate::error::{AppError, Result};
use crate::models::ActivityRecord;
use crate::services::geometry;
use crate::services::strava::{ActivityDetail, StravaService};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Kind of object a push notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Activity,
    Athlete,
    Other,
}

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aspect {
    Create,
    Update,
    Delete,
    Other,
}

/// A push notification, reduced to what the cache acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushEvent {
    pub object: ObjectKind,
    pub aspect: Aspect,
    pub object_id: u64,
    pub owner_id: u64,
}

impl PushEvent {
    /// Build an event from Strava's `object_type` / `aspect_type` strings.
    pub fn parse(object_type: &str, aspect_type: &str, object_id: u64, owner_id: u64) -> Self {
        let object = match object_type {
            "activity" => ObjectKind::Activity,
            "athlete" => ObjectKind::Athlete,
            _ => ObjectKind::Other,
        };
        let aspect = match aspect_type {
            "create" => Aspect::Create,
            "update" => Aspect::Update,
            "delete" => Aspect::Delete,
            _ => Aspect::Other,
        };
        Self {
            object,
            aspect,
            object_id,
            owner_id,
        }
    }
}

/// Result of applying one pushed activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Created,
    Updated,
    /// Activity has no route (indoor, manual entry, ...).
    SkippedNoPath,
    SkippedInvalidGeometry,
    /// Event type the cache does not act on.
    Ignored,
}

/// Counts from one full reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub listed: usize,
    pub created: usize,
    pub renamed: usize,
    pub unchanged: usize,
    pub skipped_no_path: usize,
    pub skipped_invalid_geometry: usize,
}

/// Cancellation signal checked between summaries of a full sync.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal paired with the sender that triggers it.
    pub fn pair() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self::pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested. Pends forever if the
    /// sender is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }

    /// Run `work` unless cancellation arrives first.
    pub async fn guard<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(AppError::Cancelled),
            result = work => result,
        }
    }
}

/// Keeps the activity cache consistent with Strava.
#[derive(Clone)]
pub struct CacheSynchronizer {
    strava: StravaService,
    store: Arc<dyn ActivityStore>,
}

impl CacheSynchronizer {
    pub fn new(strava: StravaService, store: Arc<dyn ActivityStore>) -> Self {
        Self { strava, store }
    }

    pub fn strava(&self) -> &StravaService {
        &self.strava
    }

    /// Reconcile the athlete's full activity list with the cache.
    ///
    /// Fails fast: an error fetching or storing any single activity ends
    /// the sync. Already-written records stay, so re-running is safe.
    pub async fn sync_user(&self, athlete_id: u64, cancel: &CancelSignal) -> Result<SyncReport> {
        tracing::info!(athlete_id, "Starting full activity sync");

        // Listing can sit in a rate-limit wait for minutes.
        let summaries = cancel
            .guard(self.strava.list_summaries(athlete_id, 0))
            .await
            .inspect_err(|err| {
                if matches!(err, AppError::Cancelled) {
                    tracing::info!(athlete_id, "Activity sync cancelled while listing");
                }
            })?;
        let mut report = SyncReport {
            listed: summaries.len(),
            ..SyncReport::default()
        };

        for summary in &summaries {
            if cancel.is_cancelled() {
                tracing::info!(athlete_id, ?report, "Activity sync cancelled");
                return Err(AppError::Cancelled);
            }

            if summary.encoded_path().is_none() {
                tracing::info!(
                    athlete_id,
                    activity_id = summary.id,
                    sport_type = %summary.sport_type,
                    "Skipping activity with empty polyline"
                );
                report.skipped_no_path += 1;
                continue;
            }

            match self.store.get_activity(summary.id, athlete_id).await? {
                None => {
                    let detail = cancel
                        .guard(self.strava.get_detail(summary.id, athlete_id))
                        .await?;
                    match self.store_detail(&detail).await? {
                        PushOutcome::Created | PushOutcome::Updated => report.created += 1,
                        PushOutcome::SkippedNoPath => report.skipped_no_path += 1,
                        PushOutcome::SkippedInvalidGeometry => {
                            report.skipped_invalid_geometry += 1
                        }
                        PushOutcome::Ignored => {}
                    }
                }
                Some(existing) if existing.name != summary.name => {
                    tracing::info!(
                        athlete_id,
                        activity_id = summary.id,
                        old_name = %existing.name,
                        new_name = %summary.name,
                        "Activity name changed, updating"
                    );
                    self.store
                        .rename_activity(summary.id, athlete_id, &summary.name)
                        .await?;
                    report.renamed += 1;
                }
                Some(_) => report.unchanged += 1,
            }
        }

        tracing::info!(athlete_id, ?report, "Activity sync complete");
        Ok(report)
    }

    /// Fetch one activity and write every field of it to the cache.
    pub async fn apply_pushed_activity(
        &self,
        activity_id: u64,
        owner_id: u64,
    ) -> Result<PushOutcome> {
        tracing::info!(activity_id, owner_id, "Applying pushed activity");
        let detail = self.strava.get_detail(activity_id, owner_id).await?;
        self.store_detail(&detail).await
    }

    /// Dispatch a push notification.
    pub async fn handle_push_event(&self, event: PushEvent) -> Result<PushOutcome> {
        match (event.object, event.aspect) {
            (ObjectKind::Activity, Aspect::Create | Aspect::Update) => {
                self.apply_pushed_activity(event.object_id, event.owner_id)
                    .await
            }
            (ObjectKind::Activity, Aspect::Delete) => {
                // Deletions are not reconciled into the cache.
                tracing::info!(
                    activity_id = event.object_id,
                    owner_id = event.owner_id,
                    "Ignoring activity delete event"
                );
                Ok(PushOutcome::Ignored)
            }
            (object, aspect) => {
                tracing::debug!(?object, ?aspect, "Ignoring unhandled event type");
                Ok(PushOutcome::Ignored)
            }
        }
    }

    /// Decode a detail's route and upsert it.
    ///
    /// Missing routes and undecodable routes skip the record without error.
    async fn store_detail(&self, detail: &ActivityDetail) -> Result<PushOutcome> {
        let Some(polyline) = detail.encoded_path() else {
            tracing::info!(
                activity_id = detail.id,
                sport_type = %detail.sport_type,
                "Skipping activity with empty polyline"
            );
            return Ok(PushOutcome::SkippedNoPath);
        };

        let route = match geometry::derive(polyline) {
            Ok(route) => route,
            Err(e) => {
                tracing::warn!(activity_id = detail.id, error = %e, "Skipping activity with invalid geometry");
                return Ok(PushOutcome::SkippedInvalidGeometry);
            }
        };

        let record = ActivityRecord::from_detail(detail, polyline, route);
        let outcome = self.store.upsert_activity(&record).await?;

        match outcome {
            UpsertOutcome::Created => {
                tracing::info!(
                    activity_id = record.id,
                    athlete_id = record.athlete_id,
                    "Added new activity to cache"
                );
                Ok(PushOutcome::Created)
            }
            UpsertOutcome::Updated => {
                tracing::info!(
                    activity_id = record.id,
                    athlete_id = record.athlete_id,
                    "Updated activity in cache"
                );
                Ok(PushOutcome::Updated)
            }
        }
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistent store for credentials and cached activities.
//!
//! The synchronizer only sees the [`ActivityStore`] trait. Each backend is
//! responsible for its own locking so that a single record write is atomic.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{ActivityRecord, Credential};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const CREDENTIALS: &str = "credentials";
    pub const ACTIVITIES: &str = "activities";
}

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// CRUD operations used by the token gate and the cache synchronizer.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn get_credential(&self, athlete_id: u64) -> Result<Option<Credential>, AppError>;

    /// Replace the stored credential for `credential.athlete_id`.
    async fn save_credential(&self, credential: &Credential) -> Result<(), AppError>;

    /// Look up an activity owned by `athlete_id`.
    async fn get_activity(
        &self,
        activity_id: u64,
        athlete_id: u64,
    ) -> Result<Option<ActivityRecord>, AppError>;

    /// Whether any athlete has an activity with this ID.
    async fn activity_exists(&self, activity_id: u64) -> Result<bool, AppError>;

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), AppError>;

    /// Overwrite every field of an existing activity.
    async fn update_activity(&self, record: &ActivityRecord) -> Result<(), AppError>;

    /// Patch only the name of an existing activity.
    async fn rename_activity(
        &self,
        activity_id: u64,
        athlete_id: u64,
        name: &str,
    ) -> Result<(), AppError>;

    /// Insert or fully overwrite a record as one atomic operation.
    async fn upsert_activity(&self, record: &ActivityRecord) -> Result<UpsertOutcome, AppError>;

    /// Athletes with a stored credential.
    async fn list_athlete_ids(&self) -> Result<Vec<u64>, AppError>;
}

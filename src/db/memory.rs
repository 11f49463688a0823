// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store.
//!
//! All writes go through one `RwLock`, so concurrent syncs for different
//! athletes are serialized against each other.

use crate::db::{ActivityStore, UpsertOutcome};
use crate::error::AppError;
use crate::models::{ActivityRecord, Credential};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    credentials: HashMap<u64, Credential>,
    activities: HashMap<u64, ActivityRecord>,
}

/// Store backed by in-memory maps, shared by cloning.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    writes: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful write operations since creation.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored activities across all athletes.
    pub async fn activity_count(&self) -> usize {
        self.tables.read().await.activities.len()
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn get_credential(&self, athlete_id: u64) -> Result<Option<Credential>, AppError> {
        Ok(self.tables.read().await.credentials.get(&athlete_id).cloned())
    }

    async fn save_credential(&self, credential: &Credential) -> Result<(), AppError> {
        self.tables
            .write()
            .await
            .credentials
            .insert(credential.athlete_id, credential.clone());
        self.record_write();
        Ok(())
    }

    async fn get_activity(
        &self,
        activity_id: u64,
        athlete_id: u64,
    ) -> Result<Option<ActivityRecord>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .activities
            .get(&activity_id)
            .filter(|r| r.athlete_id == athlete_id)
            .cloned())
    }

    async fn activity_exists(&self, activity_id: u64) -> Result<bool, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .activities
            .contains_key(&activity_id))
    }

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.activities.contains_key(&record.id) {
            return Err(AppError::Database(format!(
                "Activity {} already exists",
                record.id
            )));
        }
        tables.activities.insert(record.id, record.clone());
        self.record_write();
        Ok(())
    }

    async fn update_activity(&self, record: &ActivityRecord) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .activities
            .get_mut(&record.id)
            .ok_or_else(|| AppError::Database(format!("Activity {} does not exist", record.id)))?;
        *existing = record.clone();
        self.record_write();
        Ok(())
    }

    async fn rename_activity(
        &self,
        activity_id: u64,
        athlete_id: u64,
        name: &str,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .activities
            .get_mut(&activity_id)
            .filter(|r| r.athlete_id == athlete_id)
            .ok_or_else(|| {
                AppError::Database(format!(
                    "Activity {} does not exist for athlete {}",
                    activity_id, athlete_id
                ))
            })?;
        existing.name = name.to_string();
        self.record_write();
        Ok(())
    }

    async fn upsert_activity(&self, record: &ActivityRecord) -> Result<UpsertOutcome, AppError> {
        let mut tables = self.tables.write().await;
        let outcome = match tables.activities.insert(record.id, record.clone()) {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        };
        self.record_write();
        Ok(outcome)
    }

    async fn list_athlete_ids(&self) -> Result<Vec<u64>, AppError> {
        let mut ids: Vec<u64> = self
            .tables
            .read()
            .await
            .credentials
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token gate for outbound Strava calls.

use crate::db::ActivityStore;
use crate::error::{AppError, AuthError};
use crate::models::Credential;
use crate::services::strava::StravaClient;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared refresh locks, one per athlete.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Hands out non-expired access tokens, refreshing them when needed.
///
/// Refreshes for the same athlete are serialized; the second caller finds
/// the freshly stored credential and does not refresh again.
#[derive(Clone)]
pub struct TokenGate {
    client: StravaClient,
    store: Arc<dyn ActivityStore>,
    refresh_locks: RefreshLocks,
}

impl TokenGate {
    pub fn new(client: StravaClient, store: Arc<dyn ActivityStore>) -> Self {
        Self {
            client,
            store,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Get a valid access token for the given athlete.
    ///
    /// On refresh failure the stored credential is left as it was.
    pub async fn access_token(&self, athlete_id: u64) -> Result<String, AppError> {
        let credential = self.load(athlete_id).await?;
        if !credential.is_expired_at(Utc::now()) {
            return Ok(credential.access_token);
        }

        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let credential = self.load(athlete_id).await?;
        if !credential.is_expired_at(Utc::now()) {
            return Ok(credential.access_token);
        }

        tracing::info!(athlete_id, "Access token expired, refreshing");

        let refreshed = self
            .client
            .refresh_token(&credential.refresh_token)
            .await
            .inspect_err(|e| tracing::warn!(athlete_id, error = %e, "Token refresh failed"))?;

        let updated = Credential {
            athlete_id,
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            expires_at: refreshed.expires_at,
        };
        self.store.save_credential(&updated).await?;

        tracing::info!(athlete_id, expires_at = updated.expires_at, "Token refreshed");
        Ok(updated.access_token)
    }

    async fn load(&self, athlete_id: u64) -> Result<Credential, AppError> {
        self.store
            .get_credential(athlete_id)
            .await?
            .ok_or(AppError::Auth(AuthError::MissingCredential(athlete_id)))
    }
}

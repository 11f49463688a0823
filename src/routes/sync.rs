// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-demand full sync routes.
//!
//! Every route requires the `x-sync-token` header to match the configured
//! trigger token.

use crate::error::AppError;
use crate::services::JobSnapshot;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use std::sync::Arc;

/// Header carrying the shared trigger secret.
pub const SYNC_TOKEN_HEADER: &str = "x-sync-token";

/// Sync routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/sync/{athlete_id}",
        post(start_sync).get(sync_status).delete(cancel_sync),
    )
}

fn require_sync_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let provided = headers
        .get(SYNC_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(token) if token == state.config.sync_trigger_token => Ok(()),
        _ => {
            tracing::warn!("Sync request with missing or invalid trigger token");
            Err(AppError::Unauthorized)
        }
    }
}

/// Start a full sync in the background (POST).
///
/// Returns 202 for a new job, 200 with the existing snapshot if one is
/// already running.
async fn start_sync(
    State(state): State<Arc<AppState>>,
    Path(athlete_id): Path<u64>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<JobSnapshot>), AppError> {
    require_sync_token(&state, &headers)?;

    let (snapshot, task) = state.jobs.spawn_sync(athlete_id);
    let status = if task.is_some() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(snapshot)))
}

/// Latest job for the athlete (GET).
async fn sync_status(
    State(state): State<Arc<AppState>>,
    Path(athlete_id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<JobSnapshot>, AppError> {
    require_sync_token(&state, &headers)?;

    state
        .jobs
        .status(athlete_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no sync job for athlete {}", athlete_id)))
}

/// Cancel a running job (DELETE).
async fn cancel_sync(
    State(state): State<Arc<AppState>>,
    Path(athlete_id): Path<u64>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    require_sync_token(&state, &headers)?;

    if state.jobs.cancel(athlete_id) {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(AppError::NotFound(format!(
            "no running sync job for athlete {}",
            athlete_id
        )))
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity-Sync API Server
//!
//! Mirrors athletes' Strava activities into a local cache, driven by
//! Strava webhook pushes and on-demand full syncs.

use activity_sync::{
    config::{Config, StoreBackend},
    db::{ActivityStore, FirestoreDb, MemoryStore},
    services::{
        CacheSynchronizer, RateLimiter, RetryPolicy, StravaClient, StravaService, SyncJobs,
        TokenGate,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Activity-Sync API");

    let store: Arc<dyn ActivityStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; cached activities are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let client = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    )
    .with_urls(&config.strava_api_url, &config.strava_token_url);

    // One limiter per process: Strava's quota is per application
    let limiter = Arc::new(RateLimiter::new());
    let tokens = TokenGate::new(client.clone(), store.clone());
    let retry = RetryPolicy {
        max_attempts: config.rate_limit_max_attempts,
        backoff: config.rate_limit_retry_backoff,
    };
    let strava = StravaService::new(client, tokens, limiter, retry);

    let synchronizer = Arc::new(CacheSynchronizer::new(strava, store.clone()));
    let jobs = SyncJobs::new(synchronizer.clone());

    if config.sync_on_startup {
        match jobs.spawn_all(store.as_ref()).await {
            Ok(started) => tracing::info!(started, "Startup sync queued"),
            Err(e) => tracing::error!(error = %e, "Failed to queue startup sync"),
        }
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        synchronizer,
        jobs,
    });

    // Build router
    let app = activity_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("activity_sync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity-Sync: keep a local cache of Strava activities current
//!
//! This crate pulls activities from the Strava API under its rate limits,
//! derives route geometry, and stores the results. Webhook pushes and
//! periodic full reconciliations keep the cache consistent.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::ActivityStore;
use services::{CacheSynchronizer, SyncJobs};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ActivityStore>,
    pub synchronizer: Arc<CacheSynchronizer>,
    pub jobs: SyncJobs,
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod geometry;
pub mod jobs;
pub mod rate_limit;
pub mod strava;
pub mod sync;
pub mod token;

pub use jobs::{JobSnapshot, JobStatus, SyncJobs};
pub use rate_limit::{LimitKind, QuotaReport, RateLimiter};
pub use strava::{RetryPolicy, StravaClient, StravaService};
pub use sync::{CacheSynchronizer, CancelSignal, PushEvent, PushOutcome, SyncReport};
pub use token::TokenGate;

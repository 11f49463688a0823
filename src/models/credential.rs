// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stored Strava OAuth credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth token pair for one athlete.
///
/// `expires_at` always belongs to the stored `access_token`; a refresh
/// replaces all three fields together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Strava athlete ID (also used as document ID)
    pub athlete_id: u64,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (Unix seconds)
    pub expires_at: i64,
}

impl Credential {
    /// True once the access token can no longer be used at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }
}

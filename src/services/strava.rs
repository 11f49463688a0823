// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for listing and fetching activities.
//!
//! Handles:
//! - Paginated activity summaries and detailed activities
//! - Token refresh requests
//! - Quota tracking from response headers, with a bounded retry on 429

use crate::error::{AppError, AuthError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Largest page Strava will return from the activity list endpoint.
pub const MAX_PAGE_SIZE: u32 = 200;

const DEFAULT_API_URL: &str = "https://www.strava.com/api/v3";
const DEFAULT_TOKEN_URL: &str = "https://www.strava.com/oauth/token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: DEFAULT_API_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Point the client at different API and token endpoints.
    pub fn with_urls(mut self, base_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self.token_url = token_url.into();
        self
    }

    /// Request one page of the authenticated athlete's activities.
    pub async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<reqwest::Response, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);
        self.get(
            &url,
            access_token,
            &[("page", page.to_string()), ("per_page", per_page.to_string())],
        )
        .await
    }

    /// Request a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<reqwest::Response, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        self.get(&url, access_token, &[]).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("invalid response: {}", e)))
    }

    /// Authenticated GET; only connection failures are errors here.
    async fn get(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, AppError> {
        self.http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
}

/// Activity map data with polylines.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaMap {
    #[serde(default)]
    pub polyline: Option<String>,
    #[serde(default)]
    pub summary_polyline: Option<String>,
}

/// Athlete reference embedded in activities.
#[derive(Debug, Clone, Deserialize)]
pub struct AthleteRef {
    pub id: u64,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivitySummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub sport_type: String,
    #[serde(default)]
    pub map: Option<StravaMap>,
}

impl ActivitySummary {
    /// Summary polyline, if Strava recorded a route for this activity.
    pub fn encoded_path(&self) -> Option<&str> {
        self.map
            .as_ref()
            .and_then(|m| m.summary_polyline.as_deref())
            .filter(|p| !p.is_empty())
    }
}

/// Detailed Strava activity response.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityDetail {
    pub id: u64,
    pub athlete: AthleteRef,
    pub start_date: DateTime<Utc>,
    pub name: String,
    #[serde(default)]
    pub sport_type: String,
    #[serde(default)]
    pub elapsed_time: u32,
    #[serde(default)]
    pub moving_time: u32,
    /// Meters
    #[serde(default)]
    pub distance: f64,
    /// Meters per second
    #[serde(default)]
    pub average_speed: f64,
    /// Meters
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub map: Option<StravaMap>,
}

impl ActivityDetail {
    /// Full-resolution polyline, if present and non-empty.
    pub fn encoded_path(&self) -> Option<&str> {
        self.map
            .as_ref()
            .and_then(|m| m.polyline.as_deref())
            .filter(|p| !p.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - Token and quota aware API access
// ─────────────────────────────────────────────────────────────────────────────

use crate::services::rate_limit::{LimitKind, QuotaReport, RateLimiter};
use crate::services::token::TokenGate;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Retry policy for 429 responses.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first. Zero counts as one.
    pub max_attempts: u32,
    /// Pause before retrying a 429 when the limiter reports spare capacity.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

/// High-level Strava service used by the cache synchronizer.
///
/// Every request:
/// - carries a valid access token from the [`TokenGate`]
/// - waits for the [`RateLimiter`] when Strava reported an exhausted window
/// - feeds the response's quota headers back into the limiter
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    tokens: TokenGate,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl StravaService {
    pub fn new(
        client: StravaClient,
        tokens: TokenGate,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            tokens,
            limiter,
            retry,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Fetch activity summaries page by page, starting at page 1.
    ///
    /// Stops at the first empty page, or after `max_pages` pages when
    /// `max_pages` is non-zero. Pages are requested strictly in order.
    pub async fn list_summaries(
        &self,
        athlete_id: u64,
        max_pages: u32,
    ) -> Result<Vec<ActivitySummary>, AppError> {
        tracing::info!(athlete_id, max_pages, "Listing Strava activities");

        let mut summaries = Vec::new();
        let mut page = 1;
        let mut fetched = 0;
        loop {
            let batch = self.list_page(athlete_id, page).await?;
            fetched += 1;
            if batch.is_empty() {
                break;
            }
            summaries.extend(batch);

            if max_pages > 0 && page >= max_pages {
                break;
            }
            page += 1;
        }

        tracing::info!(
            athlete_id,
            pages = fetched,
            count = summaries.len(),
            "Listed Strava activities"
        );
        Ok(summaries)
    }

    /// Fetch a single page of summaries.
    pub async fn list_page(
        &self,
        athlete_id: u64,
        page: u32,
    ) -> Result<Vec<ActivitySummary>, AppError> {
        tracing::debug!(athlete_id, page, "Fetching activity page");
        self.request(athlete_id, |client, token| {
            let token = token.to_string();
            async move { client.list_activities(&token, page, MAX_PAGE_SIZE).await }
        })
        .await
    }

    /// Fetch full detail for one activity.
    pub async fn get_detail(
        &self,
        activity_id: u64,
        athlete_id: u64,
    ) -> Result<ActivityDetail, AppError> {
        tracing::debug!(athlete_id, activity_id, "Fetching detailed activity");
        self.request(athlete_id, |client, token| {
            let token = token.to_string();
            async move { client.get_activity(&token, activity_id).await }
        })
        .await
    }

    /// Run one Strava GET under the token and quota discipline.
    ///
    /// A 429 is retried up to `max_attempts` times; running out of attempts
    /// is reported as a transport error.
    async fn request<T, F, Fut>(&self, athlete_id: u64, send: F) -> Result<T, AppError>
    where
        T: DeserializeOwned,
        F: Fn(StravaClient, &str) -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, AppError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let limit = self.limiter.check();
            if limit != LimitKind::None {
                self.limiter.await_reset(limit).await;
            }

            // The wait can outlast the token, so fetch it only now.
            let access_token = self.tokens.access_token(athlete_id).await?;
            let response = send(self.client.clone(), &access_token).await?;
            if let Some(quota) = QuotaReport::from_headers(response.headers()) {
                self.limiter.report(quota, Utc::now());
            }

            let status = response.status();
            if status.is_success() {
                return response
                    .json()
                    .await
                    .map_err(|e| AppError::Transport(format!("JSON parse error: {}", e)));
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!(athlete_id, attempt, "Strava rate limit hit (429)");
                if self.limiter.check() == LimitKind::None {
                    tokio::time::sleep(self.retry.backoff).await;
                }
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        Err(AppError::Transport(format!(
            "Strava rate limit persisted after {} attempts",
            max_attempts
        )))
    }
}

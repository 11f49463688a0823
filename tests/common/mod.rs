// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use activity_sync::config::Config;
use activity_sync::db::{ActivityStore, FirestoreDb, MemoryStore};
use activity_sync::models::Credential;
use activity_sync::routes::create_router;
use activity_sync::services::{
    CacheSynchronizer, RateLimiter, RetryPolicy, StravaClient, StravaService, SyncJobs, TokenGate,
};
use activity_sync::AppState;
use axum::{
    extract::{Form, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reference polyline: (38.5, -120.2), (40.7, -120.95), (43.252, -126.453)
#[allow(dead_code)]
pub const SAMPLE_POLYLINE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

/// Athlete seeded with a valid credential by [`harness`].
#[allow(dead_code)]
pub const ATHLETE_ID: u64 = 7;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ═══════════════════════════════════════════════════════════════════════════
// MOCK STRAVA
// ═══════════════════════════════════════════════════════════════════════════

/// Scriptable stand-in for the Strava API and token endpoint.
#[derive(Default)]
pub struct MockStrava {
    activities: Mutex<Vec<Value>>,
    requested_pages: Mutex<Vec<u32>>,
    bearer_tokens: Mutex<Vec<String>>,
    failing_details: Mutex<HashSet<u64>>,
    quota: Mutex<Option<(String, String)>>,
    throttled_responses: AtomicUsize,
    exhausted_responses: AtomicUsize,
    refresh_fails: AtomicBool,
    pub detail_requests: AtomicUsize,
    pub refresh_requests: AtomicUsize,
}

#[allow(dead_code)]
impl MockStrava {
    /// Add a detailed activity; it is also listed in summary pages.
    pub fn add_activity(&self, detail: Value) {
        self.activities.lock().unwrap().push(detail);
    }

    pub fn rename_activity(&self, activity_id: u64, name: &str) {
        let mut activities = self.activities.lock().unwrap();
        for activity in activities.iter_mut() {
            if activity["id"] == activity_id {
                activity["name"] = json!(name);
            }
        }
    }

    /// Answer the next `count` API calls with 429 and no quota headers.
    pub fn throttle_next(&self, count: usize) {
        self.throttled_responses.store(count, Ordering::SeqCst);
    }

    /// Answer the next `count` list calls with 429 and quota headers
    /// showing the short window used up.
    pub fn throttle_exhausted(&self, count: usize) {
        self.exhausted_responses.store(count, Ordering::SeqCst);
    }

    pub fn fail_detail(&self, activity_id: u64) {
        self.failing_details.lock().unwrap().insert(activity_id);
    }

    pub fn fail_refresh(&self) {
        self.refresh_fails.store(true, Ordering::SeqCst);
    }

    /// Quota headers (`"short,long"` usage and limit) sent on success.
    pub fn report_quota(&self, usage: &str, limit: &str) {
        *self.quota.lock().unwrap() = Some((usage.to_string(), limit.to_string()));
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested_pages.lock().unwrap().clone()
    }

    pub fn bearer_tokens(&self) -> Vec<String> {
        self.bearer_tokens.lock().unwrap().clone()
    }

    pub fn detail_count(&self) -> usize {
        self.detail_requests.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_requests.load(Ordering::SeqCst)
    }

    fn take_throttle(&self) -> bool {
        take_one(&self.throttled_responses)
    }

    fn record_bearer(&self, headers: &HeaderMap) {
        if let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        {
            self.bearer_tokens.lock().unwrap().push(token.to_string());
        }
    }

    fn with_quota(&self, mut response: Response) -> Response {
        if let Some((usage, limit)) = self.quota.lock().unwrap().clone() {
            let headers = response.headers_mut();
            headers.insert("x-readratelimit-usage", HeaderValue::from_str(&usage).unwrap());
            headers.insert("x-readratelimit-limit", HeaderValue::from_str(&limit).unwrap());
        }
        response
    }
}

/// A running mock server.
#[allow(dead_code)]
pub struct MockServer {
    pub addr: SocketAddr,
    pub strava: Arc<MockStrava>,
}

#[allow(dead_code)]
impl MockServer {
    pub fn api_url(&self) -> String {
        format!("http://{}/api/v3", self.addr)
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/oauth/token", self.addr)
    }
}

#[derive(Deserialize)]
struct PageParams {
    page: u32,
    per_page: u32,
}

#[derive(Deserialize)]
struct RefreshForm {
    grant_type: String,
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn quota_exhausted() -> Response {
    let mut response = too_many_requests();
    let headers = response.headers_mut();
    headers.insert("x-readratelimit-usage", HeaderValue::from_static("100,500"));
    headers.insert("x-readratelimit-limit", HeaderValue::from_static("100,1000"));
    response
}

fn too_many_requests() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({"message": "Rate Limit Exceeded"})),
    )
        .into_response()
}

fn summary_of(detail: &Value) -> Value {
    json!({
        "id": detail["id"],
        "name": detail["name"],
        "sport_type": detail["sport_type"],
        "map": {"summary_polyline": detail["map"]["polyline"]},
    })
}

async fn list_activities(
    State(strava): State<Arc<MockStrava>>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Response {
    strava.record_bearer(&headers);
    strava.requested_pages.lock().unwrap().push(params.page);
    if take_one(&strava.exhausted_responses) {
        return quota_exhausted();
    }
    if strava.take_throttle() {
        return too_many_requests();
    }

    let start = (params.page.saturating_sub(1) * params.per_page) as usize;
    let page: Vec<Value> = strava
        .activities
        .lock()
        .unwrap()
        .iter()
        .skip(start)
        .take(params.per_page as usize)
        .map(summary_of)
        .collect();
    strava.with_quota(Json(page).into_response())
}

async fn get_activity(
    State(strava): State<Arc<MockStrava>>,
    headers: HeaderMap,
    Path(activity_id): Path<u64>,
) -> Response {
    strava.record_bearer(&headers);
    strava.detail_requests.fetch_add(1, Ordering::SeqCst);
    if strava.take_throttle() {
        return too_many_requests();
    }
    if strava.failing_details.lock().unwrap().contains(&activity_id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream failure").into_response();
    }

    let found = strava
        .activities
        .lock()
        .unwrap()
        .iter()
        .find(|a| a["id"] == activity_id)
        .cloned();
    match found {
        Some(detail) => strava.with_quota(Json(detail).into_response()),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Record Not Found"})),
        )
            .into_response(),
    }
}

async fn refresh_token(
    State(strava): State<Arc<MockStrava>>,
    Form(form): Form<RefreshForm>,
) -> Response {
    let n = strava.refresh_requests.fetch_add(1, Ordering::SeqCst) + 1;
    // Keep the refresh in flight long enough for concurrent callers to pile up
    tokio::time::sleep(Duration::from_millis(50)).await;

    if strava.refresh_fails.load(Ordering::SeqCst) || form.grant_type != "refresh_token" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Bad Request"})),
        )
            .into_response();
    }

    let expires_at = chrono::Utc::now().timestamp() + 21600;
    Json(json!({
        "access_token": format!("fresh-access-{}", n),
        "refresh_token": format!("fresh-refresh-{}", n),
        "expires_at": expires_at,
        "expires_in": 21600,
        "token_type": "Bearer",
    }))
    .into_response()
}

/// Start a mock Strava server on an ephemeral port.
#[allow(dead_code)]
pub async fn spawn_mock_strava() -> MockServer {
    let strava = Arc::new(MockStrava::default());
    let app = Router::new()
        .route("/api/v3/athlete/activities", get(list_activities))
        .route("/api/v3/activities/{id}", get(get_activity))
        .route("/oauth/token", post(refresh_token))
        .with_state(strava.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer { addr, strava }
}

/// Detailed activity JSON in Strava's shape.
#[allow(dead_code)]
pub fn detail_json(activity_id: u64, owner_id: u64, name: &str, polyline: &str) -> Value {
    json!({
        "id": activity_id,
        "athlete": {"id": owner_id, "resource_state": 1},
        "start_date": "2024-05-04T07:30:00Z",
        "name": name,
        "sport_type": "Run",
        "elapsed_time": 3700,
        "moving_time": 3600,
        "distance": 10000.0,
        "average_speed": 2.5,
        "total_elevation_gain": 120.0,
        "map": {"polyline": polyline, "summary_polyline": polyline},
    })
}

#[allow(dead_code)]
pub fn valid_credential(athlete_id: u64) -> Credential {
    Credential {
        athlete_id,
        access_token: format!("access-{}", athlete_id),
        refresh_token: format!("refresh-{}", athlete_id),
        expires_at: chrono::Utc::now().timestamp() + 3600,
    }
}

#[allow(dead_code)]
pub fn expired_credential(athlete_id: u64) -> Credential {
    Credential {
        expires_at: chrono::Utc::now().timestamp() - 60,
        ..valid_credential(athlete_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HARNESS
// ═══════════════════════════════════════════════════════════════════════════

/// Synchronizer wired to a mock Strava and an in-memory store.
#[allow(dead_code)]
pub struct TestHarness {
    pub mock: MockServer,
    pub store: MemoryStore,
    pub synchronizer: Arc<CacheSynchronizer>,
}

#[allow(dead_code)]
impl TestHarness {
    pub fn strava(&self) -> &MockStrava {
        &self.mock.strava
    }

    pub fn dyn_store(&self) -> Arc<dyn ActivityStore> {
        Arc::new(self.store.clone())
    }

    pub fn client(&self) -> StravaClient {
        StravaClient::new("test_client_id".to_string(), "test_secret".to_string())
            .with_urls(self.mock.api_url(), self.mock.token_url())
    }

    /// Router over this harness, with the config pointing at the mock.
    pub fn app(&self) -> (Router, Arc<AppState>) {
        let mut config = Config::test_default();
        config.strava_api_url = self.mock.api_url();
        config.strava_token_url = self.mock.token_url();

        let state = Arc::new(AppState {
            config,
            store: self.dyn_store(),
            synchronizer: self.synchronizer.clone(),
            jobs: SyncJobs::new(self.synchronizer.clone()),
        });
        (create_router(state.clone()), state)
    }
}

/// Harness with a valid credential stored for [`ATHLETE_ID`].
#[allow(dead_code)]
pub async fn harness() -> TestHarness {
    let h = bare_harness().await;
    h.store
        .save_credential(&valid_credential(ATHLETE_ID))
        .await
        .unwrap();
    h
}

/// Harness with an empty store.
#[allow(dead_code)]
pub async fn bare_harness() -> TestHarness {
    let mock = spawn_mock_strava().await;
    let store = MemoryStore::new();
    let shared: Arc<dyn ActivityStore> = Arc::new(store.clone());

    let client = StravaClient::new("test_client_id".to_string(), "test_secret".to_string())
        .with_urls(mock.api_url(), mock.token_url());
    let tokens = TokenGate::new(client.clone(), shared.clone());
    let retry = RetryPolicy {
        max_attempts: 5,
        backoff: Duration::from_millis(10),
    };
    let strava = StravaService::new(client, tokens, Arc::new(RateLimiter::new()), retry);

    TestHarness {
        mock,
        store,
        synchronizer: Arc::new(CacheSynchronizer::new(strava, shared)),
    }
}

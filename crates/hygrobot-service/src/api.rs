//! REST API endpoints for the hygrobot-service.
//!
//! The API is the tool surface for external automations: it reads the same
//! store the monitoring loop writes and reuses the chat command router for
//! `/api/command`, so a reply over HTTP matches a reply in chat.
//!
//! # Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Storage
//! errors return HTTP 500; client errors (unknown recipient, out-of-range
//! parameters) return appropriate 4xx codes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use hygrobot_types::{Reading, Recipient, RecipientId, round2};

use crate::state::AppState;

/// Largest `minutes` window accepted by the recent-readings endpoint (7 days).
const MAX_WINDOW_MINUTES: u32 = 10_080;
/// Largest `limit` accepted by the recent-readings endpoint.
const MAX_LIMIT: u32 = 1_000;
/// Default `minutes` window.
const DEFAULT_WINDOW_MINUTES: u32 = 60;
/// Default `limit`.
const DEFAULT_LIMIT: u32 = 300;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/current", get(get_current))
        .route("/api/readings/recent", get(get_recent_readings))
        .route(
            "/api/recipients/{id}/thresholds/min",
            put(set_threshold_min),
        )
        .route(
            "/api/recipients/{id}/thresholds/max",
            put(set_threshold_max),
        )
        .route("/api/command", post(run_command))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Query parameters identifying the calling recipient.
#[derive(Debug, Deserialize)]
pub struct RecipientQuery {
    pub recipient_id: i64,
}

/// Configured thresholds, echoed in responses.
#[derive(Debug, Serialize)]
pub struct ThresholdsResponse {
    pub humidity_min: f64,
    pub humidity_max: f64,
}

impl From<&Recipient> for ThresholdsResponse {
    fn from(r: &Recipient) -> Self {
        Self {
            humidity_min: r.humidity_min,
            humidity_max: r.humidity_max,
        }
    }
}

/// Current-conditions response.
#[derive(Debug, Serialize)]
pub struct CurrentResponse {
    /// `ok`, `stale` or `no_data`.
    pub status: &'static str,
    pub recipient_id: RecipientId,
    pub thresholds: ThresholdsResponse,
    pub reading: Option<Reading>,
    pub age_seconds: Option<i64>,
    pub is_stale: bool,
}

/// Get the most recent stored reading with freshness information.
async fn get_current(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecipientQuery>,
) -> Result<Json<CurrentResponse>, AppError> {
    let id = parse_recipient_id(params.recipient_id)?;
    let recipient = require_recipient(&state, id).await?;

    let reading = state.repo.latest_stored_reading().await?;
    let now = OffsetDateTime::now_utc();

    // Absent data is never fresh: no_data reports stale, like a reading
    // older than the freshness window.
    let age_seconds = reading.as_ref().map(|r| r.age_seconds(now));
    let (status, is_stale) = match age_seconds {
        None => ("no_data", true),
        Some(age) if age > state.stale_after_seconds as i64 => ("stale", true),
        Some(_) => ("ok", false),
    };

    Ok(Json(CurrentResponse {
        status,
        recipient_id: id,
        thresholds: (&recipient).into(),
        reading,
        age_seconds,
        is_stale,
    }))
}

/// Query parameters for the recent-readings endpoint.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub recipient_id: i64,
    pub minutes: Option<u32>,
    pub limit: Option<u32>,
}

/// Summary statistics over a window of readings.
#[derive(Debug, Serialize)]
pub struct ReadingsSummary {
    pub count: usize,
    pub avg_humidity: Option<f64>,
    pub min_humidity: Option<f64>,
    pub max_humidity: Option<f64>,
}

impl ReadingsSummary {
    fn from_readings(readings: &[Reading]) -> Self {
        if readings.is_empty() {
            return Self {
                count: 0,
                avg_humidity: None,
                min_humidity: None,
                max_humidity: None,
            };
        }
        let humidities: Vec<f64> = readings.iter().map(|r| r.humidity).collect();
        let sum: f64 = humidities.iter().sum();
        Self {
            count: readings.len(),
            avg_humidity: Some(round2(sum / humidities.len() as f64)),
            min_humidity: humidities.iter().copied().reduce(f64::min),
            max_humidity: humidities.iter().copied().reduce(f64::max),
        }
    }
}

/// Recent-readings response, newest first.
#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub status: &'static str,
    pub recipient_id: RecipientId,
    pub thresholds: ThresholdsResponse,
    pub window_minutes: u32,
    pub limit: u32,
    pub summary: ReadingsSummary,
    pub readings: Vec<Reading>,
}

/// Get recent readings in a bounded time window.
async fn get_recent_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentQuery>,
) -> Result<Json<RecentResponse>, AppError> {
    let id = parse_recipient_id(params.recipient_id)?;
    let recipient = require_recipient(&state, id).await?;

    let minutes = params.minutes.unwrap_or(DEFAULT_WINDOW_MINUTES);
    if !(1..=MAX_WINDOW_MINUTES).contains(&minutes) {
        return Err(AppError::BadRequest(format!(
            "minutes must be between 1 and {MAX_WINDOW_MINUTES}, got {minutes}"
        )));
    }
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {limit}"
        )));
    }

    let readings = state.repo.recent_readings(minutes, limit).await?;

    Ok(Json(RecentResponse {
        status: "ok",
        recipient_id: id,
        thresholds: (&recipient).into(),
        window_minutes: minutes,
        limit,
        summary: ReadingsSummary::from_readings(&readings),
        readings,
    }))
}

/// Request body for the threshold setters.
#[derive(Debug, Deserialize)]
pub struct ThresholdRequest {
    pub value: f64,
}

/// Response after a threshold update.
#[derive(Debug, Serialize)]
pub struct ThresholdUpdateResponse {
    pub status: &'static str,
    pub recipient_id: RecipientId,
    pub humidity_min: f64,
    pub humidity_max: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Set the lower humidity threshold.
async fn set_threshold_min(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<ThresholdRequest>,
) -> Result<Json<ThresholdUpdateResponse>, AppError> {
    set_threshold(state, id, Bound::Min, request.value).await
}

/// Set the upper humidity threshold.
async fn set_threshold_max(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<ThresholdRequest>,
) -> Result<Json<ThresholdUpdateResponse>, AppError> {
    set_threshold(state, id, Bound::Max, request.value).await
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Min,
    Max,
}

async fn set_threshold(
    state: Arc<AppState>,
    id: i64,
    bound: Bound,
    value: f64,
) -> Result<Json<ThresholdUpdateResponse>, AppError> {
    let id = parse_recipient_id(id)?;
    let recipient = require_recipient(&state, id).await?;

    let (min, max) = match bound {
        Bound::Min => (value, recipient.humidity_max),
        Bound::Max => (recipient.humidity_min, value),
    };

    let updated = recipient
        .with_thresholds(min, max, OffsetDateTime::now_utc())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    state.repo.update_recipient(&updated).await?;

    Ok(Json(ThresholdUpdateResponse {
        status: "ok",
        recipient_id: id,
        humidity_min: updated.humidity_min,
        humidity_max: updated.humidity_max,
        updated_at: updated.updated_at,
    }))
}

/// Request body bridging a chat message into the command router.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub recipient_id: i64,
    pub text: String,
}

/// Reply produced by the command router.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub reply: String,
}

/// Run a chat command on behalf of a recipient.
async fn run_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    let id = parse_recipient_id(request.recipient_id)?;
    let reply = state.router.handle(id, &request.text).await;
    Ok(Json(CommandResponse { reply }))
}

fn parse_recipient_id(raw: i64) -> Result<RecipientId, AppError> {
    RecipientId::new(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

async fn require_recipient(state: &AppState, id: RecipientId) -> Result<Recipient, AppError> {
    state.repo.get_recipient(id).await?.ok_or_else(|| {
        AppError::NotFound(format!(
            "Recipient {id} not found. Send /start to register."
        ))
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<hygrobot_core::Error> for AppError {
    fn from(e: hygrobot_core::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use time::Duration;
    use tower::ServiceExt;

    use hygrobot_core::link::MockTransport;
    use hygrobot_core::{LinkConfig, LinkReader, MemoryRepository, Repository};

    fn test_state() -> Arc<AppState> {
        let repo = Arc::new(MemoryRepository::new());
        let reader = Arc::new(LinkReader::new(
            Arc::new(MockTransport::new()),
            LinkConfig::default(),
        ));
        AppState::new(repo, reader, 10)
    }

    async fn register(state: &AppState, id: i64) -> RecipientId {
        let id = RecipientId::new(id).unwrap();
        let now = OffsetDateTime::now_utc();
        let recipient = Recipient::new(
            id,
            hygrobot_types::DEFAULT_HUMIDITY_MIN,
            hygrobot_types::DEFAULT_HUMIDITY_MAX,
            now,
            now,
        )
        .unwrap();
        state.repo.create_recipient(&recipient).await.unwrap();
        id
    }

    async fn store_reading(state: &AppState, humidity: f64, age: Duration) {
        let reading = Reading::new(
            humidity,
            22.0,
            22.1,
            21.9,
            OffsetDateTime::now_utc() - age,
        )
        .unwrap();
        state.repo.insert_reading(&reading).await.unwrap();
    }

    async fn response_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .with_state(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, response_body(response).await)
    }

    async fn send_json(
        state: Arc<AppState>,
        method: &str,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = router()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        (status, response_body(response).await)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, json) = get(test_state(), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn current_requires_a_registered_recipient() {
        let (status, json) = get(test_state(), "/api/current?recipient_id=42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("/start"));
    }

    #[tokio::test]
    async fn current_reports_no_data_without_readings() {
        let state = test_state();
        register(&state, 42).await;

        let (status, json) = get(state, "/api/current?recipient_id=42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "no_data");
        assert!(json["reading"].is_null());
        assert!(json["age_seconds"].is_null());
        // No data cannot be fresh.
        assert_eq!(json["is_stale"], true);
        assert_eq!(json["thresholds"]["humidity_min"], 40.0);
    }

    #[tokio::test]
    async fn current_distinguishes_fresh_from_stale() {
        let state = test_state();
        register(&state, 42).await;
        store_reading(&state, 55.0, Duration::seconds(2)).await;

        let (status, json) = get(Arc::clone(&state), "/api/current?recipient_id=42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["is_stale"], false);
        assert_eq!(json["reading"]["humidity"], 55.0);

        let state = test_state();
        register(&state, 42).await;
        store_reading(&state, 58.0, Duration::seconds(120)).await;

        let (status, json) = get(state, "/api/current?recipient_id=42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "stale");
        assert_eq!(json["is_stale"], true);
        assert!(json["age_seconds"].as_i64().unwrap() >= 119);
    }

    #[tokio::test]
    async fn recent_validates_window_and_limit() {
        let state = test_state();
        register(&state, 42).await;

        let (status, json) = get(
            Arc::clone(&state),
            "/api/readings/recent?recipient_id=42&minutes=0",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("minutes"));

        let (status, json) = get(
            Arc::clone(&state),
            "/api/readings/recent?recipient_id=42&minutes=20000",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("minutes"));

        let (status, json) = get(state, "/api/readings/recent?recipient_id=42&limit=2000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn recent_summarizes_the_window() {
        let state = test_state();
        register(&state, 42).await;
        store_reading(&state, 50.0, Duration::minutes(5)).await;
        store_reading(&state, 60.0, Duration::minutes(3)).await;
        store_reading(&state, 55.0, Duration::minutes(1)).await;
        // Outside the default 60 minute window.
        store_reading(&state, 10.0, Duration::minutes(90)).await;

        let (status, json) = get(state, "/api/readings/recent?recipient_id=42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["thresholds"]["humidity_min"], 40.0);
        assert_eq!(json["thresholds"]["humidity_max"], 60.0);
        assert_eq!(json["window_minutes"], 60);
        assert_eq!(json["limit"], 300);
        assert_eq!(json["summary"]["count"], 3);
        assert_eq!(json["summary"]["avg_humidity"], 55.0);
        assert_eq!(json["summary"]["min_humidity"], 50.0);
        assert_eq!(json["summary"]["max_humidity"], 60.0);
        // Newest first.
        assert_eq!(json["readings"][0]["humidity"], 55.0);
        assert_eq!(json["readings"][2]["humidity"], 50.0);
    }

    #[tokio::test]
    async fn recent_summary_is_empty_without_readings() {
        let state = test_state();
        register(&state, 42).await;

        let (status, json) = get(state, "/api/readings/recent?recipient_id=42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["summary"]["count"], 0);
        assert!(json["summary"]["avg_humidity"].is_null());
    }

    #[tokio::test]
    async fn threshold_setter_updates_and_echoes() {
        let state = test_state();
        register(&state, 42).await;

        let (status, json) = send_json(
            Arc::clone(&state),
            "PUT",
            "/api/recipients/42/thresholds/min",
            serde_json::json!({"value": 35.0}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["humidity_min"], 35.0);
        assert_eq!(json["humidity_max"], 60.0);
        assert!(json["updated_at"].is_string());

        let stored = state
            .repo
            .get_recipient(RecipientId::new(42).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.humidity_min, 35.0);
    }

    #[tokio::test]
    async fn threshold_setter_rejects_invalid_values() {
        let state = test_state();
        register(&state, 42).await;

        // Out of range.
        let (status, _) = send_json(
            Arc::clone(&state),
            "PUT",
            "/api/recipients/42/thresholds/min",
            serde_json::json!({"value": 150.0}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Would invert the min < max order against the current max of 60.
        let (status, _) = send_json(
            Arc::clone(&state),
            "PUT",
            "/api/recipients/42/thresholds/min",
            serde_json::json!({"value": 65.0}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Rejected updates never touch the store.
        let stored = state
            .repo
            .get_recipient(RecipientId::new(42).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.humidity_min, 40.0);
    }

    #[tokio::test]
    async fn threshold_setter_unknown_recipient_is_404() {
        let (status, _) = send_json(
            test_state(),
            "PUT",
            "/api/recipients/99/thresholds/max",
            serde_json::json!({"value": 70.0}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn command_endpoint_bridges_the_router() {
        let state = test_state();

        let (status, json) = send_json(
            Arc::clone(&state),
            "POST",
            "/api/command",
            serde_json::json!({"recipient_id": 42, "text": "/start"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reply = json["reply"].as_str().unwrap();
        assert!(reply.contains("Min: 40%"));
        assert!(reply.contains("Max: 60%"));

        // /start registered the recipient, so /api/current now works.
        let (status, _) = get(state, "/api/current?recipient_id=42").await;
        assert_eq!(status, StatusCode::OK);
    }
}

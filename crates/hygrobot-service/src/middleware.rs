//! Security middleware for the hygrobot-service API.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::SecurityConfig;

/// API key authentication middleware.
///
/// Checks the `X-API-Key` header against the configured key.
/// Returns 401 Unauthorized if the key is missing or invalid.
pub async fn api_key_auth(
    headers: HeaderMap,
    State(config): State<Arc<SecurityConfig>>,
    request: Request,
    next: Next,
) -> Response {
    // Skip auth if no key is configured
    let Some(expected) = &config.api_key else {
        return next.run(request).await;
    };

    // Skip auth for health endpoint (monitoring should work without auth)
    if request.uri().path() == "/api/health" {
        return next.run(request).await;
    }

    let provided = headers.get("X-API-Key").and_then(|v| v.to_str().ok());

    // Constant-time comparison to prevent timing attacks
    let valid = provided
        .map(|key| expected.as_bytes().ct_eq(key.as_bytes()).into())
        .unwrap_or(false);

    if valid {
        next.run(request).await
    } else {
        warn!("API key authentication failed for {}", request.uri().path());
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Invalid or missing API key",
                "hint": "Provide a valid API key in the X-API-Key header"
            })),
        )
            .into_response()
    }
}

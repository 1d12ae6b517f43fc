//! API handlers and routing

pub mod convert;
pub mod formats;
pub mod health;
pub mod status;

use crate::error::ApiError;
use crate::AppState;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;

pub use health::health_routes;

/// Build conversion API routes
pub fn conversion_routes() -> Router<AppState> {
    Router::new()
        .route("/api/convert", post(convert::convert))
        .route("/api/status/:job_id", get(status::job_status))
        .route("/api/formats", get(formats::formats))
}

/// Authorization gate for conversion endpoints
///
/// Identity verification happens upstream; this service only honors a
/// shared secret passed in `x-api-key`. With no secret configured the gate
/// is open.
pub fn require_authorized(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config.shared_secret.as_deref() else {
        return Ok(());
    };
    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if provided == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("missing or invalid API key".to_string()))
    }
}

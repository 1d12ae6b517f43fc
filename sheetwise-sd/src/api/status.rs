//! Job status endpoint
//!
//! Status is derived from the archive's existence: present means the job
//! completed and is downloadable, absent means unknown or expired. There is
//! no job database; the filesystem is the source of truth.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// GET /api/status/{job_id} response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub job_id: Uuid,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /api/status/{job_id}
pub async fn job_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<StatusResponse>> {
    super::require_authorized(&state, &headers)?;

    let archive = state.config.dirs.archive_path(&job_id.to_string());
    debug!(job_id = %job_id, archive = %archive.display(), "Status query");

    match std::fs::metadata(&archive) {
        Ok(meta) => {
            let created_at = meta
                .created()
                .or_else(|_| meta.modified())
                .map(DateTime::<Utc>::from)
                .ok();
            Ok(Json(StatusResponse {
                job_id,
                status: "completed",
                download_url: Some(format!("/downloads/{}.zip", job_id)),
                file_size: Some(meta.len()),
                created_at,
                message: None,
            }))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Json(StatusResponse {
            job_id,
            status: "not_found",
            download_url: None,
            file_size: None,
            created_at: None,
            message: Some("Job not found or files have expired".to_string()),
        })),
        Err(e) => Err(ApiError::Io(e)),
    }
}

//! Conversion endpoint
//!
//! `POST /api/convert` — multipart upload of 1–10 sheet music images,
//! processed synchronously into a downloadable archive. Validation happens
//! before any job is created; a bad upload never leaves artifacts behind.

use crate::error::{ApiError, ApiResult};
use crate::models::job::{ConversionJob, DetectedElements, OutputFormat};
use crate::workflow::{JobPipeline, UploadedFile};
use crate::AppState;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

/// MIME types accepted for sheet music uploads
const ALLOWED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/tiff",
    "image/tif",
    "application/pdf",
];

/// Per-file summary in the convert response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub original_name: String,
    pub success: bool,
    pub confidence: f64,
    pub detected_elements: DetectedElements,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/convert response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub job_id: Uuid,
    pub success: bool,
    pub processed_files: usize,
    pub successful_conversions: usize,
    pub failed_conversions: usize,
    pub download_url: String,
    pub results: Vec<FileSummary>,
}

/// POST /api/convert
pub async fn convert(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<ConvertResponse>> {
    super::require_authorized(&state, &headers)?;

    let (files, format) = read_upload(multipart, &state).await?;

    let job_id = Uuid::new_v4();
    info!(job_id = %job_id, files = files.len(), format = ?format, "Starting conversion job");

    let pipeline = JobPipeline::new(state.config.clone());
    match pipeline.run(job_id, files, format).await {
        Ok(job) => Ok(Json(build_response(&job))),
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Conversion job failed");
            *state.last_error.write().await = Some(e.to_string());
            let message = if state.config.production {
                "An error occurred while processing your sheet music".to_string()
            } else {
                e.to_string()
            };
            Err(ApiError::Internal(message))
        }
    }
}

/// Read and validate the multipart upload; rejects before a job exists
async fn read_upload(
    mut multipart: Multipart,
    state: &AppState,
) -> Result<(Vec<UploadedFile>, OutputFormat), ApiError> {
    let limits = state.config.limits;
    let mut files = Vec::new();
    let mut format = OutputFormat::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("output_format") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable output_format: {}", e)))?;
                format = text
                    .parse()
                    .map_err(|e: String| ApiError::BadRequest(e))?;
            }
            Some("images") => {
                let original_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload".to_string());
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!(
                        "failed to read file {}: {}",
                        original_name, e
                    ))
                })?;

                if files.len() >= limits.max_files {
                    return Err(ApiError::BadRequest(format!(
                        "Too many files; maximum is {} per request",
                        limits.max_files
                    )));
                }
                if bytes.len() > limits.max_file_bytes {
                    return Err(ApiError::PayloadTooLarge(format!(
                        "File {} exceeds the 50MB limit",
                        original_name
                    )));
                }
                validate_file_type(&original_name, content_type.as_deref(), &bytes)?;

                files.push(UploadedFile {
                    original_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {
                // Unknown fields are drained and ignored
                while let Ok(Some(_)) = field.chunk().await {}
            }
        }
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest(
            "No files uploaded. Please upload at least one sheet music image".to_string(),
        ));
    }

    Ok((files, format))
}

/// Check the declared MIME type, falling back to content sniffing when the
/// client declared none
fn validate_file_type(
    original_name: &str,
    declared: Option<&str>,
    bytes: &[u8],
) -> Result<(), ApiError> {
    let effective = match declared {
        Some(mime) if !mime.trim().is_empty() => Some(mime.to_ascii_lowercase()),
        _ => infer::get(bytes).map(|kind| kind.mime_type().to_string()),
    };

    match effective {
        Some(mime) if ALLOWED_TYPES.contains(&mime.as_str()) => Ok(()),
        _ => Err(ApiError::BadRequest(format!(
            "File {} is not a supported type. Only JPEG, PNG, TIFF, and PDF files are allowed",
            original_name
        ))),
    }
}

fn build_response(job: &ConversionJob) -> ConvertResponse {
    ConvertResponse {
        job_id: job.job_id,
        success: true,
        processed_files: job.results.len(),
        successful_conversions: job.successful_conversions(),
        failed_conversions: job.failed_conversions(),
        download_url: format!("/downloads/{}.zip", job.job_id),
        results: job
            .results
            .iter()
            .map(|r| FileSummary {
                original_name: r.original_name.clone(),
                success: r.success,
                confidence: r.confidence,
                detected_elements: r.detected_elements,
                error: r.error.clone(),
            })
            .collect(),
    }
}

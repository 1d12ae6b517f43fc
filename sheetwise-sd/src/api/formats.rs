//! Supported format discovery

use axum::Json;
use serde::Serialize;

/// One supported format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatInfo {
    pub extension: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

/// GET /api/formats response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatsResponse {
    pub input_formats: Vec<FormatInfo>,
    pub output_formats: Vec<FormatInfo>,
}

/// GET /api/formats
pub async fn formats() -> Json<FormatsResponse> {
    Json(FormatsResponse {
        input_formats: vec![
            FormatInfo {
                extension: "jpg",
                description: "JPEG Image",
                mime_type: "image/jpeg",
            },
            FormatInfo {
                extension: "jpeg",
                description: "JPEG Image",
                mime_type: "image/jpeg",
            },
            FormatInfo {
                extension: "png",
                description: "PNG Image",
                mime_type: "image/png",
            },
            FormatInfo {
                extension: "tiff",
                description: "TIFF Image",
                mime_type: "image/tiff",
            },
            FormatInfo {
                extension: "pdf",
                description: "PDF Document",
                mime_type: "application/pdf",
            },
        ],
        output_formats: vec![
            FormatInfo {
                extension: "xml",
                description: "MusicXML",
                mime_type: "application/xml",
            },
            FormatInfo {
                extension: "mid",
                description: "MIDI File",
                mime_type: "audio/midi",
            },
            FormatInfo {
                extension: "png",
                description: "Clean PNG Image",
                mime_type: "image/png",
            },
        ],
    })
}

//! Conversion job and per-file result types
//!
//! A job covers one upload batch. Per-file results are recorded once by the
//! job pipeline and never mutated afterwards; their lifetime is tied to the
//! owning job. Wire field names are camelCase to match the conversion
//! report format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Requested output format for a conversion batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Xml,
    Midi,
    #[default]
    Both,
}

impl OutputFormat {
    /// Whether a MIDI rendition should be produced for each file
    pub fn wants_midi(self) -> bool {
        matches!(self, OutputFormat::Midi | OutputFormat::Both)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "xml" => Ok(OutputFormat::Xml),
            "midi" => Ok(OutputFormat::Midi),
            "both" => Ok(OutputFormat::Both),
            other => Err(format!(
                "unknown output format '{}' (expected xml, midi, or both)",
                other
            )),
        }
    }
}

/// Conversion job state machine
///
/// `created → processing(file i of N) → packaging → completed`, or
/// `failed` when packaging (or workspace setup) fails. `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Created,
    Processing { current: usize, total: usize },
    Packaging,
    Completed,
    Failed,
}

/// Musical elements detected in a recognized score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedElements {
    pub measures: u32,
    pub notes: u32,
    pub rests: u32,
    pub clefs: u32,
    pub time_signatures: u32,
    pub key_signatures: u32,
}

/// Outcome of processing one uploaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub original_name: String,
    pub file_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_xml_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi_path: Option<PathBuf>,
    pub confidence: f64,
    pub detected_elements: DetectedElements,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    /// Record a failed file; the job itself continues
    pub fn failure(original_name: String, file_id: Uuid, error: String) -> Self {
        Self {
            original_name,
            file_id,
            success: false,
            music_xml_path: None,
            midi_path: None,
            confidence: 0.0,
            detected_elements: DetectedElements::default(),
            error: Some(error),
        }
    }
}

/// A completed conversion job
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub results: Vec<FileResult>,
    pub archive_path: PathBuf,
}

impl ConversionJob {
    pub fn successful_conversions(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed_conversions(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// Summary written into each archive as conversion_report.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    pub timestamp: DateTime<Utc>,
    pub total_files: usize,
    pub successful_conversions: usize,
    pub failed_conversions: usize,
    pub results: Vec<FileResult>,
}

impl ConversionReport {
    pub fn new(results: &[FileResult]) -> Self {
        Self {
            timestamp: Utc::now(),
            total_files: results.len(),
            successful_conversions: results.iter().filter(|r| r.success).count(),
            failed_conversions: results.iter().filter(|r| !r.success).count(),
            results: results.to_vec(),
        }
    }
}

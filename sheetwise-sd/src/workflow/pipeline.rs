//! Job pipeline orchestration
//!
//! Drives one conversion job through its state machine:
//! `created → processing(file i of N) → packaging → completed`, or
//! `failed` when the workspace cannot be prepared or packaging fails.
//! Per-file errors never abort the batch; they become failed entries in
//! the job's result list.

use crate::config::ServiceConfig;
use crate::models::job::{ConversionJob, FileResult, JobPhase, OutputFormat};
use crate::models::score::ParsedScore;
use crate::services::{
    cleanup, image_normalizer, midi_encoder, musicxml, omr_engine::OmrEngine, packager,
    score_analyzer, PackagingError, ScoreError,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One uploaded file awaiting conversion
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Job-fatal errors; per-file failures are recorded in results instead
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to prepare job workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error(transparent)]
    Packaging(#[from] PackagingError),
}

/// Errors that fail a single file within a job
#[derive(Debug, Error)]
enum FileError {
    #[error("image preparation failed: {0}")]
    Prepare(#[source] std::io::Error),

    #[error("OMR processing failed: {0}")]
    Recognition(#[from] crate::services::OmrError),

    #[error("MusicXML analysis failed: {0}")]
    Analysis(#[from] ScoreError),
}

/// Sequential per-file conversion pipeline for one job
#[derive(Clone)]
pub struct JobPipeline {
    config: Arc<ServiceConfig>,
    engine: OmrEngine,
}

impl JobPipeline {
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        let engine = OmrEngine::new(config.omr.clone());
        Self { config, engine }
    }

    /// Run a conversion batch to completion and schedule its cleanup
    pub async fn run(
        &self,
        job_id: Uuid,
        files: Vec<UploadedFile>,
        format: OutputFormat,
    ) -> Result<ConversionJob, JobError> {
        let created_at = Utc::now();
        self.log_phase(job_id, JobPhase::Created);
        let temp_dir = self.config.dirs.job_temp_dir(&job_id.to_string());
        std::fs::create_dir_all(&temp_dir)?;

        let total = files.len();
        let mut results = Vec::with_capacity(total);

        for (index, file) in files.into_iter().enumerate() {
            self.log_phase(
                job_id,
                JobPhase::Processing {
                    current: index + 1,
                    total,
                },
            );
            info!(
                job_id = %job_id,
                file = %file.original_name,
                "Processing file {}/{}",
                index + 1,
                total
            );

            let file_id = Uuid::new_v4();
            let result = match self
                .process_file(job_id, file_id, &temp_dir, &file, format)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    error!(
                        job_id = %job_id,
                        file = %file.original_name,
                        error = %e,
                        "File conversion failed"
                    );
                    FileResult::failure(file.original_name, file_id, e.to_string())
                }
            };
            results.push(result);
        }

        self.log_phase(job_id, JobPhase::Packaging);
        let archive_path = self.config.dirs.archive_path(&job_id.to_string());
        if let Err(e) = packager::build_archive(&results, &archive_path) {
            self.log_phase(job_id, JobPhase::Failed);
            cleanup::schedule_removal(temp_dir, std::time::Duration::ZERO);
            return Err(e.into());
        }

        cleanup::schedule_removal(temp_dir, self.config.temp_cleanup_delay);
        cleanup::schedule_removal(archive_path.clone(), self.config.archive_retention);

        self.log_phase(job_id, JobPhase::Completed);
        info!(
            job_id = %job_id,
            successful = results.iter().filter(|r| r.success).count(),
            failed = results.iter().filter(|r| !r.success).count(),
            "Conversion job completed"
        );

        Ok(ConversionJob {
            job_id,
            created_at,
            results,
            archive_path,
        })
    }

    /// Convert one file: normalize → recognize → analyze → encode
    async fn process_file(
        &self,
        job_id: Uuid,
        file_id: Uuid,
        temp_dir: &Path,
        file: &UploadedFile,
        format: OutputFormat,
    ) -> Result<FileResult, FileError> {
        // Normalize (or pass through) the upload into the job workspace
        let input_path = temp_dir.join(format!("input_{}.png", file_id));
        image_normalizer::normalize_or_passthrough(
            &file.bytes,
            &input_path,
            &self.config.normalize,
        )
        .map_err(FileError::Prepare)?;

        // One output directory per file keeps engine artifacts separate
        let file_out_dir = temp_dir.join(file_id.to_string());
        std::fs::create_dir_all(&file_out_dir).map_err(FileError::Prepare)?;

        let xml_path = self.engine.recognize(&input_path, &file_out_dir).await?;

        let (analysis, score) = self.analyze_artifact(job_id, &xml_path)?;

        let midi_path = if format.wants_midi() {
            score
                .as_ref()
                .and_then(|s| self.encode_midi(job_id, file_id, temp_dir, s))
        } else {
            None
        };

        info!(
            job_id = %job_id,
            file = %file.original_name,
            confidence = analysis.confidence,
            measures = analysis.elements.measures,
            notes = analysis.elements.notes,
            "File conversion succeeded"
        );

        Ok(FileResult {
            original_name: file.original_name.clone(),
            file_id,
            success: true,
            music_xml_path: Some(xml_path),
            midi_path,
            confidence: analysis.confidence,
            detected_elements: analysis.elements,
            error: None,
        })
    }

    /// Analyze the recognized artifact
    ///
    /// Empty or malformed XML fails the file. Container/IO trouble degrades
    /// to the fixed default analysis with no score to encode.
    fn analyze_artifact(
        &self,
        job_id: Uuid,
        xml_path: &Path,
    ) -> Result<(score_analyzer::ScoreAnalysis, Option<ParsedScore>), FileError> {
        match musicxml::load_score(xml_path) {
            Ok(score) => {
                let analysis = score_analyzer::analyze(&score, &self.config.confidence);
                Ok((analysis, Some(score)))
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    artifact = %xml_path.display(),
                    error = %e,
                    "Analysis failed, using default analysis"
                );
                Ok((score_analyzer::fallback_analysis(&self.config.confidence), None))
            }
        }
    }

    /// Encode the MIDI rendition; failure is non-fatal for the file
    fn encode_midi(
        &self,
        job_id: Uuid,
        file_id: Uuid,
        temp_dir: &Path,
        score: &ParsedScore,
    ) -> Option<PathBuf> {
        let midi_path = temp_dir.join(format!("output_{}.mid", file_id));
        match midi_encoder::encode_to_file(score, &midi_path) {
            Ok(()) => Some(midi_path),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "MIDI encoding failed");
                None
            }
        }
    }

    fn log_phase(&self, job_id: Uuid, phase: JobPhase) {
        info!(job_id = %job_id, phase = ?phase, "Job phase transition");
    }
}

//! Domain models for the sheet-to-digital service

pub mod job;
pub mod score;

pub use job::{
    ConversionJob, ConversionReport, DetectedElements, FileResult, JobPhase, OutputFormat,
};
pub use score::{ParsedScore, Pitch, ScoreEntry, Step};

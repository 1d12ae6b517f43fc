//! Per-job conversion workflow
//!
//! One job covers one upload batch. Files are processed sequentially
//! (normalize → recognize → analyze → encode), failures are isolated per
//! file, and the batch finishes with a packaging phase that produces the
//! downloadable archive.

pub mod pipeline;

pub use pipeline::{JobError, JobPipeline, UploadedFile};

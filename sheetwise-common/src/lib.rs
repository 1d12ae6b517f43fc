//! Shared building blocks for Sheetwise services
//!
//! Provides the common error type, data folder resolution, and service
//! directory bootstrap used by the sheet-to-digital service.

pub mod config;
pub mod error;

pub use error::{Error, Result};

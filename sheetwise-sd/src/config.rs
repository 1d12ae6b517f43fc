//! Configuration resolution for sheetwise-sd
//!
//! Settings resolve with ENV → TOML → compiled-default priority. The TOML
//! file is the shared `sheetwise/config.toml`; environment variables
//! override individual fields for deployment tweaks without editing the
//! file.

use crate::services::image_normalizer::NormalizeConfig;
use crate::services::omr_engine::OmrConfig;
use crate::services::score_analyzer::ConfidenceWeights;
use serde::Deserialize;
use sheetwise_common::config::{locate_config_file, resolve_data_folder, ServiceDirs};
use std::time::Duration;
use tracing::{info, warn};

/// Raw TOML config file contents (all fields optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub bind_address: Option<String>,
    pub omr_binary: Option<String>,
    pub omr_timeout_secs: Option<u64>,
    pub shared_secret: Option<String>,
    #[serde(default)]
    pub confidence: Option<ConfidenceWeights>,
}

/// Upload validation limits
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Maximum files per conversion batch
    pub max_files: usize,
    /// Maximum size of one uploaded file in bytes
    pub max_file_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_file_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Working directories under the data folder
    pub dirs: ServiceDirs,
    /// HTTP bind address
    pub bind_address: String,
    /// OMR engine settings
    pub omr: OmrConfig,
    /// Image normalization settings
    pub normalize: NormalizeConfig,
    /// Upload validation limits
    pub limits: UploadLimits,
    /// Confidence heuristic weights
    pub confidence: ConfidenceWeights,
    /// Delay before a job's temp directory is removed after packaging
    pub temp_cleanup_delay: Duration,
    /// How long a finished archive stays downloadable
    pub archive_retention: Duration,
    /// Period of the stale-entry sweeper
    pub sweep_interval: Duration,
    /// Age at which a temp/download entry counts as stale
    pub sweep_max_age: Duration,
    /// Shared secret gating the API; None disables the gate
    pub shared_secret: Option<String>,
    /// Hide internal error detail from responses
    pub production: bool,
}

impl ServiceConfig {
    /// Resolve configuration from environment, TOML file, and defaults
    pub fn load() -> Self {
        let toml_config = load_toml_config();

        let data_folder = resolve_data_folder(None, "SHEETWISE_DATA", "root_folder");
        let dirs = ServiceDirs::new(&data_folder);

        let bind_address = env_string("SHEETWISE_BIND")
            .or_else(|| toml_config.bind_address.clone())
            .unwrap_or_else(|| "127.0.0.1:8080".to_string());

        let mut omr = OmrConfig::default();
        if let Some(binary) = env_string("SHEETWISE_OMR_BINARY").or_else(|| toml_config.omr_binary.clone()) {
            omr.binary = binary;
        }
        if let Some(secs) = env_string("SHEETWISE_OMR_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .or(toml_config.omr_timeout_secs)
        {
            omr.timeout = Duration::from_secs(secs);
        }

        let shared_secret = env_string("SHEETWISE_SHARED_SECRET")
            .or_else(|| toml_config.shared_secret.clone())
            .filter(|s| !s.trim().is_empty());
        if shared_secret.is_none() {
            info!("API authentication disabled (no shared secret configured)");
        }

        let production = match env_string("SHEETWISE_PRODUCTION") {
            Some(value) => value == "1" || value.eq_ignore_ascii_case("true"),
            None => !cfg!(debug_assertions),
        };

        Self {
            dirs,
            bind_address,
            omr,
            normalize: NormalizeConfig::default(),
            limits: UploadLimits::default(),
            confidence: toml_config.confidence.unwrap_or_default(),
            temp_cleanup_delay: Duration::from_secs(5),
            archive_retention: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            sweep_max_age: Duration::from_secs(24 * 60 * 60),
            shared_secret,
            production,
        }
    }

    /// Whole-request body limit for the convert endpoint
    pub fn max_body_bytes(&self) -> usize {
        // All files plus multipart framing overhead
        self.limits.max_files * self.limits.max_file_bytes + 1024 * 1024
    }
}

fn load_toml_config() -> TomlConfig {
    let Ok(path) = locate_config_file() else {
        return TomlConfig::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<TomlConfig>(&content) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded TOML config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unparsable TOML config");
                TomlConfig::default()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read TOML config");
            TomlConfig::default()
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_match_upload_contract() {
        let limits = UploadLimits::default();
        assert_eq!(limits.max_files, 10);
        assert_eq!(limits.max_file_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn toml_config_parses_partial_files() {
        let config: TomlConfig = toml::from_str(
            r#"
            omr_binary = "/opt/oemer/bin/oemer"
            omr_timeout_secs = 600
            "#,
        )
        .unwrap();
        assert_eq!(config.omr_binary.as_deref(), Some("/opt/oemer/bin/oemer"));
        assert_eq!(config.omr_timeout_secs, Some(600));
        assert!(config.shared_secret.is_none());
        assert!(config.confidence.is_none());
    }

    #[test]
    fn toml_confidence_weights_override() {
        let config: TomlConfig = toml::from_str(
            r#"
            [confidence]
            base = 0.5
            notes = 0.3
            "#,
        )
        .unwrap();
        let weights = config.confidence.unwrap();
        assert_eq!(weights.base, 0.5);
        assert_eq!(weights.notes, 0.3);
        // Unset fields keep their defaults
        assert_eq!(weights.measures, 0.1);
    }

    #[test]
    fn body_limit_covers_a_full_batch() {
        let config = UploadLimits::default();
        let total = config.max_files * config.max_file_bytes;
        assert!(total >= 500 * 1024 * 1024);
    }
}

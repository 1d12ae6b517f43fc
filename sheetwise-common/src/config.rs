//! Data folder resolution and service directory bootstrap
//!
//! The data folder holds everything the service writes: per-job temporary
//! working directories and finished download archives.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Data folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_file_key: &str,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(folder) = config.get(config_file_key).and_then(|v| v.as_str()) {
                    return PathBuf::from(folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_data_folder()
}

/// Get the configuration file path for the platform
pub fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("sheetwise").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/sheetwise/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default data folder path
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/sheetwise (or /var/lib/sheetwise for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("sheetwise"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/sheetwise"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/sheetwise
        dirs::data_dir()
            .map(|d| d.join("sheetwise"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/sheetwise"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\sheetwise
        dirs::data_local_dir()
            .map(|d| d.join("sheetwise"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\sheetwise"))
    } else {
        PathBuf::from("./sheetwise_data")
    }
}

/// Working directories of the sheet-to-digital service
///
/// `temp` holds per-job working directories keyed by job id; `downloads`
/// holds finished archives served to clients until their retention expires.
#[derive(Debug, Clone)]
pub struct ServiceDirs {
    pub data: PathBuf,
    pub temp: PathBuf,
    pub downloads: PathBuf,
}

impl ServiceDirs {
    pub fn new(data_folder: &Path) -> Self {
        Self {
            data: data_folder.to_path_buf(),
            temp: data_folder.join("temp"),
            downloads: data_folder.join("downloads"),
        }
    }

    /// Create all required directories if missing
    pub fn ensure_exist(&self) -> Result<()> {
        for dir in [&self.data, &self.temp, &self.downloads] {
            std::fs::create_dir_all(dir)?;
            info!("Directory ensured: {}", dir.display());
        }
        Ok(())
    }

    /// Per-job temporary working directory
    pub fn job_temp_dir(&self, job_id: &str) -> PathBuf {
        self.temp.join(job_id)
    }

    /// Path of a job's download archive
    pub fn archive_path(&self, job_id: &str) -> PathBuf {
        self.downloads.join(format!("{}.zip", job_id))
    }
}

//! External OMR engine invocation
//!
//! Runs the `oemer` command-line recognizer as a black-box subprocess:
//! `oemer <image> --output-path <file> --without-deskew`. The engine must
//! exit 0 and leave a MusicXML file at (or near) the requested path within
//! the configured timeout. Stdout and stderr are captured line-by-line for
//! diagnostics. On timeout the process gets SIGTERM, then SIGKILL after a
//! grace period.
//!
//! Invocations within a job are sequential; recognition is memory-hungry
//! and one subprocess per job bounds the load.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// OMR engine settings
#[derive(Debug, Clone)]
pub struct OmrConfig {
    /// Engine binary name or path
    pub binary: String,
    /// Hard wall-clock limit for one recognition run
    pub timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL
    pub kill_grace: Duration,
}

impl Default for OmrConfig {
    fn default() -> Self {
        Self {
            binary: "oemer".to_string(),
            timeout: Duration::from_secs(30 * 60),
            kill_grace: Duration::from_secs(5),
        }
    }
}

/// OMR invocation errors
///
/// `Timeout` is deliberately distinct from `Failed`: a run that was killed
/// reads differently in a file result than a tool-reported error.
#[derive(Debug, Error)]
pub enum OmrError {
    /// Engine binary not found in PATH
    #[error("OMR engine binary not found: {0}")]
    BinaryNotFound(String),

    /// Failed to spawn or communicate with the engine
    #[error("failed to execute OMR engine: {0}")]
    Execution(String),

    /// Engine exited with a non-zero status
    #[error("OMR engine failed (exit code {code:?}): {output}")]
    Failed {
        code: Option<i32>,
        output: String,
    },

    /// Engine exceeded the wall-clock limit and was killed
    #[error("OMR engine timed out after {0:?}")]
    Timeout(Duration),

    /// Engine exited successfully but no output artifact was found
    #[error("OMR engine completed but no output file was found")]
    MissingOutput,

    /// I/O error handling the output artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Canonical name the recognized artifact is moved to
const CANONICAL_OUTPUT: &str = "omr_output.xml";

/// Flat subdirectory the engine writes into
const FLAT_OUTPUT_DIR: &str = "omr_flat_output";

/// Handle to the external recognition engine
#[derive(Debug, Clone)]
pub struct OmrEngine {
    config: OmrConfig,
}

impl OmrEngine {
    pub fn new(config: OmrConfig) -> Self {
        Self { config }
    }

    /// Probe whether the engine binary responds at all
    pub async fn is_available(&self) -> bool {
        Command::new(&self.config.binary)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok()
    }

    /// Recognize one normalized image, returning the canonical MusicXML path
    pub async fn recognize(
        &self,
        image_path: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, OmrError> {
        let flat_dir = output_dir.join(FLAT_OUTPUT_DIR);
        std::fs::create_dir_all(&flat_dir)?;
        let expected = flat_dir.join("output.musicxml");

        info!(
            image = %image_path.display(),
            output = %expected.display(),
            "Executing OMR engine"
        );

        let mut child = Command::new(&self.config.binary)
            .arg(image_path)
            .arg("--output-path")
            .arg(&expected)
            .arg("--without-deskew")
            .current_dir(&flat_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OmrError::BinaryNotFound(self.config.binary.clone())
                } else {
                    OmrError::Execution(e.to_string())
                }
            })?;

        let stdout_task = child
            .stdout
            .take()
            .map(|stream| tokio::spawn(capture_lines(stream, false)));
        let stderr_task = child
            .stderr
            .take()
            .map(|stream| tokio::spawn(capture_lines(stream, true)));

        let status = match tokio::time::timeout(self.config.timeout, child.wait()).await {
            Ok(status) => status.map_err(|e| OmrError::Execution(e.to_string()))?,
            Err(_) => {
                warn!(
                    image = %image_path.display(),
                    timeout = ?self.config.timeout,
                    "OMR engine timed out, terminating"
                );
                self.terminate(&mut child).await;
                return Err(OmrError::Timeout(self.config.timeout));
            }
        };

        let stdout = join_capture(stdout_task).await;
        let stderr = join_capture(stderr_task).await;

        if !status.success() {
            let output = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(OmrError::Failed {
                code: status.code(),
                output: output.trim().to_string(),
            });
        }

        let artifact = self.locate_artifact(&expected, &flat_dir, image_path)?;
        let canonical = output_dir.join(CANONICAL_OUTPUT);
        std::fs::rename(&artifact, &canonical)?;
        info!(artifact = %canonical.display(), "OMR recognition completed");
        Ok(canonical)
    }

    /// Find the produced artifact: the expected flat path first, then a
    /// small set of alternative names, then any `.musicxml` in the flat dir
    fn locate_artifact(
        &self,
        expected: &Path,
        flat_dir: &Path,
        image_path: &Path,
    ) -> Result<PathBuf, OmrError> {
        if expected.exists() {
            return Ok(expected.to_path_buf());
        }

        let stem = image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let candidates = [
            flat_dir.join(format!("enhanced_{}.musicxml", stem)),
            flat_dir.join(format!("{}.musicxml", stem)),
        ];
        for candidate in &candidates {
            if candidate.exists() {
                debug!(path = %candidate.display(), "Found OMR output at alternative path");
                return Ok(candidate.clone());
            }
        }

        for entry in std::fs::read_dir(flat_dir)?.flatten() {
            let path = entry.path();
            if path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("musicxml"))
            {
                debug!(path = %path.display(), "Found OMR output by directory scan");
                return Ok(path);
            }
        }

        Err(OmrError::MissingOutput)
    }

    /// Graceful termination with forceful escalation
    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            // SIGTERM first, SIGKILL only after the grace period
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
            if tokio::time::timeout(self.config.kill_grace, child.wait())
                .await
                .is_ok()
            {
                return;
            }
            warn!(pid, "OMR engine ignored SIGTERM, killing");
        }

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill OMR engine process");
        }
    }
}

/// Read a stdio stream line by line, logging as lines arrive
async fn capture_lines<R: AsyncRead + Unpin>(stream: R, is_stderr: bool) -> String {
    let mut captured = String::new();
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            if is_stderr {
                warn!(target: "omr", "{}", line.trim());
            } else {
                debug!(target: "omr", "{}", line.trim());
            }
        }
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}

async fn join_capture(task: Option<tokio::task::JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

//! Transient artifact cleanup
//!
//! Two mechanisms keep the data folder bounded:
//! - per-job deferred removals (temp dir shortly after packaging, archive
//!   after its retention window), fire-and-forget timers whose failures
//!   are logged and never surfaced to a caller that already got a response;
//! - a process-wide periodic sweeper that removes stale entries left behind
//!   by crashed or interrupted jobs.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// Remove `path` after `delay`, whatever it is by then
pub fn schedule_removal(path: PathBuf, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match remove_path(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed transient artifact"),
            Err(e) => error!(path = %path.display(), error = %e, "Deferred cleanup failed"),
        }
    });
}

/// Start the periodic sweep of stale temp/download entries
///
/// Runs for the life of the process; started once from service init.
pub fn spawn_sweeper(
    directories: Vec<PathBuf>,
    max_age: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            for dir in &directories {
                match sweep_directory(dir, max_age) {
                    Ok(removed) if removed > 0 => {
                        info!(dir = %dir.display(), removed, "Cleanup sweep completed");
                    }
                    Ok(_) => {}
                    Err(e) => error!(dir = %dir.display(), error = %e, "Cleanup sweep failed"),
                }
            }
        }
    })
}

/// Remove entries of `dir` older than `max_age`; returns how many went
pub fn sweep_directory(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .and_then(|t| t.elapsed().map_err(|e| std::io::Error::other(e)));
        match age {
            Ok(age) if age > max_age => {
                remove_path(&path)?;
                info!(path = %path.display(), "Cleaned up stale entry");
                removed += 1;
            }
            Ok(_) => {}
            Err(e) => error!(path = %path.display(), error = %e, "Could not determine entry age"),
        }
    }
    Ok(removed)
}

/// Remove a file or directory tree; a missing target is not an error
fn remove_path(path: &Path) -> std::io::Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

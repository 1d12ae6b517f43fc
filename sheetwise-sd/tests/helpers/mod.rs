//! Shared test helpers: service state over a temp data folder, fake OMR
//! engine scripts, and multipart body construction.

#![allow(dead_code)]

use sheetwise_common::config::ServiceDirs;
use sheetwise_sd::config::{ServiceConfig, UploadLimits};
use sheetwise_sd::services::image_normalizer::NormalizeConfig;
use sheetwise_sd::services::omr_engine::OmrConfig;
use sheetwise_sd::services::score_analyzer::ConfidenceWeights;
use sheetwise_sd::AppState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A minimal one-measure, one-note (C4 quarter) score
pub const ONE_NOTE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="3.1">
  <part id="P1">
    <measure number="1">
      <attributes>
        <divisions>96</divisions>
        <key><fifths>0</fifths></key>
        <time><beats>4</beats><beat-type>4</beat-type></time>
        <clef><sign>G</sign><line>2</line></clef>
      </attributes>
      <note>
        <pitch><step>C</step><octave>4</octave></pitch>
        <duration>96</duration>
        <type>quarter</type>
      </note>
    </measure>
  </part>
</score-partwise>"#;

/// Build a service config rooted in a fresh temp data folder
pub fn test_config(data_dir: &Path, omr_binary: &str) -> ServiceConfig {
    let dirs = ServiceDirs::new(data_dir);
    dirs.ensure_exist().expect("test data folder");
    ServiceConfig {
        dirs,
        bind_address: "127.0.0.1:0".to_string(),
        omr: OmrConfig {
            binary: omr_binary.to_string(),
            timeout: Duration::from_secs(30),
            kill_grace: Duration::from_millis(200),
        },
        normalize: NormalizeConfig::default(),
        limits: UploadLimits::default(),
        confidence: ConfidenceWeights::default(),
        temp_cleanup_delay: Duration::from_secs(30),
        archive_retention: Duration::from_secs(60 * 60),
        sweep_interval: Duration::from_secs(60 * 60),
        sweep_max_age: Duration::from_secs(24 * 60 * 60),
        shared_secret: None,
        production: false,
    }
}

/// Create an AppState (and keep the temp dir alive) for router tests
pub fn test_state(omr_binary: &str) -> (TempDir, AppState) {
    let root = tempfile::tempdir().expect("temp dir");
    let config = test_config(&root.path().join("data"), omr_binary);
    (root, AppState::new(Arc::new(config)))
}

/// Write an executable fake OMR engine script
#[cfg(unix)]
pub fn write_fake_omr(dir: &Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-oemer");
    let script = format!("#!/bin/sh\n{}\n", body);
    std::fs::write(&path, script).expect("write fake engine");
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A fake engine that emits `xml` at the requested output path
#[cfg(unix)]
pub fn fake_omr_writing(dir: &Path, xml: &str) -> std::path::PathBuf {
    let fixture = dir.join("fixture.musicxml");
    std::fs::write(&fixture, xml).expect("write fixture");
    write_fake_omr(
        dir,
        &format!("cat '{}' > \"$3\"", fixture.display()),
    )
}

/// Multipart body with one `images` part per (name, content_type, bytes)
/// plus an optional output_format field
pub fn multipart_body(
    boundary: &str,
    files: &[(&str, &str, &[u8])],
    output_format: Option<&str>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, content_type, bytes) in files {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"images\"; filename=\"{}\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(format) = output_format {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"output_format\"\r\n\r\n",
        );
        body.extend_from_slice(format.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

//! Download archive construction
//!
//! Builds the per-job zip: one `<basename>.xml` per successful file (XML
//! text extracted from MXL containers, preferring in-memory content over
//! raw container bytes), the `<basename>.mid` rendition where one was
//! produced, and a `conversion_report.json` summary. Packaging failure is
//! fatal to the whole job.

use crate::models::job::{ConversionReport, FileResult};
use crate::services::musicxml;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive construction errors
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("failed to create archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to serialize conversion report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Build the download archive for a finished batch
pub fn build_archive(results: &[FileResult], archive_path: &Path) -> Result<(), PackagingError> {
    let file = std::fs::File::create(archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    for result in results {
        if !result.success {
            continue;
        }
        let base = entry_basename(&result.original_name);

        if let Some(xml_path) = result.music_xml_path.as_deref() {
            if xml_path.exists() {
                add_musicxml_entry(&mut writer, options, &base, xml_path)?;
            }
        }

        if let Some(midi_path) = result.midi_path.as_deref() {
            if midi_path.exists() {
                writer.start_file(format!("{}.mid", base), options)?;
                writer.write_all(&std::fs::read(midi_path)?)?;
            }
        }
    }

    let report = ConversionReport::new(results);
    writer.start_file("conversion_report.json", options)?;
    writer.write_all(&serde_json::to_vec_pretty(&report)?)?;

    let file = writer.finish()?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    info!(
        archive = %archive_path.display(),
        bytes = size,
        "Download package created"
    );
    Ok(())
}

/// Add the XML for one file, extracting container content when needed
///
/// A container whose content cannot be extracted is added raw under the
/// `.mxl` name instead of failing the archive.
fn add_musicxml_entry(
    writer: &mut ZipWriter<std::fs::File>,
    options: SimpleFileOptions,
    base: &str,
    xml_path: &Path,
) -> Result<(), PackagingError> {
    match musicxml::read_musicxml_text(xml_path) {
        Ok(text) => {
            writer.start_file(format!("{}.xml", base), options)?;
            writer.write_all(text.as_bytes())?;
        }
        Err(err) => {
            warn!(
                source = %xml_path.display(),
                error = %err,
                "Could not extract XML text, adding raw artifact"
            );
            let extension = if musicxml::is_compressed_container(xml_path) {
                "mxl"
            } else {
                "xml"
            };
            writer.start_file(format!("{}.{}", base, extension), options)?;
            writer.write_all(&std::fs::read(xml_path)?)?;
        }
    }
    Ok(())
}

/// Archive entry base name from the uploaded filename
///
/// Strips any directory components and squashes characters that could not
/// travel in a zip entry name.
fn entry_basename(original_name: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.chars().take(255).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::DetectedElements;
    use std::io::Read;
    use uuid::Uuid;

    fn success_result(name: &str, xml: Option<&Path>, midi: Option<&Path>) -> FileResult {
        FileResult {
            original_name: name.to_string(),
            file_id: Uuid::new_v4(),
            success: true,
            music_xml_path: xml.map(Path::to_path_buf),
            midi_path: midi.map(Path::to_path_buf),
            confidence: 0.9,
            detected_elements: DetectedElements {
                measures: 1,
                notes: 1,
                ..DetectedElements::default()
            },
            error: None,
        }
    }

    fn archive_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn archive_contains_outputs_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let xml_a = dir.path().join("a_out.xml");
        let midi_a = dir.path().join("a_out.mid");
        std::fs::write(&xml_a, "<score-partwise/>").unwrap();
        std::fs::write(&midi_a, [0x4D, 0x54, 0x68, 0x64]).unwrap();

        let results = vec![
            success_result("sonata.png", Some(&xml_a), Some(&midi_a)),
            FileResult::failure("broken.png".into(), Uuid::new_v4(), "OMR failed".into()),
        ];

        let archive_path = dir.path().join("job.zip");
        build_archive(&results, &archive_path).unwrap();

        let names = archive_names(&archive_path);
        assert!(names.contains(&"sonata.xml".to_string()));
        assert!(names.contains(&"sonata.mid".to_string()));
        assert!(names.contains(&"conversion_report.json".to_string()));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn report_lists_all_files_including_failures() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            FileResult::failure("x.png".into(), Uuid::new_v4(), "timeout".into()),
            FileResult::failure("y.png".into(), Uuid::new_v4(), "exit 1".into()),
        ];
        let archive_path = dir.path().join("job.zip");
        build_archive(&results, &archive_path).unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
        let mut entry = archive.by_name("conversion_report.json").unwrap();
        let mut json = String::new();
        entry.read_to_string(&mut json).unwrap();

        let report: ConversionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.total_files, 2);
        assert_eq!(report.successful_conversions, 0);
        assert_eq!(report.failed_conversions, 2);
        assert_eq!(report.results.len(), 2);
    }

    #[test]
    fn container_content_is_extracted_into_plain_xml_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mxl = dir.path().join("score.mxl");
        {
            let file = std::fs::File::create(&mxl).unwrap();
            let mut writer = ZipWriter::new(file);
            let options = SimpleFileOptions::default();
            writer.start_file("score.xml", options).unwrap();
            writer.write_all(b"<score-partwise/>").unwrap();
            writer.finish().unwrap();
        }

        let results = vec![success_result("etude.jpeg", Some(&mxl), None)];
        let archive_path = dir.path().join("job.zip");
        build_archive(&results, &archive_path).unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
        let mut entry = archive.by_name("etude.xml").unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<score-partwise/>");
    }

    #[test]
    fn entry_basename_sanitizes_hostile_names() {
        assert_eq!(entry_basename("../../etc/passwd"), "passwd");
        assert_eq!(entry_basename("my score (1).png"), "my_score__1_");
        assert_eq!(entry_basename(""), "file");
        assert_eq!(entry_basename("..."), "file");
    }
}

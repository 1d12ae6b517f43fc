//! MusicXML loading and parsing
//!
//! Loads a MusicXML document from a plain `.xml`/`.musicxml` file or from
//! an MXL compressed container (a zip whose first non-directory `.xml`
//! entry is the score), and normalizes it into the ordered [`ParsedScore`]
//! shape. The parser is strict about document well-formedness and lenient
//! about content: a well-formed document without a `score-partwise` root
//! parses to an empty score.

use crate::models::score::{
    AttributesBlock, Measure, Note, ParsedScore, Part, Pitch, Rest, ScoreEntry, Step,
};
use roxmltree::Node;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors loading or parsing a MusicXML artifact
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Failed to read the artifact from disk
    #[error("failed to read MusicXML file: {0}")]
    Io(#[from] std::io::Error),

    /// The MXL container could not be opened
    #[error("failed to open compressed container: {0}")]
    Container(#[from] zip::result::ZipError),

    /// The MXL container holds no XML entry
    #[error("no XML entry found in compressed container")]
    MissingXmlEntry,

    /// The document is empty or whitespace-only
    #[error("MusicXML document is empty")]
    EmptyDocument,

    /// The document is not well-formed XML
    #[error("malformed MusicXML: {0}")]
    Parse(#[from] roxmltree::Error),
}

impl ScoreError {
    /// Empty or unparsable XML fails the file; container/IO trouble
    /// degrades to the default analysis instead.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoreError::EmptyDocument | ScoreError::Parse(_))
    }
}

/// Load a score from a MusicXML file or MXL container
pub fn load_score(path: &Path) -> Result<ParsedScore, ScoreError> {
    let xml = read_musicxml_text(path)?;
    parse_musicxml(&xml)
}

/// Read the raw XML text of an artifact, extracting from MXL if needed
pub fn read_musicxml_text(path: &Path) -> Result<String, ScoreError> {
    if is_compressed_container(path) {
        extract_xml_from_container(path)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Whether the artifact is an MXL compressed container
pub fn is_compressed_container(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mxl"))
}

/// Extract the first non-directory XML entry from an MXL container
fn extract_xml_from_container(path: &Path) -> Result<String, ScoreError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.ends_with(".xml") || name.ends_with(".musicxml") {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            debug!(entry = %name, chars = content.len(), "Extracted MusicXML from container");
            return Ok(content);
        }
    }

    Err(ScoreError::MissingXmlEntry)
}

/// Parse MusicXML text into the ordered score representation
pub fn parse_musicxml(xml: &str) -> Result<ParsedScore, ScoreError> {
    if xml.trim().is_empty() {
        return Err(ScoreError::EmptyDocument);
    }

    let document = roxmltree::Document::parse(xml)?;
    let root = document.root_element();
    if root.tag_name().name() != "score-partwise" {
        // Well-formed but not a partwise score; nothing to count or encode
        return Ok(ParsedScore::default());
    }

    let parts = root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "part")
        .map(parse_part)
        .collect();

    Ok(ParsedScore { parts })
}

fn parse_part(part: Node) -> Part {
    let measures = part
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "measure")
        .map(parse_measure)
        .collect();
    Part { measures }
}

fn parse_measure(measure: Node) -> Measure {
    let mut entries = Vec::new();
    let mut attributes = Vec::new();

    for child in measure.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "note" => entries.push(parse_note(child)),
            "attributes" => attributes.push(AttributesBlock {
                clef: child_element(child, "clef").is_some(),
                time_signature: child_element(child, "time").is_some(),
                key_signature: child_element(child, "key").is_some(),
            }),
            // backup, forward, direction, barline... carry no entries
            _ => {}
        }
    }

    Measure {
        entries,
        attributes,
    }
}

fn parse_note(note: Node) -> ScoreEntry {
    let duration = child_text(note, "duration").and_then(|t| t.trim().parse::<u32>().ok());

    if child_element(note, "rest").is_some() {
        return ScoreEntry::Rest(Rest { duration });
    }

    let pitch = child_element(note, "pitch").map(|pitch_node| Pitch {
        step: child_text(pitch_node, "step")
            .map(|t| Step::from_letter(&t))
            .unwrap_or(Step::C),
        octave: child_text(pitch_node, "octave")
            .and_then(|t| t.trim().parse::<i32>().ok())
            .unwrap_or(4),
        alter: child_text(pitch_node, "alter")
            .and_then(|t| t.trim().parse::<i32>().ok())
            .unwrap_or(0),
    });

    ScoreEntry::Note(Note {
        pitch,
        duration,
        chord: child_element(note, "chord").is_some(),
    })
}

fn child_element<'a>(node: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: Node, name: &str) -> Option<String> {
    child_element(node, name).and_then(|n| n.text().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ONE_NOTE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
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

    #[test]
    fn parses_single_note_document() {
        let score = parse_musicxml(ONE_NOTE).unwrap();
        assert_eq!(score.parts.len(), 1);
        assert_eq!(score.parts[0].measures.len(), 1);

        let measure = &score.parts[0].measures[0];
        assert_eq!(measure.entries.len(), 1);
        assert_eq!(measure.attributes.len(), 1);
        assert!(measure.attributes[0].clef);
        assert!(measure.attributes[0].time_signature);
        assert!(measure.attributes[0].key_signature);

        match &measure.entries[0] {
            ScoreEntry::Note(note) => {
                let pitch = note.pitch.expect("pitched note");
                assert_eq!(pitch.midi_note(), 60);
                assert_eq!(note.duration, Some(96));
                assert!(!note.chord);
            }
            other => panic!("expected note, got {:?}", other),
        }
    }

    #[test]
    fn rest_and_chord_markers_are_typed() {
        let xml = r#"<score-partwise><part id="P1"><measure number="1">
            <note><rest/><duration>48</duration></note>
            <note><pitch><step>E</step><octave>5</octave><alter>-1</alter></pitch><duration>24</duration></note>
            <note><chord/><pitch><step>G</step><octave>5</octave></pitch><duration>24</duration></note>
        </measure></part></score-partwise>"#;
        let score = parse_musicxml(xml).unwrap();
        let entries = &score.parts[0].measures[0].entries;
        assert!(matches!(
            entries[0],
            ScoreEntry::Rest(Rest {
                duration: Some(48)
            })
        ));
        match &entries[1] {
            ScoreEntry::Note(n) => {
                assert_eq!(n.pitch.unwrap().alter, -1);
                assert!(!n.chord);
            }
            other => panic!("expected note, got {:?}", other),
        }
        match &entries[2] {
            ScoreEntry::Note(n) => assert!(n.chord),
            other => panic!("expected chord note, got {:?}", other),
        }
    }

    #[test]
    fn empty_document_is_fatal() {
        let err = parse_musicxml("   \n ").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ScoreError::EmptyDocument));
    }

    #[test]
    fn malformed_document_is_fatal() {
        let err = parse_musicxml("<score-partwise><part>").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ScoreError::Parse(_)));
    }

    #[test]
    fn non_score_document_parses_to_empty_score() {
        let score = parse_musicxml("<something-else/>").unwrap();
        assert!(score.is_empty());
    }

    #[test]
    fn invalid_duration_becomes_none() {
        let xml = r#"<score-partwise><part><measure>
            <note><pitch><step>C</step><octave>4</octave></pitch><duration>abc</duration></note>
        </measure></part></score-partwise>"#;
        let score = parse_musicxml(xml).unwrap();
        match &score.parts[0].measures[0].entries[0] {
            ScoreEntry::Note(n) => assert_eq!(n.duration, None),
            other => panic!("expected note, got {:?}", other),
        }
    }

    #[test]
    fn extracts_xml_from_mxl_container() {
        let dir = tempfile::tempdir().unwrap();
        let mxl_path = dir.path().join("score.mxl");

        let file = std::fs::File::create(&mxl_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("META-INF", options).unwrap();
        writer.start_file("score.xml", options).unwrap();
        writer.write_all(ONE_NOTE.as_bytes()).unwrap();
        writer.finish().unwrap();

        let text = read_musicxml_text(&mxl_path).unwrap();
        assert_eq!(text, ONE_NOTE);

        let score = load_score(&mxl_path).unwrap();
        assert_eq!(score.parts.len(), 1);
    }

    #[test]
    fn container_without_xml_entry_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mxl_path = dir.path().join("empty.mxl");

        let file = std::fs::File::create(&mxl_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("readme.txt", options).unwrap();
        writer.write_all(b"nothing here").unwrap();
        writer.finish().unwrap();

        let err = load_score(&mxl_path).unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err, ScoreError::MissingXmlEntry));
    }

    #[test]
    fn loading_twice_yields_identical_structure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("score.xml");
        std::fs::write(&path, ONE_NOTE).unwrap();

        let first = load_score(&path).unwrap();
        let second = load_score(&path).unwrap();
        assert_eq!(first.parts.len(), second.parts.len());
        assert_eq!(
            first.parts[0].measures[0].entries.len(),
            second.parts[0].measures[0].entries.len()
        );
    }
}

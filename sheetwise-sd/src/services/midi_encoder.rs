//! MusicXML-to-MIDI encoding
//!
//! Emits a minimal single-track, format 0 MIDI byte stream from a parsed
//! score: note-on/note-off pairs with variable-length delta times, a fixed
//! 96-ticks-per-quarter division, and a trailing end-of-track marker. The
//! track chunk length is patched to the exact encoded byte count.
//!
//! Time accumulates across the traversal: rest durations advance the delta
//! of the next note-on, and chord-marked notes start on the same tick as
//! their anchor note. Every note-on is paired with a note-off before the
//! end-of-track marker.
//!
//! The encoder is lenient: a score with no encodable notes produces a track
//! containing only the end marker.

use crate::models::score::{Note, ParsedScore, ScoreEntry};
use std::path::Path;

/// Ticks per quarter note written into the header chunk
pub const DIVISION: u16 = 96;

/// Duration assumed when a note carries none (one quarter note)
const DEFAULT_DURATION: u32 = 96;

/// Fixed note-on velocity
const NOTE_ON_VELOCITY: u8 = 100;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// Encode a parsed score as a complete MIDI file byte stream
pub fn encode_score(score: &ParsedScore) -> Vec<u8> {
    let track = encode_track_events(score);

    let mut bytes = Vec::with_capacity(14 + 8 + track.len());

    // Header chunk: format 0, one track, 96 ticks per quarter note
    bytes.extend_from_slice(b"MThd");
    bytes.extend_from_slice(&6u32.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&DIVISION.to_be_bytes());

    // Track chunk with exact byte length
    bytes.extend_from_slice(b"MTrk");
    bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&track);

    bytes
}

/// Encode a score and write it to `path`
pub fn encode_to_file(score: &ParsedScore, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, encode_score(score))
}

/// Encode the track body: timed events plus the end-of-track meta event
fn encode_track_events(score: &ParsedScore) -> Vec<u8> {
    let mut track = Vec::new();
    // Ticks elapsed since the last emitted event (rests accumulate here)
    let mut pending_delta: u32 = 0;

    for part in &score.parts {
        for measure in &part.measures {
            let entries = &measure.entries;
            let mut idx = 0;
            while idx < entries.len() {
                match &entries[idx] {
                    ScoreEntry::Rest(rest) => {
                        pending_delta += duration_or_default(rest.duration);
                        idx += 1;
                    }
                    ScoreEntry::Note(anchor) => {
                        // Collect the chord group anchored at this note:
                        // immediately following chord-marked notes sound
                        // on the same tick.
                        let mut group: Vec<&Note> = vec![anchor];
                        let mut next = idx + 1;
                        while let Some(ScoreEntry::Note(note)) = entries.get(next) {
                            if !note.chord {
                                break;
                            }
                            group.push(note);
                            next += 1;
                        }

                        pending_delta = emit_group(&mut track, &group, pending_delta);
                        idx = next;
                    }
                }
            }
        }
    }

    // End-of-track meta event
    track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    track
}

/// Emit note-on/note-off pairs for one chord group; returns the delta
/// carried over to the next event (0 after any event was emitted)
fn emit_group(track: &mut Vec<u8>, group: &[&Note], pending_delta: u32) -> u32 {
    let pitched: Vec<u8> = group
        .iter()
        .filter_map(|note| note.pitch.map(|p| p.midi_note()))
        .collect();
    if pitched.is_empty() {
        // Nothing encodable; keep the accumulated delta for the next note
        return pending_delta;
    }

    // The anchor's duration governs the whole group
    let duration = duration_or_default(group[0].duration);

    for (i, &key) in pitched.iter().enumerate() {
        let delta = if i == 0 { pending_delta } else { 0 };
        write_vlq(track, delta);
        track.push(NOTE_ON);
        track.push(key);
        track.push(NOTE_ON_VELOCITY);
    }
    for (i, &key) in pitched.iter().enumerate() {
        let delta = if i == 0 { duration } else { 0 };
        write_vlq(track, delta);
        track.push(NOTE_OFF);
        track.push(key);
        track.push(0x00);
    }

    0
}

/// Effective duration: default quarter note when absent, minimum of 1 tick
fn duration_or_default(duration: Option<u32>) -> u32 {
    match duration {
        Some(d) => d.max(1),
        None => DEFAULT_DURATION,
    }
}

/// Append `value` as a MIDI variable-length quantity
///
/// Seven bits per byte, most significant group first, continuation bit set
/// on all but the final byte.
pub fn write_vlq(buf: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & 0x7F) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let byte = if i == 0 { groups[i] } else { groups[i] | 0x80 };
        buf.push(byte);
    }
}

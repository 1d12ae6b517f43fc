//! Recognized-score analysis
//!
//! Counts the structural elements of a parsed score and derives a heuristic
//! confidence value. The weights are rough, tunable quality signals rather
//! than correctness properties, so they live in a config-overridable struct
//! instead of hard constants.

use crate::models::job::DetectedElements;
use crate::models::score::{ParsedScore, ScoreEntry};
use serde::Deserialize;

/// Confidence heuristic weights
///
/// Base value plus one bonus per element class found, clamped to 1.0.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub base: f64,
    pub notes: f64,
    pub measures: f64,
    pub clefs: f64,
    pub time_signatures: f64,
    pub key_signatures: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            base: 0.6,
            notes: 0.2,
            measures: 0.1,
            clefs: 0.05,
            time_signatures: 0.03,
            key_signatures: 0.02,
        }
    }
}

/// Analysis outcome: confidence plus element counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreAnalysis {
    pub confidence: f64,
    pub elements: DetectedElements,
}

/// Count elements in document order and score confidence
///
/// Pure over the parsed score: analyzing the same document twice yields
/// identical counts and confidence.
pub fn analyze(score: &ParsedScore, weights: &ConfidenceWeights) -> ScoreAnalysis {
    let mut elements = DetectedElements::default();

    for part in &score.parts {
        for measure in &part.measures {
            elements.measures += 1;

            for entry in &measure.entries {
                match entry {
                    ScoreEntry::Note(_) => elements.notes += 1,
                    ScoreEntry::Rest(_) => elements.rests += 1,
                }
            }

            for block in &measure.attributes {
                if block.clef {
                    elements.clefs += 1;
                }
                if block.time_signature {
                    elements.time_signatures += 1;
                }
                if block.key_signature {
                    elements.key_signatures += 1;
                }
            }
        }
    }

    let mut confidence = weights.base;
    if elements.notes > 0 {
        confidence += weights.notes;
    }
    if elements.measures > 0 {
        confidence += weights.measures;
    }
    if elements.clefs > 0 {
        confidence += weights.clefs;
    }
    if elements.time_signatures > 0 {
        confidence += weights.time_signatures;
    }
    if elements.key_signatures > 0 {
        confidence += weights.key_signatures;
    }

    ScoreAnalysis {
        confidence: confidence.min(1.0),
        elements,
    }
}

/// Fixed default analysis used when a produced artifact cannot be analyzed
/// for reasons other than empty/malformed XML
pub fn fallback_analysis(weights: &ConfidenceWeights) -> ScoreAnalysis {
    ScoreAnalysis {
        confidence: weights.base,
        elements: DetectedElements {
            measures: 1,
            notes: 0,
            rests: 0,
            clefs: 1,
            time_signatures: 1,
            key_signatures: 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::score::{AttributesBlock, Measure, Note, Part, Pitch, Rest, Step};
    use crate::services::musicxml::parse_musicxml;

    fn full_measure() -> Measure {
        Measure {
            entries: vec![
                ScoreEntry::Note(Note {
                    pitch: Some(Pitch {
                        step: Step::C,
                        octave: 4,
                        alter: 0,
                    }),
                    duration: Some(96),
                    chord: false,
                }),
                ScoreEntry::Rest(Rest { duration: Some(96) }),
            ],
            attributes: vec![AttributesBlock {
                clef: true,
                time_signature: true,
                key_signature: true,
            }],
        }
    }

    #[test]
    fn zero_element_score_gets_base_confidence_only() {
        let analysis = analyze(&ParsedScore::default(), &ConfidenceWeights::default());
        assert_eq!(analysis.confidence, 0.6);
        assert_eq!(analysis.elements, DetectedElements::default());
    }

    #[test]
    fn all_bonuses_sum_and_clamp() {
        let score = ParsedScore {
            parts: vec![Part {
                measures: vec![full_measure()],
            }],
        };
        let analysis = analyze(&score, &ConfidenceWeights::default());
        // 0.6 + 0.2 + 0.1 + 0.05 + 0.03 + 0.02 = 1.0
        assert!((analysis.confidence - 1.0).abs() < 1e-9);
        assert_eq!(analysis.elements.measures, 1);
        assert_eq!(analysis.elements.notes, 1);
        assert_eq!(analysis.elements.rests, 1);
        assert_eq!(analysis.elements.clefs, 1);
        assert_eq!(analysis.elements.time_signatures, 1);
        assert_eq!(analysis.elements.key_signatures, 1);
    }

    #[test]
    fn confidence_never_exceeds_one() {
        let weights = ConfidenceWeights {
            base: 0.9,
            notes: 0.5,
            ..ConfidenceWeights::default()
        };
        let score = ParsedScore {
            parts: vec![Part {
                measures: vec![full_measure()],
            }],
        };
        assert_eq!(analyze(&score, &weights).confidence, 1.0);
    }

    #[test]
    fn measures_without_notes_earn_only_the_measure_bonus() {
        let score = ParsedScore {
            parts: vec![Part {
                measures: vec![Measure::default(), Measure::default()],
            }],
        };
        let analysis = analyze(&score, &ConfidenceWeights::default());
        assert!((analysis.confidence - 0.7).abs() < 1e-9);
        assert_eq!(analysis.elements.measures, 2);
        assert_eq!(analysis.elements.notes, 0);
    }

    #[test]
    fn analysis_is_idempotent() {
        let xml = r#"<score-partwise><part><measure>
            <attributes><clef><sign>G</sign></clef></attributes>
            <note><pitch><step>G</step><octave>4</octave></pitch><duration>48</duration></note>
            <note><rest/><duration>48</duration></note>
        </measure></part></score-partwise>"#;
        let score = parse_musicxml(xml).unwrap();
        let weights = ConfidenceWeights::default();

        let first = analyze(&score, &weights);
        let second = analyze(&score, &weights);
        assert_eq!(first.elements, second.elements);
        assert_eq!(first.confidence, second.confidence);
    }

    #[test]
    fn fallback_values() {
        let analysis = fallback_analysis(&ConfidenceWeights::default());
        assert_eq!(analysis.confidence, 0.6);
        assert_eq!(analysis.elements.measures, 1);
        assert_eq!(analysis.elements.notes, 0);
        assert_eq!(analysis.elements.rests, 0);
        assert_eq!(analysis.elements.clefs, 1);
        assert_eq!(analysis.elements.time_signatures, 1);
        assert_eq!(analysis.elements.key_signatures, 1);
    }
}

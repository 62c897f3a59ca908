//! The structured critique the oracle must return, and the strict parser for it.
//!
//! Anything that does not match the schema is rejected with
//! [`CritiqueError::Malformed`]; nothing is defaulted to zero scores.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::CritiqueError;

//=========================================================================================
// Schema Types
//=========================================================================================

/// A 0-100 score. Fractional values are rounded; anything outside the range is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub fn new(value: u8) -> Option<Self> {
        (value <= 100).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<f64> for Score {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self(value.round() as u8))
        } else {
            Err(format!("score {} is outside 0-100", value))
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub correction: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceCritique {
    pub index: u32,
    pub original: String,
    pub grammar_score: Score,
    pub semantic_score: Score,
    pub collocation_score: Score,
    pub overall_quality: Score,
    #[serde(default)]
    pub issues: Vec<SentenceIssue>,
    #[serde(default)]
    pub improvement_suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssayIssue {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssayCritique {
    pub structure_score: Score,
    pub coherence_score: Score,
    pub transition_score: Score,
    pub topic_consistency_score: Score,
    pub logic_score: Score,
    #[serde(default)]
    pub structure_feedback: String,
    #[serde(default)]
    pub coherence_feedback: String,
    #[serde(default)]
    pub transition_feedback: String,
    #[serde(default)]
    pub essay_issues: Vec<EssayIssue>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
}

impl EssayCritique {
    /// Mean of structure, coherence, transition and logic.
    pub fn quality(&self) -> f64 {
        let scores = [
            self.structure_score,
            self.coherence_score,
            self.transition_score,
            self.logic_score,
        ];
        scores.iter().map(|s| s.get() as f64).sum::<f64>() / scores.len() as f64
    }
}

/// Version 1 of the oracle's response document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueReport {
    pub sentence_analysis: Vec<SentenceCritique>,
    #[serde(default)]
    pub essay_analysis: Option<EssayCritique>,
    #[serde(default)]
    pub overall_coherence: Option<Score>,
}

impl CritiqueReport {
    /// Mean per-sentence overall quality, or `None` without sentence entries.
    pub fn sentence_quality(&self) -> Option<f64> {
        mean(self.sentence_analysis.iter().map(|s| s.overall_quality))
    }
}

pub(crate) fn mean(scores: impl Iterator<Item = Score>) -> Option<f64> {
    let (sum, count) = scores.fold((0.0, 0usize), |(sum, count), s| {
        (sum + s.get() as f64, count + 1)
    });
    (count > 0).then(|| sum / count as f64)
}

//=========================================================================================
// Extraction and Parsing
//=========================================================================================

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid regex"));
static FENCED_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("valid regex"));
static BARE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Pulls the JSON document out of a model reply, tolerating code fences and
/// surrounding prose.
pub fn extract_json(text: &str) -> &str {
    if let Some(inner) = FENCED_JSON.captures(text).and_then(|c| c.get(1)) {
        return inner.as_str();
    }
    if let Some(inner) = FENCED_ANY.captures(text).and_then(|c| c.get(1)) {
        return inner.as_str();
    }
    if let Some(object) = BARE_OBJECT.find(text) {
        return object.as_str();
    }
    text
}

/// Parses and validates a raw oracle reply.
pub fn parse_report(raw: &str) -> Result<CritiqueReport, CritiqueError> {
    let report: CritiqueReport = serde_json::from_str(extract_json(raw))
        .map_err(|e| CritiqueError::Malformed(e.to_string()))?;

    if report.sentence_analysis.is_empty() {
        return Err(CritiqueError::Malformed(
            "response contained no sentence entries".to_string(),
        ));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "sentence_analysis": [
            {
                "index": 1,
                "original": "我很喜欢学习中文",
                "grammar_score": 90,
                "semantic_score": 85.4,
                "collocation_score": 80,
                "overall_quality": 85,
                "issues": [
                    {"type": "Word order", "description": "Adverb placement", "correction": "我非常喜欢", "severity": "minor"}
                ],
                "improvement_suggestion": "Try a stronger adverb"
            }
        ],
        "essay_analysis": {
            "structure_score": 80,
            "coherence_score": 70,
            "transition_score": 60,
            "topic_consistency_score": 90,
            "logic_score": 90,
            "essay_issues": [],
            "strengths": ["Clear topic"]
        },
        "overall_coherence": 82
    }"#;

    #[test]
    fn parses_a_complete_report() {
        let report = parse_report(VALID).expect("valid report");
        assert_eq!(report.sentence_analysis.len(), 1);
        let sentence = &report.sentence_analysis[0];
        assert_eq!(sentence.semantic_score.get(), 85);
        assert_eq!(sentence.issues[0].severity, Severity::Minor);
        let essay = report.essay_analysis.expect("essay section");
        assert_eq!(essay.quality(), 75.0);
        assert_eq!(essay.structure_feedback, "");
    }

    #[test]
    fn extracts_json_from_fenced_blocks_and_prose() {
        let fenced = format!("Here you go:\n```json\n{}\n```\nThanks", VALID);
        assert!(parse_report(&fenced).is_ok());

        let plain_fence = format!("```\n{}\n```", VALID);
        assert!(parse_report(&plain_fence).is_ok());

        let prose = format!("Analysis follows. {} Hope it helps.", VALID);
        assert!(parse_report(&prose).is_ok());
    }

    #[test]
    fn rejects_non_json_replies() {
        let err = parse_report("I'm sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, CritiqueError::Malformed(_)));
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let broken = VALID.replace("\"grammar_score\": 90", "\"grammar_score\": 140");
        assert!(matches!(parse_report(&broken), Err(CritiqueError::Malformed(_))));
    }

    #[test]
    fn rejects_missing_required_dimension() {
        let broken = VALID.replace("\"logic_score\": 90", "\"logic\": 90");
        assert!(matches!(parse_report(&broken), Err(CritiqueError::Malformed(_))));
    }

    #[test]
    fn rejects_unknown_severity() {
        let broken = VALID.replace("\"severity\": \"minor\"", "\"severity\": \"minor|major\"");
        assert!(parse_report(&broken).is_err());
    }

    #[test]
    fn rejects_reports_without_sentences() {
        let err = parse_report(r#"{"sentence_analysis": []}"#).unwrap_err();
        assert!(matches!(err, CritiqueError::Malformed(_)));
    }

    #[test]
    fn essay_section_is_optional() {
        let report = parse_report(
            r#"{"sentence_analysis": [{"index": 1, "original": "好", "grammar_score": 50,
                "semantic_score": 50, "collocation_score": 50, "overall_quality": 40}]}"#,
        )
        .expect("valid");
        assert!(report.essay_analysis.is_none());
        assert_eq!(report.sentence_quality(), Some(40.0));
    }

    #[test]
    fn severity_orders_critical_highest() {
        assert!(Severity::Critical > Severity::Major);
        assert!(Severity::Major > Severity::Minor);
    }
}

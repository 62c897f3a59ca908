//! crates/writing_coach_core/src/scoring.rs
//!
//! Merges the vocabulary report and the critique outcome into one weighted
//! overall score, a per-dimension breakdown, and the final recommendation list.

use serde::Serialize;

use crate::critique::report::mean;
use crate::critique::{CritiqueOutcome, EssayCritique};
use crate::domain::TargetLevel;
use crate::vocabulary::VocabularyReport;

const VOCABULARY_WEIGHT: f64 = 0.4;
const SENTENCE_WEIGHT: f64 = 0.3;
const ESSAY_WEIGHT: f64 = 0.3;
/// Sentence weight when no essay-level data exists.
const SENTENCE_ONLY_WEIGHT: f64 = 0.6;

const LOW_DIVERSITY_TTR: f64 = 0.5;
const LOW_ADVANCED_RATIO: f64 = 0.1;
const ADVANCED_TARGET_LEVEL: u8 = 4;

/// Individual dimension scores. `None` means the dimension was not assessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub grammar: Option<u8>,
    pub semantics: Option<u8>,
    pub collocation: Option<u8>,
    pub structure: Option<u8>,
    pub coherence: Option<u8>,
    pub transition: Option<u8>,
    pub topic_consistency: Option<u8>,
    pub logic: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub overall: u8,
    pub vocabulary: u8,
    pub sentence_quality: u8,
    /// `None` when the critique carried no essay-level section.
    pub essay_quality: Option<u8>,
    pub breakdown: ScoreBreakdown,
}

pub fn aggregate(vocabulary: &VocabularyReport, critique: &CritiqueOutcome) -> ScoreCard {
    let vocabulary_score = vocabulary.richness_score as f64;
    let sentence_score = critique.quality_score as f64;
    let essay = critique
        .report
        .as_ref()
        .and_then(|r| r.essay_analysis.as_ref());

    let (overall, essay_quality) = match essay {
        Some(essay) => {
            let essay_score = essay.quality();
            let overall = vocabulary_score * VOCABULARY_WEIGHT
                + sentence_score * SENTENCE_WEIGHT
                + essay_score * ESSAY_WEIGHT;
            (overall, Some(essay_score as u8))
        }
        None => (
            vocabulary_score * VOCABULARY_WEIGHT + sentence_score * SENTENCE_ONLY_WEIGHT,
            None,
        ),
    };

    ScoreCard {
        overall: overall.min(100.0) as u8,
        vocabulary: vocabulary.richness_score,
        sentence_quality: critique.quality_score,
        essay_quality,
        breakdown: breakdown(critique, essay),
    }
}

fn breakdown(critique: &CritiqueOutcome, essay: Option<&EssayCritique>) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown::default();

    if let Some(report) = &critique.report {
        let sentences = &report.sentence_analysis;
        let truncated = |m: Option<f64>| m.map(|v| v as u8);
        breakdown.grammar = truncated(mean(sentences.iter().map(|s| s.grammar_score)));
        breakdown.semantics = truncated(mean(sentences.iter().map(|s| s.semantic_score)));
        breakdown.collocation = truncated(mean(sentences.iter().map(|s| s.collocation_score)));
    }

    if let Some(essay) = essay {
        breakdown.structure = Some(essay.structure_score.get());
        breakdown.coherence = Some(essay.coherence_score.get());
        breakdown.transition = Some(essay.transition_score.get());
        breakdown.topic_consistency = Some(essay.topic_consistency_score.get());
        breakdown.logic = Some(essay.logic_score.get());
    }

    breakdown
}

/// Critique recommendations win; vocabulary advice is only a fallback channel.
pub fn merge_recommendations(
    critique: &CritiqueOutcome,
    vocabulary: &VocabularyReport,
    level: TargetLevel,
) -> Vec<String> {
    if !critique.recommendations.is_empty() {
        return critique.recommendations.clone();
    }

    let vocabulary_recs = vocabulary_recommendations(vocabulary, level);
    if !vocabulary_recs.is_empty() {
        return vocabulary_recs;
    }

    vec!["Excellent work! Your writing quality is strong across all dimensions.".to_string()]
}

fn vocabulary_recommendations(vocabulary: &VocabularyReport, level: TargetLevel) -> Vec<String> {
    let mut recs = Vec::new();

    if vocabulary.ttr < LOW_DIVERSITY_TTR {
        recs.push(format!(
            "Consider using more diverse vocabulary (current diversity: {:.2}). \
             Try to avoid repeating the same words.",
            vocabulary.ttr
        ));
    }

    if vocabulary.advanced_ratio < LOW_ADVANCED_RATIO && level.get() >= ADVANCED_TARGET_LEVEL {
        recs.push(format!(
            "Try incorporating more HSK {} level vocabulary (currently {:.1}% advanced words).",
            level.get(),
            vocabulary.advanced_ratio * 100.0
        ));
    }

    recs
}

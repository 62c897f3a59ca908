//! crates/writing_coach_core/src/critique/mod.rs
//!
//! The remote critique client: asks the language model for a sentence-level and
//! essay-level critique, parses the structured reply, and derives a quality score
//! and recommendations from it.

pub mod language;
pub mod prompt;
pub mod recommendations;
pub mod report;

use std::sync::Arc;

use tracing::{info, warn};

pub use language::{FeedbackLanguage, RecommendationLabels};
pub use report::{
    CritiqueReport, EssayCritique, EssayIssue, Score, SentenceCritique, SentenceIssue, Severity,
};

use crate::domain::{split_paragraphs, TargetLevel};
use crate::ports::{CritiqueService, PortError};

/// Why a critique could not be produced. Both variants mean "no score", which is
/// never reported as a zero score.
#[derive(Debug, thiserror::Error)]
pub enum CritiqueError {
    #[error("Critique provider unavailable: {0}")]
    Unavailable(String),
    #[error("Critique response malformed: {0}")]
    Malformed(String),
}

impl From<PortError> for CritiqueError {
    fn from(e: PortError) -> Self {
        CritiqueError::Unavailable(e.to_string())
    }
}

/// Everything the critique stage hands to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct CritiqueOutcome {
    pub sentence_count: usize,
    pub paragraph_count: usize,
    /// `None` when the text had no sentences and the oracle was never called.
    pub report: Option<CritiqueReport>,
    pub quality_score: u8,
    pub recommendations: Vec<String>,
    pub language: FeedbackLanguage,
}

impl CritiqueOutcome {
    fn empty(language: FeedbackLanguage) -> Self {
        Self {
            sentence_count: 0,
            paragraph_count: 0,
            report: None,
            quality_score: 0,
            recommendations: Vec::new(),
            language,
        }
    }
}

/// Half per-sentence quality, half essay-level quality, truncated.
pub fn quality_score(report: &CritiqueReport) -> u8 {
    let sentence = report.sentence_quality().unwrap_or(0.0);
    let essay = report
        .essay_analysis
        .as_ref()
        .map(EssayCritique::quality)
        .unwrap_or(0.0);
    (sentence * 0.5 + essay * 0.5) as u8
}

#[derive(Clone)]
pub struct CritiqueClient {
    oracle: Arc<dyn CritiqueService>,
}

impl CritiqueClient {
    pub fn new(oracle: Arc<dyn CritiqueService>) -> Self {
        Self { oracle }
    }

    /// Critiques `text` for a learner at `level`, writing feedback in `language_code`
    /// (English when the code is unsupported).
    pub async fn critique(
        &self,
        text: &str,
        level: TargetLevel,
        language_code: &str,
    ) -> Result<CritiqueOutcome, CritiqueError> {
        let language = FeedbackLanguage::resolve(language_code);
        let sentences = prompt::split_sentences(text);
        let paragraphs = split_paragraphs(text);

        if sentences.is_empty() {
            info!("No sentences found, skipping critique request");
            return Ok(CritiqueOutcome::empty(language));
        }

        info!(
            sentences = sentences.len(),
            paragraphs = paragraphs.len(),
            level = level.get(),
            language = language.code,
            "Requesting critique"
        );
        let request = prompt::build_prompt(text, &sentences, &paragraphs, level, language);
        let raw = self.oracle.complete(&request).await.map_err(|e| {
            warn!("Critique provider failed: {}", e);
            CritiqueError::from(e)
        })?;

        let report = report::parse_report(&raw).inspect_err(|e| {
            let preview: String = raw.chars().take(500).collect();
            warn!(error = %e, preview = %preview, "Could not parse critique response");
        })?;

        let quality_score = quality_score(&report);
        let recommendations = recommendations::recommendations(&report, language);
        info!(quality_score, "Critique complete");

        Ok(CritiqueOutcome {
            sentence_count: sentences.len(),
            paragraph_count: paragraphs.len(),
            report: Some(report),
            quality_score,
            recommendations,
            language,
        })
    }
}

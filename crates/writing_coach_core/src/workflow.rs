//! crates/writing_coach_core/src/workflow.rs
//!
//! The essay submission saga: persist the essay, score it, persist the analysis.
//! A failure anywhere after the essay is written triggers a separate compensating
//! delete of that essay.
//!
//! The essay row is committed before scoring starts, so a concurrent reader may
//! briefly see it without an analysis. If the process dies between the essay
//! commit and the compensating delete, that essay stays behind without an
//! analysis; read paths treat that as a valid state.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::critique::{CritiqueClient, CritiqueError, CritiqueOutcome};
use crate::domain::{chinese_char_count, Analysis, Essay, NewAnalysis, NewEssay, TargetLevel};
use crate::ports::{DatabaseService, PortError};
use crate::scoring::{aggregate, merge_recommendations};
use crate::vocabulary::{VocabularyReport, VocabularyScorer};

pub const MIN_CONTENT_CHARS: usize = 10;
pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_THEME_CHARS: usize = 100;
pub const MAX_LANGUAGE_CHARS: usize = 10;

//=========================================================================================
// Types
//=========================================================================================

/// Where a submission is in the saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    EssayPersisted,
    Scoring,
    AnalysisPersisted,
    ScoringFailed,
    EssayRolledBack,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::EssayPersisted => "essay_persisted",
            Stage::Scoring => "scoring",
            Stage::AnalysisPersisted => "analysis_persisted",
            Stage::ScoringFailed => "scoring_failed",
            Stage::EssayRolledBack => "essay_rolled_back",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct EssaySubmission {
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub theme: Option<String>,
    pub target_level: TargetLevel,
    /// Requested feedback language code; unsupported codes fall back to English.
    pub language: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// Rejected before anything was written.
    #[error("Invalid submission: {0}")]
    Invalid(String),
    /// The critique oracle failed or answered with something unusable. The essay
    /// has been rolled back.
    #[error("Scoring is currently unavailable: {0}")]
    ScoringUnavailable(#[from] CritiqueError),
    /// Any other failure after the essay was written. The essay has been rolled back.
    #[error("Scoring failed: {0}")]
    ScoringFailed(String),
    /// The essay itself could not be written.
    #[error("Could not store essay: {0}")]
    Persistence(PortError),
}

//=========================================================================================
// Workflow
//=========================================================================================

#[derive(Clone)]
pub struct SubmissionWorkflow {
    db: Arc<dyn DatabaseService>,
    vocabulary: Arc<VocabularyScorer>,
    critique: CritiqueClient,
}

impl SubmissionWorkflow {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        vocabulary: Arc<VocabularyScorer>,
        critique: CritiqueClient,
    ) -> Self {
        Self {
            db,
            vocabulary,
            critique,
        }
    }

    /// Runs one submission to completion, returning the stored analysis.
    pub async fn submit(&self, submission: EssaySubmission) -> Result<Analysis, SubmissionError> {
        validate(&submission)?;
        log_stage(None, Stage::Received);

        let essay = self
            .db
            .create_essay(NewEssay {
                user_id: submission.user_id,
                title: submission.title,
                content: submission.content,
                theme: submission.theme,
                target_level: submission.target_level,
            })
            .await
            .map_err(SubmissionError::Persistence)?;
        log_stage(Some(essay.id), Stage::EssayPersisted);

        log_stage(Some(essay.id), Stage::Scoring);
        let scored = AssertUnwindSafe(self.score_and_store(&essay, &submission.language))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SubmissionError::ScoringFailed(panic_message(&*panic))));

        match scored {
            Ok(analysis) => {
                log_stage(Some(essay.id), Stage::AnalysisPersisted);
                Ok(analysis)
            }
            Err(e) => {
                error!(essay_id = %essay.id, stage = %Stage::ScoringFailed, error = %e, "Scoring failed");
                self.roll_back(essay.id).await;
                Err(e)
            }
        }
    }

    async fn score_and_store(
        &self,
        essay: &Essay,
        language: &str,
    ) -> Result<Analysis, SubmissionError> {
        let vocabulary = self.vocabulary.score(&essay.content);
        info!(
            essay_id = %essay.id,
            words = vocabulary.total_words,
            richness = vocabulary.richness_score,
            "Vocabulary scored"
        );

        let critique = self
            .critique
            .critique(&essay.content, essay.target_level, language)
            .await?;

        let new_analysis = build_analysis(essay, &vocabulary, &critique)?;
        self.db
            .create_analysis(new_analysis)
            .await
            .map_err(|e| SubmissionError::ScoringFailed(format!("could not store analysis: {}", e)))
    }

    /// Compensating delete. Failure here leaves an essay without analysis, which
    /// is logged and otherwise tolerated.
    async fn roll_back(&self, essay_id: Uuid) {
        match self.db.delete_essay(essay_id).await {
            Ok(()) => log_stage(Some(essay_id), Stage::EssayRolledBack),
            Err(e) => error!(%essay_id, error = %e, "Rollback failed, essay left without analysis"),
        }
    }
}

fn log_stage(essay_id: Option<Uuid>, stage: Stage) {
    match essay_id {
        Some(essay_id) => info!(%essay_id, %stage, "Submission stage"),
        None => info!(%stage, "Submission stage"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic during scoring: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic during scoring: {}", message)
    } else {
        "panic during scoring".to_string()
    }
}

pub fn validate(submission: &EssaySubmission) -> Result<(), SubmissionError> {
    let title_len = submission.title.chars().count();
    if title_len == 0 || title_len > MAX_TITLE_CHARS {
        return Err(SubmissionError::Invalid(format!(
            "title must be between 1 and {} characters",
            MAX_TITLE_CHARS
        )));
    }
    if submission.content.chars().count() < MIN_CONTENT_CHARS {
        return Err(SubmissionError::Invalid(format!(
            "content must be at least {} characters",
            MIN_CONTENT_CHARS
        )));
    }
    if let Some(theme) = &submission.theme {
        if theme.chars().count() > MAX_THEME_CHARS {
            return Err(SubmissionError::Invalid(format!(
                "theme must be at most {} characters",
                MAX_THEME_CHARS
            )));
        }
    }
    if submission.language.chars().count() > MAX_LANGUAGE_CHARS {
        warn!(language = %submission.language, "Rejecting oversized language code");
        return Err(SubmissionError::Invalid(format!(
            "language must be at most {} characters",
            MAX_LANGUAGE_CHARS
        )));
    }
    Ok(())
}

/// Shapes the stored analysis from both scoring outputs.
fn build_analysis(
    essay: &Essay,
    vocabulary: &VocabularyReport,
    critique: &CritiqueOutcome,
) -> Result<NewAnalysis, SubmissionError> {
    let card = aggregate(vocabulary, critique);
    let recommendations = merge_recommendations(critique, vocabulary, essay.target_level);
    let dimension = |score: Option<u8>| score.map(i32::from);

    let (sentence_details, essay_details) = match &critique.report {
        Some(report) => (
            to_json(&report.sentence_analysis)?,
            match &report.essay_analysis {
                Some(essay_analysis) => to_json(essay_analysis)?,
                None => json!({}),
            },
        ),
        None => (json!([]), json!({})),
    };

    Ok(NewAnalysis {
        essay_id: essay.id,
        char_count: chinese_char_count(&essay.content) as i32,
        word_count: vocabulary.total_words as i32,
        sentence_count: critique.sentence_count as i32,
        paragraph_count: critique.paragraph_count as i32,
        unique_words: vocabulary.unique_words as i32,
        vocabulary_richness: vocabulary.ttr,
        vocabulary_score: i32::from(card.vocabulary),
        advanced_vocab_ratio: vocabulary.advanced_ratio,
        sentence_quality_score: i32::from(card.sentence_quality),
        grammar_score: dimension(card.breakdown.grammar),
        semantic_score: dimension(card.breakdown.semantics),
        collocation_score: dimension(card.breakdown.collocation),
        structure_score: dimension(card.breakdown.structure),
        coherence_score: dimension(card.breakdown.coherence),
        transition_score: dimension(card.breakdown.transition),
        topic_consistency_score: dimension(card.breakdown.topic_consistency),
        logic_score: dimension(card.breakdown.logic),
        overall_score: i32::from(card.overall),
        vocabulary_details: to_json(&vocabulary.word_details)?,
        sentence_details,
        essay_analysis: essay_details,
        hsk_distribution: to_json(&vocabulary.hsk_distribution)?,
        recommendations,
        analysis_language: critique.language.code.to_string(),
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, SubmissionError> {
    serde_json::to_value(value)
        .map_err(|e| SubmissionError::ScoringFailed(format!("could not encode details: {}", e)))
}

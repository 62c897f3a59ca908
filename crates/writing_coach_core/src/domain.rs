//! crates/writing_coach_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs are independent of any database or transport; the detail blobs
//! on `Analysis` are carried as opaque JSON documents.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

//=========================================================================================
// Proficiency Level
//=========================================================================================

/// An HSK proficiency tier, always within `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct TargetLevel(u8);

impl TargetLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&level).then_some(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for TargetLevel {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<i32> for TargetLevel {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| format!("level {} is outside 1-6", value))
    }
}

impl From<TargetLevel> for i32 {
    fn from(level: TargetLevel) -> Self {
        level.0 as i32
    }
}

/// Counts characters in the CJK unified ideograph range used for essay length.
pub fn chinese_char_count(text: &str) -> usize {
    text.chars()
        .filter(|c| ('\u{4e00}'..='\u{9fa5}').contains(c))
        .count()
}

/// Splits text into non-empty, trimmed paragraphs (one per line).
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

//=========================================================================================
// Users
//=========================================================================================

/// Represents a user - used throughout app.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub target_level: TargetLevel,
    pub preferred_language: String,
    pub dark_mode: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub hashed_password: String,
    pub target_level: TargetLevel,
    pub preferred_language: String,
}

/// Partial settings update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UserSettingsUpdate {
    pub target_level: Option<TargetLevel>,
    pub preferred_language: Option<String>,
    pub dark_mode: Option<bool>,
}

//=========================================================================================
// Essays and Analyses
//=========================================================================================

/// A submitted essay.
#[derive(Debug, Clone, PartialEq)]
pub struct Essay {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub theme: Option<String>,
    pub target_level: TargetLevel,
    pub submitted_at: DateTime<Utc>,
}

impl Essay {
    /// Derived, never persisted.
    pub fn char_count(&self) -> usize {
        chinese_char_count(&self.content)
    }
}

#[derive(Debug, Clone)]
pub struct NewEssay {
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub theme: Option<String>,
    pub target_level: TargetLevel,
}

/// Lightweight row for essay listings; the score is absent until analysed.
#[derive(Debug, Clone)]
pub struct EssaySummary {
    pub id: Uuid,
    pub title: String,
    pub theme: Option<String>,
    pub target_level: TargetLevel,
    pub submitted_at: DateTime<Utc>,
    pub char_count: usize,
    pub overall_score: Option<i32>,
}

/// The fields of an analysis row before the store assigns identity and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis {
    pub essay_id: Uuid,

    // Basic counts
    pub char_count: i32,
    pub word_count: i32,
    pub sentence_count: i32,
    pub paragraph_count: i32,

    // Vocabulary metrics
    pub unique_words: i32,
    pub vocabulary_richness: f64,
    pub vocabulary_score: i32,
    pub advanced_vocab_ratio: f64,

    // Sentence and essay dimensions; `None` means "not available", never zero.
    pub sentence_quality_score: i32,
    pub grammar_score: Option<i32>,
    pub semantic_score: Option<i32>,
    pub collocation_score: Option<i32>,
    pub structure_score: Option<i32>,
    pub coherence_score: Option<i32>,
    pub transition_score: Option<i32>,
    pub topic_consistency_score: Option<i32>,
    pub logic_score: Option<i32>,

    pub overall_score: i32,

    // Opaque detail documents returned verbatim to API consumers
    pub vocabulary_details: Value,
    pub sentence_details: Value,
    pub essay_analysis: Value,
    pub hsk_distribution: Value,
    pub recommendations: Vec<String>,

    pub analysis_language: String,
}

/// A persisted analysis; exactly one per essay.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub fields: NewAnalysis,
}

//=========================================================================================
// Drafts
//=========================================================================================

/// A user's scratch essay; unrelated to essays and analyses.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub content: Option<String>,
    pub theme: Option<String>,
    pub target_level: Option<TargetLevel>,
    pub char_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDraft {
    pub title: Option<String>,
    pub content: Option<String>,
    pub theme: Option<String>,
    pub target_level: Option<TargetLevel>,
    pub char_count: i32,
}

/// Partial draft update; only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct DraftUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub theme: Option<String>,
    pub target_level: Option<TargetLevel>,
    pub char_count: Option<i32>,
}

//=========================================================================================
// Password Reset Tokens
//=========================================================================================

/// An expiry as it came out of storage, with or without timezone information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredTimestamp {
    /// No offset recorded; interpreted as UTC.
    Naive(NaiveDateTime),
    Utc(DateTime<Utc>),
}

impl StoredTimestamp {
    pub fn to_utc(self) -> DateTime<Utc> {
        match self {
            StoredTimestamp::Naive(naive) => naive.and_utc(),
            StoredTimestamp::Utc(instant) => instant,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: StoredTimestamp,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// A token is valid while unused and strictly before its expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at.to_utc() > now
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

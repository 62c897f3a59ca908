pub mod critique;
pub mod domain;
pub mod ports;
pub mod scoring;
pub mod vocabulary;
pub mod workflow;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use critique::{CritiqueClient, CritiqueError, CritiqueOutcome, FeedbackLanguage};
pub use domain::{
    Analysis, Draft, DraftUpdate, Essay, EssaySummary, NewAnalysis, NewDraft, NewEssay, NewUser,
    PasswordResetToken, StoredTimestamp, TargetLevel, User, UserCredentials, UserSettingsUpdate,
};
pub use ports::{CritiquePrompt, CritiqueService, DatabaseService, PortError, PortResult};
pub use scoring::{ScoreBreakdown, ScoreCard};
pub use vocabulary::{HskDictionary, VocabularyReport, VocabularyScorer};
pub use workflow::{EssaySubmission, Stage, SubmissionError, SubmissionWorkflow};

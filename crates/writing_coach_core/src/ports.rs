//! crates/writing_coach_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Analysis, Draft, DraftUpdate, Essay, EssaySummary, NewAnalysis, NewDraft, NewEssay, NewUser,
    PasswordResetToken, User, UserCredentials, UserSettingsUpdate,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint was violated (duplicate email, second analysis, ...).
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    /// Fails with `Conflict` when the email or username is already taken.
    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn record_login(&self, user_id: Uuid) -> PortResult<User>;

    async fn update_user_settings(
        &self,
        user_id: Uuid,
        update: UserSettingsUpdate,
    ) -> PortResult<User>;

    /// Removes the user together with their essays, analyses, drafts and tokens.
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()>;

    // --- Essay Management ---
    async fn create_essay(&self, new_essay: NewEssay) -> PortResult<Essay>;

    async fn get_essay(&self, essay_id: Uuid) -> PortResult<Essay>;

    /// Newest first.
    async fn list_essays_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> PortResult<Vec<EssaySummary>>;

    /// Cascades to the essay's analysis.
    async fn delete_essay(&self, essay_id: Uuid) -> PortResult<()>;

    // --- Analysis Management ---
    /// Fails with `Conflict` if the essay already has an analysis.
    async fn create_analysis(&self, new_analysis: NewAnalysis) -> PortResult<Analysis>;

    async fn get_analysis_for_essay(&self, essay_id: Uuid) -> PortResult<Analysis>;

    // --- Draft Management ---
    async fn create_draft(&self, user_id: Uuid, new_draft: NewDraft) -> PortResult<Draft>;

    /// Most recently updated first.
    async fn list_drafts_for_user(&self, user_id: Uuid) -> PortResult<Vec<Draft>>;

    async fn get_draft(&self, draft_id: Uuid) -> PortResult<Draft>;

    async fn update_draft(&self, draft_id: Uuid, update: DraftUpdate) -> PortResult<Draft>;

    async fn delete_draft(&self, draft_id: Uuid) -> PortResult<()>;

    // --- Password Reset ---
    /// Drops the user's unused tokens and stores a fresh one.
    async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<PasswordResetToken>;

    async fn get_reset_token(&self, token: &str) -> PortResult<PasswordResetToken>;

    /// Marks the token used and sets the new password hash in one step.
    /// Fails with `Conflict`, writing nothing, when the token is already used or expired.
    async fn complete_password_reset(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        hashed_password: &str,
    ) -> PortResult<()>;
}

/// The two halves of a request to the critique oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CritiquePrompt {
    pub system_instructions: String,
    pub user_payload: String,
}

#[async_trait]
pub trait CritiqueService: Send + Sync {
    /// Sends one prompt to the language model and returns its raw text reply.
    async fn complete(&self, prompt: &CritiquePrompt) -> PortResult<String>;
}

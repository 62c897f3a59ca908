//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use writing_coach_core::domain::{
    chinese_char_count, Analysis, Draft, DraftUpdate, Essay, EssaySummary, NewAnalysis, NewDraft,
    NewEssay, NewUser, PasswordResetToken, StoredTimestamp, TargetLevel, User, UserCredentials,
    UserSettingsUpdate,
};
use writing_coach_core::ports::{DatabaseService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        other => unexpected(other),
    }
}

/// Unique violations become `Conflict` with a message naming the clashing field.
fn conflict_or_unexpected(e: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let message = match db_err.constraint() {
                Some("users_email_key") => "Email already registered",
                Some("users_username_key") => "Username already taken",
                Some("essay_analysis_essay_id_key") => "Essay already has an analysis",
                _ => "Duplicate record",
            };
            return PortError::Conflict(message.to_string());
        }
    }
    unexpected(e)
}

fn level(raw: i32) -> PortResult<TargetLevel> {
    TargetLevel::try_from(raw).map_err(PortError::Unexpected)
}

fn ensure_affected(rows: u64, what: String) -> PortResult<()> {
    if rows == 0 {
        Err(PortError::NotFound(what))
    } else {
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    username: String,
    target_level: i32,
    preferred_language: String,
    dark_mode: bool,
    created_at: DateTime<Utc>,
    last_login: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            username: self.username,
            target_level: level(self.target_level)?,
            preferred_language: self.preferred_language,
            dark_mode: self.dark_mode,
            created_at: self.created_at,
            last_login: self.last_login,
        })
    }
}

const USER_COLUMNS: &str =
    "id, email, username, target_level, preferred_language, dark_mode, created_at, last_login";

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct EssayRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    content: String,
    theme: Option<String>,
    target_level: i32,
    submitted_at: DateTime<Utc>,
}
impl EssayRecord {
    fn to_domain(self) -> PortResult<Essay> {
        Ok(Essay {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            theme: self.theme,
            target_level: level(self.target_level)?,
            submitted_at: self.submitted_at,
        })
    }
}

#[derive(FromRow)]
struct EssaySummaryRecord {
    id: Uuid,
    title: String,
    content: String,
    theme: Option<String>,
    target_level: i32,
    submitted_at: DateTime<Utc>,
    overall_score: Option<i32>,
}
impl EssaySummaryRecord {
    fn to_domain(self) -> PortResult<EssaySummary> {
        Ok(EssaySummary {
            id: self.id,
            title: self.title,
            char_count: chinese_char_count(&self.content),
            theme: self.theme,
            target_level: level(self.target_level)?,
            submitted_at: self.submitted_at,
            overall_score: self.overall_score,
        })
    }
}

#[derive(FromRow)]
struct AnalysisRecord {
    id: Uuid,
    essay_id: Uuid,
    char_count: i32,
    word_count: i32,
    sentence_count: i32,
    paragraph_count: i32,
    unique_words: i32,
    vocabulary_richness: f64,
    vocabulary_score: i32,
    advanced_vocab_ratio: f64,
    sentence_quality_score: i32,
    grammar_score: Option<i32>,
    semantic_score: Option<i32>,
    collocation_score: Option<i32>,
    structure_score: Option<i32>,
    coherence_score: Option<i32>,
    transition_score: Option<i32>,
    topic_consistency_score: Option<i32>,
    logic_score: Option<i32>,
    overall_score: i32,
    vocabulary_details: Value,
    sentence_details: Value,
    essay_analysis: Value,
    hsk_distribution: Value,
    recommendations: Value,
    analysis_language: String,
    analyzed_at: DateTime<Utc>,
}
impl AnalysisRecord {
    fn to_domain(self) -> PortResult<Analysis> {
        let recommendations: Vec<String> = serde_json::from_value(self.recommendations)
            .map_err(|e| PortError::Unexpected(format!("Bad recommendations column: {}", e)))?;
        Ok(Analysis {
            id: self.id,
            analyzed_at: self.analyzed_at,
            fields: NewAnalysis {
                essay_id: self.essay_id,
                char_count: self.char_count,
                word_count: self.word_count,
                sentence_count: self.sentence_count,
                paragraph_count: self.paragraph_count,
                unique_words: self.unique_words,
                vocabulary_richness: self.vocabulary_richness,
                vocabulary_score: self.vocabulary_score,
                advanced_vocab_ratio: self.advanced_vocab_ratio,
                sentence_quality_score: self.sentence_quality_score,
                grammar_score: self.grammar_score,
                semantic_score: self.semantic_score,
                collocation_score: self.collocation_score,
                structure_score: self.structure_score,
                coherence_score: self.coherence_score,
                transition_score: self.transition_score,
                topic_consistency_score: self.topic_consistency_score,
                logic_score: self.logic_score,
                overall_score: self.overall_score,
                vocabulary_details: self.vocabulary_details,
                sentence_details: self.sentence_details,
                essay_analysis: self.essay_analysis,
                hsk_distribution: self.hsk_distribution,
                recommendations,
                analysis_language: self.analysis_language,
            },
        })
    }
}

#[derive(FromRow)]
struct DraftRecord {
    id: Uuid,
    user_id: Uuid,
    title: Option<String>,
    content: Option<String>,
    theme: Option<String>,
    target_level: Option<i32>,
    char_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl DraftRecord {
    fn to_domain(self) -> PortResult<Draft> {
        Ok(Draft {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            theme: self.theme,
            target_level: self.target_level.map(level).transpose()?,
            char_count: self.char_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ResetTokenRecord {
    id: Uuid,
    user_id: Uuid,
    token: String,
    expires_at: NaiveDateTime,
    used: bool,
    created_at: DateTime<Utc>,
}
impl ResetTokenRecord {
    fn to_domain(self) -> PasswordResetToken {
        PasswordResetToken {
            id: self.id,
            user_id: self.user_id,
            token: self.token,
            expires_at: StoredTimestamp::Naive(self.expires_at),
            used: self.used,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, username, hashed_password, target_level, preferred_language)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.username)
            .bind(&new_user.hashed_password)
            .bind(i32::from(new_user.target_level))
            .bind(&new_user.preferred_language)
            .fetch_one(&self.pool)
            .await
            .map_err(conflict_or_unexpected)?
            .to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!("User {} not found", user_id)))?
            .to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("User with email {} not found", email)))?;

        Ok(UserCredentials {
            user_id: record.id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn record_login(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!(
            "UPDATE users SET last_login = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!("User {} not found", user_id)))?
            .to_domain()
    }

    async fn update_user_settings(
        &self,
        user_id: Uuid,
        update: UserSettingsUpdate,
    ) -> PortResult<User> {
        let sql = format!(
            "UPDATE users SET
                target_level = COALESCE($2, target_level),
                preferred_language = COALESCE($3, preferred_language),
                dark_mode = COALESCE($4, dark_mode)
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .bind(update.target_level.map(i32::from))
            .bind(update.preferred_language)
            .bind(update.dark_mode)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!("User {} not found", user_id)))?
            .to_domain()
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("User {} not found", user_id))
    }

    async fn create_essay(&self, new_essay: NewEssay) -> PortResult<Essay> {
        sqlx::query_as::<_, EssayRecord>(
            "INSERT INTO essays (id, user_id, title, content, theme, target_level)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, user_id, title, content, theme, target_level, submitted_at",
        )
        .bind(Uuid::new_v4())
        .bind(new_essay.user_id)
        .bind(&new_essay.title)
        .bind(&new_essay.content)
        .bind(&new_essay.theme)
        .bind(i32::from(new_essay.target_level))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn get_essay(&self, essay_id: Uuid) -> PortResult<Essay> {
        sqlx::query_as::<_, EssayRecord>(
            "SELECT id, user_id, title, content, theme, target_level, submitted_at
             FROM essays WHERE id = $1",
        )
        .bind(essay_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Essay {} not found", essay_id)))?
        .to_domain()
    }

    async fn list_essays_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> PortResult<Vec<EssaySummary>> {
        let records = sqlx::query_as::<_, EssaySummaryRecord>(
            "SELECT e.id, e.title, e.content, e.theme, e.target_level, e.submitted_at,
                    a.overall_score
             FROM essays e
             LEFT JOIN essay_analysis a ON a.essay_id = e.id
             WHERE e.user_id = $1
             ORDER BY e.submitted_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(EssaySummaryRecord::to_domain).collect()
    }

    async fn delete_essay(&self, essay_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM essays WHERE id = $1")
            .bind(essay_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("Essay {} not found", essay_id))
    }

    async fn create_analysis(&self, a: NewAnalysis) -> PortResult<Analysis> {
        let recommendations = serde_json::to_value(&a.recommendations)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query_as::<_, AnalysisRecord>(
            "INSERT INTO essay_analysis (
                id, essay_id, char_count, word_count, sentence_count, paragraph_count,
                unique_words, vocabulary_richness, vocabulary_score, advanced_vocab_ratio,
                sentence_quality_score, grammar_score, semantic_score, collocation_score,
                structure_score, coherence_score, transition_score, topic_consistency_score,
                logic_score, overall_score, vocabulary_details, sentence_details,
                essay_analysis, hsk_distribution, recommendations, analysis_language
             ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24, $25, $26
             )
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(a.essay_id)
        .bind(a.char_count)
        .bind(a.word_count)
        .bind(a.sentence_count)
        .bind(a.paragraph_count)
        .bind(a.unique_words)
        .bind(a.vocabulary_richness)
        .bind(a.vocabulary_score)
        .bind(a.advanced_vocab_ratio)
        .bind(a.sentence_quality_score)
        .bind(a.grammar_score)
        .bind(a.semantic_score)
        .bind(a.collocation_score)
        .bind(a.structure_score)
        .bind(a.coherence_score)
        .bind(a.transition_score)
        .bind(a.topic_consistency_score)
        .bind(a.logic_score)
        .bind(a.overall_score)
        .bind(&a.vocabulary_details)
        .bind(&a.sentence_details)
        .bind(&a.essay_analysis)
        .bind(&a.hsk_distribution)
        .bind(&recommendations)
        .bind(&a.analysis_language)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_or_unexpected)?
        .to_domain()
    }

    async fn get_analysis_for_essay(&self, essay_id: Uuid) -> PortResult<Analysis> {
        sqlx::query_as::<_, AnalysisRecord>("SELECT * FROM essay_analysis WHERE essay_id = $1")
            .bind(essay_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!("Analysis for essay {} not found", essay_id)))?
            .to_domain()
    }

    async fn create_draft(&self, user_id: Uuid, new_draft: NewDraft) -> PortResult<Draft> {
        sqlx::query_as::<_, DraftRecord>(
            "INSERT INTO drafts (id, user_id, title, content, theme, target_level, char_count)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(new_draft.title)
        .bind(new_draft.content)
        .bind(new_draft.theme)
        .bind(new_draft.target_level.map(i32::from))
        .bind(new_draft.char_count)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn list_drafts_for_user(&self, user_id: Uuid) -> PortResult<Vec<Draft>> {
        let records = sqlx::query_as::<_, DraftRecord>(
            "SELECT * FROM drafts WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(DraftRecord::to_domain).collect()
    }

    async fn get_draft(&self, draft_id: Uuid) -> PortResult<Draft> {
        sqlx::query_as::<_, DraftRecord>("SELECT * FROM drafts WHERE id = $1")
            .bind(draft_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!("Draft {} not found", draft_id)))?
            .to_domain()
    }

    async fn update_draft(&self, draft_id: Uuid, update: DraftUpdate) -> PortResult<Draft> {
        sqlx::query_as::<_, DraftRecord>(
            "UPDATE drafts SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                theme = COALESCE($4, theme),
                target_level = COALESCE($5, target_level),
                char_count = COALESCE($6, char_count),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(draft_id)
        .bind(update.title)
        .bind(update.content)
        .bind(update.theme)
        .bind(update.target_level.map(i32::from))
        .bind(update.char_count)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Draft {} not found", draft_id)))?
        .to_domain()
    }

    async fn delete_draft(&self, draft_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM drafts WHERE id = $1")
            .bind(draft_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("Draft {} not found", draft_id))
    }

    async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<PasswordResetToken> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1 AND used = FALSE")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, ResetTokenRecord>(
            "INSERT INTO password_reset_tokens (id, user_id, token, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id, user_id, token, expires_at, used, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token)
        .bind(expires_at.naive_utc())
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_or_unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_reset_token(&self, token: &str) -> PortResult<PasswordResetToken> {
        let record = sqlx::query_as::<_, ResetTokenRecord>(
            "SELECT id, user_id, token, expires_at, used, created_at
             FROM password_reset_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or("Reset token not found".to_string()))?;
        Ok(record.to_domain())
    }

    async fn complete_password_reset(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        hashed_password: &str,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Claim the token first; a concurrent reset that already used it leaves zero rows.
        let claimed = sqlx::query(
            "UPDATE password_reset_tokens SET used = TRUE
             WHERE id = $1 AND user_id = $2 AND used = FALSE
               AND expires_at > (NOW() AT TIME ZONE 'UTC')",
        )
        .bind(token_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if claimed.rows_affected() == 0 {
            return Err(PortError::Conflict(
                "Reset token already used or expired".to_string(),
            ));
        }

        let updated = sqlx::query("UPDATE users SET hashed_password = $2 WHERE id = $1")
            .bind(user_id)
            .bind(hashed_password)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        ensure_affected(updated.rows_affected(), format!("User {} not found", user_id))?;

        tx.commit().await.map_err(unexpected)
    }
}

//! In-memory adapters for tests: a `DatabaseService` backed by hash maps and a
//! critique oracle that replays a canned reply.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Analysis, Draft, DraftUpdate, Essay, EssaySummary, NewAnalysis, NewDraft, NewEssay, NewUser,
    PasswordResetToken, StoredTimestamp, User, UserCredentials, UserSettingsUpdate,
};
use crate::ports::{CritiquePrompt, CritiqueService, DatabaseService, PortError, PortResult};
use crate::vocabulary::Segmenter;

/// A well-formed three-sentence critique.
///
/// Sentence quality averages 80 and the essay dimensions average 72.5, so the
/// combined quality score is 76. Transitions score below the feedback threshold.
pub const SAMPLE_REPORT: &str = r#"{
  "sentence_analysis": [
    {
      "index": 1,
      "original": "我很喜欢学习中文",
      "grammar_score": 90,
      "semantic_score": 80,
      "collocation_score": 70,
      "overall_quality": 85,
      "issues": [
        {"type": "Word order", "description": "Adverb placement", "correction": "我非常喜欢学习中文", "severity": "minor"}
      ],
      "improvement_suggestion": "Try a stronger adverb"
    },
    {
      "index": 2,
      "original": "中文是一门很有意思的语言",
      "grammar_score": 70,
      "semantic_score": 80,
      "collocation_score": 75,
      "overall_quality": 75,
      "issues": [
        {"type": "Word order", "description": "Modifier order", "correction": "中文是一门非常有意思的语言", "severity": "minor"}
      ]
    },
    {
      "index": 3,
      "original": "学习中文有很多好处",
      "grammar_score": 85,
      "semantic_score": 81,
      "collocation_score": 80,
      "overall_quality": 80,
      "issues": []
    }
  ],
  "essay_analysis": {
    "structure_score": 80,
    "coherence_score": 75,
    "transition_score": 60,
    "topic_consistency_score": 90,
    "logic_score": 75,
    "structure_feedback": "Clear opening",
    "coherence_feedback": "Ideas connect",
    "transition_feedback": "Add linking words between paragraphs",
    "essay_issues": [
      {"type": "Missing transition", "location": "Between paragraph 1 and 2", "description": "The second paragraph starts abruptly", "suggestion": "Begin with 因此", "severity": "major"}
    ],
    "strengths": ["Clear topic"],
    "areas_for_improvement": ["Transitions"]
  },
  "overall_coherence": 78
}"#;

/// A critique with sentence entries only. Quality score is 35.
pub const SENTENCES_ONLY_REPORT: &str = r#"{
  "sentence_analysis": [
    {"index": 1, "original": "我很喜欢学习中文", "grammar_score": 60, "semantic_score": 70,
     "collocation_score": 70, "overall_quality": 70},
    {"index": 2, "original": "中文很有意思", "grammar_score": 60, "semantic_score": 70,
     "collocation_score": 70, "overall_quality": 70}
  ]
}"#;

/// Splits on whitespace only, so tests control word boundaries exactly.
pub struct WhitespaceSegmenter;

impl Segmenter for WhitespaceSegmenter {
    fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split_whitespace().collect()
    }
}

//=========================================================================================
// Scripted Critique Oracle
//=========================================================================================

enum Script {
    Reply(String),
    Fail(String),
    Panic,
}

/// Replays one scripted behaviour for every request and records what it was sent.
pub struct ScriptedOracle {
    script: Script,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<CritiquePrompt>>,
}

impl ScriptedOracle {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::with_script(Script::Reply(reply.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_script(Script::Fail(message.to_string()))
    }

    pub fn panicking() -> Self {
        Self::with_script(Script::Panic)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<CritiquePrompt> {
        self.last_prompt.lock().expect("prompt lock").clone()
    }
}

#[async_trait]
impl CritiqueService for ScriptedOracle {
    async fn complete(&self, prompt: &CritiquePrompt) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().expect("prompt lock") = Some(prompt.clone());
        match &self.script {
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Fail(message) => Err(PortError::Unexpected(message.clone())),
            Script::Panic => panic!("scripted oracle panic"),
        }
    }
}

//=========================================================================================
// In-Memory Database
//=========================================================================================

struct StoredUser {
    user: User,
    hashed_password: String,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, StoredUser>,
    essays: HashMap<Uuid, Essay>,
    analyses: HashMap<Uuid, Analysis>,
    drafts: HashMap<Uuid, Draft>,
    reset_tokens: HashMap<Uuid, PasswordResetToken>,
}

/// A `DatabaseService` with the same uniqueness and cascade rules as the
/// Postgres schema.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
    fail_analysis_writes: AtomicBool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `create_analysis` fail with an unexpected error.
    pub fn fail_analysis_writes(&self) {
        self.fail_analysis_writes.store(true, Ordering::SeqCst);
    }

    pub fn essay_count(&self) -> usize {
        self.lock().essays.len()
    }

    pub fn analysis_count(&self) -> usize {
        self.lock().analyses.len()
    }

    pub fn reset_tokens_for(&self, user_id: Uuid) -> Vec<PasswordResetToken> {
        self.lock()
            .reset_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Stores a token directly, bypassing `replace_reset_token`.
    pub fn insert_reset_token(&self, token: PasswordResetToken) {
        self.lock().reset_tokens.insert(token.id, token);
    }

    pub fn password_hash_for(&self, user_id: Uuid) -> Option<String> {
        self.lock()
            .users
            .get(&user_id)
            .map(|u| u.hashed_password.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory database lock")
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {} not found", what, id))
}

#[async_trait]
impl DatabaseService for MemoryDatabase {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut tables = self.lock();
        if tables.users.values().any(|u| u.user.email == new_user.email) {
            return Err(PortError::Conflict("Email already registered".to_string()));
        }
        if tables
            .users
            .values()
            .any(|u| u.user.username == new_user.username)
        {
            return Err(PortError::Conflict("Username already taken".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            target_level: new_user.target_level,
            preferred_language: new_user.preferred_language,
            dark_mode: false,
            created_at: now,
            last_login: now,
        };
        tables.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                hashed_password: new_user.hashed_password,
            },
        );
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.lock()
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or_else(|| not_found("User", user_id))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.lock()
            .users
            .values()
            .find(|u| u.user.email == email)
            .map(|u| UserCredentials {
                user_id: u.user.id,
                email: u.user.email.clone(),
                hashed_password: u.hashed_password.clone(),
            })
            .ok_or_else(|| not_found("User with email", email))
    }

    async fn record_login(&self, user_id: Uuid) -> PortResult<User> {
        let mut tables = self.lock();
        let stored = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("User", user_id))?;
        stored.user.last_login = Utc::now();
        Ok(stored.user.clone())
    }

    async fn update_user_settings(
        &self,
        user_id: Uuid,
        update: UserSettingsUpdate,
    ) -> PortResult<User> {
        let mut tables = self.lock();
        let stored = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("User", user_id))?;
        if let Some(level) = update.target_level {
            stored.user.target_level = level;
        }
        if let Some(language) = update.preferred_language {
            stored.user.preferred_language = language;
        }
        if let Some(dark_mode) = update.dark_mode {
            stored.user.dark_mode = dark_mode;
        }
        Ok(stored.user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let mut tables = self.lock();
        if tables.users.remove(&user_id).is_none() {
            return Err(not_found("User", user_id));
        }
        let essay_ids: Vec<Uuid> = tables
            .essays
            .values()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.id)
            .collect();
        for essay_id in essay_ids {
            tables.essays.remove(&essay_id);
            tables.analyses.retain(|_, a| a.fields.essay_id != essay_id);
        }
        tables.drafts.retain(|_, d| d.user_id != user_id);
        tables.reset_tokens.retain(|_, t| t.user_id != user_id);
        Ok(())
    }

    async fn create_essay(&self, new_essay: NewEssay) -> PortResult<Essay> {
        let mut tables = self.lock();
        if !tables.users.contains_key(&new_essay.user_id) {
            return Err(not_found("User", new_essay.user_id));
        }
        let essay = Essay {
            id: Uuid::new_v4(),
            user_id: new_essay.user_id,
            title: new_essay.title,
            content: new_essay.content,
            theme: new_essay.theme,
            target_level: new_essay.target_level,
            submitted_at: Utc::now(),
        };
        tables.essays.insert(essay.id, essay.clone());
        Ok(essay)
    }

    async fn get_essay(&self, essay_id: Uuid) -> PortResult<Essay> {
        self.lock()
            .essays
            .get(&essay_id)
            .cloned()
            .ok_or_else(|| not_found("Essay", essay_id))
    }

    async fn list_essays_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> PortResult<Vec<EssaySummary>> {
        let tables = self.lock();
        let mut essays: Vec<&Essay> = tables
            .essays
            .values()
            .filter(|e| e.user_id == user_id)
            .collect();
        essays.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

        Ok(essays
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|essay| EssaySummary {
                id: essay.id,
                title: essay.title.clone(),
                theme: essay.theme.clone(),
                target_level: essay.target_level,
                submitted_at: essay.submitted_at,
                char_count: essay.char_count(),
                overall_score: tables
                    .analyses
                    .values()
                    .find(|a| a.fields.essay_id == essay.id)
                    .map(|a| a.fields.overall_score),
            })
            .collect())
    }

    async fn delete_essay(&self, essay_id: Uuid) -> PortResult<()> {
        let mut tables = self.lock();
        if tables.essays.remove(&essay_id).is_none() {
            return Err(not_found("Essay", essay_id));
        }
        tables.analyses.retain(|_, a| a.fields.essay_id != essay_id);
        Ok(())
    }

    async fn create_analysis(&self, new_analysis: NewAnalysis) -> PortResult<Analysis> {
        if self.fail_analysis_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("analysis write failed".to_string()));
        }
        let mut tables = self.lock();
        if !tables.essays.contains_key(&new_analysis.essay_id) {
            return Err(not_found("Essay", new_analysis.essay_id));
        }
        if tables
            .analyses
            .values()
            .any(|a| a.fields.essay_id == new_analysis.essay_id)
        {
            return Err(PortError::Conflict(format!(
                "essay {} already has an analysis",
                new_analysis.essay_id
            )));
        }
        let analysis = Analysis {
            id: Uuid::new_v4(),
            analyzed_at: Utc::now(),
            fields: new_analysis,
        };
        tables.analyses.insert(analysis.id, analysis.clone());
        Ok(analysis)
    }

    async fn get_analysis_for_essay(&self, essay_id: Uuid) -> PortResult<Analysis> {
        self.lock()
            .analyses
            .values()
            .find(|a| a.fields.essay_id == essay_id)
            .cloned()
            .ok_or_else(|| not_found("Analysis for essay", essay_id))
    }

    async fn create_draft(&self, user_id: Uuid, new_draft: NewDraft) -> PortResult<Draft> {
        let now = Utc::now();
        let draft = Draft {
            id: Uuid::new_v4(),
            user_id,
            title: new_draft.title,
            content: new_draft.content,
            theme: new_draft.theme,
            target_level: new_draft.target_level,
            char_count: new_draft.char_count,
            created_at: now,
            updated_at: now,
        };
        self.lock().drafts.insert(draft.id, draft.clone());
        Ok(draft)
    }

    async fn list_drafts_for_user(&self, user_id: Uuid) -> PortResult<Vec<Draft>> {
        let mut drafts: Vec<Draft> = self
            .lock()
            .drafts
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        drafts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(drafts)
    }

    async fn get_draft(&self, draft_id: Uuid) -> PortResult<Draft> {
        self.lock()
            .drafts
            .get(&draft_id)
            .cloned()
            .ok_or_else(|| not_found("Draft", draft_id))
    }

    async fn update_draft(&self, draft_id: Uuid, update: DraftUpdate) -> PortResult<Draft> {
        let mut tables = self.lock();
        let draft = tables
            .drafts
            .get_mut(&draft_id)
            .ok_or_else(|| not_found("Draft", draft_id))?;
        if let Some(title) = update.title {
            draft.title = Some(title);
        }
        if let Some(content) = update.content {
            draft.content = Some(content);
        }
        if let Some(theme) = update.theme {
            draft.theme = Some(theme);
        }
        if let Some(level) = update.target_level {
            draft.target_level = Some(level);
        }
        if let Some(char_count) = update.char_count {
            draft.char_count = char_count;
        }
        draft.updated_at = Utc::now();
        Ok(draft.clone())
    }

    async fn delete_draft(&self, draft_id: Uuid) -> PortResult<()> {
        self.lock()
            .drafts
            .remove(&draft_id)
            .map(|_| ())
            .ok_or_else(|| not_found("Draft", draft_id))
    }

    async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<PasswordResetToken> {
        let mut tables = self.lock();
        tables
            .reset_tokens
            .retain(|_, t| t.user_id != user_id || t.used);
        let record = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at: StoredTimestamp::Naive(expires_at.naive_utc()),
            used: false,
            created_at: Utc::now(),
        };
        tables.reset_tokens.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_reset_token(&self, token: &str) -> PortResult<PasswordResetToken> {
        self.lock()
            .reset_tokens
            .values()
            .find(|t| t.token == token)
            .cloned()
            .ok_or_else(|| PortError::NotFound("reset token not found".to_string()))
    }

    async fn complete_password_reset(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        hashed_password: &str,
    ) -> PortResult<()> {
        let mut tables = self.lock();
        let claimable = tables
            .reset_tokens
            .get(&token_id)
            .map(|t| t.user_id == user_id && t.is_valid())
            .ok_or_else(|| not_found("Reset token", token_id))?;
        if !claimable {
            return Err(PortError::Conflict(
                "Reset token already used or expired".to_string(),
            ));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(not_found("User", user_id));
        }

        if let Some(token) = tables.reset_tokens.get_mut(&token_id) {
            token.used = true;
        }
        if let Some(stored) = tables.users.get_mut(&user_id) {
            stored.hashed_password = hashed_password.to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetLevel;
    use chrono::Duration;

    async fn user_with_token(db: &MemoryDatabase, expires_in: Duration) -> PasswordResetToken {
        let user = db
            .create_user(NewUser {
                email: "li@example.com".to_string(),
                username: "xiaoli".to_string(),
                hashed_password: "h0".to_string(),
                target_level: TargetLevel::default(),
                preferred_language: "en".to_string(),
            })
            .await
            .expect("user");
        db.replace_reset_token(user.id, &"c".repeat(64), Utc::now() + expires_in)
            .await
            .expect("token")
    }

    #[tokio::test]
    async fn reset_token_can_only_be_claimed_once() {
        let db = MemoryDatabase::new();
        let token = user_with_token(&db, Duration::minutes(30)).await;

        // Both requests read the token while it was still unused.
        let first_read = db.get_reset_token(&token.token).await.expect("read");
        let second_read = db.get_reset_token(&token.token).await.expect("read");
        assert!(first_read.is_valid() && second_read.is_valid());

        db.complete_password_reset(first_read.id, first_read.user_id, "h1")
            .await
            .expect("first reset");
        let second = db
            .complete_password_reset(second_read.id, second_read.user_id, "h2")
            .await;

        assert!(matches!(second, Err(PortError::Conflict(_))));
        assert_eq!(db.password_hash_for(token.user_id).as_deref(), Some("h1"));
    }

    #[tokio::test]
    async fn expired_reset_token_writes_nothing() {
        let db = MemoryDatabase::new();
        let token = user_with_token(&db, Duration::minutes(-1)).await;
        let result = db.complete_password_reset(token.id, token.user_id, "h1").await;

        assert!(matches!(result, Err(PortError::Conflict(_))));
        assert_eq!(db.password_hash_for(token.user_id).as_deref(), Some("h0"));
        assert!(!db.reset_tokens_for(token.user_id)[0].used);
    }

    #[tokio::test]
    async fn duplicate_registration_messages_match_the_database_constraints() {
        let db = MemoryDatabase::new();
        user_with_token(&db, Duration::minutes(30)).await;
        let duplicate = |email: &str, username: &str| NewUser {
            email: email.to_string(),
            username: username.to_string(),
            hashed_password: "h".to_string(),
            target_level: TargetLevel::default(),
            preferred_language: "en".to_string(),
        };

        let email = db.create_user(duplicate("li@example.com", "other")).await;
        let username = db.create_user(duplicate("wang@example.com", "xiaoli")).await;

        assert!(matches!(email, Err(PortError::Conflict(m)) if m == "Email already registered"));
        assert!(matches!(username, Err(PortError::Conflict(m)) if m == "Username already taken"));
    }
}

//! services/api/src/web/essays.rs
//!
//! Essay submission and retrieval. Submission runs the scoring saga; everything
//! else is owner-scoped reads and deletes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use writing_coach_core::domain::{Analysis, Essay, EssaySummary, TargetLevel};
use writing_coach_core::workflow::EssaySubmission;

use crate::error::{forbidden, port_error, submission_error, HttpError};
use crate::web::{state::AppState, validated, validated_query, MessageResponse};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, Validate, ToSchema)]
pub struct SubmitEssayRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 10))]
    pub content: String,
    #[validate(length(max = 100))]
    pub theme: Option<String>,
    #[serde(default = "default_level")]
    #[validate(range(min = 1, max = 6))]
    pub target_level: u8,
    /// Feedback language code; unsupported codes fall back to English.
    #[serde(default = "default_language")]
    #[validate(length(max = 10))]
    pub language: String,
}

fn default_level() -> u8 {
    TargetLevel::default().get()
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEssaysQuery {
    /// Page size, 1-100 (default 10).
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct EssayResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub theme: Option<String>,
    pub target_level: u8,
    pub submitted_at: DateTime<Utc>,
    pub char_count: usize,
}

impl From<Essay> for EssayResponse {
    fn from(essay: Essay) -> Self {
        Self {
            char_count: essay.char_count(),
            id: essay.id,
            user_id: essay.user_id,
            title: essay.title,
            content: essay.content,
            theme: essay.theme,
            target_level: essay.target_level.get(),
            submitted_at: essay.submitted_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EssayListItem {
    pub id: Uuid,
    pub title: String,
    pub theme: Option<String>,
    pub target_level: u8,
    pub submitted_at: DateTime<Utc>,
    pub char_count: usize,
    /// Absent when the essay has no analysis.
    pub overall_score: Option<i32>,
}

impl From<EssaySummary> for EssayListItem {
    fn from(summary: EssaySummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            theme: summary.theme,
            target_level: summary.target_level.get(),
            submitted_at: summary.submitted_at,
            char_count: summary.char_count,
            overall_score: summary.overall_score,
        }
    }
}

/// The stored analysis. Dimension scores are `null` when they were not assessed.
#[derive(Serialize, ToSchema)]
pub struct AnalysisResponse {
    pub id: Uuid,
    pub essay_id: Uuid,
    pub char_count: i32,
    pub word_count: i32,
    pub sentence_count: i32,
    pub paragraph_count: i32,
    pub unique_words: i32,
    pub vocabulary_richness: f64,
    pub vocabulary_score: i32,
    pub advanced_vocab_ratio: f64,
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
    #[schema(value_type = Object)]
    pub vocabulary_details: Value,
    #[schema(value_type = Vec<Object>)]
    pub sentence_details: Value,
    #[schema(value_type = Object)]
    pub essay_analysis: Value,
    #[schema(value_type = Object)]
    pub hsk_distribution: Value,
    pub recommendations: Vec<String>,
    pub analysis_language: String,
    pub analyzed_at: DateTime<Utc>,
}

impl From<Analysis> for AnalysisResponse {
    fn from(analysis: Analysis) -> Self {
        let a = analysis.fields;
        Self {
            id: analysis.id,
            essay_id: a.essay_id,
            char_count: a.char_count,
            word_count: a.word_count,
            sentence_count: a.sentence_count,
            paragraph_count: a.paragraph_count,
            unique_words: a.unique_words,
            vocabulary_richness: a.vocabulary_richness,
            vocabulary_score: a.vocabulary_score,
            advanced_vocab_ratio: a.advanced_vocab_ratio,
            sentence_quality_score: a.sentence_quality_score,
            grammar_score: a.grammar_score,
            semantic_score: a.semantic_score,
            collocation_score: a.collocation_score,
            structure_score: a.structure_score,
            coherence_score: a.coherence_score,
            transition_score: a.transition_score,
            topic_consistency_score: a.topic_consistency_score,
            logic_score: a.logic_score,
            overall_score: a.overall_score,
            vocabulary_details: a.vocabulary_details,
            sentence_details: a.sentence_details,
            essay_analysis: a.essay_analysis,
            hsk_distribution: a.hsk_distribution,
            recommendations: a.recommendations,
            analysis_language: a.analysis_language,
            analyzed_at: analysis.analyzed_at,
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Loads an essay and checks it belongs to `user_id`.
async fn owned_essay(state: &AppState, essay_id: Uuid, user_id: Uuid) -> Result<Essay, HttpError> {
    let essay = state.db.get_essay(essay_id).await.map_err(port_error)?;
    if essay.user_id != user_id {
        return Err(forbidden());
    }
    Ok(essay)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/essays/submit - Submit an essay for scoring
#[utoipa::path(
    post,
    path = "/api/essays/submit",
    request_body = SubmitEssayRequest,
    responses(
        (status = 201, description = "Essay scored and stored", body = AnalysisResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 422, description = "Invalid essay"),
        (status = 502, description = "Scoring provider unavailable; nothing was stored"),
        (status = 500, description = "Scoring failed; nothing was stored")
    ),
    security(("bearer" = []))
)]
pub async fn submit_essay_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SubmitEssayRequest>,
) -> Result<impl IntoResponse, HttpError> {
    validated(&req)?;
    let target_level = TargetLevel::new(req.target_level).unwrap_or_default();

    let analysis = state
        .submissions
        .submit(EssaySubmission {
            user_id,
            title: req.title,
            content: req.content,
            theme: req.theme,
            target_level,
            language: req.language,
        })
        .await
        .map_err(submission_error)?;
    info!(%user_id, essay_id = %analysis.fields.essay_id, "Essay submitted");

    Ok((StatusCode::CREATED, Json(AnalysisResponse::from(analysis))))
}

/// GET /api/essays - The caller's essays, newest first
#[utoipa::path(
    get,
    path = "/api/essays",
    params(ListEssaysQuery),
    responses(
        (status = 200, description = "Essay list", body = [EssayListItem]),
        (status = 400, description = "Invalid paging parameters"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn list_essays_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<ListEssaysQuery>,
) -> Result<Json<Vec<EssayListItem>>, HttpError> {
    validated_query(&query)?;
    let essays = state
        .db
        .list_essays_for_user(user_id, query.limit.unwrap_or(10), query.offset.unwrap_or(0))
        .await
        .map_err(port_error)?;
    Ok(Json(essays.into_iter().map(EssayListItem::from).collect()))
}

/// GET /api/essays/{id} - One essay
#[utoipa::path(
    get,
    path = "/api/essays/{id}",
    params(("id" = Uuid, Path, description = "Essay id")),
    responses(
        (status = 200, description = "Essay", body = EssayResponse),
        (status = 403, description = "Essay belongs to another user"),
        (status = 404, description = "No such essay")
    ),
    security(("bearer" = []))
)]
pub async fn get_essay_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<Json<EssayResponse>, HttpError> {
    let essay = owned_essay(&state, id, user_id).await?;
    Ok(Json(essay.into()))
}

/// GET /api/essays/{id}/analysis - The stored analysis of one essay
#[utoipa::path(
    get,
    path = "/api/essays/{id}/analysis",
    params(("id" = Uuid, Path, description = "Essay id")),
    responses(
        (status = 200, description = "Analysis", body = AnalysisResponse),
        (status = 403, description = "Essay belongs to another user"),
        (status = 404, description = "No such essay or no analysis yet")
    ),
    security(("bearer" = []))
)]
pub async fn get_analysis_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisResponse>, HttpError> {
    let essay = owned_essay(&state, id, user_id).await?;
    let analysis = state
        .db
        .get_analysis_for_essay(essay.id)
        .await
        .map_err(port_error)?;
    Ok(Json(analysis.into()))
}

/// DELETE /api/essays/{id} - Delete an essay and its analysis
#[utoipa::path(
    delete,
    path = "/api/essays/{id}",
    params(("id" = Uuid, Path, description = "Essay id")),
    responses(
        (status = 200, description = "Essay deleted", body = MessageResponse),
        (status = 403, description = "Essay belongs to another user"),
        (status = 404, description = "No such essay")
    ),
    security(("bearer" = []))
)]
pub async fn delete_essay_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, HttpError> {
    let essay = owned_essay(&state, id, user_id).await?;
    state.db.delete_essay(essay.id).await.map_err(port_error)?;
    info!(%user_id, essay_id = %essay.id, "Essay deleted");
    Ok(Json(MessageResponse::new("Essay deleted successfully")))
}

//! services/api/src/web/drafts.rs
//!
//! Draft CRUD, always scoped to the authenticated owner.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;
use writing_coach_core::domain::{Draft, DraftUpdate, NewDraft, TargetLevel};

use crate::error::{forbidden, port_error, HttpError};
use crate::web::{state::AppState, validated, MessageResponse};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateDraftRequest {
    #[validate(length(max = 255))]
    pub title: Option<String>,
    pub content: Option<String>,
    #[validate(length(max = 100))]
    pub theme: Option<String>,
    #[validate(range(min = 1, max = 6))]
    pub target_level: Option<u8>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub char_count: i32,
}

/// Only the provided fields change.
#[derive(Deserialize, Validate, ToSchema)]
pub struct UpdateDraftRequest {
    #[validate(length(max = 255))]
    pub title: Option<String>,
    pub content: Option<String>,
    #[validate(length(max = 100))]
    pub theme: Option<String>,
    #[validate(range(min = 1, max = 6))]
    pub target_level: Option<u8>,
    #[validate(range(min = 0))]
    pub char_count: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct DraftResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub content: Option<String>,
    pub theme: Option<String>,
    pub target_level: Option<u8>,
    pub char_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Draft> for DraftResponse {
    fn from(draft: Draft) -> Self {
        Self {
            id: draft.id,
            user_id: draft.user_id,
            title: draft.title,
            content: draft.content,
            theme: draft.theme,
            target_level: draft.target_level.map(TargetLevel::get),
            char_count: draft.char_count,
            created_at: draft.created_at,
            updated_at: draft.updated_at,
        }
    }
}

async fn owned_draft(state: &AppState, draft_id: Uuid, user_id: Uuid) -> Result<Draft, HttpError> {
    let draft = state.db.get_draft(draft_id).await.map_err(port_error)?;
    if draft.user_id != user_id {
        return Err(forbidden());
    }
    Ok(draft)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/drafts - Create a draft
#[utoipa::path(
    post,
    path = "/api/drafts",
    request_body = CreateDraftRequest,
    responses(
        (status = 201, description = "Draft created", body = DraftResponse),
        (status = 422, description = "Invalid draft")
    ),
    security(("bearer" = []))
)]
pub async fn create_draft_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateDraftRequest>,
) -> Result<impl IntoResponse, HttpError> {
    validated(&req)?;
    let draft = state
        .db
        .create_draft(
            user_id,
            NewDraft {
                title: req.title,
                content: req.content,
                theme: req.theme,
                target_level: req.target_level.and_then(TargetLevel::new),
                char_count: req.char_count,
            },
        )
        .await
        .map_err(port_error)?;
    Ok((StatusCode::CREATED, Json(DraftResponse::from(draft))))
}

/// GET /api/drafts - The caller's drafts, most recently updated first
#[utoipa::path(
    get,
    path = "/api/drafts",
    responses((status = 200, description = "Draft list", body = [DraftResponse])),
    security(("bearer" = []))
)]
pub async fn list_drafts_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<Vec<DraftResponse>>, HttpError> {
    let drafts = state
        .db
        .list_drafts_for_user(user_id)
        .await
        .map_err(port_error)?;
    Ok(Json(drafts.into_iter().map(DraftResponse::from).collect()))
}

/// GET /api/drafts/{id} - One draft
#[utoipa::path(
    get,
    path = "/api/drafts/{id}",
    params(("id" = Uuid, Path, description = "Draft id")),
    responses(
        (status = 200, description = "Draft", body = DraftResponse),
        (status = 403, description = "Draft belongs to another user"),
        (status = 404, description = "No such draft")
    ),
    security(("bearer" = []))
)]
pub async fn get_draft_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<Json<DraftResponse>, HttpError> {
    Ok(Json(owned_draft(&state, id, user_id).await?.into()))
}

/// PUT /api/drafts/{id} - Partially update a draft
#[utoipa::path(
    put,
    path = "/api/drafts/{id}",
    params(("id" = Uuid, Path, description = "Draft id")),
    request_body = UpdateDraftRequest,
    responses(
        (status = 200, description = "Updated draft", body = DraftResponse),
        (status = 403, description = "Draft belongs to another user"),
        (status = 404, description = "No such draft"),
        (status = 422, description = "Invalid draft")
    ),
    security(("bearer" = []))
)]
pub async fn update_draft_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDraftRequest>,
) -> Result<Json<DraftResponse>, HttpError> {
    validated(&req)?;
    let draft = owned_draft(&state, id, user_id).await?;
    let updated = state
        .db
        .update_draft(
            draft.id,
            DraftUpdate {
                title: req.title,
                content: req.content,
                theme: req.theme,
                target_level: req.target_level.and_then(TargetLevel::new),
                char_count: req.char_count,
            },
        )
        .await
        .map_err(port_error)?;
    Ok(Json(updated.into()))
}

/// DELETE /api/drafts/{id} - Delete a draft
#[utoipa::path(
    delete,
    path = "/api/drafts/{id}",
    params(("id" = Uuid, Path, description = "Draft id")),
    responses(
        (status = 200, description = "Draft deleted", body = MessageResponse),
        (status = 403, description = "Draft belongs to another user"),
        (status = 404, description = "No such draft")
    ),
    security(("bearer" = []))
)]
pub async fn delete_draft_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, HttpError> {
    let draft = owned_draft(&state, id, user_id).await?;
    state.db.delete_draft(draft.id).await.map_err(port_error)?;
    Ok(Json(MessageResponse::new("Draft deleted successfully")))
}

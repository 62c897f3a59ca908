//! services/api/src/web/users.rs
//!
//! Profile endpoints for the authenticated user, plus public profile lookup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;
use writing_coach_core::domain::{TargetLevel, User, UserSettingsUpdate};

use crate::error::{port_error, HttpError};
use crate::web::{state::AppState, validated, MessageResponse};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub target_level: u8,
    pub preferred_language: String,
    pub dark_mode: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            target_level: user.target_level.get(),
            preferred_language: user.preferred_language,
            dark_mode: user.dark_mode,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct SettingsRequest {
    #[validate(range(min = 1, max = 6))]
    pub target_level: Option<u8>,
    #[validate(length(min = 1, max = 10))]
    pub preferred_language: Option<String>,
    pub dark_mode: Option<bool>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/users/me - The authenticated user's profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<UserResponse>, HttpError> {
    let user = state.db.get_user_by_id(user_id).await.map_err(port_error)?;
    Ok(Json(user.into()))
}

/// PUT /api/users/me/settings - Update level, language and display settings
#[utoipa::path(
    put,
    path = "/api/users/me/settings",
    request_body = SettingsRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 422, description = "Invalid settings")
    ),
    security(("bearer" = []))
)]
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<UserResponse>, HttpError> {
    validated(&req)?;
    let update = UserSettingsUpdate {
        target_level: req.target_level.and_then(TargetLevel::new),
        preferred_language: req.preferred_language,
        dark_mode: req.dark_mode,
    };
    let user = state
        .db
        .update_user_settings(user_id, update)
        .await
        .map_err(port_error)?;
    Ok(Json(user.into()))
}

/// DELETE /api/users/me - Delete the account with all essays and drafts
#[utoipa::path(
    delete,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn delete_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    state.db.delete_user(user_id).await.map_err(port_error)?;
    info!(%user_id, "Account deleted");
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Account deleted successfully")),
    ))
}

/// GET /api/users/{id} - Look up a user by id
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "No such user")
    ),
    security(("bearer" = []))
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, HttpError> {
    let user = state.db.get_user_by_id(id).await.map_err(port_error)?;
    Ok(Json(user.into()))
}

//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: registration, login and password reset.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;
use writing_coach_core::domain::{NewUser, TargetLevel};
use writing_coach_core::ports::PortError;

use crate::error::{port_error, HttpError};
use crate::web::{state::AppState, users::UserResponse, validated, MessageResponse};

const NEUTRAL_RESET_MESSAGE: &str = "If the email exists, a password reset link has been sent";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";
const INVALID_CREDENTIALS: &str = "Incorrect email or password";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 8, max = 100))]
    pub password: String,
    #[serde(default = "default_level")]
    #[validate(range(min = 1, max = 6))]
    pub target_level: u8,
    #[serde(default = "default_language")]
    #[validate(length(min = 1, max = 10))]
    pub preferred_language: String,
}

fn default_level() -> u8 {
    TargetLevel::default().get()
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8, max = 100))]
    pub new_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenValidity {
    pub valid: bool,
    pub message: String,
}

//=========================================================================================
// Password Helpers
//=========================================================================================

fn hash_password(password: &str) -> Result<String, HttpError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool, HttpError> {
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// 64 hex characters of randomness.
fn new_reset_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn issue_token(state: &AppState, user_id: Uuid) -> Result<String, HttpError> {
    state.tokens.issue(user_id).map_err(|e| {
        error!("Failed to issue access token: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to issue access token".to_string(),
        )
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/users/register - Create a new user account
#[utoipa::path(
    post,
    path = "/api/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = TokenResponse),
        (status = 400, description = "Email or username already taken"),
        (status = 422, description = "Invalid request")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, HttpError> {
    validated(&req)?;
    let target_level = TargetLevel::new(req.target_level).unwrap_or_default();

    // 1. Hash the password
    let hashed_password = hash_password(&req.password)?;

    // 2. Create user in database
    let user = state
        .db
        .create_user(NewUser {
            email: req.email,
            username: req.username,
            hashed_password,
            target_level,
            preferred_language: req.preferred_language,
        })
        .await
        .map_err(port_error)?;
    info!(user_id = %user.id, "User registered");

    // 3. Issue the access token
    let access_token = issue_token(&state, user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            user: user.into(),
        }),
    ))
}

/// POST /api/users/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, HttpError> {
    let invalid = || (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string());

    // 1. Get user by email
    let user_creds = state
        .db
        .get_user_by_email(&req.email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid(),
            other => port_error(other),
        })?;

    // 2. Verify password
    if !verify_password(&req.password, &user_creds.hashed_password)? {
        return Err(invalid());
    }

    // 3. Record the login and issue a token
    let user = state
        .db
        .record_login(user_creds.user_id)
        .await
        .map_err(port_error)?;
    let access_token = issue_token(&state, user.id)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: user.into(),
    }))
}

/// POST /api/users/forgot-password - Request a reset link
///
/// Always answers with the same message, whether or not the email is known.
#[utoipa::path(
    post,
    path = "/api/users/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse)
    )
)]
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, HttpError> {
    validated(&req)?;

    let user_creds = match state.db.get_user_by_email(&req.email).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => {
            info!("Password reset requested for unknown email");
            return Ok(Json(MessageResponse::new(NEUTRAL_RESET_MESSAGE)));
        }
        Err(e) => return Err(port_error(e)),
    };

    let token = new_reset_token();
    let expires_at = Utc::now() + Duration::minutes(state.config.password_reset_ttl_minutes);
    state
        .db
        .replace_reset_token(user_creds.user_id, &token, expires_at)
        .await
        .map_err(port_error)?;

    // No mail delivery; the link is only logged.
    let reset_link = format!("{}/reset-password?token={}", state.config.frontend_url, token);
    info!(user_id = %user_creds.user_id, %reset_link, "Password reset link generated");

    Ok(Json(MessageResponse::new(NEUTRAL_RESET_MESSAGE)))
}

/// GET /api/users/verify-reset-token/{token} - Check a reset token
#[utoipa::path(
    get,
    path = "/api/users/verify-reset-token/{token}",
    params(("token" = String, Path, description = "Reset token")),
    responses(
        (status = 200, description = "Token is valid", body = TokenValidity),
        (status = 400, description = "Token is invalid, used or expired")
    )
)]
pub async fn verify_reset_token_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<TokenValidity>, HttpError> {
    let record = state.db.get_reset_token(&token).await.map_err(|e| match e {
        PortError::NotFound(_) => (StatusCode::BAD_REQUEST, INVALID_RESET_TOKEN.to_string()),
        other => port_error(other),
    })?;

    if !record.is_valid() {
        return Err((StatusCode::BAD_REQUEST, INVALID_RESET_TOKEN.to_string()));
    }
    Ok(Json(TokenValidity {
        valid: true,
        message: "Token is valid".to_string(),
    }))
}

/// POST /api/users/reset-password - Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/api/users/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Token is invalid, used or expired"),
        (status = 422, description = "Password too short")
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, HttpError> {
    validated(&req)?;
    let rejected = || (StatusCode::BAD_REQUEST, INVALID_RESET_TOKEN.to_string());

    let record = state
        .db
        .get_reset_token(&req.token)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => rejected(),
            other => port_error(other),
        })?;

    if !record.is_valid() {
        warn!(user_id = %record.user_id, used = record.used, "Rejected stale reset token");
        return Err(rejected());
    }

    let hashed_password = hash_password(&req.new_password)?;
    state
        .db
        .complete_password_reset(record.id, record.user_id, &hashed_password)
        .await
        .map_err(|e| match e {
            // Claimed by a concurrent reset since the check above.
            PortError::Conflict(_) | PortError::NotFound(_) => rejected(),
            other => port_error(other),
        })?;
    info!(user_id = %record.user_id, "Password reset completed");

    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}

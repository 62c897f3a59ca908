pub mod auth;
pub mod drafts;
pub mod essays;
pub mod jwt;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod users;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::HttpError;
pub use middleware::require_auth;
use state::AppState;

/// A plain acknowledgement body.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Runs the request's validation rules; failures are a 422.
pub(crate) fn validated<T: Validate>(req: &T) -> Result<(), HttpError> {
    req.validate()
        .map_err(|errors| (StatusCode::UNPROCESSABLE_ENTITY, errors.to_string()))
}

/// Query-string bounds; failures are a 400.
pub(crate) fn validated_query<T: Validate>(query: &T) -> Result<(), HttpError> {
    query
        .validate()
        .map_err(|errors| (StatusCode::BAD_REQUEST, errors.to_string()))
}

/// Builds the full HTTP surface. Everything outside the public set requires a bearer token.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(rest::root_handler))
        .route("/health", get(rest::health_handler))
        .route("/api/users/register", post(auth::register_handler))
        .route("/api/users/login", post(auth::login_handler))
        .route("/api/users/forgot-password", post(auth::forgot_password_handler))
        .route(
            "/api/users/verify-reset-token/{token}",
            get(auth::verify_reset_token_handler),
        )
        .route("/api/users/reset-password", post(auth::reset_password_handler));

    let protected_routes = Router::new()
        .route(
            "/api/users/me",
            get(users::me_handler).delete(users::delete_me_handler),
        )
        .route("/api/users/me/settings", put(users::update_settings_handler))
        .route("/api/users/{id}", get(users::get_user_handler))
        .route("/api/essays/submit", post(essays::submit_essay_handler))
        .route("/api/essays", get(essays::list_essays_handler))
        .route(
            "/api/essays/{id}",
            get(essays::get_essay_handler).delete(essays::delete_essay_handler),
        )
        .route("/api/essays/{id}/analysis", get(essays::get_analysis_handler))
        .route(
            "/api/drafts",
            get(drafts::list_drafts_handler).post(drafts::create_draft_handler),
        )
        .route(
            "/api/drafts/{id}",
            get(drafts::get_draft_handler)
                .put(drafts::update_draft_handler)
                .delete(drafts::delete_draft_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

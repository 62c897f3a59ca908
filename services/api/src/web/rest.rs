//! services/api/src/web/rest.rs
//!
//! Service-level endpoints and the master definition for the OpenAPI specification.

use axum::response::Json;
use serde::Serialize;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};

use crate::web::{auth, drafts, essays, users, MessageResponse};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        root_handler,
        health_handler,
        auth::register_handler,
        auth::login_handler,
        auth::forgot_password_handler,
        auth::verify_reset_token_handler,
        auth::reset_password_handler,
        users::me_handler,
        users::update_settings_handler,
        users::delete_me_handler,
        users::get_user_handler,
        essays::submit_essay_handler,
        essays::list_essays_handler,
        essays::get_essay_handler,
        essays::get_analysis_handler,
        essays::delete_essay_handler,
        drafts::create_draft_handler,
        drafts::list_drafts_handler,
        drafts::get_draft_handler,
        drafts::update_draft_handler,
        drafts::delete_draft_handler,
    ),
    components(
        schemas(
            ServiceInfo,
            HealthStatus,
            MessageResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::TokenResponse,
            auth::ForgotPasswordRequest,
            auth::ResetPasswordRequest,
            auth::TokenValidity,
            users::UserResponse,
            users::SettingsRequest,
            essays::SubmitEssayRequest,
            essays::EssayResponse,
            essays::EssayListItem,
            essays::AnalysisResponse,
            drafts::CreateDraftRequest,
            drafts::UpdateDraftRequest,
            drafts::DraftResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Writing Coach API", description = "Scoring and feedback for Chinese essays.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by the protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

//=========================================================================================
// Service Endpoints
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ServiceInfo {
    pub message: String,
    pub status: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
}

/// GET / - Service banner
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is running", body = ServiceInfo))
)]
pub async fn root_handler() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Welcome to the Chinese Writing Coach API".to_string(),
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /health - Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthStatus))
)]
pub async fn health_handler() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
    })
}

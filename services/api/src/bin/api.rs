//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiCritiqueAdapter},
    config::Config,
    error::ApiError,
    web::{jwt::TokenKeys, rest::ApiDoc, router, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use writing_coach_core::{
    CritiqueClient, DatabaseService, HskDictionary, SubmissionWorkflow, VocabularyScorer,
};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");
    let db: Arc<dyn DatabaseService> = db_adapter;

    // --- 3. Load the Vocabulary Model ---
    let dictionary = Arc::new(HskDictionary::load(&config.hsk_vocabulary_path)?);
    let vocabulary = Arc::new(VocabularyScorer::with_jieba(dictionary));

    // --- 4. Initialize the Critique Oracle ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let critique = CritiqueClient::new(Arc::new(OpenAiCritiqueAdapter::new(
        openai_client,
        config.openai_model.clone(),
    )));

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db.clone(),
        config: config.clone(),
        submissions: SubmissionWorkflow::new(db, vocabulary, critique),
        tokens: TokenKeys::new(&config.jwt_secret, config.access_token_expire_minutes),
    });

    let frontend_origin = config.frontend_url.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!(
            "FRONTEND_URL '{}' is not a valid origin: {}",
            config.frontend_url, e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state))
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

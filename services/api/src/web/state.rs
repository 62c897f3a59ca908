//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::jwt::TokenKeys;
use std::sync::Arc;
use writing_coach_core::ports::DatabaseService;
use writing_coach_core::workflow::SubmissionWorkflow;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub submissions: SubmissionWorkflow,
    pub tokens: TokenKeys,
}

//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use vista_core::ports::{
    DatabaseService, PathwayGenerationService, PlanGenerationService, ProgramGenerationService,
    TitleGenerationService, TurnStreamService, VectorStoreService,
};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub turn_llm: Arc<dyn TurnStreamService>,
    pub vector_stores: Arc<dyn VectorStoreService>,
    pub pathway_llm: Arc<dyn PathwayGenerationService>,
    pub program_llm: Arc<dyn ProgramGenerationService>,
    pub plan_llm: Arc<dyn PlanGenerationService>,
    pub title_adapter: Arc<dyn TitleGenerationService>,
}

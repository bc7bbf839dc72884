use std::sync::Arc;

use crate::freshness::FreshnessManager;
use crate::search::SearchOrchestrator;
use crate::store::JobRepository;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres or in-memory, chosen by `JOB_STORE`.
    pub store: Arc<dyn JobRepository>,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub freshness: FreshnessManager,
}

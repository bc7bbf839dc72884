use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::errors::AppError;
use crate::freshness::FreshnessReport;
use crate::state::AppState;
use crate::store::{ClassifyCounts, PurgeReport};

#[derive(Debug, Default, Deserialize)]
pub struct PurgeRequest {
    #[serde(default)]
    pub force: bool,
}

/// GET /api/v1/jobs/freshness
pub async fn handle_freshness_report(
    State(state): State<AppState>,
) -> Result<Json<FreshnessReport>, AppError> {
    Ok(Json(state.freshness.report(Utc::now()).await?))
}

/// POST /api/v1/jobs/classify
pub async fn handle_classify(
    State(state): State<AppState>,
) -> Result<Json<ClassifyCounts>, AppError> {
    Ok(Json(state.freshness.classify(Utc::now()).await?))
}

/// POST /api/v1/jobs/purge
/// A refused purge is still a 200: the report says why nothing was deleted.
pub async fn handle_purge(
    State(state): State<AppState>,
    body: Option<Json<PurgeRequest>>,
) -> Result<Json<PurgeReport>, AppError> {
    let force = body.map(|Json(req)| req.force).unwrap_or(false);
    Ok(Json(state.freshness.purge(Utc::now(), force).await?))
}

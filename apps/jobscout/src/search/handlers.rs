use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::freshness::{bucket_for, FreshnessBucket};
use crate::models::{JobPosting, ProfileSearchRequest};
use crate::search::SearchOutcome;
use crate::state::AppState;
use crate::store::{JobQuery, SearchField};

const MAX_LIST_LIMIT: i64 = 200;

/// A stored posting plus the freshness bucket it currently falls into.
#[derive(Debug, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: JobPosting,
    pub freshness: FreshnessBucket,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

/// POST /api/v1/search
pub async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<ProfileSearchRequest>,
) -> Result<Json<SearchOutcome>, AppError> {
    request.validate()?;
    info!(
        "Search request: {} keywords, {} locations",
        request.keywords.len(),
        request.locations.len()
    );
    let outcome = state.orchestrator.run_search(&request).await?;
    Ok(Json(outcome))
}

/// GET /api/v1/jobs?q=&limit=
/// Substring search over every text field; most recently seen first.
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<Vec<JobView>>, AppError> {
    let limit = params.limit.unwrap_or(50);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_LIST_LIMIT}"
        )));
    }

    let query = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => JobQuery::matching(
            &[q.to_string()],
            &[
                SearchField::Title,
                SearchField::Description,
                SearchField::SourceTerm,
                SearchField::Industry,
            ],
            limit,
        ),
        _ => JobQuery::recent(limit),
    };
    let jobs = state.store.query(&query).await?;

    let now = Utc::now();
    let config = state.freshness.config();
    let views = jobs
        .into_iter()
        .map(|job| JobView {
            freshness: bucket_for(job.age(now), &config.thresholds, config.max_age),
            job,
        })
        .collect();
    Ok(Json(views))
}

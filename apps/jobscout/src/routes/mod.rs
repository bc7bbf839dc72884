pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::freshness::handlers as freshness;
use crate::search::handlers as search;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Search
        .route("/api/v1/search", post(search::handle_search))
        .route("/api/v1/jobs", get(search::handle_list_jobs))
        // Freshness maintenance
        .route("/api/v1/jobs/freshness", get(freshness::handle_freshness_report))
        .route("/api/v1/jobs/classify", post(freshness::handle_classify))
        .route("/api/v1/jobs/purge", post(freshness::handle_purge))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::freshness::{FreshnessConfig, FreshnessManager};
    use crate::matching::{MatcherConfig, RelevanceMatcher, ScoringTable};
    use crate::models::NormalizedPosting;
    use crate::scrape::errors::PageFailure;
    use crate::scrape::{JobSource, ScrapeFailed, ScrapeQuery};
    use crate::search::{SearchConfig, SearchOrchestrator};
    use crate::store::{InMemoryJobStore, JobRepository};

    struct BlockedSource;

    #[async_trait]
    impl JobSource for BlockedSource {
        async fn scrape(&self, _query: &ScrapeQuery) -> Result<Vec<NormalizedPosting>, ScrapeFailed> {
            Err(ScrapeFailed::FirstPage(PageFailure::ChallengeTimeout { attempts: 3 }))
        }
    }

    fn app() -> Router {
        let store: Arc<dyn JobRepository> = Arc::new(InMemoryJobStore::new());
        let matcher = RelevanceMatcher::new(store.clone(), ScoringTable::default(), MatcherConfig::default());
        let orchestrator = SearchOrchestrator::new(
            store.clone(),
            Arc::new(BlockedSource),
            matcher,
            SearchConfig::default(),
        );
        build_router(AppState {
            store: store.clone(),
            orchestrator: Arc::new(orchestrator),
            freshness: FreshnessManager::new(store, FreshnessConfig::default()),
        })
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_service_name() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "jobscout");
    }

    #[tokio::test]
    async fn test_search_without_any_data_is_503() {
        let response = app()
            .oneshot(post_json("/api/v1/search", r#"{"keywords":["data analyst"]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "NO_DATA_AVAILABLE");
    }

    #[tokio::test]
    async fn test_search_rejects_blank_keywords() {
        let response = app()
            .oneshot(post_json("/api/v1/search", r#"{"keywords":["  "]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_purge_on_empty_store_without_body() {
        let response = app()
            .oneshot(Request::builder().method("POST").uri("/api/v1/jobs/purge").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["deleted"], 0);
    }

    #[tokio::test]
    async fn test_list_jobs_validates_limit() {
        let response = app()
            .oneshot(Request::builder().uri("/api/v1/jobs?limit=0").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app()
            .oneshot(Request::builder().uri("/api/v1/jobs?q=rust").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!([]));
    }
}

//! Search Orchestrator: the single `run_search` entry point. Prefers live
//! data, degrades to the stored postings, and only fails outright when both
//! are unavailable.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::matching::{MatchResult, RelevanceMatcher};
use crate::models::{JobPosting, ProfileSearchRequest};
use crate::scrape::{JobSource, ScrapeQuery};
use crate::store::{JobRepository, StoreError};

pub mod handlers;
pub mod query;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchSource {
    Live,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub source: SearchSource,
    pub results: Vec<MatchResult>,
    pub new_jobs_stored: usize,
    pub partial_failures: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no live postings could be fetched and the job store is empty")]
    NoDataAvailable { partial_failures: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Scrape sessions run at the same time within one search.
    pub concurrency: usize,
    pub default_location: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            default_location: "copenhagen, denmark".to_string(),
        }
    }
}

enum TupleOutcome {
    Stored {
        postings: Vec<JobPosting>,
        created: usize,
    },
    Empty,
    Failed(String),
}

#[derive(Clone)]
pub struct SearchOrchestrator {
    store: Arc<dyn JobRepository>,
    source: Arc<dyn JobSource>,
    matcher: RelevanceMatcher,
    config: SearchConfig,
}

impl SearchOrchestrator {
    pub fn new(
        store: Arc<dyn JobRepository>,
        source: Arc<dyn JobSource>,
        matcher: RelevanceMatcher,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            source,
            matcher,
            config,
        }
    }

    /// Scrapes one tuple and upserts whatever it produced as one batch.
    async fn run_tuple(&self, query: ScrapeQuery) -> TupleOutcome {
        let label = query.label();
        let postings = match self.source.scrape(&query).await {
            Ok(postings) => postings,
            Err(e) => {
                warn!("Scrape failed for {label}: {e}");
                return TupleOutcome::Failed(format!("{label}: {e}"));
            }
        };
        if postings.is_empty() {
            info!("Scrape for {label} returned no postings");
            return TupleOutcome::Empty;
        }

        match self.store.upsert_batch(&postings, Utc::now()).await {
            Ok(batch) => {
                info!(
                    "Stored {} postings for {label} ({} new)",
                    batch.postings.len(),
                    batch.created
                );
                TupleOutcome::Stored {
                    postings: batch.postings,
                    created: batch.created,
                }
            }
            Err(e) => {
                warn!("Storing postings for {label} failed: {e}");
                TupleOutcome::Failed(format!("{label}: {e}"))
            }
        }
    }

    pub async fn run_search(
        &self,
        request: &ProfileSearchRequest,
    ) -> Result<SearchOutcome, SearchError> {
        let profile = request.profile();
        let queries = query::derive_queries(request, &self.config.default_location);
        info!("Running search with {} query tuples", queries.len());

        let outcomes: Vec<TupleOutcome> = stream::iter(queries)
            .map(|q| self.run_tuple(q))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut seeds: Vec<JobPosting> = Vec::new();
        let mut new_jobs_stored = 0;
        let mut partial_failures = Vec::new();
        let mut live = false;
        for outcome in outcomes {
            match outcome {
                TupleOutcome::Stored { postings, created } => {
                    live = true;
                    new_jobs_stored += created;
                    seeds.extend(postings);
                }
                TupleOutcome::Empty => {}
                TupleOutcome::Failed(reason) => partial_failures.push(reason),
            }
        }

        let now = Utc::now();
        if live {
            let results = self.matcher.rank(&profile, seeds, now).await?;
            info!(
                "Live search: {} results, {} new postings, {} failed tuples",
                results.len(),
                new_jobs_stored,
                partial_failures.len()
            );
            return Ok(SearchOutcome {
                source: SearchSource::Live,
                results,
                new_jobs_stored,
                partial_failures,
            });
        }

        warn!("No live postings; falling back to stored postings");
        if self.store.count().await? == 0 {
            return Err(SearchError::NoDataAvailable { partial_failures });
        }
        let results = self.matcher.match_stored(&profile, now).await?;
        Ok(SearchOutcome {
            source: SearchSource::Fallback,
            results,
            new_jobs_stored,
            partial_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{MatcherConfig, ScoringTable};
    use crate::models::{ExperienceLevel, NormalizedPosting, RemotePreference};
    use crate::scrape::errors::PageFailure;
    use crate::scrape::ScrapeFailed;
    use crate::store::InMemoryJobStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Scripted source: keyed by search keywords; unknown keywords fail.
    struct FakeSource {
        results: HashMap<String, usize>,
    }

    #[async_trait]
    impl JobSource for FakeSource {
        async fn scrape(&self, query: &ScrapeQuery) -> Result<Vec<NormalizedPosting>, ScrapeFailed> {
            let Some(n) = self.results.get(&query.keywords) else {
                return Err(ScrapeFailed::FirstPage(PageFailure::ChallengeTimeout { attempts: 3 }));
            };
            Ok((0..*n)
                .map(|i| NormalizedPosting {
                    canonical_url: format!("https://dk.indeed.com/viewjob?jk={}-{i}", query.keywords),
                    title: format!("{} {i}", query.keywords),
                    company: "Acme".to_string(),
                    location: "Aarhus".to_string(),
                    description: String::new(),
                    job_type: query.job_type.clone(),
                    is_remote: query.remote,
                    industry: None,
                    source_term: query.keywords.clone(),
                    source_location: query.location.clone(),
                    posted_at: None,
                })
                .collect())
        }
    }

    fn orchestrator(store: Arc<InMemoryJobStore>, results: &[(&str, usize)]) -> SearchOrchestrator {
        let source = FakeSource {
            results: results.iter().map(|(k, n)| (k.to_string(), *n)).collect(),
        };
        let matcher = RelevanceMatcher::new(store.clone(), ScoringTable::default(), MatcherConfig::default());
        SearchOrchestrator::new(store, Arc::new(source), matcher, SearchConfig::default())
    }

    fn request(keywords: &[&str]) -> ProfileSearchRequest {
        ProfileSearchRequest {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            skills: vec![],
            field: String::new(),
            experience_level: ExperienceLevel::Mid,
            locations: vec![],
            job_types: vec![],
            remote_preference: RemotePreference::NoPreference,
            max_results_per_query: 50,
        }
    }

    #[tokio::test]
    async fn test_one_failed_tuple_still_live() {
        let store = Arc::new(InMemoryJobStore::new());
        let orch = orchestrator(store.clone(), &[("data analyst", 5)]);

        let outcome = orch.run_search(&request(&["data analyst", "blocked"])).await.unwrap();

        assert_eq!(outcome.source, SearchSource::Live);
        assert_eq!(outcome.partial_failures.len(), 1);
        assert!(outcome.partial_failures[0].contains("blocked"));
        assert_eq!(outcome.new_jobs_stored, 5);
        assert_eq!(outcome.results.len(), 5);
        assert_eq!(store.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_repeat_search_refreshes_instead_of_duplicating() {
        let store = Arc::new(InMemoryJobStore::new());
        let orch = orchestrator(store.clone(), &[("rust", 3)]);

        orch.run_search(&request(&["rust"])).await.unwrap();
        let second = orch.run_search(&request(&["rust"])).await.unwrap();

        assert_eq!(second.new_jobs_stored, 0);
        assert_eq!(store.count().await.unwrap(), 3);
        assert!(second.results.iter().all(|r| r.job.refresh_count == 2));
    }

    #[tokio::test]
    async fn test_all_failed_falls_back_to_store() {
        let store = Arc::new(InMemoryJobStore::new());
        store
            .upsert(
                &NormalizedPosting {
                    canonical_url: "https://dk.indeed.com/viewjob?jk=old".to_string(),
                    title: "Data Analyst".to_string(),
                    company: "Acme".to_string(),
                    location: "Aarhus".to_string(),
                    description: String::new(),
                    job_type: "fulltime".to_string(),
                    is_remote: None,
                    industry: None,
                    source_term: "data analyst".to_string(),
                    source_location: "aarhus, denmark".to_string(),
                    posted_at: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let orch = orchestrator(store, &[]);

        let outcome = orch.run_search(&request(&["data analyst"])).await.unwrap();
        assert_eq!(outcome.source, SearchSource::Fallback);
        assert_eq!(outcome.partial_failures.len(), 1);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.new_jobs_stored, 0);
    }

    #[tokio::test]
    async fn test_all_failed_and_empty_store_is_no_data() {
        let store = Arc::new(InMemoryJobStore::new());
        let orch = orchestrator(store, &[]);

        let err = orch.run_search(&request(&["a", "b"])).await.unwrap_err();
        match err {
            SearchError::NoDataAvailable { partial_failures } => assert_eq!(partial_failures.len(), 2),
            other => panic!("expected NoDataAvailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_live_results_use_fallback() {
        let store = Arc::new(InMemoryJobStore::new());
        let orch = orchestrator(store, &[("rust", 0)]);
        let err = orch.run_search(&request(&["rust"])).await.unwrap_err();
        assert!(matches!(err, SearchError::NoDataAvailable { ref partial_failures } if partial_failures.is_empty()));
    }

    #[tokio::test]
    async fn test_store_with_only_incomplete_rows_still_falls_back() {
        let store = Arc::new(InMemoryJobStore::new());
        store
            .upsert(
                &NormalizedPosting {
                    canonical_url: "https://dk.indeed.com/viewjob?jk=anon".to_string(),
                    title: "Warehouse Assistant".to_string(),
                    company: String::new(),
                    location: "Odense".to_string(),
                    description: String::new(),
                    job_type: "parttime".to_string(),
                    is_remote: None,
                    industry: None,
                    source_term: "warehouse".to_string(),
                    source_location: "odense, denmark".to_string(),
                    posted_at: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let orch = orchestrator(store, &[]);

        let outcome = orch.run_search(&request(&["data analyst"])).await.unwrap();
        assert_eq!(outcome.source, SearchSource::Fallback);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].match_type, crate::matching::MatchType::RecentFallback);
    }
}

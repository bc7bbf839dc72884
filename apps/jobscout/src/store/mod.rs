//! Job Store: durable upsert-by-canonical-URL plus the queries the matcher and
//! freshness manager need.
//!
//! `AppState` carries an `Arc<dyn JobRepository>`; the PostgreSQL backend is the
//! production store, the in-memory backend has identical semantics and backs
//! tests and `JOB_STORE=memory` runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::freshness::PurgeGuard;
use crate::models::{JobPosting, NormalizedPosting};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryJobStore;
pub use postgres::PgJobStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Columns a substring predicate may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Title,
    Description,
    SourceTerm,
    Industry,
}

impl SearchField {
    pub fn column(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Description => "description",
            SearchField::SourceTerm => "source_term",
            SearchField::Industry => "industry",
        }
    }

    pub fn value<'a>(&self, job: &'a JobPosting) -> &'a str {
        match self {
            SearchField::Title => &job.title,
            SearchField::Description => &job.description,
            SearchField::SourceTerm => &job.source_term,
            SearchField::Industry => job.industry.as_deref().unwrap_or(""),
        }
    }
}

/// Filter for `JobRepository::query`.
///
/// A row matches when any term is a case-insensitive substring of any listed
/// field. No terms means "no filter": the most recently seen rows are returned.
/// Results are always ordered by `last_seen_at` descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobQuery {
    pub terms: Vec<String>,
    pub fields: Vec<SearchField>,
    /// Skip rows with an empty title or company.
    pub require_title_and_company: bool,
    pub limit: i64,
}

impl JobQuery {
    pub fn recent(limit: i64) -> Self {
        Self {
            terms: Vec::new(),
            fields: Vec::new(),
            require_title_and_company: false,
            limit,
        }
    }

    pub fn matching(terms: &[String], fields: &[SearchField], limit: i64) -> Self {
        Self {
            terms: terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            fields: fields.to_vec(),
            require_title_and_company: false,
            limit,
        }
    }

    pub fn quality_only(mut self) -> Self {
        self.require_title_and_company = true;
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.terms.is_empty() || self.fields.is_empty()
    }

    /// In-process evaluation of the predicate; mirrors the SQL the PostgreSQL
    /// backend builds.
    pub fn matches(&self, job: &JobPosting) -> bool {
        if self.require_title_and_company && (job.title.is_empty() || job.company.is_empty()) {
            return false;
        }
        if self.is_unfiltered() {
            return true;
        }
        self.fields.iter().any(|field| {
            let haystack = field.value(job).to_lowercase();
            self.terms.iter().any(|term| haystack.contains(term.as_str()))
        })
    }
}

/// Result of upserting one posting.
#[derive(Debug, Clone)]
pub struct UpsertResult {
    pub posting: JobPosting,
    /// True when the canonical URL was not stored before.
    pub created: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BatchUpsert {
    pub postings: Vec<JobPosting>,
    pub created: usize,
    pub refreshed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyCounts {
    pub active: i64,
    pub stale: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub total: i64,
    pub eligible: i64,
    pub deleted: i64,
    /// Set when the guard blocked the run; nothing was deleted.
    pub refused: bool,
    pub forced: bool,
    pub purged_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Inserts a new row (`first_seen_at = last_seen_at = now`, `refresh_count = 1`)
    /// or refreshes the existing one (`last_seen_at = now`, `refresh_count += 1`).
    /// Atomic per canonical URL.
    async fn upsert(
        &self,
        posting: &NormalizedPosting,
        now: DateTime<Utc>,
    ) -> Result<UpsertResult, StoreError>;

    /// Upserts a batch as one unit: a failure leaves none of it applied.
    async fn upsert_batch(
        &self,
        postings: &[NormalizedPosting],
        now: DateTime<Utc>,
    ) -> Result<BatchUpsert, StoreError>;

    async fn query(&self, query: &JobQuery) -> Result<Vec<JobPosting>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// Rows with `last_seen_at < cutoff`.
    async fn count_seen_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError>;

    /// Rows with `last_seen_at <= cutoff`.
    async fn count_seen_at_or_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError>;

    /// Recomputes `status` for every row: `Stale` iff `last_seen_at < stale_before`.
    async fn classify(&self, stale_before: DateTime<Utc>) -> Result<ClassifyCounts, StoreError>;

    /// Deletes rows with `last_seen_at < cutoff` unless the guard refuses.
    /// Counting, the guard decision and the delete share one transaction.
    async fn purge_seen_before(
        &self,
        cutoff: DateTime<Utc>,
        guard: PurgeGuard,
        now: DateTime<Utc>,
    ) -> Result<PurgeReport, StoreError>;

    async fn last_purge_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Writes the last-known relevance score cache.
    async fn record_scores(&self, scores: &[(String, i32)]) -> Result<(), StoreError>;
}

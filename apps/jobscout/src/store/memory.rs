use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    BatchUpsert, ClassifyCounts, JobQuery, JobRepository, PurgeReport, StoreError, UpsertResult,
};
use crate::freshness::PurgeGuard;
use crate::models::{JobPosting, JobStatus, NormalizedPosting};

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, JobPosting>,
    last_purge_at: Option<DateTime<Utc>>,
}

/// Process-local job store. Every operation takes the lock once, which gives
/// the same per-URL atomicity and all-or-nothing batches as the database.
#[derive(Default)]
pub struct InMemoryJobStore {
    inner: RwLock<Inner>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert_locked(inner: &mut Inner, posting: &NormalizedPosting, now: DateTime<Utc>) -> UpsertResult {
    match inner.jobs.get_mut(&posting.canonical_url) {
        Some(existing) => {
            existing.observe_again(posting, now);
            UpsertResult {
                posting: existing.clone(),
                created: false,
            }
        }
        None => {
            let job = JobPosting::first_observation(posting, now);
            inner.jobs.insert(job.canonical_url.clone(), job.clone());
            UpsertResult {
                posting: job,
                created: true,
            }
        }
    }
}

#[async_trait]
impl JobRepository for InMemoryJobStore {
    async fn upsert(
        &self,
        posting: &NormalizedPosting,
        now: DateTime<Utc>,
    ) -> Result<UpsertResult, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(upsert_locked(&mut inner, posting, now))
    }

    async fn upsert_batch(
        &self,
        postings: &[NormalizedPosting],
        now: DateTime<Utc>,
    ) -> Result<BatchUpsert, StoreError> {
        let mut inner = self.inner.write().await;
        let mut batch = BatchUpsert::default();
        for posting in postings {
            let result = upsert_locked(&mut inner, posting, now);
            if result.created {
                batch.created += 1;
            } else {
                batch.refreshed += 1;
            }
            batch.postings.push(result.posting);
        }
        Ok(batch)
    }

    async fn query(&self, query: &JobQuery) -> Result<Vec<JobPosting>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<JobPosting> = inner
            .jobs
            .values()
            .filter(|job| query.matches(job))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.last_seen_at
                .cmp(&a.last_seen_at)
                .then_with(|| a.canonical_url.cmp(&b.canonical_url))
        });
        rows.truncate(query.limit.max(0) as usize);
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().await.jobs.len() as i64)
    }

    async fn count_seen_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.jobs.values().filter(|j| j.last_seen_at < cutoff).count() as i64)
    }

    async fn count_seen_at_or_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.jobs.values().filter(|j| j.last_seen_at <= cutoff).count() as i64)
    }

    async fn classify(&self, stale_before: DateTime<Utc>) -> Result<ClassifyCounts, StoreError> {
        let mut inner = self.inner.write().await;
        let mut counts = ClassifyCounts::default();
        for job in inner.jobs.values_mut() {
            job.status = JobStatus::classify(job.last_seen_at, stale_before);
            match job.status {
                JobStatus::Active => counts.active += 1,
                JobStatus::Stale => counts.stale += 1,
            }
        }
        Ok(counts)
    }

    async fn purge_seen_before(
        &self,
        cutoff: DateTime<Utc>,
        guard: PurgeGuard,
        now: DateTime<Utc>,
    ) -> Result<PurgeReport, StoreError> {
        let mut inner = self.inner.write().await;
        let total = inner.jobs.len() as i64;
        let eligible = inner.jobs.values().filter(|j| j.last_seen_at < cutoff).count() as i64;

        if !guard.allows(total, eligible) {
            return Ok(PurgeReport {
                total,
                eligible,
                deleted: 0,
                refused: true,
                forced: guard.force,
                purged_at: None,
            });
        }

        inner.jobs.retain(|_, j| j.last_seen_at >= cutoff);
        inner.last_purge_at = Some(now);
        Ok(PurgeReport {
            total,
            eligible,
            deleted: eligible,
            refused: false,
            forced: guard.force,
            purged_at: Some(now),
        })
    }

    async fn last_purge_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.inner.read().await.last_purge_at)
    }

    async fn record_scores(&self, scores: &[(String, i32)]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for (url, score) in scores {
            if let Some(job) = inner.jobs.get_mut(url) {
                job.last_match_score = Some(*score);
            }
        }
        Ok(())
    }
}

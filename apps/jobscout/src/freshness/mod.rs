//! Freshness Manager: reclassifies stored postings by age and purges the ones
//! past `max_age`, behind a guard that refuses runs deleting too much at once.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::{ClassifyCounts, JobRepository, PurgeReport, StoreError};

pub mod handlers;

/// Informational age buckets, in days since `last_seen_at`. Upper bounds are
/// exclusive: a posting exactly 7 days old is already `Recent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessThresholds {
    pub fresh_days: i64,
    pub recent_days: i64,
    pub aging_days: i64,
}

impl Default for FreshnessThresholds {
    fn default() -> Self {
        Self {
            fresh_days: 7,
            recent_days: 14,
            aging_days: 21,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessBucket {
    Fresh,
    Recent,
    Aging,
    /// Past the aging bucket but not yet purge-eligible.
    Stale,
    PurgeEligible,
}

pub fn bucket_for(age: Duration, thresholds: &FreshnessThresholds, max_age: Duration) -> FreshnessBucket {
    if age > max_age {
        FreshnessBucket::PurgeEligible
    } else if age < Duration::days(thresholds.fresh_days) {
        FreshnessBucket::Fresh
    } else if age < Duration::days(thresholds.recent_days) {
        FreshnessBucket::Recent
    } else if age < Duration::days(thresholds.aging_days) {
        FreshnessBucket::Aging
    } else {
        FreshnessBucket::Stale
    }
}

/// Protects against a misconfigured `max_age` wiping the store in one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurgeGuard {
    /// Largest share of the store one unforced run may delete, in `[0, 1]`.
    pub max_fraction: f64,
    pub force: bool,
}

impl PurgeGuard {
    pub fn allows(&self, total: i64, eligible: i64) -> bool {
        if self.force || eligible == 0 {
            return true;
        }
        if total <= 0 {
            return false;
        }
        (eligible as f64 / total as f64) <= self.max_fraction
    }
}

#[derive(Debug, Clone)]
pub struct FreshnessConfig {
    pub stale_after: Duration,
    pub max_age: Duration,
    pub thresholds: FreshnessThresholds,
    pub purge_max_fraction: f64,
    /// Minimum time between two scheduled purges.
    pub purge_interval: Duration,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::days(21),
            max_age: Duration::days(30),
            thresholds: FreshnessThresholds::default(),
            purge_max_fraction: 0.5,
            purge_interval: Duration::hours(168),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreshnessReport {
    pub total: i64,
    pub fresh: i64,
    pub recent: i64,
    pub aging: i64,
    pub stale: i64,
    pub purge_eligible: i64,
    pub last_purge_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub classified: ClassifyCounts,
    /// `None` when the purge cadence was not due.
    pub purge: Option<PurgeReport>,
}

#[derive(Clone)]
pub struct FreshnessManager {
    store: Arc<dyn JobRepository>,
    config: FreshnessConfig,
}

impl FreshnessManager {
    pub fn new(store: Arc<dyn JobRepository>, config: FreshnessConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &FreshnessConfig {
        &self.config
    }

    /// Recomputes `status` for every row. Idempotent.
    pub async fn classify(&self, now: DateTime<Utc>) -> Result<ClassifyCounts, StoreError> {
        let counts = self.store.classify(now - self.config.stale_after).await?;
        info!(
            "Freshness classification: {} active, {} stale",
            counts.active, counts.stale
        );
        Ok(counts)
    }

    /// Deletes rows unseen for longer than `max_age`, subject to the guard.
    pub async fn purge(&self, now: DateTime<Utc>, force: bool) -> Result<PurgeReport, StoreError> {
        let guard = PurgeGuard {
            max_fraction: self.config.purge_max_fraction,
            force,
        };
        let report = self
            .store
            .purge_seen_before(now - self.config.max_age, guard, now)
            .await?;

        if report.refused {
            warn!(
                "Purge refused: {} of {} postings are older than {} days (limit {:.0}%); pass force to override",
                report.eligible,
                report.total,
                self.config.max_age.num_days(),
                self.config.purge_max_fraction * 100.0
            );
        } else {
            info!("Purged {} of {} postings", report.deleted, report.total);
        }
        Ok(report)
    }

    pub async fn report(&self, now: DateTime<Utc>) -> Result<FreshnessReport, StoreError> {
        let t = &self.config.thresholds;
        let total = self.store.count().await?;
        let eligible = self.store.count_seen_before(now - self.config.max_age).await?;
        // Purge-eligible rows leave the informational buckets, so a short
        // max_age empties the older buckets rather than driving them negative.
        let older = |days: i64| {
            let cutoff = now - Duration::days(days);
            async move {
                Ok::<_, StoreError>(self.store.count_seen_at_or_before(cutoff).await?.max(eligible))
            }
        };
        let older_fresh = older(t.fresh_days).await?;
        let older_recent = older(t.recent_days).await?;
        let older_aging = older(t.aging_days).await?;

        Ok(FreshnessReport {
            total,
            fresh: total - older_fresh,
            recent: older_fresh - older_recent,
            aging: older_recent - older_aging,
            stale: older_aging - eligible,
            purge_eligible: eligible,
            last_purge_at: self.store.last_purge_at().await?,
        })
    }

    pub fn purge_due(&self, last_purge_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_purge_at {
            None => true,
            Some(last) => now - last >= self.config.purge_interval,
        }
    }

    /// Scheduled pass: always classify, purge (never forced) only when due.
    pub async fn run_maintenance(&self, now: DateTime<Utc>) -> Result<MaintenanceReport, StoreError> {
        let classified = self.classify(now).await?;
        let last = self.store.last_purge_at().await?;
        let purge = if self.purge_due(last, now) {
            Some(self.purge(now, false).await?)
        } else {
            None
        };
        Ok(MaintenanceReport { classified, purge })
    }

    /// Runs `run_maintenance` on a fixed interval until the task is dropped.
    pub async fn run_forever(self, every: std::time::Duration) {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_maintenance(Utc::now()).await {
                warn!("Freshness maintenance failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NormalizedPosting;
    use crate::store::{InMemoryJobStore, JobQuery};

    fn posting(n: usize) -> NormalizedPosting {
        NormalizedPosting {
            canonical_url: format!("https://jobs.example/view?jk={n}"),
            title: format!("Job {n}"),
            company: "Acme".to_string(),
            location: "Odense".to_string(),
            description: String::new(),
            job_type: "fulltime".to_string(),
            is_remote: None,
            industry: None,
            source_term: "job".to_string(),
            source_location: "odense, denmark".to_string(),
            posted_at: None,
        }
    }

    async fn seed(store: &InMemoryJobStore, ages_days: &[i64], now: DateTime<Utc>) {
        for (n, age) in ages_days.iter().enumerate() {
            store
                .upsert(&posting(n), now - Duration::days(*age))
                .await
                .unwrap();
        }
    }

    fn manager(store: Arc<InMemoryJobStore>) -> FreshnessManager {
        FreshnessManager::new(store, FreshnessConfig::default())
    }

    #[test]
    fn test_bucket_boundaries() {
        let t = FreshnessThresholds::default();
        let max_age = Duration::days(30);
        assert_eq!(bucket_for(Duration::days(2), &t, max_age), FreshnessBucket::Fresh);
        assert_eq!(bucket_for(Duration::days(6), &t, max_age), FreshnessBucket::Fresh);
        assert_eq!(bucket_for(Duration::days(7), &t, max_age), FreshnessBucket::Recent);
        assert_eq!(bucket_for(Duration::days(14), &t, max_age), FreshnessBucket::Aging);
        assert_eq!(bucket_for(Duration::days(21), &t, max_age), FreshnessBucket::Stale);
        assert_eq!(bucket_for(Duration::days(30), &t, max_age), FreshnessBucket::Stale);
        assert_eq!(bucket_for(Duration::days(20), &t, max_age), FreshnessBucket::Aging);
        assert_eq!(bucket_for(Duration::days(25), &t, max_age), FreshnessBucket::Stale);
        assert_eq!(bucket_for(Duration::days(31), &t, max_age), FreshnessBucket::PurgeEligible);
    }

    #[test]
    fn test_guard_refuses_above_fraction_unless_forced() {
        let guard = PurgeGuard { max_fraction: 0.5, force: false };
        assert!(guard.allows(10, 5));
        assert!(!guard.allows(10, 8));
        assert!(guard.allows(10, 0));
        assert!(PurgeGuard { force: true, ..guard }.allows(10, 10));
    }

    #[test]
    fn test_purge_due_respects_interval() {
        let m = manager(Arc::new(InMemoryJobStore::new()));
        let now = Utc::now();
        assert!(m.purge_due(None, now));
        assert!(!m.purge_due(Some(now - Duration::hours(1)), now));
        assert!(m.purge_due(Some(now - Duration::days(8)), now));
    }

    #[tokio::test]
    async fn test_purge_refuses_when_most_rows_are_old() {
        let store = Arc::new(InMemoryJobStore::new());
        let now = Utc::now();
        // 8 of 10 rows older than 30 days
        seed(&store, &[40, 40, 40, 40, 40, 40, 40, 40, 1, 2], now).await;
        let m = manager(store.clone());

        let report = m.purge(now, false).await.unwrap();
        assert!(report.refused, "80% purge must be refused without force");
        assert_eq!(report.deleted, 0);
        assert_eq!(report.eligible, 8);
        assert_eq!(store.count().await.unwrap(), 10);
        assert_eq!(store.last_purge_at().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forced_purge_deletes_old_rows() {
        let store = Arc::new(InMemoryJobStore::new());
        let now = Utc::now();
        seed(&store, &[40, 40, 40, 40, 1], now).await;
        let m = manager(store.clone());

        let report = m.purge(now, true).await.unwrap();
        assert!(!report.refused);
        assert_eq!(report.deleted, 4);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.last_purge_at().await.unwrap(), Some(now));
    }

    #[tokio::test]
    async fn test_classify_is_idempotent() {
        let store = Arc::new(InMemoryJobStore::new());
        let now = Utc::now();
        seed(&store, &[1, 10, 25, 28], now).await;
        let m = manager(store.clone());

        let first = m.classify(now).await.unwrap();
        let second = m.classify(now).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, ClassifyCounts { active: 2, stale: 2 });

        let all = store.query(&JobQuery::recent(10)).await.unwrap();
        assert_eq!(all.iter().filter(|j| j.status == crate::models::JobStatus::Stale).count(), 2);
    }

    #[tokio::test]
    async fn test_report_counts_each_bucket() {
        let store = Arc::new(InMemoryJobStore::new());
        let now = Utc::now();
        seed(&store, &[1, 2, 8, 15, 25, 35], now).await;
        let m = manager(store);

        let report = m.report(now).await.unwrap();
        assert_eq!(report.total, 6);
        assert_eq!(report.fresh, 2);
        assert_eq!(report.recent, 1);
        assert_eq!(report.aging, 1);
        assert_eq!(report.stale, 1);
        assert_eq!(report.purge_eligible, 1);
    }

    #[tokio::test]
    async fn test_report_boundaries_match_bucket_for() {
        let store = Arc::new(InMemoryJobStore::new());
        let now = Utc::now();
        seed(&store, &[7, 14, 21], now).await;
        let m = manager(store);

        let report = m.report(now).await.unwrap();
        assert_eq!(report.fresh, 0, "exactly 7 days old is no longer fresh");
        assert_eq!((report.recent, report.aging, report.stale), (1, 1, 1));
        assert_eq!(report.purge_eligible, 0);
    }

    #[tokio::test]
    async fn test_report_with_short_max_age_never_goes_negative() {
        let store = Arc::new(InMemoryJobStore::new());
        let now = Utc::now();
        seed(&store, &[1, 8, 15, 25], now).await;
        let m = FreshnessManager::new(
            store,
            FreshnessConfig {
                max_age: Duration::days(5),
                ..FreshnessConfig::default()
            },
        );

        let report = m.report(now).await.unwrap();
        assert_eq!(report.fresh, 1);
        assert_eq!((report.recent, report.aging, report.stale), (0, 0, 0));
        assert_eq!(report.purge_eligible, 3);
    }

    #[tokio::test]
    async fn test_maintenance_skips_purge_when_not_due() {
        let store = Arc::new(InMemoryJobStore::new());
        let now = Utc::now();
        seed(&store, &[1, 2, 3, 40], now).await;
        let m = manager(store.clone());

        let first = m.run_maintenance(now).await.unwrap();
        assert_eq!(first.purge.as_ref().map(|p| p.deleted), Some(1));

        let second = m.run_maintenance(now + Duration::hours(1)).await.unwrap();
        assert!(second.purge.is_none());
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a stored posting. Derived from `last_seen_at` age by the
/// freshness classifier; never set directly by callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Active,
    Stale,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Stale => "stale",
        }
    }

    /// Parses the persisted column value. Unknown values read as `Active` since
    /// the next classification pass recomputes the column anyway.
    pub fn from_db(value: &str) -> Self {
        match value {
            "stale" => JobStatus::Stale,
            _ => JobStatus::Active,
        }
    }

    /// `Stale` iff the row was last seen strictly before `stale_before`
    /// (`now - last_seen_at > stale_after`).
    pub fn classify(last_seen_at: DateTime<Utc>, stale_before: DateTime<Utc>) -> Self {
        if last_seen_at < stale_before {
            JobStatus::Stale
        } else {
            JobStatus::Active
        }
    }
}

/// One stored listing, keyed by `canonical_url`.
///
/// Owned by the job store. Everything else works on snapshots of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: Uuid,
    pub canonical_url: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub job_type: String,
    pub is_remote: Option<bool>,
    pub industry: Option<String>,
    pub source_term: String,
    pub source_location: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: JobStatus,
    pub refresh_count: i32,
    /// Last relevance score computed for this posting. A cache, not authoritative.
    pub last_match_score: Option<i32>,
}

impl JobPosting {
    /// Builds the row inserted the first time a canonical URL is observed.
    pub fn first_observation(posting: &NormalizedPosting, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            canonical_url: posting.canonical_url.clone(),
            title: posting.title.clone(),
            company: posting.company.clone(),
            location: posting.location.clone(),
            description: posting.description.clone(),
            job_type: posting.job_type.clone(),
            is_remote: posting.is_remote,
            industry: posting.industry.clone(),
            source_term: posting.source_term.clone(),
            source_location: posting.source_location.clone(),
            posted_at: posting.posted_at,
            first_seen_at: now,
            last_seen_at: now,
            status: JobStatus::Active,
            refresh_count: 1,
            last_match_score: None,
        }
    }

    /// Applies a re-observation of the same canonical URL.
    ///
    /// `first_seen_at` is never touched and `last_seen_at` never moves backwards.
    /// Listing fields that were empty on the stored row are filled in.
    pub fn observe_again(&mut self, posting: &NormalizedPosting, now: DateTime<Utc>) {
        self.last_seen_at = self.last_seen_at.max(now);
        self.refresh_count += 1;
        self.status = JobStatus::Active;
        if self.description.is_empty() {
            self.description = posting.description.clone();
        }
        if self.industry.is_none() {
            self.industry = posting.industry.clone();
        }
        if self.posted_at.is_none() {
            self.posted_at = posting.posted_at;
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_seen_at
    }
}

/// A posting as emitted by a scrape session, before it reaches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPosting {
    pub canonical_url: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub job_type: String,
    pub is_remote: Option<bool>,
    pub industry: Option<String>,
    pub source_term: String,
    pub source_location: String,
    pub posted_at: Option<DateTime<Utc>>,
}

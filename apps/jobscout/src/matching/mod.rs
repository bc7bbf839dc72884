//! Relevance Matcher: turns a profile plus Job Store contents into a ranked,
//! deduplicated list of `MatchResult`s.
//!
//! Passes (keyword, field, skill, recency fallback) only discover candidates.
//! Candidates are merged on their natural key and then scored once through
//! `ScoringTable::score`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{JobPosting, UserProfile};
use crate::store::{JobQuery, JobRepository, SearchField, StoreError};

pub mod fields;
pub mod scoring;
pub mod seniority;

pub use scoring::ScoringTable;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// Which discovery pass found a candidate. Ordered best-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchType {
    Keyword,
    Field,
    Skill,
    RecentFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub job: JobPosting,
    pub score: i32,
    pub match_type: MatchType,
}

#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Results returned per call.
    pub limit: usize,
    /// Below this many relevance candidates the recency fallback kicks in.
    pub min_candidates: usize,
    pub fallback_limit: i64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            limit: 50,
            min_candidates: 10,
            fallback_limit: 30,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    job: JobPosting,
    match_type: MatchType,
}

// ────────────────────────────────────────────────────────────────────────────
// Discovery passes
// ────────────────────────────────────────────────────────────────────────────

const KEYWORD_FIELDS: &[SearchField] = &[
    SearchField::Title,
    SearchField::Description,
    SearchField::SourceTerm,
];
const FIELD_FIELDS: &[SearchField] = &[
    SearchField::Description,
    SearchField::Title,
    SearchField::Industry,
];
const SKILL_FIELDS: &[SearchField] = &[SearchField::Title, SearchField::Description];

struct Passes {
    keyword: Option<JobQuery>,
    field: Option<JobQuery>,
    skill: Option<JobQuery>,
}

impl Passes {
    fn for_profile(profile: &UserProfile, field_terms: &[String], limit: i64) -> Self {
        let build = |terms: &[String], fields: &[SearchField], limit: i64| {
            let query = JobQuery::matching(terms, fields, limit);
            (!query.is_unfiltered()).then_some(query)
        };
        Self {
            keyword: build(&profile.keywords, KEYWORD_FIELDS, limit * 2),
            field: build(field_terms, FIELD_FIELDS, limit),
            skill: build(&profile.skills, SKILL_FIELDS, limit),
        }
    }

    fn in_order(&self) -> impl Iterator<Item = (MatchType, &JobQuery)> {
        [
            (MatchType::Keyword, self.keyword.as_ref()),
            (MatchType::Field, self.field.as_ref()),
            (MatchType::Skill, self.skill.as_ref()),
        ]
        .into_iter()
        .filter_map(|(t, q)| q.map(|q| (t, q)))
    }

    /// Tags a posting that did not come from a store query.
    fn classify(&self, job: &JobPosting) -> MatchType {
        self.in_order()
            .find(|(_, q)| q.matches(job))
            .map(|(t, _)| t)
            .unwrap_or(MatchType::RecentFallback)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Merge
// ────────────────────────────────────────────────────────────────────────────

fn natural_key(job: &JobPosting) -> (String, String, String) {
    (
        job.title.trim().to_lowercase(),
        job.company.trim().to_lowercase(),
        job.location.trim().to_lowercase(),
    )
}

/// Collapses candidates sharing a canonical URL or a natural key. The survivor
/// keeps the best match type and the most recently seen snapshot.
fn merge_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut merged: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut by_url: HashMap<String, usize> = HashMap::new();
    let mut by_key: HashMap<(String, String, String), usize> = HashMap::new();

    for candidate in candidates {
        let key = natural_key(&candidate.job);
        let existing = by_url
            .get(&candidate.job.canonical_url)
            .or_else(|| by_key.get(&key))
            .copied();

        match existing {
            Some(idx) => {
                let kept = &mut merged[idx];
                kept.match_type = kept.match_type.min(candidate.match_type);
                by_url.insert(candidate.job.canonical_url.clone(), idx);
                by_key.entry(key).or_insert(idx);
                if candidate.job.last_seen_at > kept.job.last_seen_at {
                    kept.job = candidate.job;
                }
            }
            None => {
                let idx = merged.len();
                by_url.insert(candidate.job.canonical_url.clone(), idx);
                by_key.insert(key, idx);
                merged.push(candidate);
            }
        }
    }
    merged
}

// ────────────────────────────────────────────────────────────────────────────
// RelevanceMatcher
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RelevanceMatcher {
    store: Arc<dyn JobRepository>,
    table: ScoringTable,
    config: MatcherConfig,
}

impl RelevanceMatcher {
    pub fn new(store: Arc<dyn JobRepository>, table: ScoringTable, config: MatcherConfig) -> Self {
        Self {
            store,
            table,
            config,
        }
    }

    /// Ranks stored postings only.
    pub async fn match_stored(
        &self,
        profile: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchResult>, StoreError> {
        self.rank(profile, Vec::new(), now).await
    }

    /// Ranks `seeds` (postings just upserted by a live search) together with
    /// whatever the store passes discover.
    pub async fn rank(
        &self,
        profile: &UserProfile,
        seeds: Vec<JobPosting>,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchResult>, StoreError> {
        let limit = self.config.limit.max(1) as i64;
        let field_terms = fields::field_terms(&profile.field);
        let passes = Passes::for_profile(profile, &field_terms, limit);

        let mut candidates: Vec<Candidate> = seeds
            .into_iter()
            .map(|job| Candidate {
                match_type: passes.classify(&job),
                job,
            })
            .collect();

        for (match_type, query) in passes.in_order() {
            let found = self.store.query(query).await?;
            debug!("{:?} pass found {} candidates", match_type, found.len());
            candidates.extend(found.into_iter().map(|job| Candidate { job, match_type }));
        }

        let relevant = candidates
            .iter()
            .filter(|c| c.match_type != MatchType::RecentFallback)
            .count();
        if relevant < self.config.min_candidates {
            let recent_query = JobQuery::recent(self.config.fallback_limit);
            let mut recent = self.store.query(&recent_query.clone().quality_only()).await?;
            if recent.is_empty() {
                // Only incomplete rows stored; they still beat an empty answer.
                recent = self.store.query(&recent_query).await?;
            }
            info!(
                "Only {} relevance candidates; adding {} recent postings",
                relevant,
                recent.len()
            );
            candidates.extend(recent.into_iter().map(|job| Candidate {
                job,
                match_type: MatchType::RecentFallback,
            }));
        }

        let before = candidates.len();
        let unique = merge_candidates(candidates);
        debug!("Merged {} candidates into {}", before, unique.len());

        let mut results: Vec<MatchResult> = unique
            .into_iter()
            .map(|c| {
                let recency_only = c.match_type == MatchType::RecentFallback;
                let signals = scoring::Signals::collect(
                    &c.job,
                    profile,
                    &field_terms,
                    &self.table,
                    now,
                    recency_only,
                );
                MatchResult {
                    score: self.table.score(&signals),
                    match_type: c.match_type,
                    job: c.job,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.job.last_seen_at.cmp(&a.job.last_seen_at))
                .then_with(|| a.job.canonical_url.cmp(&b.job.canonical_url))
        });
        results.truncate(self.config.limit);

        let scores: Vec<(String, i32)> = results
            .iter()
            .map(|r| (r.job.canonical_url.clone(), r.score))
            .collect();
        // The score cache is advisory; a failed write never fails the search.
        if let Err(e) = self.store.record_scores(&scores).await {
            warn!("Failed to cache match scores: {e}");
        }

        Ok(results)
    }
}

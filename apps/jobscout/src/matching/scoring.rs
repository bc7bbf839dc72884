//! One scoring function over a signal vector. Discovery passes only decide
//! which postings are candidates; every candidate is scored here exactly once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::seniority::{self, Alignment};
use crate::models::{JobPosting, UserProfile};

/// Weights and word lists behind the relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringTable {
    pub base: i32,
    /// Base for candidates that only came from the recency fallback.
    pub fallback_base: i32,
    pub title_keyword: i32,
    pub source_term_keyword: i32,
    pub industry_keyword: i32,
    pub description_keyword: i32,
    pub reputable_company: i32,
    pub reputable_tokens: Vec<String>,
    pub quality_industry: i32,
    pub quality_industry_tokens: Vec<String>,
    pub skill_hit: i32,
    pub max_skill_hits: u32,
    pub field_hit: i32,
    /// `(max_age_days, bonus)`, checked in order; the first tier that fits wins.
    pub freshness_tiers: Vec<(i64, i32)>,
    pub experience_match: i32,
    pub experience_adjacent: i32,
    pub experience_mismatch: i32,
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self {
            base: 40,
            fallback_base: 30,
            title_keyword: 20,
            source_term_keyword: 12,
            industry_keyword: 15,
            description_keyword: 6,
            reputable_company: 8,
            reputable_tokens: ["group", "international", "holding", "a/s", "corporation"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            quality_industry: 5,
            quality_industry_tokens: ["technology", "software", "finance", "consulting", "pharma", "energy"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            skill_hit: 4,
            max_skill_hits: 3,
            field_hit: 5,
            freshness_tiers: vec![(3, 15), (7, 10), (14, 5)],
            experience_match: 15,
            experience_adjacent: 8,
            experience_mismatch: -5,
        }
    }
}

/// Where a keyword was found. Each keyword counts once, in its best field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeywordField {
    Title,
    SourceTerm,
    Description,
    Industry,
}

fn best_field(keyword: &str, job: &Lowered) -> Option<KeywordField> {
    if job.title.contains(keyword) {
        Some(KeywordField::Title)
    } else if job.source_term.contains(keyword) {
        Some(KeywordField::SourceTerm)
    } else if job.description.contains(keyword) {
        Some(KeywordField::Description)
    } else if job.industry.contains(keyword) {
        Some(KeywordField::Industry)
    } else {
        None
    }
}

struct Lowered {
    title: String,
    company: String,
    description: String,
    source_term: String,
    industry: String,
}

impl Lowered {
    fn of(job: &JobPosting) -> Self {
        Self {
            title: job.title.to_lowercase(),
            company: job.company.to_lowercase(),
            description: job.description.to_lowercase(),
            source_term: job.source_term.to_lowercase(),
            industry: job.industry.as_deref().unwrap_or("").to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signals {
    pub recency_only: bool,
    pub title_hits: u32,
    pub source_term_hits: u32,
    pub description_hits: u32,
    pub industry_hits: u32,
    pub skill_hits: u32,
    pub field_hit: bool,
    pub reputable_company: bool,
    pub quality_industry: bool,
    pub age: Duration,
    pub experience: Alignment,
}

impl Signals {
    pub fn collect(
        job: &JobPosting,
        profile: &UserProfile,
        field_terms: &[String],
        table: &ScoringTable,
        now: DateTime<Utc>,
        recency_only: bool,
    ) -> Self {
        let lowered = Lowered::of(job);
        let mut signals = Signals {
            recency_only,
            title_hits: 0,
            source_term_hits: 0,
            description_hits: 0,
            industry_hits: 0,
            skill_hits: 0,
            field_hit: false,
            reputable_company: false,
            quality_industry: false,
            age: job.age(now),
            experience: seniority::alignment(&job.title, profile.experience_level),
        };

        for keyword in &profile.keywords {
            match best_field(&keyword.to_lowercase(), &lowered) {
                Some(KeywordField::Title) => signals.title_hits += 1,
                Some(KeywordField::SourceTerm) => signals.source_term_hits += 1,
                Some(KeywordField::Description) => signals.description_hits += 1,
                Some(KeywordField::Industry) => signals.industry_hits += 1,
                None => {}
            }
        }

        signals.skill_hits = profile
            .skills
            .iter()
            .map(|s| s.to_lowercase())
            .filter(|s| lowered.title.contains(s.as_str()) || lowered.description.contains(s.as_str()))
            .count() as u32;

        signals.field_hit = field_terms.iter().any(|t| {
            lowered.title.contains(t.as_str())
                || lowered.description.contains(t.as_str())
                || lowered.industry.contains(t.as_str())
        });

        signals.reputable_company = !lowered.company.is_empty()
            && table
                .reputable_tokens
                .iter()
                .any(|t| lowered.company.contains(&t.to_lowercase()));

        signals.quality_industry = !lowered.industry.is_empty()
            && table
                .quality_industry_tokens
                .iter()
                .any(|t| lowered.industry.contains(&t.to_lowercase()));

        signals
    }
}

impl ScoringTable {
    pub fn freshness_bonus(&self, age: Duration) -> i32 {
        self.freshness_tiers
            .iter()
            .find(|(days, _)| age <= Duration::days(*days))
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0)
    }

    /// Relevance score clamped to `[1, 100]`.
    pub fn score(&self, s: &Signals) -> i32 {
        let mut score = if s.recency_only { self.fallback_base } else { self.base };

        score += self.title_keyword * s.title_hits as i32;
        score += self.source_term_keyword * s.source_term_hits as i32;
        score += self.description_keyword * s.description_hits as i32;
        score += self.industry_keyword * s.industry_hits as i32;
        score += self.skill_hit * s.skill_hits.min(self.max_skill_hits) as i32;
        if s.field_hit {
            score += self.field_hit;
        }
        if s.reputable_company {
            score += self.reputable_company;
        }
        if s.quality_industry {
            score += self.quality_industry;
        }
        score += self.freshness_bonus(s.age);
        score += match s.experience {
            Alignment::Match => self.experience_match,
            Alignment::Adjacent => self.experience_adjacent,
            Alignment::Mismatch => self.experience_mismatch,
            Alignment::Unknown => 0,
        };

        score.clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExperienceLevel, JobStatus};
    use uuid::Uuid;

    fn job(title: &str, company: &str, age_days: i64) -> JobPosting {
        let now = Utc::now();
        let seen = now - Duration::days(age_days);
        JobPosting {
            id: Uuid::new_v4(),
            canonical_url: format!("https://jobs.example/{}", title.replace(' ', "-")),
            title: title.to_string(),
            company: company.to_string(),
            location: "Copenhagen".to_string(),
            description: String::new(),
            job_type: "fulltime".to_string(),
            is_remote: None,
            industry: None,
            source_term: String::new(),
            source_location: String::new(),
            posted_at: None,
            first_seen_at: seen,
            last_seen_at: seen,
            status: JobStatus::Active,
            refresh_count: 1,
            last_match_score: None,
        }
    }

    fn profile(keywords: &[&str], level: ExperienceLevel) -> UserProfile {
        UserProfile {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            experience_level: level,
            ..UserProfile::default()
        }
    }

    fn score_of(job: &JobPosting, profile: &UserProfile, recency_only: bool) -> i32 {
        let table = ScoringTable::default();
        let signals = Signals::collect(job, profile, &[], &table, Utc::now(), recency_only);
        table.score(&signals)
    }

    #[test]
    fn test_senior_data_analyst_scenario() {
        let j = job("Senior Data Analyst", "Acme Group", 2);
        let p = profile(&["data analyst"], ExperienceLevel::Mid);
        let score = score_of(&j, &p, false);
        // 40 base + 20 title + 8 reputable + 15 fresh + 8 adjacent band
        assert_eq!(score, 91);
        assert!((88..=98).contains(&score));
    }

    #[test]
    fn test_keyword_counts_once_in_best_field() {
        let mut j = job("Data Analyst", "Acme", 30);
        j.source_term = "data analyst".to_string();
        j.description = "data analyst wanted".to_string();
        let table = ScoringTable::default();
        let s = Signals::collect(&j, &profile(&["data analyst"], ExperienceLevel::Unspecified), &[], &table, Utc::now(), false);
        assert_eq!((s.title_hits, s.source_term_hits, s.description_hits), (1, 0, 0));
    }

    #[test]
    fn test_score_bounds_hold_for_extremes() {
        let many: Vec<String> = (0..20).map(|i| format!("kw{i}")).collect();
        let mut j = job("title", "Acme Group", 0);
        j.title = many.join(" ");
        let p = UserProfile {
            keywords: many.clone(),
            skills: many.clone(),
            experience_level: ExperienceLevel::Mid,
            ..UserProfile::default()
        };
        assert_eq!(score_of(&j, &p, false), 100);

        let table = ScoringTable {
            fallback_base: -50,
            ..ScoringTable::default()
        };
        let j = job("Senior Architect", "", 400);
        let s = Signals::collect(&j, &profile(&[], ExperienceLevel::Student), &[], &table, Utc::now(), true);
        assert_eq!(table.score(&s), 1);
    }

    #[test]
    fn test_freshness_is_monotonic() {
        let p = profile(&["analyst"], ExperienceLevel::Mid);
        let mut previous = i32::MAX;
        for age in [0, 1, 3, 4, 7, 8, 14, 15, 30, 90] {
            let score = score_of(&job("Analyst", "Acme", age), &p, false);
            assert!(score <= previous, "age {age} scored {score} > {previous}");
            previous = score;
        }
    }

    #[test]
    fn test_fallback_candidates_start_lower() {
        let j = job("Chef", "Restaurant", 20);
        let p = profile(&["data analyst"], ExperienceLevel::Unspecified);
        assert_eq!(score_of(&j, &p, false), 40);
        assert_eq!(score_of(&j, &p, true), 30);
    }

    #[test]
    fn test_skill_hits_are_capped() {
        let mut j = job("Engineer", "Acme", 30);
        j.description = "rust go sql python kafka".to_string();
        let p = UserProfile {
            skills: ["rust", "go", "sql", "python", "kafka"].iter().map(|s| s.to_string()).collect(),
            ..UserProfile::default()
        };
        // 40 base + 3 * 4 skills
        assert_eq!(score_of(&j, &p, false), 52);
    }

    #[test]
    fn test_quality_industry_and_field_bonuses() {
        let mut j = job("Analyst", "Acme", 30);
        j.industry = Some("Financial Technology".to_string());
        let table = ScoringTable::default();
        let terms = vec!["financial".to_string()];
        let s = Signals::collect(&j, &UserProfile::default(), &terms, &table, Utc::now(), false);
        assert!(s.quality_industry);
        assert!(s.field_hit);
        assert_eq!(table.score(&s), 40 + 5 + 5);
    }
}

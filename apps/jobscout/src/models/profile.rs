use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    #[default]
    Unspecified,
    Student,
    Entry,
    Mid,
    Senior,
    Lead,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemotePreference {
    #[default]
    NoPreference,
    OnSite,
    Hybrid,
    Remote,
}

impl RemotePreference {
    /// Only an explicit remote or on-site preference narrows a listing search.
    pub fn as_filter(&self) -> Option<bool> {
        match self {
            RemotePreference::Remote => Some(true),
            RemotePreference::OnSite => Some(false),
            RemotePreference::NoPreference | RemotePreference::Hybrid => None,
        }
    }
}

/// Search request handed over by the profile layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSearchRequest {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub job_types: Vec<String>,
    #[serde(default)]
    pub remote_preference: RemotePreference,
    #[serde(default = "default_max_results")]
    pub max_results_per_query: u32,
}

fn default_max_results() -> u32 {
    50
}

impl ProfileSearchRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_results_per_query == 0 {
            return Err(AppError::Validation(
                "maxResultsPerQuery must be greater than zero".to_string(),
            ));
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::Validation(
                "at least one non-empty keyword is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The query shape the matcher works with. Blank entries are dropped.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            keywords: clean_terms(&self.keywords),
            skills: clean_terms(&self.skills),
            field: self.field.trim().to_string(),
            experience_level: self.experience_level,
            locations: clean_terms(&self.locations),
            job_types: clean_terms(&self.job_types),
            remote_preference: self.remote_preference,
        }
    }
}

/// Query shape of a user profile as seen by the relevance matcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub keywords: Vec<String>,
    pub skills: Vec<String>,
    pub field: String,
    pub experience_level: ExperienceLevel,
    pub locations: Vec<String>,
    pub job_types: Vec<String>,
    pub remote_preference: RemotePreference,
}

fn clean_terms(terms: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        let term = term.trim();
        if !term.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(term)) {
            out.push(term.to_string());
        }
    }
    out
}

//! Scrape Session: drives the fetch / challenge-resolution loop against one
//! listing site and emits normalized postings. Never touches storage.

use async_trait::async_trait;
use serde::Serialize;

use crate::models::NormalizedPosting;

pub mod challenge;
pub mod errors;
pub mod extractor;
pub mod fetcher;
pub mod normalize;
pub mod retry;
pub mod session;

pub use errors::ScrapeFailed;
pub use session::{ListingScraper, SessionConfig};

/// One `(keywords, location, job_type, remote)` tuple derived from a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeQuery {
    pub keywords: String,
    pub location: String,
    pub job_type: String,
    pub remote: Option<bool>,
    pub max_results: usize,
}

impl ScrapeQuery {
    pub fn label(&self) -> String {
        format!("'{}' in '{}'", self.keywords, self.location)
    }
}

/// Where live postings come from. The orchestrator depends on this, not on
/// the concrete scraper, so tests can script outcomes per tuple.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn scrape(&self, query: &ScrapeQuery) -> Result<Vec<NormalizedPosting>, ScrapeFailed>;
}

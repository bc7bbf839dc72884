use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::challenge::ChallengeDetector;
use super::errors::{PageFailure, ScrapeFailed};
use super::extractor::PostingExtractor;
use super::fetcher::{FetchedPage, PageFetcher};
use super::normalize::normalize;
use super::retry::{Backoff, RetryPolicy, Sleeper};
use super::{JobSource, ScrapeQuery};
use crate::models::NormalizedPosting;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Loading,
    ChallengeDetected,
    Waiting,
    Resolved,
    Retrying,
    Extracting,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: Url,
    /// Page-load budget and the backoff between attempts.
    pub page_retry: RetryPolicy,
    pub challenge_attempts: u32,
    /// Time given to an interstitial before the page is checked again.
    pub challenge_wait: Duration,
    pub max_pages: u32,
    /// Listing offset step between pages.
    pub page_size: u32,
    /// Wall-clock budget for a whole session, independent of retries.
    pub budget: Duration,
    pub fetch_descriptions: bool,
    /// Detail pages get one load and at most one challenge wait each.
    pub detail_retry: RetryPolicy,
}

impl SessionConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            page_retry: RetryPolicy::default(),
            challenge_attempts: 3,
            challenge_wait: Duration::from_secs(25),
            max_pages: 3,
            page_size: 10,
            budget: Duration::from_secs(120),
            fetch_descriptions: false,
            detail_retry: RetryPolicy {
                max_attempts: 1,
                backoff: Backoff::Immediate,
                seed: None,
            },
        }
    }
}

/// Builds `/jobs?q=..&l=..[&sc=..]&start=..` for one results page.
pub fn search_url(base: &Url, query: &ScrapeQuery, start: u32) -> Result<Url, ScrapeFailed> {
    let mut url = base
        .join("/jobs")
        .map_err(|e| ScrapeFailed::InvalidQuery(format!("bad base URL {base}: {e}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("q", &query.keywords);
        pairs.append_pair("l", &query.location);

        let mut filter = String::new();
        if query.remote == Some(true) {
            filter.push_str("attr(DSQF7)");
        }
        if !query.job_type.is_empty() {
            filter.push_str(&format!("jt({})", query.job_type));
        }
        if !filter.is_empty() {
            pairs.append_pair("sc", &format!("0kf:{filter};"));
        }
        pairs.append_pair("start", &start.to_string());
    }
    Ok(url)
}

/// Collaborators shared by every session against one listing site.
#[derive(Clone)]
pub struct ListingScraper {
    fetcher: Arc<dyn PageFetcher>,
    detector: Arc<dyn ChallengeDetector>,
    extractor: Arc<dyn PostingExtractor>,
    sleeper: Arc<dyn Sleeper>,
    config: SessionConfig,
}

impl ListingScraper {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        detector: Arc<dyn ChallengeDetector>,
        extractor: Arc<dyn PostingExtractor>,
        sleeper: Arc<dyn Sleeper>,
        config: SessionConfig,
    ) -> Self {
        Self {
            fetcher,
            detector,
            extractor,
            sleeper,
            config,
        }
    }
}

#[async_trait]
impl JobSource for ListingScraper {
    async fn scrape(&self, query: &ScrapeQuery) -> Result<Vec<NormalizedPosting>, ScrapeFailed> {
        ScrapeSession::new(self, query).run().await
    }
}

/// One run of the state machine for one query tuple.
pub struct ScrapeSession<'a> {
    scraper: &'a ListingScraper,
    query: &'a ScrapeQuery,
    state: SessionState,
    transitions: Vec<SessionState>,
    seen: HashSet<String>,
    postings: Vec<NormalizedPosting>,
}

impl<'a> ScrapeSession<'a> {
    pub fn new(scraper: &'a ListingScraper, query: &'a ScrapeQuery) -> Self {
        Self {
            scraper,
            query,
            state: SessionState::Init,
            transitions: vec![SessionState::Init],
            seen: HashSet::new(),
            postings: Vec::new(),
        }
    }

    pub fn transitions(&self) -> &[SessionState] {
        &self.transitions
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Scrape {}: {:?} -> {:?}", self.query.label(), self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    /// Sweeps the listing pages, then optionally fills descriptions. Both
    /// phases share one wall-clock deadline; only the sweep running out of
    /// time fails the session.
    pub async fn run(&mut self) -> Result<Vec<NormalizedPosting>, ScrapeFailed> {
        let budget = self.scraper.config.budget;
        let deadline = Instant::now() + budget;

        match timeout_at(deadline, self.sweep()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!("Scrape session for {} timed out after {:?}", self.query.label(), budget);
                self.transition(SessionState::Failed);
                return Err(ScrapeFailed::Timeout(budget));
            }
        }

        if self.scraper.config.fetch_descriptions && !self.postings.is_empty() {
            if timeout_at(deadline, self.fill_descriptions()).await.is_err() {
                warn!(
                    "Detail pages for {} ran out of budget; keeping {} postings",
                    self.query.label(),
                    self.postings.len()
                );
            }
        }

        self.transition(SessionState::Done);
        info!(
            "Scrape for {} collected {} postings",
            self.query.label(),
            self.postings.len()
        );
        Ok(std::mem::take(&mut self.postings))
    }

    async fn sweep(&mut self) -> Result<(), ScrapeFailed> {
        if self.query.keywords.trim().is_empty() {
            self.transition(SessionState::Failed);
            return Err(ScrapeFailed::InvalidQuery("keywords must not be empty".to_string()));
        }
        if self.query.max_results == 0 {
            self.transition(SessionState::Failed);
            return Err(ScrapeFailed::InvalidQuery("max_results must be positive".to_string()));
        }

        let scraper = self.scraper;
        let config = &scraper.config;
        for page in 0..config.max_pages {
            if self.postings.len() >= self.query.max_results {
                break;
            }
            let url = search_url(&config.base_url, self.query, page * config.page_size)?;
            info!("Scraping page {} for {}: {}", page + 1, self.query.label(), url);

            let fetched = match self.load_page(&url, &config.page_retry, config.challenge_attempts).await {
                Ok(fetched) => fetched,
                Err(failure) if page == 0 => {
                    warn!("First page for {} failed: {}", self.query.label(), failure);
                    self.transition(SessionState::Failed);
                    return Err(ScrapeFailed::FirstPage(failure));
                }
                Err(failure) => {
                    warn!(
                        "Skipping page {} for {}: {}",
                        page + 1,
                        self.query.label(),
                        failure
                    );
                    continue;
                }
            };

            self.transition(SessionState::Extracting);
            if !self.extract(&fetched) {
                break;
            }
        }

        Ok(())
    }

    /// Adds the page's postings. Returns whether another page should be tried.
    fn extract(&mut self, fetched: &FetchedPage) -> bool {
        let listing = self.scraper.extractor.extract_listing(fetched);
        let now = Utc::now();
        let mut added = 0usize;

        for raw in listing.postings {
            if self.postings.len() >= self.query.max_results {
                break;
            }
            match raw.and_then(|r| normalize(&r, &fetched.url, self.query, now)) {
                Ok(posting) => {
                    if self.seen.insert(posting.canonical_url.clone()) {
                        self.postings.push(posting);
                        added += 1;
                    }
                }
                Err(e) => debug!("Skipping posting on {}: {}", fetched.url, e),
            }
        }

        debug!("Extracted {} new postings from {}", added, fetched.url);
        listing.has_next_page && self.postings.len() < self.query.max_results
    }

    /// Loads one URL, waiting out challenges and retrying within the budgets.
    async fn load_page(
        &mut self,
        url: &Url,
        policy: &RetryPolicy,
        challenge_attempts: u32,
    ) -> Result<FetchedPage, PageFailure> {
        let scraper = self.scraper;
        let mut schedule = policy.schedule();
        let mut loads = 0u32;
        let mut challenges = 0u32;
        let mut retries = 0u32;

        loop {
            self.transition(SessionState::Loading);
            loads += 1;

            match scraper.fetcher.fetch(url).await {
                Err(e) => {
                    if loads >= policy.max_attempts {
                        return Err(PageFailure::Exhausted {
                            attempts: loads,
                            last: e,
                        });
                    }
                    warn!("Load attempt {} for {} failed: {}", loads, url, e);
                }
                Ok(page) if scraper.detector.is_challenge(&page) => {
                    self.transition(SessionState::ChallengeDetected);
                    challenges += 1;
                    self.transition(SessionState::Waiting);
                    warn!(
                        "Challenge on {} (attempt {}), waiting {:?}",
                        url, challenges, scraper.config.challenge_wait
                    );
                    scraper.sleeper.sleep(scraper.config.challenge_wait).await;

                    match scraper.fetcher.fetch(url).await {
                        Ok(page) if !scraper.detector.is_challenge(&page) => {
                            self.transition(SessionState::Resolved);
                            return Ok(page);
                        }
                        Ok(_) => debug!("Challenge on {} still present after waiting", url),
                        Err(e) => debug!("Re-check of {} failed: {}", url, e),
                    }

                    if challenges >= challenge_attempts {
                        return Err(PageFailure::ChallengeTimeout {
                            attempts: challenges,
                        });
                    }
                }
                Ok(page) => return Ok(page),
            }

            self.transition(SessionState::Retrying);
            retries += 1;
            let delay = schedule.next_delay(retries);
            warn!("Retrying {} in {:?}", url, delay);
            scraper.sleeper.sleep(delay).await;
        }
    }

    /// Detail pages are best effort: a failure leaves the description empty.
    /// Postings are updated in place, so cancelling part-way keeps them all.
    async fn fill_descriptions(&mut self) {
        let scraper = self.scraper;
        let policy = &scraper.config.detail_retry;
        let challenge_attempts = policy.max_attempts.max(1);
        for i in 0..self.postings.len() {
            let Ok(url) = Url::parse(&self.postings[i].canonical_url) else {
                continue;
            };
            match self.load_page(&url, policy, challenge_attempts).await {
                Ok(page) => {
                    if let Some(text) = scraper.extractor.extract_description(&page) {
                        self.postings[i].description = text;
                    }
                }
                Err(e) => debug!("No description for {}: {}", url, e),
            }
        }
    }
}

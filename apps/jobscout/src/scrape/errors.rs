use std::time::Duration;

use thiserror::Error;

/// A single page load that did not produce a usable document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// One posting could not be extracted. Recovered locally: the posting is
/// skipped and the session continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("posting is missing its {0}")]
    MissingField(&'static str),

    #[error("posting link '{0}' cannot be resolved")]
    InvalidUrl(String),

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Why a page was given up on after its retry budget.
#[derive(Debug, Error)]
pub enum PageFailure {
    #[error("page load failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: FetchError },

    #[error("anti-bot challenge unresolved after {attempts} attempts")]
    ChallengeTimeout { attempts: u32 },
}

/// Terminal failure of a whole scrape session. Distinct from an empty success.
#[derive(Debug, Error)]
pub enum ScrapeFailed {
    #[error("invalid scrape query: {0}")]
    InvalidQuery(String),

    #[error("first results page unavailable: {0}")]
    FirstPage(#[source] PageFailure),

    #[error("session exceeded its wall-clock budget of {}s", .0.as_secs())]
    Timeout(Duration),
}

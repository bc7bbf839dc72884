use super::fetcher::FetchedPage;

/// Decides whether a fetched page is an anti-bot interstitial rather than
/// the content that was asked for.
pub trait ChallengeDetector: Send + Sync {
    fn is_challenge(&self, page: &FetchedPage) -> bool;
}

/// Case-insensitive marker matching on the body and the final URL.
#[derive(Debug, Clone)]
pub struct MarkerChallengeDetector {
    body_markers: Vec<String>,
    url_markers: Vec<String>,
}

impl MarkerChallengeDetector {
    pub fn new(body_markers: Vec<String>, url_markers: Vec<String>) -> Self {
        Self {
            body_markers: body_markers.into_iter().map(|m| m.to_lowercase()).collect(),
            url_markers: url_markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

impl Default for MarkerChallengeDetector {
    fn default() -> Self {
        let body = [
            "captcha",
            "verify you are human",
            "are you a robot",
            "just a moment",
            "checking your browser",
            "cf-challenge",
            "challenge-platform",
        ];
        let url = ["/challenge", "captcha", "cdn-cgi/challenge"];
        Self::new(
            body.iter().map(|s| s.to_string()).collect(),
            url.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl ChallengeDetector for MarkerChallengeDetector {
    fn is_challenge(&self, page: &FetchedPage) -> bool {
        // 403/503 with a body is how most bot walls answer plain HTTP clients.
        if matches!(page.status, 403 | 503) {
            return true;
        }
        let url = page.url.as_str().to_lowercase();
        if self.url_markers.iter().any(|m| url.contains(m.as_str())) {
            return true;
        }
        let body = page.body.to_lowercase();
        self.body_markers.iter().any(|m| body.contains(m.as_str()))
    }
}

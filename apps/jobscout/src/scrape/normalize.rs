use chrono::{DateTime, Duration, NaiveDate, Utc};
use url::Url;

use super::errors::ParseError;
use super::extractor::RawPosting;
use super::ScrapeQuery;
use crate::models::NormalizedPosting;

/// Collapses runs of whitespace and trims the ends.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves `raw` against the page it came from, then drops the fragment and
/// `utm_*` tracking parameters so re-scrapes map to the same key.
pub fn canonical_url(page_url: &Url, raw: &str) -> Result<String, ParseError> {
    let mut url = page_url
        .join(raw.trim())
        .map_err(|_| ParseError::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ParseError::InvalidUrl(raw.to_string()));
    }
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.to_ascii_lowercase().starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    Ok(url.to_string())
}

/// Parses listing-site posted-date text such as "Just posted", "Today",
/// "3 days ago", "30+ days ago" or an ISO date.
pub fn parse_posted_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = clean_text(raw).to_lowercase();
    if text.is_empty() {
        return None;
    }
    if text.contains("just posted") || text.contains("today") || text.contains("i dag") {
        return Some(now);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    let n: i64 = text
        .split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())?
        .parse()
        .ok()?;
    if text.contains("hour") || text.contains("timer") {
        return now.checked_sub_signed(Duration::try_hours(n)?);
    }
    let unit_days = if text.contains("week") || text.contains("uge") {
        7
    } else if text.contains("month") || text.contains("måned") {
        30
    } else {
        1
    };
    // Garbled counts overflow chrono's range; treat them as unparseable.
    let days = n.checked_mul(unit_days)?;
    now.checked_sub_signed(Duration::try_days(days)?)
}

/// Turns one raw extraction into the stored shape.
pub fn normalize(
    raw: &RawPosting,
    page_url: &Url,
    query: &ScrapeQuery,
    now: DateTime<Utc>,
) -> Result<NormalizedPosting, ParseError> {
    let title = clean_text(&raw.title);
    if title.is_empty() {
        return Err(ParseError::MissingField("title"));
    }
    Ok(NormalizedPosting {
        canonical_url: canonical_url(page_url, &raw.url_raw)?,
        title,
        company: clean_text(&raw.company_raw),
        location: clean_text(&raw.location_raw),
        description: String::new(),
        job_type: query.job_type.clone(),
        is_remote: query.remote,
        industry: None,
        source_term: query.keywords.clone(),
        source_location: query.location.clone(),
        posted_at: parse_posted_date(&raw.posted_date_raw, now),
    })
}

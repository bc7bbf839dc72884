//! Listing-page extraction. Selectors are configuration; the session only sees
//! the `PostingExtractor` trait.

use scraper::{ElementRef, Html, Selector};

use super::errors::ParseError;
use super::fetcher::FetchedPage;

/// Fields exactly as they appear on the listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPosting {
    pub title: String,
    pub company_raw: String,
    pub location_raw: String,
    pub url_raw: String,
    pub posted_date_raw: String,
}

#[derive(Debug, Default)]
pub struct ListingPage {
    pub postings: Vec<Result<RawPosting, ParseError>>,
    pub has_next_page: bool,
}

pub trait PostingExtractor: Send + Sync {
    fn extract_listing(&self, page: &FetchedPage) -> ListingPage;

    /// Full description text from a posting's detail page, if present.
    fn extract_description(&self, page: &FetchedPage) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub card: String,
    pub title: String,
    pub link: String,
    pub company: String,
    pub location: String,
    pub posted_date: String,
    pub next_page: String,
    pub description: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: "div.job_seen_beacon, div.jobsearch-SerpJobCard".to_string(),
            title: "h2.jobTitle span, h2.jobTitle a".to_string(),
            link: "h2.jobTitle a, a[data-jk]".to_string(),
            company: "[data-testid=\"company-name\"]".to_string(),
            location: "[data-testid=\"text-location\"]".to_string(),
            posted_date: "span.date".to_string(),
            next_page: "a[aria-label=\"Next Page\"], a[data-testid=\"pagination-page-next\"]"
                .to_string(),
            description: "#jobDescriptionText".to_string(),
        }
    }
}

/// CSS-selector extractor over server-rendered listing HTML.
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    card: Selector,
    title: Selector,
    link: Selector,
    company: Selector,
    location: Selector,
    posted_date: Selector,
    next_page: Selector,
    description: Selector,
}

fn parse_selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl SelectorExtractor {
    pub fn new(config: &SelectorConfig) -> Result<Self, ParseError> {
        Ok(Self {
            card: parse_selector(&config.card)?,
            title: parse_selector(&config.title)?,
            link: parse_selector(&config.link)?,
            company: parse_selector(&config.company)?,
            location: parse_selector(&config.location)?,
            posted_date: parse_selector(&config.posted_date)?,
            next_page: parse_selector(&config.next_page)?,
            description: parse_selector(&config.description)?,
        })
    }

    fn first_text(&self, card: ElementRef<'_>, selector: &Selector) -> String {
        card.select(selector).next().map(text_of).unwrap_or_default()
    }

    fn card(&self, card: ElementRef<'_>) -> Result<RawPosting, ParseError> {
        let title = self.first_text(card, &self.title);
        if title.is_empty() {
            return Err(ParseError::MissingField("title"));
        }
        let url_raw = card
            .select(&self.link)
            .find_map(|a| a.value().attr("href"))
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or(ParseError::MissingField("link"))?;

        let posted = self.first_text(card, &self.posted_date);
        Ok(RawPosting {
            title,
            company_raw: self.first_text(card, &self.company),
            location_raw: self.first_text(card, &self.location),
            url_raw,
            posted_date_raw: posted.replace("Posted", "").trim().to_string(),
        })
    }
}

impl PostingExtractor for SelectorExtractor {
    fn extract_listing(&self, page: &FetchedPage) -> ListingPage {
        let doc = Html::parse_document(&page.body);
        ListingPage {
            postings: doc.select(&self.card).map(|card| self.card(card)).collect(),
            has_next_page: doc.select(&self.next_page).next().is_some(),
        }
    }

    fn extract_description(&self, page: &FetchedPage) -> Option<String> {
        let doc = Html::parse_document(&page.body);
        doc.select(&self.description)
            .next()
            .map(text_of)
            .filter(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const LISTING: &str = r#"
        <html><body>
          <div class="job_seen_beacon">
            <h2 class="jobTitle"><a href="/rc/clk?jk=abc123&utm_source=x"><span>Senior  Data Analyst</span></a></h2>
            <span data-testid="company-name"> Acme Group </span>
            <div data-testid="text-location">København</div>
            <span class="date">Posted 2 days ago</span>
          </div>
          <div class="job_seen_beacon">
            <h2 class="jobTitle"><span>No link here</span></h2>
          </div>
          <nav><a aria-label="Next Page" href="/jobs?start=10">Next</a></nav>
        </body></html>
    "#;

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            url: Url::parse("https://dk.indeed.com/jobs?q=data").unwrap(),
            status: 200,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_extracts_cards_and_skips_broken_ones() {
        let ex = SelectorExtractor::new(&SelectorConfig::default()).unwrap();
        let listing = ex.extract_listing(&page(LISTING));

        assert_eq!(listing.postings.len(), 2);
        let first = listing.postings[0].as_ref().unwrap();
        assert_eq!(first.title, "Senior  Data Analyst");
        assert_eq!(first.company_raw, "Acme Group");
        assert_eq!(first.location_raw, "København");
        assert_eq!(first.url_raw, "/rc/clk?jk=abc123&utm_source=x");
        assert_eq!(first.posted_date_raw, "2 days ago");

        assert_eq!(listing.postings[1], Err(ParseError::MissingField("link")));
        assert!(listing.has_next_page);
    }

    #[test]
    fn test_empty_page_has_no_postings_and_no_next() {
        let ex = SelectorExtractor::new(&SelectorConfig::default()).unwrap();
        let listing = ex.extract_listing(&page("<html><body>No results</body></html>"));
        assert!(listing.postings.is_empty());
        assert!(!listing.has_next_page);
    }

    #[test]
    fn test_description_extraction() {
        let ex = SelectorExtractor::new(&SelectorConfig::default()).unwrap();
        let detail = page(r#"<div id="jobDescriptionText"><p>Build dashboards.</p><p>Use SQL.</p></div>"#);
        assert_eq!(
            ex.extract_description(&detail).as_deref(),
            Some("Build dashboards. Use SQL.")
        );
        assert_eq!(ex.extract_description(&page("<p>nothing</p>")), None);
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let config = SelectorConfig {
            card: "div[".to_string(),
            ..SelectorConfig::default()
        };
        assert!(matches!(
            SelectorExtractor::new(&config),
            Err(ParseError::InvalidSelector { .. })
        ));
    }
}

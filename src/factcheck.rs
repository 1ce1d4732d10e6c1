//! Headline and subheadline scraping for fact-check pages.

use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{error, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Capability to look up the texts shown at the top of a fact-check page.
pub trait FactCheckSource: Send + Sync {
    fn headline(&self, url: &str) -> Option<String>;
    fn subheadline(&self, url: &str) -> Option<String>;
}

/// Fetches pages over HTTP and reads their Open Graph tags.
pub struct FactCheckScraper {
    agent: ureq::Agent,
}

impl Default for FactCheckScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl FactCheckScraper {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .redirects(5)
            .build();
        Self { agent }
    }

    fn fetch_page(&self, url: &str) -> Option<String> {
        if !is_http_url(url) {
            warn!("Invalid or missing URL for fact-check fetch: {url:?}");
            return None;
        }
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                error!("Fact-check page {url} answered with HTTP {code}");
                return None;
            }
            Err(err) => {
                error!("Fetching fact-check page {url} failed: {err}");
                return None;
            }
        };
        match response.into_string() {
            Ok(body) => Some(body),
            Err(err) => {
                error!("Reading fact-check page {url} failed: {err}");
                None
            }
        }
    }
}

impl FactCheckSource for FactCheckScraper {
    fn headline(&self, url: &str) -> Option<String> {
        let html = self.fetch_page(url)?;
        let headline = extract_headline(&html);
        match &headline {
            Some(text) => info!("Found headline '{}' for {url}", preview(text)),
            None => warn!("Could not find og:title or h1 for {url}"),
        }
        headline
    }

    fn subheadline(&self, url: &str) -> Option<String> {
        let html = self.fetch_page(url)?;
        let subheadline = extract_subheadline(&html);
        match &subheadline {
            Some(text) => info!("Found og:description '{}' for {url}", preview(text)),
            None => warn!("Could not find og:description for {url}"),
        }
        subheadline
    }
}

/// Accepts only absolute `http://` or `https://` URLs.
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// `og:title`, falling back to the text of the first `h1`.
pub fn extract_headline(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    meta_property(&document, "og:title").or_else(|| {
        let selector = Selector::parse("h1").ok()?;
        let heading = document.select(&selector).next()?;
        let text = heading
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ");
        (!text.is_empty()).then_some(text)
    })
}

/// `og:description` only.
pub fn extract_subheadline(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    meta_property(&document, "og:description")
}

fn meta_property(document: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[property=\"{property}\"]")).ok()?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

//! HTTP plumbing: the link suppliers and the raw dataset fetcher.
//!
//! The registry advertises its datasets as `*crnt.txt` anchors on a public
//! listing page; scraping that page is the only discovery this crate does
//! itself. Anything richer (scripted browsing) stays outside and feeds in
//! through [`StaticLinkSupplier`] or a custom [`LinkSupplier`].

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use tracing::{debug, warn};

use crate::contract::{FetchError, LinkSupplier, SourceFetcher};

const DATA_FILE_SUFFIX: &str = "crnt.txt";

/// Supplies a fixed link set, for offline runs and tests.
pub struct StaticLinkSupplier {
    links: Vec<String>,
}

impl StaticLinkSupplier {
    pub fn new(links: Vec<String>) -> Self {
        StaticLinkSupplier { links }
    }
}

#[async_trait]
impl LinkSupplier for StaticLinkSupplier {
    async fn links(&self) -> Result<Vec<String>, FetchError> {
        Ok(self.links.clone())
    }
}

/// Scrapes the regulant-list page for anchors ending in `crnt.txt`,
/// resolving relative hrefs against the page URL.
pub struct RegulantPageSupplier {
    client: reqwest::Client,
    page_url: String,
    timeout: Duration,
}

impl RegulantPageSupplier {
    pub fn new(page_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(RegulantPageSupplier {
            client: reqwest::Client::builder().build()?,
            page_url: page_url.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl LinkSupplier for RegulantPageSupplier {
    async fn links(&self) -> Result<Vec<String>, FetchError> {
        let response = self
            .client
            .get(&self.page_url)
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: self.page_url.clone(),
                status: response.status(),
            });
        }
        let body = response.text().await?;

        let base = Url::parse(&self.page_url).ok();
        let href_pattern = Regex::new(r#"href="([^"]+)""#).expect("static regex");

        let mut links = Vec::new();
        for capture in href_pattern.captures_iter(&body) {
            let href = &capture[1];
            if !href.ends_with(DATA_FILE_SUFFIX) {
                continue;
            }
            let absolute = match (&base, href.starts_with("http")) {
                (_, true) => href.to_string(),
                (Some(base), false) => match base.join(href) {
                    Ok(url) => url.to_string(),
                    Err(e) => {
                        warn!(href = %href, error = %e, "unresolvable data link");
                        continue;
                    }
                },
                (None, false) => {
                    warn!(href = %href, "relative link with unparsable page url");
                    continue;
                }
            };
            links.push(absolute);
        }
        debug!(count = links.len(), "scraped data file links");
        Ok(links)
    }
}

/// Fetches raw dataset files over HTTP with a per-request timeout.
pub struct HttpSourceFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSourceFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(HttpSourceFetcher {
            client: reqwest::Client::builder().build()?,
            timeout,
        })
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response.text().await?)
    }
}

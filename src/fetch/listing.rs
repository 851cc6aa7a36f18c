// src/fetch/listing.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::error::DiscoveryError;

/// Extensions recognised as downloadable archives.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".zip"];

const PARENT_LINK: &str = "../";

/// Source of directory-listing anchors.
#[async_trait]
pub trait ListingClient: Send + Sync {
    /// Every anchor `href` under `url`, in document order, minus the parent link.
    async fn anchors(&self, url: &Url) -> Result<Vec<String>, DiscoveryError>;
}

/// [`ListingClient`] over plain HTTP index pages.
#[derive(Clone)]
pub struct HttpListingClient {
    client: Client,
    max_retries: u32,
    initial_backoff_ms: u64,
}

impl HttpListingClient {
    pub fn new(client: Client, http: &HttpConfig) -> Self {
        Self {
            client,
            max_retries: http.max_retries,
            initial_backoff_ms: http.initial_backoff_ms,
        }
    }

    async fn get_text_core(&self, url: &Url) -> Result<String> {
        debug!("Fetching listing {}", url);
        Ok(self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Non-success status {}", url))?
            .text()
            .await
            .with_context(|| format!("Reading text from {}", url))?)
    }

    async fn get_text_with_retry(&self, url: &Url) -> Result<String> {
        let mut attempts = 0;
        loop {
            match self.get_text_core(url).await {
                Ok(t) => return Ok(t),
                Err(e) if attempts < self.max_retries => {
                    attempts += 1;
                    let backoff = self.initial_backoff_ms * 2u64.pow(attempts - 1);
                    warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    error!(%url, error = %e, "Exhausted retries");
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl ListingClient for HttpListingClient {
    async fn anchors(&self, url: &Url) -> Result<Vec<String>, DiscoveryError> {
        let body = self
            .get_text_with_retry(url)
            .await
            .map_err(|e| DiscoveryError::Unreachable {
                url: url.to_string(),
                reason: format!("{:#}", e),
            })?;
        Ok(extract_anchors(&body))
    }
}

/// All `href`s of `<a>` elements, in document order, without `../`.
pub fn extract_anchors(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a[href]").expect("anchor selector should parse");
    doc.select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| *href != PARENT_LINK)
        .map(|href| {
            trace!(href, "anchor");
            href.to_string()
        })
        .collect()
}

/// Anchors that name a year directory (`2023/` → `2023`), in listing order.
pub fn year_directories(anchors: &[String]) -> Vec<String> {
    anchors
        .iter()
        .map(|href| href.replace('/', ""))
        .filter(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// Anchors that name an archive file, in listing order.
pub fn archive_names(anchors: &[String]) -> Vec<String> {
    anchors
        .iter()
        .filter(|href| ARCHIVE_EXTENSIONS.iter().any(|ext| href.ends_with(ext)))
        .cloned()
        .collect()
}

/// Year directories listed at `base`.
pub async fn list_years<C: ListingClient + ?Sized>(
    client: &C,
    base: &Url,
) -> Result<Vec<String>, DiscoveryError> {
    let years = year_directories(&client.anchors(base).await?);
    debug!(url = %base, years = ?years, "listed year directories");
    Ok(years)
}

/// Archive file names listed at `dir`.
pub async fn list_archives<C: ListingClient + ?Sized>(
    client: &C,
    dir: &Url,
) -> Result<Vec<String>, DiscoveryError> {
    let names = archive_names(&client.anchors(dir).await?);
    debug!(url = %dir, archives = names.len(), "listed archives");
    Ok(names)
}

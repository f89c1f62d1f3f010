//! Scraper trait.

use async_trait::async_trait;

use crate::error::ScrapeFailure;

/// Fetches a URL and renders it as a markdown-shaped text blob.
///
/// Implementations may concatenate several sub-pages of the same site,
/// separating sections with `---` source-URL headers; the extraction
/// prompt relies on that convention.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Scrape a URL. Repeated calls on a reachable URL return equivalent
    /// content modulo site-side changes.
    async fn scrape(&self, url: &str) -> Result<String, ScrapeFailure>;
}

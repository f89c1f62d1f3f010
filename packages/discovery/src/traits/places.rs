//! Places provider trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Candidate, GeoPoint};

/// A places-search provider.
///
/// One `text_search` call per query variant; the client layers caching,
/// deduplication, and the website fallback on top.
#[async_trait]
pub trait PlacesApi: Send + Sync {
    /// Search for places matching a free-text query near a point.
    async fn text_search(
        &self,
        query: &str,
        center: GeoPoint,
        radius_meters: u32,
    ) -> Result<Vec<Candidate>>;

    /// Fetch the website URL for a place via a details lookup.
    ///
    /// Fallback for candidates whose search result had no website.
    async fn place_website(&self, place_id: &str) -> Result<Option<String>>;
}

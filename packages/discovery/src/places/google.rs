//! Google Places API (New) client.
//!
//! Uses Text Search with a field mask that includes `websiteUri` so a
//! single call returns everything a candidate needs, plus a Place
//! Details lookup as the website fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::{DiscoveryError, Result};
use crate::traits::PlacesApi;
use crate::types::{Candidate, GeoPoint};

const DEFAULT_BASE_URL: &str = "https://places.googleapis.com/v1";

/// Field mask for text search. `websiteUri` bumps the request to the
/// Enterprise tier; the free monthly quota covers this service's volume.
const SEARCH_FIELD_MASK: &str =
    "places.displayName,places.formattedAddress,places.location,places.websiteUri,places.id";

const DETAILS_FIELD_MASK: &str = "websiteUri";

const MAX_RESULTS_PER_QUERY: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    #[serde(default)]
    id: String,
    display_name: Option<DisplayName>,
    #[serde(default)]
    formatted_address: String,
    location: Option<Location>,
    website_uri: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DisplayName {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailsResponse {
    website_uri: Option<String>,
}

/// Places provider backed by the Google Places API (New).
#[derive(Clone)]
pub struct GooglePlaces {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GooglePlaces {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `GOOGLE_PLACES_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_PLACES_API_KEY").map_err(|_| {
            DiscoveryError::InvalidRequest("GOOGLE_PLACES_API_KEY is not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn candidate_from_place(place: Place) -> Candidate {
        let (lat, lng) = place
            .location
            .map(|l| (l.latitude, l.longitude))
            .unwrap_or((0.0, 0.0));
        Candidate {
            place_id: place.id,
            name: place
                .display_name
                .map(|n| n.text)
                .unwrap_or_else(|| "Unknown".to_string()),
            formatted_address: place.formatted_address,
            lat,
            lng,
            website: place.website_uri,
        }
    }
}

#[async_trait]
impl PlacesApi for GooglePlaces {
    async fn text_search(
        &self,
        query: &str,
        center: GeoPoint,
        radius_meters: u32,
    ) -> Result<Vec<Candidate>> {
        let body = json!({
            "textQuery": query,
            "locationBias": {
                "circle": {
                    "center": {"latitude": center.lat(), "longitude": center.lng()},
                    "radius": radius_meters as f64,
                }
            },
            "maxResultCount": MAX_RESULTS_PER_QUERY,
        });

        let response = self
            .client
            .post(format!("{}/places:searchText", self.base_url))
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", SEARCH_FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(DiscoveryError::provider)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let preview: String = text.chars().take(500).collect();
            error!(query, %status, error = %preview, "places text search failed");
            return Err(DiscoveryError::Provider(
                format!("text search returned {}: {}", status, preview).into(),
            ));
        }

        let parsed: SearchResponse = response.json().await.map_err(DiscoveryError::provider)?;
        Ok(parsed
            .places
            .into_iter()
            .map(Self::candidate_from_place)
            .collect())
    }

    async fn place_website(&self, place_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/places/{}", self.base_url, place_id))
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .send()
            .await
            .map_err(DiscoveryError::provider)?;

        if !response.status().is_success() {
            // Details are best-effort; a failed lookup just means no website.
            warn!(place_id, status = %response.status(), "place details lookup failed");
            return Ok(None);
        }

        let parsed: DetailsResponse = response.json().await.map_err(DiscoveryError::provider)?;
        Ok(parsed.website_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_response() {
        let body = r#"{
            "places": [{
                "id": "abc123",
                "displayName": {"text": "Denver Food Bank"},
                "formattedAddress": "123 Main St, Denver, CO 80202, USA",
                "location": {"latitude": 39.74, "longitude": -104.99},
                "websiteUri": "https://denverfoodbank.org"
            }]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let candidate = GooglePlaces::candidate_from_place(parsed.places.into_iter().next().unwrap());

        assert_eq!(candidate.place_id, "abc123");
        assert_eq!(candidate.name, "Denver Food Bank");
        assert_eq!(candidate.lat, 39.74);
        assert_eq!(candidate.website.as_deref(), Some("https://denverfoodbank.org"));
    }

    #[test]
    fn tolerates_sparse_place() {
        let body = r#"{"places": [{"id": "only-id"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let candidate = GooglePlaces::candidate_from_place(parsed.places.into_iter().next().unwrap());

        assert_eq!(candidate.name, "Unknown");
        assert_eq!(candidate.lat, 0.0);
        assert_eq!(candidate.website, None);
    }

    #[test]
    fn empty_response_yields_no_places() {
        let parsed: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.places.is_empty());
    }
}

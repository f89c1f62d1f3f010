//! Testing utilities: configurable mocks for every collaborator seam.
//!
//! These let the orchestrator, pipeline, and places client be exercised
//! without network calls or a database. All mocks are cheaply cloneable
//! and track their calls for assertions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{DiscoveryError, Result, ScrapeFailure};
use crate::traits::{PlacesApi, Scraper, AI};
use crate::types::{Candidate, GeoPoint};

/// A complete extraction response for tests that just need success.
pub const OPEN_EXTRACTION_JSON: &str = r#"{
    "status": "OPEN",
    "hours_notes": "Mon-Fri 9am-5pm",
    "hours_today": "9am-5pm",
    "eligibility_rules": ["Open to all"],
    "is_id_required": false,
    "residency_req": null,
    "special_notes": null,
    "confidence": 8
}"#;

/// Candidate without a website, addressed in Denver.
pub fn candidate(place_id: &str, name: &str, lat: f64, lng: f64) -> Candidate {
    Candidate {
        place_id: place_id.to_string(),
        name: name.to_string(),
        formatted_address: "123 Main St, Denver, CO 80202, USA".to_string(),
        lat,
        lng,
        website: None,
    }
}

/// Candidate with a website, addressed in Denver.
pub fn candidate_with_website(
    place_id: &str,
    name: &str,
    lat: f64,
    lng: f64,
    website: &str,
) -> Candidate {
    Candidate {
        website: Some(website.to_string()),
        ..candidate(place_id, name, lat, lng)
    }
}

// =============================================================================
// MockPlacesApi
// =============================================================================

/// Places provider mock with per-variant result sets and call counting.
#[derive(Clone, Default)]
pub struct MockPlacesApi {
    by_query: Arc<RwLock<HashMap<String, Vec<Candidate>>>>,
    default_results: Arc<RwLock<Vec<Candidate>>>,
    websites: Arc<RwLock<HashMap<String, String>>>,
    fail_all: Arc<AtomicBool>,
    search_calls: Arc<AtomicUsize>,
    detail_calls: Arc<AtomicUsize>,
}

impl MockPlacesApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results returned for any variant without a specific override.
    pub fn with_results(self, candidates: Vec<Candidate>) -> Self {
        *self.default_results.write().unwrap() = candidates;
        self
    }

    /// Results returned for one specific query variant.
    pub fn with_results_for(self, query: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        self.by_query.write().unwrap().insert(query.into(), candidates);
        self
    }

    /// Website returned by the details fallback for a place id.
    pub fn with_website(self, place_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.websites.write().unwrap().insert(place_id.into(), url.into());
        self
    }

    /// Make every search call fail (provider outage).
    pub fn failing(self) -> Self {
        self.fail_all.store(true, Ordering::SeqCst);
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlacesApi for MockPlacesApi {
    async fn text_search(
        &self,
        query: &str,
        _center: GeoPoint,
        _radius_meters: u32,
    ) -> Result<Vec<Candidate>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Provider("mock outage".into()));
        }
        if let Some(results) = self.by_query.read().unwrap().get(query) {
            return Ok(results.clone());
        }
        Ok(self.default_results.read().unwrap().clone())
    }

    async fn place_website(&self, place_id: &str) -> Result<Option<String>> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.websites.read().unwrap().get(place_id).cloned())
    }
}

// =============================================================================
// MockScraper
// =============================================================================

/// Scraper mock serving canned pages and failures, with optional delay
/// for cancellation tests.
#[derive(Clone, Default)]
pub struct MockScraper {
    pages: Arc<RwLock<HashMap<String, String>>>,
    failures: Arc<RwLock<HashMap<String, ScrapeFailure>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<AtomicUsize>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, markdown: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), markdown.into());
        self
    }

    pub fn with_failure(self, url: impl Into<String>, failure: ScrapeFailure) -> Self {
        self.failures.write().unwrap().insert(url.into(), failure);
        self
    }

    /// Sleep before answering, to simulate a slow site.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for MockScraper {
    async fn scrape(&self, url: &str) -> std::result::Result<String, ScrapeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = self.failures.read().unwrap().get(url) {
            return Err(failure.clone());
        }
        match self.pages.read().unwrap().get(url) {
            Some(markdown) => Ok(markdown.clone()),
            None => Err(ScrapeFailure::HttpError("HTTP 404".to_string())),
        }
    }
}

// =============================================================================
// MockAI
// =============================================================================

/// AI mock returning canned completions.
///
/// Responses can be keyed on a needle found in the user prompt, with a
/// global default for everything else.
#[derive(Clone)]
pub struct MockAI {
    by_needle: Arc<RwLock<Vec<(String, String)>>>,
    default_response: Arc<RwLock<String>>,
    fail: Arc<AtomicBool>,
    completions: Arc<AtomicUsize>,
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            by_needle: Arc::new(RwLock::new(Vec::new())),
            default_response: Arc::new(RwLock::new(OPEN_EXTRACTION_JSON.to_string())),
            fail: Arc::new(AtomicBool::new(false)),
            completions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the default response for all prompts.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        *self.default_response.write().unwrap() = response.into();
        self
    }

    /// Respond with `response` when the user prompt contains `needle`.
    pub fn with_response_for(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.by_needle
            .write()
            .unwrap()
            .push((needle.into(), response.into()));
        self
    }

    /// Make every completion fail (LLM outage).
    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    /// How many completions were requested.
    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AI for MockAI {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Ai("mock outage".into()));
        }
        for (needle, response) in self.by_needle.read().unwrap().iter() {
            if user.contains(needle.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(self.default_response.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn places_mock_serves_per_query_results() {
        let api = MockPlacesApi::new()
            .with_results(vec![candidate("default", "D", 39.7, -105.0)])
            .with_results_for("food bank", vec![candidate("bank", "B", 39.7, -105.0)]);

        let center = GeoPoint::new(39.7, -105.0);
        let bank = api.text_search("food bank", center, 8000).await.unwrap();
        assert_eq!(bank[0].place_id, "bank");

        let other = api.text_search("food pantry", center, 8000).await.unwrap();
        assert_eq!(other[0].place_id, "default");
        assert_eq!(api.search_calls(), 2);
    }

    #[tokio::test]
    async fn scraper_mock_404s_unknown_urls() {
        let scraper = MockScraper::new();
        let err = scraper.scrape("https://nowhere.org").await.unwrap_err();
        assert!(matches!(err, ScrapeFailure::HttpError(_)));
        assert_eq!(scraper.calls(), 1);
    }

    #[tokio::test]
    async fn ai_mock_matches_needles() {
        let ai = MockAI::new()
            .with_response("default")
            .with_response_for("pantry-a.org", "keyed");

        let keyed = ai.complete("sys", "content from pantry-a.org").await.unwrap();
        assert_eq!(keyed, "keyed");

        let fallback = ai.complete("sys", "something else").await.unwrap();
        assert_eq!(fallback, "default");
    }
}

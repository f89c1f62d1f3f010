//! Places client integration tests: fingerprint caching, variant
//! fan-out, deduplication, and the website fallback.

use std::sync::Arc;
use std::time::Duration;

use discovery::testing::{candidate, candidate_with_website, MockPlacesApi};
use discovery::{DiscoveryConfig, DiscoveryError, GeoPoint, MemoryStore, PlacesClient};

fn client(api: MockPlacesApi, store: Arc<MemoryStore>, config: DiscoveryConfig) -> PlacesClient {
    PlacesClient::new(Arc::new(api), store, config)
}

fn denver() -> GeoPoint {
    GeoPoint::new(39.739, -104.990)
}

#[tokio::test]
async fn cache_hit_issues_zero_provider_requests() {
    let api = MockPlacesApi::new().with_results(vec![
        candidate_with_website("p1", "A", 39.74, -104.99, "https://a.org"),
        candidate("p2", "B", 39.75, -104.98),
    ]);
    let store = Arc::new(MemoryStore::new());
    let client = client(api.clone(), store.clone(), DiscoveryConfig::default());

    let first = client.find_candidates(denver(), 8000, None).await.unwrap();
    let calls_after_miss = api.search_calls();
    assert_eq!(calls_after_miss, 4, "one search per default variant");
    assert_eq!(store.cache_entry_count(), 1, "one cache write per miss");

    // Nearby coordinates round to the same fingerprint.
    let second = client
        .find_candidates(GeoPoint::new(39.73905, -104.99002), 8000, None)
        .await
        .unwrap();

    assert_eq!(api.search_calls(), calls_after_miss, "hit issues no requests");
    assert_eq!(store.cache_entry_count(), 1, "zero writes on hits");
    assert_eq!(first, second);
}

#[tokio::test]
async fn different_radius_misses_the_cache() {
    let api = MockPlacesApi::new().with_results(vec![candidate("p1", "A", 39.74, -104.99)]);
    let store = Arc::new(MemoryStore::new());
    let client = client(api.clone(), store, DiscoveryConfig::default());

    client.find_candidates(denver(), 8000, None).await.unwrap();
    client.find_candidates(denver(), 9000, None).await.unwrap();

    assert_eq!(api.search_calls(), 8, "both radii hit the provider");
}

#[tokio::test]
async fn expired_cache_entry_refetches() {
    let api = MockPlacesApi::new().with_results(vec![candidate("p1", "A", 39.74, -104.99)]);
    let store = Arc::new(MemoryStore::new());
    let config = DiscoveryConfig {
        places_cache_ttl: Duration::from_millis(40),
        ..DiscoveryConfig::default()
    };
    let client = client(api.clone(), store, config);

    client.find_candidates(denver(), 8000, None).await.unwrap();
    assert_eq!(api.search_calls(), 4);

    tokio::time::sleep(Duration::from_millis(80)).await;

    client.find_candidates(denver(), 8000, None).await.unwrap();
    assert_eq!(api.search_calls(), 8, "expired entry goes back to the provider");
}

#[tokio::test]
async fn overlapping_variants_deduplicate_by_place_id() {
    let api = MockPlacesApi::new()
        .with_results(vec![])
        .with_results_for(
            "food bank",
            vec![
                candidate("shared", "Shared", 39.74, -104.99),
                candidate("bank-only", "Bank", 39.75, -104.98),
            ],
        )
        .with_results_for(
            "food pantry",
            vec![
                candidate("shared", "Shared", 39.74, -104.99),
                candidate("pantry-only", "Pantry", 39.76, -104.97),
            ],
        );
    let store = Arc::new(MemoryStore::new());
    let client = client(api, store, DiscoveryConfig::default());

    let candidates = client.find_candidates(denver(), 8000, None).await.unwrap();

    let mut ids: Vec<&str> = candidates.iter().map(|c| c.place_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["bank-only", "pantry-only", "shared"]);
}

#[tokio::test]
async fn all_variants_failing_is_upstream_unavailable() {
    let api = MockPlacesApi::new().failing();
    let store = Arc::new(MemoryStore::new());
    let client = client(api, store.clone(), DiscoveryConfig::default());

    let err = client.find_candidates(denver(), 8000, None).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::UpstreamUnavailable));
    assert_eq!(store.cache_entry_count(), 0, "failure must not poison the cache");
}

#[tokio::test]
async fn website_fallback_fills_missing_urls() {
    let api = MockPlacesApi::new()
        .with_results(vec![
            candidate_with_website("has", "Has", 39.74, -104.99, "https://has.org"),
            candidate("missing", "Missing", 39.75, -104.98),
            candidate("still-missing", "Still", 39.76, -104.97),
        ])
        .with_website("missing", "https://recovered.org");
    let store = Arc::new(MemoryStore::new());
    let client = client(api.clone(), store, DiscoveryConfig::default());

    let candidates = client.find_candidates(denver(), 8000, None).await.unwrap();

    let by_id = |id: &str| candidates.iter().find(|c| c.place_id == id).unwrap();
    assert_eq!(by_id("has").website.as_deref(), Some("https://has.org"));
    assert_eq!(
        by_id("missing").website.as_deref(),
        Some("https://recovered.org")
    );
    assert_eq!(by_id("still-missing").website, None);
    // Only the two website-less candidates needed a details lookup.
    assert_eq!(api.detail_calls(), 2);
}

#[tokio::test]
async fn caller_variants_override_defaults() {
    let api = MockPlacesApi::new()
        .with_results(vec![])
        .with_results_for("soup kitchen", vec![candidate("soup", "Soup", 39.74, -104.99)]);
    let store = Arc::new(MemoryStore::new());
    let client = client(api.clone(), store, DiscoveryConfig::default());

    let candidates = client
        .find_candidates(denver(), 8000, Some(&["soup kitchen".to_string()]))
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].place_id, "soup");
    assert_eq!(api.search_calls(), 1, "only the supplied variant runs");
}

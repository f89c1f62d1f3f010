//! Places lookup with fingerprinted caching and variant fan-out.
//!
//! One discovery issues several query variants ("food bank",
//! "food pantry", ...) in parallel, unions the results by `place_id`,
//! recovers missing websites via a details fallback, and caches the
//! whole candidate set under a fingerprint of the canonicalized request.

mod google;

pub use google::GooglePlaces;

use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::traits::{PlacesApi, PlacesCache};
use crate::types::{Candidate, CandidateSet, GeoPoint, PlacesCacheEntry};

/// Canonical cache key for a places request.
///
/// Coordinates are rounded so nearby queries share a fingerprint; this is the
/// only mechanism for cache sharing. Variants are sorted so the key is
/// order-independent.
pub fn fingerprint(center: GeoPoint, radius_meters: u32, variants: &[String], round: u32) -> String {
    let mut sorted: Vec<&str> = variants.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let precision = round as usize;
    let canonical = format!(
        "{lat:.precision$}|{lng:.precision$}|{radius}|{variants}",
        lat = center.lat(),
        lng = center.lng(),
        radius = radius_meters,
        variants = sorted.join("\n"),
    );

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Deduplicated, TTL-cached candidate lookup over a [`PlacesApi`].
#[derive(Clone)]
pub struct PlacesClient {
    api: Arc<dyn PlacesApi>,
    cache: Arc<dyn PlacesCache>,
    config: DiscoveryConfig,
}

impl PlacesClient {
    pub fn new(api: Arc<dyn PlacesApi>, cache: Arc<dyn PlacesCache>, config: DiscoveryConfig) -> Self {
        Self { api, cache, config }
    }

    /// Find candidates near a point, deduplicated by `place_id`.
    ///
    /// Fail-soft across variants: a single variant failure is logged and
    /// skipped; only all variants failing is an error. A cache hit issues
    /// zero provider requests; a miss writes the cache exactly once.
    pub async fn find_candidates(
        &self,
        center: GeoPoint,
        radius_meters: u32,
        variants: Option<&[String]>,
    ) -> Result<Vec<Candidate>> {
        let variants: Vec<String> = variants
            .filter(|v| !v.is_empty())
            .map(|v| v.to_vec())
            .unwrap_or_else(|| self.config.places_variants.clone());

        let key = fingerprint(
            center,
            radius_meters,
            &variants,
            self.config.places_lat_lng_round,
        );

        // Cache failures are non-fatal; treat them as a miss.
        match self.cache.get_entry(&key).await {
            Ok(Some(entry)) if !entry.is_expired(self.config.places_cache_ttl) => {
                info!(
                    fingerprint = %key,
                    results = entry.candidates.len(),
                    "places search cache hit"
                );
                return Ok(entry.candidates);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "places cache read failed"),
        }

        info!(
            lat = center.lat(),
            lng = center.lng(),
            radius_meters,
            variants = variants.len(),
            "places search starting"
        );

        let searches = variants.iter().map(|variant| {
            let api = self.api.clone();
            let variant = variant.clone();
            async move {
                let result = timeout(
                    self.config.places_timeout,
                    api.text_search(&variant, center, radius_meters),
                )
                .await
                .unwrap_or(Err(DiscoveryError::Timeout));
                (variant, result)
            }
        });

        let mut set = CandidateSet::new();
        let mut any_succeeded = false;
        for (variant, result) in join_all(searches).await {
            match result {
                Ok(candidates) => {
                    any_succeeded = true;
                    for candidate in candidates {
                        set.insert(candidate);
                    }
                }
                Err(e) => {
                    warn!(variant = %variant, error = %e, "places variant failed");
                }
            }
        }

        if !any_succeeded {
            return Err(DiscoveryError::UpstreamUnavailable);
        }

        let candidates = self.fill_missing_websites(set.into_vec()).await;

        let with_website = candidates.iter().filter(|c| c.website.is_some()).count();
        info!(
            total = candidates.len(),
            with_website,
            without_website = candidates.len() - with_website,
            "places search complete"
        );

        let entry = PlacesCacheEntry::new(key, candidates.clone());
        if let Err(e) = self.cache.put_entry(&entry).await {
            warn!(error = %e, "failed to cache places results");
        }

        Ok(candidates)
    }

    /// Try the details fallback for every candidate missing a website.
    /// Failures are tolerated; the candidate just stays website-less.
    async fn fill_missing_websites(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut lookups = Vec::new();
        for (i, c) in candidates.iter().enumerate() {
            if c.website.is_some() {
                continue;
            }
            let api = self.api.clone();
            let place_id = c.place_id.clone();
            lookups.push(async move {
                let website = match api.place_website(&place_id).await {
                    Ok(website) => website,
                    Err(e) => {
                        debug!(place_id = %place_id, error = %e, "website fallback failed");
                        None
                    }
                };
                (i, website)
            });
        }

        let results = join_all(lookups).await;
        for (i, website) in results {
            if let Some(url) = website {
                candidates[i].website = Some(url);
            }
        }
        candidates
    }
}

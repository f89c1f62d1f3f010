//! Ingestion pipeline: scrape -> extract -> validate for one candidate.
//!
//! Stage failures recover locally: a candidate whose website cannot be
//! scraped or whose content cannot be extracted still yields a storable
//! places-only record. Only structural problems (missing name or
//! coordinates) drop a candidate outright.

use chrono::Utc;
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, ExtractFailure, Result, ScrapeFailure};
use crate::extract::Extractor;
use crate::traits::Scraper;
use crate::types::{Candidate, GeoPoint, Pantry, PantryStatus, PantryUpdate};
use crate::validate::{self, sanitize};

/// Tag recorded on records produced by this pipeline.
const SCRAPE_METHOD: &str = "http";

/// Note attached to records built from places data alone.
const PLACES_ONLY_NOTE: &str = "Limited info — places-only";

/// The result of ingesting one candidate.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Scrape and extraction both succeeded.
    Enriched(Pantry),
    /// Website missing or a stage failed; record built from places
    /// fields only, marked low-confidence.
    PlacesOnly(Pantry),
    /// Structurally unusable candidate (missing name or coordinates).
    Dropped(String),
}

/// Composes Scraper -> Extractor -> Validator for one candidate.
#[derive(Clone)]
pub struct IngestionPipeline {
    scraper: Arc<dyn Scraper>,
    extractor: Extractor,
    config: DiscoveryConfig,
}

impl IngestionPipeline {
    pub fn new(scraper: Arc<dyn Scraper>, extractor: Extractor, config: DiscoveryConfig) -> Self {
        Self {
            scraper,
            extractor,
            config,
        }
    }

    /// Run the full pipeline for one candidate.
    ///
    /// Returns `Err(Cancelled)` only when the job token fires mid-stage;
    /// every other path yields an `IngestOutcome`.
    pub async fn ingest_candidate(
        &self,
        candidate: &Candidate,
        cancel: &CancellationToken,
    ) -> Result<IngestOutcome> {
        if candidate.name.trim().is_empty() {
            return Ok(IngestOutcome::Dropped("missing name".to_string()));
        }
        if candidate.lat == 0.0 && candidate.lng == 0.0 {
            return Ok(IngestOutcome::Dropped("missing coordinates".to_string()));
        }

        let url = match &candidate.website {
            Some(url) => url.clone(),
            None => return Ok(IngestOutcome::PlacesOnly(self.places_only(candidate))),
        };

        let markdown = tokio::select! {
            _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
            result = timeout(self.config.scrape_timeout, self.scraper.scrape(&url)) => {
                match result {
                    Ok(Ok(markdown)) => markdown,
                    Ok(Err(failure)) => {
                        warn!(url = %url, reason = failure.reason(), "scrape failed, falling back to places data");
                        return Ok(IngestOutcome::PlacesOnly(self.places_only(candidate)));
                    }
                    Err(_) => {
                        warn!(url = %url, reason = ScrapeFailure::Timeout.reason(), "scrape timed out, falling back to places data");
                        return Ok(IngestOutcome::PlacesOnly(self.places_only(candidate)));
                    }
                }
            }
        };

        let raw = tokio::select! {
            _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
            result = timeout(self.config.extract_timeout, self.extractor.extract(&markdown)) => {
                match result {
                    Ok(Ok(raw)) => raw,
                    Ok(Err(failure)) => {
                        warn!(url = %url, reason = failure.reason(), "extraction failed, falling back to places data");
                        return Ok(IngestOutcome::PlacesOnly(self.places_only(candidate)));
                    }
                    Err(_) => {
                        warn!(url = %url, reason = "timeout", "extraction timed out, falling back to places data");
                        return Ok(IngestOutcome::PlacesOnly(self.places_only(candidate)));
                    }
                }
            }
        };

        let update = sanitize(raw, false);
        info!(
            url = %url,
            confidence = update.confidence,
            status = %update.status,
            "ingestion complete"
        );

        Ok(IngestOutcome::Enriched(self.build_pantry(
            candidate,
            update,
            Some(url),
        )))
    }

    /// Re-run scrape -> extract -> validate for an already-stored URL.
    ///
    /// Unlike candidate ingestion this surfaces stage failures to the
    /// caller; a synchronous re-ingest has no places-only fallback.
    pub async fn ingest_url(&self, url: &str) -> Result<PantryUpdate> {
        let markdown = timeout(self.config.scrape_timeout, self.scraper.scrape(url))
            .await
            .unwrap_or(Err(ScrapeFailure::Timeout))?;

        let raw = timeout(self.config.extract_timeout, self.extractor.extract(&markdown))
            .await
            .unwrap_or(Err(ExtractFailure::LlmError("timed out".to_string())))?;

        Ok(sanitize(raw, false))
    }

    /// A storable record from places fields alone.
    pub fn places_only(&self, candidate: &Candidate) -> Pantry {
        let update = PantryUpdate {
            status: PantryStatus::Unknown,
            hours_notes: validate::HOURS_NOT_LISTED.to_string(),
            hours_today: validate::HOURS_TODAY_NOT_LISTED.to_string(),
            eligibility_rules: vec![validate::DEFAULT_ELIGIBILITY.to_string()],
            is_id_required: false,
            residency_req: None,
            special_notes: Some(PLACES_ONLY_NOTE.to_string()),
            confidence: validate::PLACES_ONLY_CONFIDENCE,
        };
        self.build_pantry(candidate, update, None)
    }

    fn build_pantry(
        &self,
        candidate: &Candidate,
        update: PantryUpdate,
        source_url: Option<String>,
    ) -> Pantry {
        let (city, state) = candidate.city_state();
        let now = Utc::now();
        let scraped = source_url.is_some();

        Pantry {
            id: Uuid::new_v4(),
            place_id: Some(candidate.place_id.clone()),
            name: candidate.name.clone(),
            address: candidate.formatted_address.clone(),
            city,
            state,
            point: GeoPoint::new(candidate.lat, candidate.lng),
            status: update.status,
            hours_notes: update.hours_notes,
            hours_today: update.hours_today,
            eligibility_rules: update.eligibility_rules,
            is_id_required: update.is_id_required,
            residency_req: update.residency_req,
            special_notes: update.special_notes,
            confidence: Some(update.confidence),
            source_url,
            scrape_method: scraped.then(|| SCRAPE_METHOD.to_string()),
            scraped_at: scraped.then_some(now),
            last_updated: now,
        }
    }
}

//! Discovery orchestrator: the top-level state machine.
//!
//! Owns the job registry and event bus, drives the places lookup,
//! schedules per-candidate ingestion on a bounded worker pool shared
//! across jobs, upserts validated pantries, and publishes the typed
//! event stream for each job.
//!
//! All process state (store handles, cache, registry, config) is wired
//! in explicitly at construction; the orchestrator is the composition
//! root's single entry point, cloneable and cheap to share.

mod bus;
mod rate_limit;
mod registry;

pub use bus::{EventBus, EventStream};
pub use rate_limit::CallerLimits;
pub use registry::{JobEntry, JobRegistry};

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use uuid::Uuid;

use tracing::{error, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::extract::Extractor;
use crate::pipeline::{IngestOutcome, IngestionPipeline};
use crate::places::PlacesClient;
use crate::traits::{PantryFilter, PantryStore, PlacesApi, PlacesCache, Scraper, AI};
use crate::types::{
    Candidate, CitySummary, DiscoveryEvent, GeoPoint, JobSnapshot, JobState, Pantry,
};

/// Reason recorded on `pantry_skipped` events for known places.
const SKIP_ALREADY_KNOWN: &str = "already_known";

/// A request to discover pantries around a point.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    /// Human-readable location label, e.g. "Denver".
    pub query: String,
    pub lat: f64,
    pub lng: f64,
    pub radius_meters: u32,
    /// Query variants to send to the places provider; None uses the
    /// configured defaults.
    pub variants: Option<Vec<String>>,
}

/// What `start_job` hands back to the caller.
pub struct JobStarted {
    pub job_id: Uuid,
    /// Live event stream for this job, subscribed from the start.
    pub events: EventStream,
    /// Pantries already stored within the requested radius, so the
    /// caller can decide whether the job is worth awaiting.
    pub existing_pantries: u64,
}

/// Top-level discovery orchestrator.
#[derive(Clone)]
pub struct DiscoveryOrchestrator {
    config: DiscoveryConfig,
    store: Arc<dyn PantryStore>,
    places: PlacesClient,
    pipeline: IngestionPipeline,
    registry: JobRegistry,
    bus: EventBus,
    workers: Arc<Semaphore>,
    limits: Arc<CallerLimits>,
}

impl DiscoveryOrchestrator {
    /// Wire the orchestrator from its collaborators.
    pub fn new(
        config: DiscoveryConfig,
        store: Arc<dyn PantryStore>,
        places_api: Arc<dyn PlacesApi>,
        places_cache: Arc<dyn PlacesCache>,
        scraper: Arc<dyn Scraper>,
        ai: Arc<dyn AI>,
    ) -> Self {
        let places = PlacesClient::new(places_api, places_cache, config.clone());
        let pipeline = IngestionPipeline::new(scraper, Extractor::new(ai), config.clone());
        let workers = Arc::new(Semaphore::new(config.worker_concurrency.max(1)));
        let limits = Arc::new(CallerLimits::new(
            config.start_jobs_per_minute,
            config.subscribes_per_minute,
        ));
        let bus = EventBus::new(config.subscriber_buffer);

        Self {
            config,
            store,
            places,
            pipeline,
            registry: JobRegistry::new(),
            bus,
            workers,
            limits,
        }
    }

    // ── Job lifecycle ───────────────────────────────────────────────────

    /// Start a discovery job. Returns immediately with the job id, a
    /// subscribed event stream, and the count of pantries already known
    /// in the area; the discovery itself runs as a background task.
    pub async fn start_job(&self, caller_id: &str, request: DiscoveryRequest) -> Result<JobStarted> {
        self.limits.check_start_job(caller_id)?;
        validate_request(&request)?;

        let job_id = Uuid::new_v4();
        let center = GeoPoint::new(request.lat, request.lng);

        let existing_pantries = self
            .store
            .count_within(center, request.radius_meters as f64)
            .await?;

        let snapshot = JobSnapshot::new(job_id, &request.query, center, request.radius_meters);
        self.registry.insert(snapshot);
        self.bus.open(job_id).await;

        // Subscribe before the first publish so the caller's stream sees
        // the full sequence.
        let events = EventStream::new(vec![], self.bus.subscribe(job_id).await);

        self.bus
            .publish(
                job_id,
                DiscoveryEvent::JobStarted {
                    job_id,
                    query: request.query.clone(),
                    urls_found: 0,
                },
            )
            .await;

        info!(
            job_id = %job_id,
            query = %request.query,
            lat = request.lat,
            lng = request.lng,
            radius_meters = request.radius_meters,
            existing = existing_pantries,
            "discovery job started"
        );

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_discovery(job_id, request).await;
        });

        Ok(JobStarted {
            job_id,
            events,
            existing_pantries,
        })
    }

    /// Attach to a job's event stream.
    ///
    /// The stream starts with a `job_started` synthesized from current
    /// state; per-pantry history is not back-filled (poll the store for
    /// that). A finished job yields `job_started` then `complete`.
    pub async fn subscribe(&self, caller_id: &str, job_id: Uuid) -> Result<EventStream> {
        self.limits.check_subscribe(caller_id)?;

        let entry = self
            .registry
            .get(job_id)
            .ok_or(DiscoveryError::JobNotFound(job_id))?;
        let snapshot = entry.snapshot();

        let synthesized = DiscoveryEvent::JobStarted {
            job_id,
            query: snapshot.query.clone(),
            urls_found: snapshot.urls_found,
        };

        if snapshot.status.is_terminal() {
            let counters = snapshot.counters;
            return Ok(EventStream::new(
                vec![
                    synthesized,
                    DiscoveryEvent::Complete {
                        found: counters.succeeded,
                        failed: counters.failed,
                        skipped: counters.skipped,
                    },
                ],
                None,
            ));
        }

        Ok(EventStream::new(
            vec![synthesized],
            self.bus.subscribe(job_id).await,
        ))
    }

    /// Current status of a job.
    pub fn job_status(&self, job_id: Uuid) -> Result<JobSnapshot> {
        self.registry
            .get(job_id)
            .map(|entry| entry.snapshot())
            .ok_or(DiscoveryError::JobNotFound(job_id))
    }

    /// Cancel a job. Idempotent: stopping a finished, already-stopped,
    /// or unknown job is an acknowledged no-op.
    pub fn stop_job(&self, job_id: Uuid) {
        if let Some(entry) = self.registry.get(job_id) {
            info!(job_id = %job_id, "stop requested");
            entry.cancel.cancel();
        }
    }

    // ── Store-backed queries ────────────────────────────────────────────

    /// List pantries, optionally filtered by city/state.
    pub async fn list_pantries(&self, filter: PantryFilter) -> Result<Vec<Pantry>> {
        self.store.list(&filter).await
    }

    /// Pantries near a point, closest first.
    pub async fn nearby_pantries(
        &self,
        lat: f64,
        lng: f64,
        max_distance_m: f64,
        limit: usize,
    ) -> Result<Vec<Pantry>> {
        self.store
            .nearby(GeoPoint::new(lat, lng), max_distance_m, limit)
            .await
    }

    /// Cities with pantry counts and centers.
    pub async fn list_cities(&self) -> Result<Vec<CitySummary>> {
        self.store.list_cities().await
    }

    /// Synchronously re-ingest a stored pantry from its source URL and
    /// return the updated record.
    pub async fn ingest_one(&self, pantry_id: Uuid) -> Result<Pantry> {
        let pantry = self
            .store
            .get(pantry_id)
            .await?
            .ok_or(DiscoveryError::PantryNotFound(pantry_id))?;

        let url = pantry.source_url.clone().ok_or_else(|| {
            DiscoveryError::InvalidRequest("pantry has no source_url to ingest".to_string())
        })?;

        let update = self.pipeline.ingest_url(&url).await?;
        let now = Utc::now();

        let updated = Pantry {
            status: update.status,
            hours_notes: update.hours_notes,
            hours_today: update.hours_today,
            eligibility_rules: update.eligibility_rules,
            is_id_required: update.is_id_required,
            residency_req: update.residency_req,
            special_notes: update.special_notes,
            confidence: Some(update.confidence),
            scraped_at: Some(now),
            last_updated: now,
            ..pantry
        };

        self.store.upsert(&updated).await
    }

    // ── Internal discovery flow ─────────────────────────────────────────

    /// Background driver for one job: runs the discovery under the job
    /// timeout and cancellation token, then publishes the terminal
    /// events and schedules registry GC.
    async fn run_discovery(&self, job_id: Uuid, request: DiscoveryRequest) {
        let Some(entry) = self.registry.get(job_id) else {
            return;
        };
        let cancel = entry.cancel.clone();

        // A running job nobody is watching gets cancelled after a grace
        // period; subscribers reappearing resets the clock.
        let idle_watcher = tokio::spawn({
            let bus = self.bus.clone();
            let cancel = cancel.clone();
            let grace = self.config.zero_subscriber_grace;
            async move {
                let tick = (grace / 4).max(std::time::Duration::from_millis(50));
                let mut idle_since: Option<std::time::Instant> = None;
                loop {
                    tokio::time::sleep(tick).await;
                    if bus.subscriber_count(job_id).await == 0 {
                        let since = *idle_since.get_or_insert_with(std::time::Instant::now);
                        if since.elapsed() >= grace {
                            info!(job_id = %job_id, "no subscribers left, cancelling job");
                            cancel.cancel();
                            return;
                        }
                    } else {
                        idle_since = None;
                    }
                }
            }
        });

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(DiscoveryError::Cancelled),
            result = timeout(self.config.job_timeout, self.drive(job_id, &entry, &request)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(DiscoveryError::Timeout),
                }
            }
        };

        idle_watcher.abort();

        let final_state = match &outcome {
            Ok(()) => JobState::Completed,
            Err(DiscoveryError::Cancelled) => {
                info!(job_id = %job_id, "discovery job cancelled");
                JobState::Completed
            }
            Err(DiscoveryError::Timeout) => {
                warn!(job_id = %job_id, "discovery job hit its hard time ceiling");
                cancel.cancel();
                self.bus
                    .publish(
                        job_id,
                        DiscoveryEvent::ErrorEvent {
                            message: "job timed out".to_string(),
                        },
                    )
                    .await;
                JobState::Completed
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "discovery job failed");
                self.bus
                    .publish(
                        job_id,
                        DiscoveryEvent::ErrorEvent {
                            message: e.to_string(),
                        },
                    )
                    .await;
                JobState::Failed
            }
        };

        let snapshot = entry.finish(final_state);
        let counters = snapshot.counters;
        self.bus
            .publish(
                job_id,
                DiscoveryEvent::Complete {
                    found: counters.succeeded,
                    failed: counters.failed,
                    skipped: counters.skipped,
                },
            )
            .await;

        info!(
            job_id = %job_id,
            status = ?snapshot.status,
            urls_found = snapshot.urls_found,
            succeeded = counters.succeeded,
            failed = counters.failed,
            skipped = counters.skipped,
            duration_ms = snapshot.duration_ms,
            "discovery job finished"
        );

        // Keep the terminal job queryable for a grace period, then GC.
        let orchestrator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(orchestrator.config.job_retention).await;
            orchestrator.bus.close(job_id).await;
            orchestrator.registry.remove(job_id);
        });
    }

    /// The discovery flow proper: places lookup, partition, worker fan-out.
    async fn drive(
        &self,
        job_id: Uuid,
        entry: &Arc<JobEntry>,
        request: &DiscoveryRequest,
    ) -> Result<()> {
        let center = GeoPoint::new(request.lat, request.lng);
        let candidates = self
            .places
            .find_candidates(center, request.radius_meters, request.variants.as_deref())
            .await?;

        entry.set_urls_found(candidates.len() as u32);
        self.bus
            .publish(
                job_id,
                DiscoveryEvent::JobStarted {
                    job_id,
                    query: request.query.clone(),
                    urls_found: candidates.len() as u32,
                },
            )
            .await;

        if candidates.is_empty() {
            return Ok(());
        }

        let place_ids: Vec<String> = candidates.iter().map(|c| c.place_id.clone()).collect();
        let known = self.store.known_place_ids(&place_ids).await?;

        let mut to_scrape: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            if known.contains(&candidate.place_id) {
                entry.record_skipped();
                self.bus
                    .publish(
                        job_id,
                        DiscoveryEvent::PantrySkipped {
                            place_id: candidate.place_id.clone(),
                            reason: SKIP_ALREADY_KNOWN.to_string(),
                        },
                    )
                    .await;
            } else if candidate.website.is_none() {
                self.handle_outcome(
                    job_id,
                    entry,
                    IngestOutcome::PlacesOnly(self.pipeline.places_only(&candidate)),
                    &candidate,
                )
                .await;
            } else {
                to_scrape.push(candidate);
            }
        }

        let cancel = entry.cancel.clone();
        let tasks = to_scrape.iter().map(|candidate| {
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return;
                }
                let _permit = tokio::select! {
                    _ = cancel.cancelled() => return,
                    permit = self.workers.acquire() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                match self.pipeline.ingest_candidate(candidate, &cancel).await {
                    Ok(outcome) => {
                        self.handle_outcome(job_id, entry, outcome, candidate).await;
                    }
                    Err(DiscoveryError::Cancelled) => {}
                    Err(e) => {
                        warn!(place_id = %candidate.place_id, error = %e, "candidate ingestion errored");
                        entry.record_failed();
                        self.bus
                            .publish(
                                job_id,
                                DiscoveryEvent::PantryFailed {
                                    url: candidate.website.clone().unwrap_or_default(),
                                    reason: e.to_string(),
                                },
                            )
                            .await;
                        self.maybe_progress(job_id, entry).await;
                    }
                }
            }
        });
        join_all(tasks).await;

        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        Ok(())
    }

    /// Upsert (when there is a record) and publish the per-candidate
    /// events for one pipeline outcome.
    async fn handle_outcome(
        &self,
        job_id: Uuid,
        entry: &Arc<JobEntry>,
        outcome: IngestOutcome,
        candidate: &Candidate,
    ) {
        match outcome {
            IngestOutcome::Enriched(pantry) | IngestOutcome::PlacesOnly(pantry) => {
                match self.store.upsert(&pantry).await {
                    Ok(stored) => {
                        entry.record_succeeded();
                        // The upsert happens-before this event: by the
                        // time a subscriber sees it, the pantry is
                        // queryable.
                        self.bus
                            .publish(job_id, DiscoveryEvent::PantryDiscovered { pantry: stored })
                            .await;
                    }
                    Err(e) => {
                        error!(place_id = %candidate.place_id, error = %e, "pantry upsert failed");
                        entry.record_failed();
                        self.bus
                            .publish(
                                job_id,
                                DiscoveryEvent::PantryFailed {
                                    url: candidate.website.clone().unwrap_or_default(),
                                    reason: format!("store error: {}", e),
                                },
                            )
                            .await;
                    }
                }
            }
            IngestOutcome::Dropped(reason) => {
                entry.record_failed();
                self.bus
                    .publish(
                        job_id,
                        DiscoveryEvent::PantryFailed {
                            url: candidate.website.clone().unwrap_or_default(),
                            reason,
                        },
                    )
                    .await;
            }
        }
        self.maybe_progress(job_id, entry).await;
    }

    /// Emit a `progress` event unless one went out within the coalesce
    /// window.
    async fn maybe_progress(&self, job_id: Uuid, entry: &Arc<JobEntry>) {
        if !entry.should_emit_progress(self.config.progress_coalesce) {
            return;
        }
        let counters = entry.counters();
        self.bus
            .publish(
                job_id,
                DiscoveryEvent::Progress {
                    total: entry.urls_found(),
                    succeeded: counters.succeeded,
                    failed: counters.failed,
                },
            )
            .await;
    }
}

fn validate_request(request: &DiscoveryRequest) -> Result<()> {
    if !(-90.0..=90.0).contains(&request.lat) {
        return Err(DiscoveryError::InvalidRequest(format!(
            "latitude out of range: {}",
            request.lat
        )));
    }
    if !(-180.0..=180.0).contains(&request.lng) {
        return Err(DiscoveryError::InvalidRequest(format!(
            "longitude out of range: {}",
            request.lng
        )));
    }
    if request.radius_meters == 0 {
        return Err(DiscoveryError::InvalidRequest(
            "radius_meters must be positive".to_string(),
        ));
    }
    Ok(())
}

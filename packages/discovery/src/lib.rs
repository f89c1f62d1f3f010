//! Food Pantry Discovery Orchestration Core
//!
//! Discovers food pantries near a location, enriches each discovered
//! place by scraping its website and extracting structured fields via an
//! LLM, persists enriched records in a geospatially indexed store, and
//! streams progress to callers in real time.
//!
//! # Architecture
//!
//! Six cooperating components, leaves first:
//!
//! 1. [`places::PlacesClient`], deduplicated, TTL-cached candidate
//!    lookup over a places provider.
//! 2. [`scrape`], URL to markdown-shaped text, or a typed failure.
//! 3. [`extract::Extractor`], markdown to a structured pantry record
//!    via an LLM.
//! 4. [`validate`], clamping sanitizer; a validated record is always
//!    storable.
//! 5. [`pipeline::IngestionPipeline`], scrape → extract → validate for
//!    one candidate, with places-only fallback.
//! 6. [`orchestrator::DiscoveryOrchestrator`], the top-level state
//!    machine: job registry, bounded worker pool, upserts, and per-job
//!    event streams.
//!
//! External collaborators (HTTP transport, vendor SDKs, DB bootstrap)
//! sit behind the traits in [`traits`]; tests swap in the mocks from
//! [`testing`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use discovery::{DiscoveryConfig, DiscoveryOrchestrator, DiscoveryRequest};
//! use discovery::{GooglePlaces, HttpScraper, OpenAi, PostgresStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(PostgresStore::from_pool(pool).await?);
//! let orchestrator = DiscoveryOrchestrator::new(
//!     DiscoveryConfig::from_env(),
//!     store.clone(),
//!     Arc::new(GooglePlaces::from_env()?),
//!     store,
//!     Arc::new(HttpScraper::new()),
//!     Arc::new(OpenAi::from_env()?),
//! );
//!
//! let mut job = orchestrator
//!     .start_job("caller-ip", DiscoveryRequest {
//!         query: "Denver".into(),
//!         lat: 39.739,
//!         lng: -104.990,
//!         radius_meters: 8000,
//!         variants: None,
//!     })
//!     .await?;
//!
//! while let Some(event) = job.events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

pub mod ai;
pub mod config;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod pipeline;
pub mod places;
pub mod scrape;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod validate;

// Core types at the crate root
pub use config::DiscoveryConfig;
pub use error::{DiscoveryError, ExtractFailure, Result, ScrapeFailure};
pub use types::{
    Candidate, CandidateSet, CitySummary, DiscoveryEvent, GeoPoint, JobCounters, JobSnapshot,
    JobState, Pantry, PantryStatus, PantryUpdate, PlacesCacheEntry, RawExtraction,
};

// Component entry points
pub use extract::Extractor;
pub use orchestrator::{
    DiscoveryOrchestrator, DiscoveryRequest, EventBus, EventStream, JobStarted,
};
pub use pipeline::{IngestOutcome, IngestionPipeline};
pub use places::{fingerprint, PlacesClient};

// Trait seams
pub use traits::{PantryFilter, PantryStore, PlacesApi, PlacesCache, Scraper, AI};

// Production implementations
pub use ai::OpenAi;
pub use places::GooglePlaces;
pub use scrape::HttpScraper;
pub use stores::{merge_pantry, MemoryStore, PostgresStore};

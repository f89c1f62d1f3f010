//! Storage traits for pantries and the places cache.
//!
//! Split into two focused traits: `PantryStore` for the durable pantry
//! collection and `PlacesCache` for fingerprinted provider results. A
//! single backend may implement both (the in-memory store does).

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{CitySummary, GeoPoint, Pantry, PlacesCacheEntry};

/// Optional filters for listing pantries.
#[derive(Debug, Clone, Default)]
pub struct PantryFilter {
    pub city: Option<String>,
    pub state: Option<String>,
}

impl PantryFilter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn city(city: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            state: None,
        }
    }
}

/// The durable pantry collection, keyed by `place_id` for upserts and
/// indexed on `point` for radius queries.
#[async_trait]
pub trait PantryStore: Send + Sync {
    /// Fetch a pantry by its stable id.
    async fn get(&self, id: Uuid) -> Result<Option<Pantry>>;

    /// Fetch a pantry by provider place id.
    async fn find_by_place_id(&self, place_id: &str) -> Result<Option<Pantry>>;

    /// Insert or update by `place_id`.
    ///
    /// On update the stored record is merged with the incoming one:
    /// provenance fields are refreshed, non-null stored values are never
    /// overwritten with null, and two concurrent upserts for the same
    /// place converge to one record. Returns the stored record.
    async fn upsert(&self, pantry: &Pantry) -> Result<Pantry>;

    /// List pantries, optionally filtered by city/state, ordered by name.
    async fn list(&self, filter: &PantryFilter) -> Result<Vec<Pantry>>;

    /// Pantries within `max_distance_m` of a point, nearest first.
    async fn nearby(
        &self,
        center: GeoPoint,
        max_distance_m: f64,
        limit: usize,
    ) -> Result<Vec<Pantry>>;

    /// Count pantries within a radius of a point.
    async fn count_within(&self, center: GeoPoint, radius_m: f64) -> Result<u64>;

    /// Which of the given place ids already exist in the store.
    async fn known_place_ids(&self, place_ids: &[String]) -> Result<HashSet<String>>;

    /// Cities with pantry counts and mean centers, most pantries first.
    async fn list_cities(&self) -> Result<Vec<CitySummary>>;
}

/// Cache of places-provider results keyed by query fingerprint.
///
/// Reads are snapshots; a write atomically replaces the entry for its
/// fingerprint. Expiry is enforced by the reader against `created_at`.
#[async_trait]
pub trait PlacesCache: Send + Sync {
    /// Get the entry for a fingerprint, regardless of age.
    async fn get_entry(&self, fingerprint: &str) -> Result<Option<PlacesCacheEntry>>;

    /// Store an entry, replacing any previous one for the fingerprint.
    async fn put_entry(&self, entry: &PlacesCacheEntry) -> Result<()>;
}

//! In-memory storage implementation for testing and development.
//!
//! Implements both `PantryStore` and `PlacesCache`. Not suitable for
//! production: data is lost on restart and radius queries scan every
//! record.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

use super::merge_pantry;
use crate::error::Result;
use crate::traits::{PantryFilter, PantryStore, PlacesCache};
use crate::types::{CitySummary, GeoPoint, Pantry, PlacesCacheEntry};

/// In-memory pantry store and places cache.
#[derive(Default)]
pub struct MemoryStore {
    pantries: RwLock<HashMap<Uuid, Pantry>>,
    cache: RwLock<HashMap<String, PlacesCacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored pantries.
    pub fn pantry_count(&self) -> usize {
        self.read_pantries().len()
    }

    /// Number of cached places entries.
    pub fn cache_entry_count(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.pantries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn read_pantries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Pantry>> {
        self.pantries.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PantryStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Pantry>> {
        Ok(self.read_pantries().get(&id).cloned())
    }

    async fn find_by_place_id(&self, place_id: &str) -> Result<Option<Pantry>> {
        Ok(self
            .read_pantries()
            .values()
            .find(|p| p.place_id.as_deref() == Some(place_id))
            .cloned())
    }

    async fn upsert(&self, pantry: &Pantry) -> Result<Pantry> {
        let mut pantries = self.pantries.write().unwrap_or_else(|e| e.into_inner());

        // Holding the write lock for find+insert serializes concurrent
        // upserts for the same place.
        let existing = pantry.place_id.as_deref().and_then(|place_id| {
            pantries
                .values()
                .find(|p| p.place_id.as_deref() == Some(place_id))
                .cloned()
        });

        let stored = match existing {
            Some(existing) => merge_pantry(&existing, pantry),
            None => pantry.clone(),
        };
        pantries.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list(&self, filter: &PantryFilter) -> Result<Vec<Pantry>> {
        let mut result: Vec<Pantry> = self
            .read_pantries()
            .values()
            .filter(|p| match &filter.city {
                Some(city) => p
                    .city
                    .as_deref()
                    .map(|c| c.eq_ignore_ascii_case(city))
                    .unwrap_or(false),
                None => true,
            })
            .filter(|p| match &filter.state {
                Some(state) => p
                    .state
                    .as_deref()
                    .map(|s| s.eq_ignore_ascii_case(state))
                    .unwrap_or(false),
                None => true,
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn nearby(
        &self,
        center: GeoPoint,
        max_distance_m: f64,
        limit: usize,
    ) -> Result<Vec<Pantry>> {
        let mut scored: Vec<(f64, Pantry)> = self
            .read_pantries()
            .values()
            .map(|p| (center.haversine_meters(&p.point), p.clone()))
            .filter(|(d, _)| *d <= max_distance_m)
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(limit).map(|(_, p)| p).collect())
    }

    async fn count_within(&self, center: GeoPoint, radius_m: f64) -> Result<u64> {
        Ok(self
            .read_pantries()
            .values()
            .filter(|p| center.haversine_meters(&p.point) <= radius_m)
            .count() as u64)
    }

    async fn known_place_ids(&self, place_ids: &[String]) -> Result<HashSet<String>> {
        let wanted: HashSet<&str> = place_ids.iter().map(String::as_str).collect();
        Ok(self
            .read_pantries()
            .values()
            .filter_map(|p| p.place_id.as_deref())
            .filter(|id| wanted.contains(id))
            .map(str::to_string)
            .collect())
    }

    async fn list_cities(&self) -> Result<Vec<CitySummary>> {
        let mut groups: HashMap<(String, Option<String>), (u64, f64, f64)> = HashMap::new();
        for pantry in self.read_pantries().values() {
            let Some(city) = &pantry.city else { continue };
            let key = (city.clone(), pantry.state.clone());
            let entry = groups.entry(key).or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += pantry.point.lat();
            entry.2 += pantry.point.lng();
        }

        let mut cities: Vec<CitySummary> = groups
            .into_iter()
            .map(|((city, state), (count, lat_sum, lng_sum))| CitySummary {
                city,
                state,
                count,
                center: GeoPoint::new(lat_sum / count as f64, lng_sum / count as f64),
            })
            .collect();
        cities.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.city.cmp(&b.city)));
        Ok(cities)
    }
}

#[async_trait]
impl PlacesCache for MemoryStore {
    async fn get_entry(&self, fingerprint: &str) -> Result<Option<PlacesCacheEntry>> {
        Ok(self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(fingerprint)
            .cloned())
    }

    async fn put_entry(&self, entry: &PlacesCacheEntry) -> Result<()> {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(entry.fingerprint.clone(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PantryStatus;
    use chrono::Utc;

    fn pantry(place_id: &str, name: &str, lat: f64, lng: f64) -> Pantry {
        Pantry {
            id: Uuid::new_v4(),
            place_id: Some(place_id.to_string()),
            name: name.to_string(),
            address: "addr".to_string(),
            city: Some("Denver".to_string()),
            state: Some("CO".to_string()),
            point: GeoPoint::new(lat, lng),
            status: PantryStatus::Open,
            hours_notes: "Mon-Fri 9-5".to_string(),
            hours_today: "9-5".to_string(),
            eligibility_rules: vec!["Open to all".to_string()],
            is_id_required: false,
            residency_req: None,
            special_notes: None,
            confidence: Some(7),
            source_url: None,
            scrape_method: None,
            scraped_at: None,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_then_merges() {
        let store = MemoryStore::new();
        let first = pantry("p1", "A Pantry", 39.7, -105.0);
        let stored = store.upsert(&first).await.unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(store.pantry_count(), 1);

        let mut second = pantry("p1", "A Pantry", 39.7, -105.0);
        second.confidence = Some(9);
        let merged = store.upsert(&second).await.unwrap();

        // Same document, updated fields.
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.confidence, Some(9));
        assert_eq!(store.pantry_count(), 1);
    }

    #[tokio::test]
    async fn nearby_orders_by_distance() {
        let store = MemoryStore::new();
        store.upsert(&pantry("far", "Far", 39.80, -105.0)).await.unwrap();
        store.upsert(&pantry("near", "Near", 39.74, -104.99)).await.unwrap();
        store.upsert(&pantry("mid", "Mid", 39.76, -104.99)).await.unwrap();

        let center = GeoPoint::new(39.739, -104.990);
        let nearby = store.nearby(center, 20_000.0, 10).await.unwrap();
        let ids: Vec<_> = nearby
            .iter()
            .map(|p| p.place_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);

        let close_only = store.nearby(center, 1_000.0, 10).await.unwrap();
        assert_eq!(close_only.len(), 1);
    }

    #[tokio::test]
    async fn nearby_respects_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .upsert(&pantry(
                    &format!("p{}", i),
                    &format!("P{}", i),
                    39.74 + 0.001 * i as f64,
                    -104.99,
                ))
                .await
                .unwrap();
        }
        let nearby = store
            .nearby(GeoPoint::new(39.739, -104.990), 50_000.0, 2)
            .await
            .unwrap();
        assert_eq!(nearby.len(), 2);
    }

    #[tokio::test]
    async fn list_filters_by_city() {
        let store = MemoryStore::new();
        store.upsert(&pantry("p1", "A", 39.7, -105.0)).await.unwrap();
        let mut other = pantry("p2", "B", 33.7, -84.4);
        other.city = Some("Atlanta".to_string());
        other.state = Some("GA".to_string());
        store.upsert(&other).await.unwrap();

        let denver = store.list(&PantryFilter::city("denver")).await.unwrap();
        assert_eq!(denver.len(), 1);
        assert_eq!(denver[0].name, "A");

        let all = store.list(&PantryFilter::none()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn known_place_ids_intersects() {
        let store = MemoryStore::new();
        store.upsert(&pantry("p1", "A", 39.7, -105.0)).await.unwrap();
        store.upsert(&pantry("p2", "B", 39.7, -105.0)).await.unwrap();

        let known = store
            .known_place_ids(&["p1".to_string(), "p3".to_string()])
            .await
            .unwrap();
        assert!(known.contains("p1"));
        assert!(!known.contains("p2"));
        assert!(!known.contains("p3"));
    }

    #[tokio::test]
    async fn list_cities_groups_and_counts() {
        let store = MemoryStore::new();
        store.upsert(&pantry("p1", "A", 39.70, -105.00)).await.unwrap();
        store.upsert(&pantry("p2", "B", 39.80, -104.90)).await.unwrap();
        let mut atlanta = pantry("p3", "C", 33.7, -84.4);
        atlanta.city = Some("Atlanta".to_string());
        atlanta.state = Some("GA".to_string());
        store.upsert(&atlanta).await.unwrap();

        let cities = store.list_cities().await.unwrap();
        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].city, "Denver");
        assert_eq!(cities[0].count, 2);
        // Mean center of the two Denver points.
        assert!((cities[0].center.lat() - 39.75).abs() < 1e-9);
        assert!((cities[0].center.lng() + 104.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cache_roundtrip() {
        let store = MemoryStore::new();
        let entry = PlacesCacheEntry::new("fp1", vec![]);
        store.put_entry(&entry).await.unwrap();

        let got = store.get_entry("fp1").await.unwrap().unwrap();
        assert_eq!(got.fingerprint, "fp1");
        assert!(store.get_entry("other").await.unwrap().is_none());
    }
}

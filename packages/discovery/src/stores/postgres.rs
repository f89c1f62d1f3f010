//! PostgreSQL storage implementation.
//!
//! Plain runtime sqlx queries against two tables: `pantries` (unique on
//! `place_id`, lat/lng columns for radius queries) and `places_cache`
//! (keyed by fingerprint). Schema setup is idempotent and runs once at
//! construction; connection pooling belongs to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use std::collections::HashSet;
use uuid::Uuid;

use super::merge_pantry;
use crate::error::{DiscoveryError, Result};
use crate::traits::{PantryFilter, PantryStore, PlacesCache};
use crate::types::{Candidate, CitySummary, GeoPoint, Pantry, PantryStatus, PlacesCacheEntry};

/// Haversine distance in meters from a bound ($1 lat, $2 lng) point to a
/// row's coordinates.
const DISTANCE_EXPR: &str = "(2.0 * 6371000.0 * asin(sqrt( \
     power(sin(radians(lat - $1) / 2.0), 2) + \
     cos(radians($1)) * cos(radians(lat)) * power(sin(radians(lng - $2) / 2.0), 2))))";

const PANTRY_COLUMNS: &str = "id, place_id, name, address, city, state, lat, lng, status, \
     hours_notes, hours_today, eligibility_rules, is_id_required, residency_req, special_notes, \
     confidence, source_url, scrape_method, scraped_at, last_updated";

/// PostgreSQL-backed pantry store and places cache.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct PantryRow {
    id: Uuid,
    place_id: Option<String>,
    name: String,
    address: String,
    city: Option<String>,
    state: Option<String>,
    lat: f64,
    lng: f64,
    status: String,
    hours_notes: String,
    hours_today: String,
    eligibility_rules: sqlx::types::Json<Vec<String>>,
    is_id_required: bool,
    residency_req: Option<String>,
    special_notes: Option<String>,
    confidence: Option<i32>,
    source_url: Option<String>,
    scrape_method: Option<String>,
    scraped_at: Option<DateTime<Utc>>,
    last_updated: DateTime<Utc>,
}

impl From<PantryRow> for Pantry {
    fn from(row: PantryRow) -> Self {
        Pantry {
            id: row.id,
            place_id: row.place_id,
            name: row.name,
            address: row.address,
            city: row.city,
            state: row.state,
            point: GeoPoint::new(row.lat, row.lng),
            status: PantryStatus::coerce(&row.status),
            hours_notes: row.hours_notes,
            hours_today: row.hours_today,
            eligibility_rules: row.eligibility_rules.0,
            is_id_required: row.is_id_required,
            residency_req: row.residency_req,
            special_notes: row.special_notes,
            confidence: row.confidence,
            source_url: row.source_url,
            scrape_method: row.scrape_method,
            scraped_at: row.scraped_at,
            last_updated: row.last_updated,
        }
    }
}

impl PostgresStore {
    /// Create a store over an existing pool, running schema setup.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS pantries (
                id UUID PRIMARY KEY,
                place_id TEXT,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                city TEXT,
                state TEXT,
                lat DOUBLE PRECISION NOT NULL,
                lng DOUBLE PRECISION NOT NULL,
                status TEXT NOT NULL,
                hours_notes TEXT NOT NULL,
                hours_today TEXT NOT NULL,
                eligibility_rules JSONB NOT NULL DEFAULT '[]',
                is_id_required BOOLEAN NOT NULL DEFAULT FALSE,
                residency_req TEXT,
                special_notes TEXT,
                confidence INTEGER,
                source_url TEXT,
                scrape_method TEXT,
                scraped_at TIMESTAMPTZ,
                last_updated TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE UNIQUE INDEX IF NOT EXISTS pantries_place_id_key \
             ON pantries (place_id) WHERE place_id IS NOT NULL",
            "CREATE INDEX IF NOT EXISTS pantries_lat_lng_idx ON pantries (lat, lng)",
            "CREATE INDEX IF NOT EXISTS pantries_city_state_idx ON pantries (city, state)",
            r#"
            CREATE TABLE IF NOT EXISTS places_cache (
                fingerprint TEXT PRIMARY KEY,
                candidates JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(DiscoveryError::store)?;
        }
        Ok(())
    }

    async fn fetch_existing(&self, pantry: &Pantry) -> Result<Option<Pantry>> {
        if let Some(place_id) = pantry.place_id.as_deref() {
            return self.find_by_place_id(place_id).await;
        }
        self.get(pantry.id).await
    }

    async fn write_pantry(&self, pantry: &Pantry) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO pantries (id, place_id, name, address, city, state, lat, lng, status,
                hours_notes, hours_today, eligibility_rules, is_id_required, residency_req,
                special_notes, confidence, source_url, scrape_method, scraped_at, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20)
            ON CONFLICT (id) DO UPDATE SET
                place_id = EXCLUDED.place_id,
                name = EXCLUDED.name,
                address = EXCLUDED.address,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                lat = EXCLUDED.lat,
                lng = EXCLUDED.lng,
                status = EXCLUDED.status,
                hours_notes = EXCLUDED.hours_notes,
                hours_today = EXCLUDED.hours_today,
                eligibility_rules = EXCLUDED.eligibility_rules,
                is_id_required = EXCLUDED.is_id_required,
                residency_req = EXCLUDED.residency_req,
                special_notes = EXCLUDED.special_notes,
                confidence = EXCLUDED.confidence,
                source_url = EXCLUDED.source_url,
                scrape_method = EXCLUDED.scrape_method,
                scraped_at = EXCLUDED.scraped_at,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(pantry.id)
        .bind(&pantry.place_id)
        .bind(&pantry.name)
        .bind(&pantry.address)
        .bind(&pantry.city)
        .bind(&pantry.state)
        .bind(pantry.point.lat())
        .bind(pantry.point.lng())
        .bind(pantry.status.as_str())
        .bind(&pantry.hours_notes)
        .bind(&pantry.hours_today)
        .bind(sqlx::types::Json(&pantry.eligibility_rules))
        .bind(pantry.is_id_required)
        .bind(&pantry.residency_req)
        .bind(&pantry.special_notes)
        .bind(pantry.confidence)
        .bind(&pantry.source_url)
        .bind(&pantry.scrape_method)
        .bind(pantry.scraped_at)
        .bind(pantry.last_updated)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(
            err.as_database_error().map(|db| db.kind()),
            Some(sqlx::error::ErrorKind::UniqueViolation)
        )
    }
}

#[async_trait]
impl PantryStore for PostgresStore {
    async fn get(&self, id: Uuid) -> Result<Option<Pantry>> {
        let row = sqlx::query_as::<_, PantryRow>(&format!(
            "SELECT {} FROM pantries WHERE id = $1",
            PANTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DiscoveryError::store)?;
        Ok(row.map(Pantry::from))
    }

    async fn find_by_place_id(&self, place_id: &str) -> Result<Option<Pantry>> {
        let row = sqlx::query_as::<_, PantryRow>(&format!(
            "SELECT {} FROM pantries WHERE place_id = $1",
            PANTRY_COLUMNS
        ))
        .bind(place_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DiscoveryError::store)?;
        Ok(row.map(Pantry::from))
    }

    async fn upsert(&self, pantry: &Pantry) -> Result<Pantry> {
        let merged = match self.fetch_existing(pantry).await? {
            Some(existing) => merge_pantry(&existing, pantry),
            None => pantry.clone(),
        };

        match self.write_pantry(&merged).await {
            Ok(()) => Ok(merged),
            // A concurrent upsert won the place_id race between our read
            // and write: re-read the winner, merge on top, retry once.
            Err(e) if Self::is_unique_violation(&e) => {
                let existing = self
                    .fetch_existing(pantry)
                    .await?
                    .ok_or_else(|| DiscoveryError::store(e))?;
                let remerged = merge_pantry(&existing, pantry);
                self.write_pantry(&remerged)
                    .await
                    .map_err(DiscoveryError::store)?;
                Ok(remerged)
            }
            Err(e) => Err(DiscoveryError::store(e)),
        }
    }

    async fn list(&self, filter: &PantryFilter) -> Result<Vec<Pantry>> {
        let rows = sqlx::query_as::<_, PantryRow>(&format!(
            r#"
            SELECT {} FROM pantries
            WHERE ($1::TEXT IS NULL OR LOWER(city) = LOWER($1))
              AND ($2::TEXT IS NULL OR LOWER(state) = LOWER($2))
            ORDER BY name
            "#,
            PANTRY_COLUMNS
        ))
        .bind(&filter.city)
        .bind(&filter.state)
        .fetch_all(&self.pool)
        .await
        .map_err(DiscoveryError::store)?;
        Ok(rows.into_iter().map(Pantry::from).collect())
    }

    async fn nearby(
        &self,
        center: GeoPoint,
        max_distance_m: f64,
        limit: usize,
    ) -> Result<Vec<Pantry>> {
        let rows = sqlx::query_as::<_, PantryRow>(&format!(
            r#"
            SELECT {} FROM (
                SELECT *, {} AS distance_m FROM pantries
            ) p
            WHERE distance_m <= $3
            ORDER BY distance_m ASC
            LIMIT $4
            "#,
            PANTRY_COLUMNS, DISTANCE_EXPR
        ))
        .bind(center.lat())
        .bind(center.lng())
        .bind(max_distance_m)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DiscoveryError::store)?;
        Ok(rows.into_iter().map(Pantry::from).collect())
    }

    async fn count_within(&self, center: GeoPoint, radius_m: f64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM pantries WHERE {} <= $3",
            DISTANCE_EXPR
        ))
        .bind(center.lat())
        .bind(center.lng())
        .bind(radius_m)
        .fetch_one(&self.pool)
        .await
        .map_err(DiscoveryError::store)?;
        Ok(count as u64)
    }

    async fn known_place_ids(&self, place_ids: &[String]) -> Result<HashSet<String>> {
        if place_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT place_id FROM pantries WHERE place_id = ANY($1)")
                .bind(place_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(DiscoveryError::store)?;
        Ok(rows.into_iter().collect())
    }

    async fn list_cities(&self) -> Result<Vec<CitySummary>> {
        let rows: Vec<PgRow> = sqlx::query(
            r#"
            SELECT city, state, COUNT(*) AS count, AVG(lat) AS lat, AVG(lng) AS lng
            FROM pantries
            WHERE city IS NOT NULL
            GROUP BY city, state
            ORDER BY count DESC, city ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DiscoveryError::store)?;

        rows.into_iter()
            .map(|row| {
                Ok(CitySummary {
                    city: row.try_get("city").map_err(DiscoveryError::store)?,
                    state: row.try_get("state").map_err(DiscoveryError::store)?,
                    count: row
                        .try_get::<i64, _>("count")
                        .map_err(DiscoveryError::store)? as u64,
                    center: GeoPoint::new(
                        row.try_get("lat").map_err(DiscoveryError::store)?,
                        row.try_get("lng").map_err(DiscoveryError::store)?,
                    ),
                })
            })
            .collect()
    }
}

#[async_trait]
impl PlacesCache for PostgresStore {
    async fn get_entry(&self, fingerprint: &str) -> Result<Option<PlacesCacheEntry>> {
        let row = sqlx::query(
            "SELECT fingerprint, candidates, created_at FROM places_cache WHERE fingerprint = $1",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(DiscoveryError::store)?;

        row.map(|row| {
            let candidates: sqlx::types::Json<Vec<Candidate>> =
                row.try_get("candidates").map_err(DiscoveryError::store)?;
            Ok(PlacesCacheEntry {
                fingerprint: row.try_get("fingerprint").map_err(DiscoveryError::store)?,
                candidates: candidates.0,
                created_at: row.try_get("created_at").map_err(DiscoveryError::store)?,
            })
        })
        .transpose()
    }

    async fn put_entry(&self, entry: &PlacesCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO places_cache (fingerprint, candidates, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (fingerprint) DO UPDATE SET
                candidates = EXCLUDED.candidates,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&entry.fingerprint)
        .bind(sqlx::types::Json(&entry.candidates))
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(DiscoveryError::store)?;
        Ok(())
    }
}

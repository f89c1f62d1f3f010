//! The canonical pantry record and its supporting types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operational status of a pantry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PantryStatus {
    Open,
    Closed,
    Waitlist,
    Unknown,
}

impl PantryStatus {
    /// Coerce an arbitrary string into a status; anything unrecognized
    /// becomes `Unknown`.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Self::Open,
            "CLOSED" => Self::Closed,
            "WAITLIST" => Self::Waitlist,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Waitlist => "WAITLIST",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for PantryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A geographic point stored in GeoJSON coordinate order: `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// `[longitude, latitude]` - GeoJSON uses lng,lat order.
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    /// Build a point from the conventional lat/lng argument order.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            coordinates: [lng, lat],
        }
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    /// Great-circle distance to another point in meters.
    pub fn haversine_meters(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;
        let lat1 = self.lat().to_radians();
        let lat2 = other.lat().to_radians();
        let dlat = (other.lat() - self.lat()).to_radians();
        let dlng = (other.lng() - self.lng()).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();
        EARTH_RADIUS_M * c
    }
}

/// The canonical enriched pantry record, the only durable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pantry {
    pub id: Uuid,
    /// Identifier assigned by the places provider; upsert key when present.
    pub place_id: Option<String>,
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub point: GeoPoint,
    pub status: PantryStatus,
    /// Full weekly schedule as free text, e.g. "Mon-Fri 9am-5pm".
    pub hours_notes: String,
    /// Today's hours, e.g. "9am-5pm" or "Closed today".
    pub hours_today: String,
    pub eligibility_rules: Vec<String>,
    pub is_id_required: bool,
    pub residency_req: Option<String>,
    pub special_notes: Option<String>,
    /// 1-10 quality score of the extraction; always set after validation.
    pub confidence: Option<i32>,
    /// The URL that was scraped, if any.
    pub source_url: Option<String>,
    pub scrape_method: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

/// Structured data extracted from scraped pantry content, after validation.
///
/// Merged into a `Pantry` together with the places-provider identity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryUpdate {
    pub status: PantryStatus,
    pub hours_notes: String,
    pub hours_today: String,
    pub eligibility_rules: Vec<String>,
    pub is_id_required: bool,
    pub residency_req: Option<String>,
    pub special_notes: Option<String>,
    pub confidence: i32,
}

/// The raw, unvalidated shape the LLM is asked to return.
///
/// Every field is optional here; the validator clamps and defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExtraction {
    pub status: Option<String>,
    pub hours_notes: Option<String>,
    pub hours_today: Option<String>,
    pub eligibility_rules: Option<Vec<String>>,
    pub is_id_required: Option<bool>,
    pub residency_req: Option<String>,
    pub special_notes: Option<String>,
    pub confidence: Option<i64>,
}

/// One row of the cities listing: a city with how many pantries it has
/// and the mean center of their locations.
#[derive(Debug, Clone, Serialize)]
pub struct CitySummary {
    pub city: String,
    pub state: Option<String>,
    pub count: u64,
    pub center: GeoPoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_coerces_unknown_strings() {
        assert_eq!(PantryStatus::coerce("OPEN"), PantryStatus::Open);
        assert_eq!(PantryStatus::coerce("closed"), PantryStatus::Closed);
        assert_eq!(PantryStatus::coerce(" waitlist "), PantryStatus::Waitlist);
        assert_eq!(PantryStatus::coerce("MAYBE"), PantryStatus::Unknown);
        assert_eq!(PantryStatus::coerce(""), PantryStatus::Unknown);
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&PantryStatus::Waitlist).unwrap();
        assert_eq!(json, "\"WAITLIST\"");
        let back: PantryStatus = serde_json::from_str("\"OPEN\"").unwrap();
        assert_eq!(back, PantryStatus::Open);
    }

    #[test]
    fn geo_point_is_lng_lat_order() {
        let p = GeoPoint::new(39.739, -104.990);
        assert_eq!(p.coordinates, [-104.990, 39.739]);
        assert_eq!(p.lat(), 39.739);
        assert_eq!(p.lng(), -104.990);
    }

    #[test]
    fn haversine_denver_to_boulder() {
        let denver = GeoPoint::new(39.7392, -104.9903);
        let boulder = GeoPoint::new(40.0150, -105.2705);
        let d = denver.haversine_meters(&boulder);
        // Roughly 38 km.
        assert!(d > 35_000.0 && d < 42_000.0, "got {}", d);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = GeoPoint::new(39.7392, -104.9903);
        assert!(p.haversine_meters(&p) < 1e-6);
    }
}

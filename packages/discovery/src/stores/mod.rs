//! Storage implementations.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::types::{Pantry, PantryStatus};
use crate::validate::{HOURS_NOT_LISTED, HOURS_TODAY_NOT_LISTED};

/// Merge an incoming pantry into the stored one for the same place.
///
/// The stored identity (`id`) wins; provenance fields always refresh;
/// everything else follows "more specific wins, never overwrite with
/// null": an incoming None keeps the stored value, an incoming UNKNOWN
/// status or not-listed hours only replaces a stored value that is no
/// more specific itself. `last_updated` is monotonically non-decreasing.
pub fn merge_pantry(existing: &Pantry, incoming: &Pantry) -> Pantry {
    Pantry {
        id: existing.id,
        place_id: incoming.place_id.clone().or_else(|| existing.place_id.clone()),
        name: pick_string(&existing.name, &incoming.name),
        address: pick_string(&existing.address, &incoming.address),
        city: incoming.city.clone().or_else(|| existing.city.clone()),
        state: incoming.state.clone().or_else(|| existing.state.clone()),
        point: incoming.point,
        status: if incoming.status == PantryStatus::Unknown {
            existing.status
        } else {
            incoming.status
        },
        hours_notes: pick_specific(&existing.hours_notes, &incoming.hours_notes, HOURS_NOT_LISTED),
        hours_today: pick_specific(
            &existing.hours_today,
            &incoming.hours_today,
            HOURS_TODAY_NOT_LISTED,
        ),
        eligibility_rules: if incoming.eligibility_rules.is_empty() {
            existing.eligibility_rules.clone()
        } else {
            incoming.eligibility_rules.clone()
        },
        is_id_required: incoming.is_id_required || existing.is_id_required,
        residency_req: incoming
            .residency_req
            .clone()
            .or_else(|| existing.residency_req.clone()),
        special_notes: incoming
            .special_notes
            .clone()
            .or_else(|| existing.special_notes.clone()),
        confidence: incoming.confidence.or(existing.confidence),
        source_url: incoming
            .source_url
            .clone()
            .or_else(|| existing.source_url.clone()),
        scrape_method: incoming
            .scrape_method
            .clone()
            .or_else(|| existing.scrape_method.clone()),
        scraped_at: incoming.scraped_at.or(existing.scraped_at),
        last_updated: incoming.last_updated.max(existing.last_updated),
    }
}

fn pick_string(existing: &str, incoming: &str) -> String {
    if incoming.trim().is_empty() {
        existing.to_string()
    } else {
        incoming.to_string()
    }
}

/// Incoming wins unless it is the "not listed" placeholder and the
/// stored value is something more informative.
fn pick_specific(existing: &str, incoming: &str, placeholder: &str) -> String {
    if incoming == placeholder && !existing.is_empty() && existing != placeholder {
        existing.to_string()
    } else {
        pick_string(existing, incoming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn pantry(name: &str) -> Pantry {
        Pantry {
            id: Uuid::new_v4(),
            place_id: Some("p1".to_string()),
            name: name.to_string(),
            address: "123 Main St".to_string(),
            city: Some("Denver".to_string()),
            state: Some("CO".to_string()),
            point: GeoPoint::new(39.7, -105.0),
            status: PantryStatus::Open,
            hours_notes: "Mon-Fri 9-5".to_string(),
            hours_today: "9-5".to_string(),
            eligibility_rules: vec!["Open to all".to_string()],
            is_id_required: false,
            residency_req: None,
            special_notes: None,
            confidence: Some(8),
            source_url: Some("https://a.org".to_string()),
            scrape_method: Some("http".to_string()),
            scraped_at: Some(Utc::now()),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn merge_keeps_stored_id() {
        let existing = pantry("A");
        let incoming = pantry("A");
        let merged = merge_pantry(&existing, &incoming);
        assert_eq!(merged.id, existing.id);
    }

    #[test]
    fn merge_never_overwrites_with_null() {
        let existing = pantry("A");
        let mut incoming = pantry("A");
        incoming.confidence = None;
        incoming.source_url = None;
        incoming.city = None;

        let merged = merge_pantry(&existing, &incoming);
        assert_eq!(merged.confidence, Some(8));
        assert_eq!(merged.source_url.as_deref(), Some("https://a.org"));
        assert_eq!(merged.city.as_deref(), Some("Denver"));
    }

    #[test]
    fn merge_prefers_specific_status() {
        let existing = pantry("A");
        let mut incoming = pantry("A");
        incoming.status = PantryStatus::Unknown;

        let merged = merge_pantry(&existing, &incoming);
        assert_eq!(merged.status, PantryStatus::Open);

        let mut closed = pantry("A");
        closed.status = PantryStatus::Closed;
        let merged = merge_pantry(&existing, &closed);
        assert_eq!(merged.status, PantryStatus::Closed);
    }

    #[test]
    fn merge_keeps_informative_hours_over_placeholder() {
        let existing = pantry("A");
        let mut incoming = pantry("A");
        incoming.hours_notes = HOURS_NOT_LISTED.to_string();
        incoming.hours_today = HOURS_TODAY_NOT_LISTED.to_string();

        let merged = merge_pantry(&existing, &incoming);
        assert_eq!(merged.hours_notes, "Mon-Fri 9-5");
        assert_eq!(merged.hours_today, "9-5");
    }

    #[test]
    fn merge_last_updated_is_monotone() {
        let mut existing = pantry("A");
        existing.last_updated = Utc::now();
        let mut incoming = pantry("A");
        incoming.last_updated = existing.last_updated - Duration::hours(1);

        let merged = merge_pantry(&existing, &incoming);
        assert_eq!(merged.last_updated, existing.last_updated);
    }
}

//! Pre-enrichment records returned by the places provider, and the
//! cache entry that stores them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// A food organization found via the places provider, before enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub place_id: String,
    pub name: String,
    pub formatted_address: String,
    pub lat: f64,
    pub lng: f64,
    pub website: Option<String>,
}

impl Candidate {
    /// Best-effort extraction of city and state from the provider's
    /// formatted address. Handles "123 Main St, Denver, CO 80202, USA"
    /// as well as shorter forms like "Denver, CO 80202".
    pub fn city_state(&self) -> (Option<String>, Option<String>) {
        parse_city_state(&self.formatted_address)
    }
}

fn parse_city_state(address: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();

    let (city, state_zip) = match parts.len() {
        0 | 1 => return (None, None),
        2 => (parts[0], parts[1]),
        // [street, city, "STATE ZIP"] or [street, city, "STATE ZIP", country]
        n if n >= 4 => (parts[n - 3], parts[n - 2]),
        _ => (parts[1], parts[2]),
    };

    if city.is_empty() {
        return (None, None);
    }

    let state = state_zip
        .split_whitespace()
        .next()
        .filter(|s| s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()))
        .map(|s| s.to_ascii_uppercase());

    (Some(city.to_string()), state)
}

/// The deduplicated result of a places lookup, unique by `place_id`.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    seen: HashSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate, ignoring duplicates and entries without a
    /// `place_id`. Returns true when the candidate was added.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        if candidate.place_id.is_empty() || !self.seen.insert(candidate.place_id.clone()) {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.candidates
    }
}

impl FromIterator<Candidate> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        let mut set = Self::new();
        for candidate in iter {
            set.insert(candidate);
        }
        set
    }
}

/// A cached places result keyed by its query fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesCacheEntry {
    pub fingerprint: String,
    pub candidates: Vec<Candidate>,
    pub created_at: DateTime<Utc>,
}

impl PlacesCacheEntry {
    pub fn new(fingerprint: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            candidates,
            created_at: Utc::now(),
        }
    }

    /// Whether the entry is older than the given TTL.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        age.to_std().map(|age| age > ttl).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(place_id: &str) -> Candidate {
        Candidate {
            place_id: place_id.to_string(),
            name: format!("Pantry {}", place_id),
            formatted_address: "732 Joseph E Lowery Blvd NW, Atlanta, GA 30318, USA".to_string(),
            lat: 33.7701,
            lng: -84.4324,
            website: None,
        }
    }

    #[test]
    fn set_deduplicates_by_place_id() {
        let mut set = CandidateSet::new();
        assert!(set.insert(candidate("a")));
        assert!(set.insert(candidate("b")));
        assert!(!set.insert(candidate("a")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn set_rejects_empty_place_id() {
        let mut set = CandidateSet::new();
        assert!(!set.insert(candidate("")));
        assert!(set.is_empty());
    }

    #[test]
    fn city_state_from_full_address() {
        let c = candidate("a");
        assert_eq!(
            c.city_state(),
            (Some("Atlanta".to_string()), Some("GA".to_string()))
        );
    }

    #[test]
    fn city_state_from_short_address() {
        let (city, state) = parse_city_state("Denver, CO 80202");
        assert_eq!(city.as_deref(), Some("Denver"));
        assert_eq!(state.as_deref(), Some("CO"));
    }

    #[test]
    fn city_state_rejects_non_state_token() {
        let (city, state) = parse_city_state("Denver, Colorado");
        assert_eq!(city.as_deref(), Some("Denver"));
        assert_eq!(state, None);
    }

    #[test]
    fn city_state_handles_empty_address() {
        assert_eq!(parse_city_state(""), (None, None));
    }

    #[test]
    fn cache_entry_expiry() {
        let mut entry = PlacesCacheEntry::new("fp", vec![]);
        assert!(!entry.is_expired(Duration::from_secs(60)));

        entry.created_at = Utc::now() - chrono::Duration::hours(2);
        assert!(entry.is_expired(Duration::from_secs(3600)));
        assert!(!entry.is_expired(Duration::from_secs(3 * 3600)));
    }
}

//! Typed events published on a job's stream.
//!
//! These are facts about job progress, not commands. The HTTP collaborator
//! typically maps them 1:1 onto SSE frames: the serde tag becomes the
//! event name, the content the data payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pantry::Pantry;

/// An event on a discovery job's stream.
///
/// Within a job, `job_started` precedes every `pantry_*` event and
/// `complete` is always last. `job_started` may be emitted twice (an
/// immediate zero-count and a corrected count once the places lookup
/// returns); the later value is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    JobStarted {
        job_id: Uuid,
        query: String,
        urls_found: u32,
    },
    PantryDiscovered {
        pantry: Pantry,
    },
    PantryFailed {
        url: String,
        reason: String,
    },
    PantrySkipped {
        place_id: String,
        reason: String,
    },
    Progress {
        total: u32,
        succeeded: u32,
        failed: u32,
    },
    Complete {
        found: u32,
        failed: u32,
        skipped: u32,
    },
    ErrorEvent {
        message: String,
    },
}

impl DiscoveryEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JobStarted { .. } => "job_started",
            Self::PantryDiscovered { .. } => "pantry_discovered",
            Self::PantryFailed { .. } => "pantry_failed",
            Self::PantrySkipped { .. } => "pantry_skipped",
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
            Self::ErrorEvent { .. } => "error_event",
        }
    }

    /// `complete` ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_started_serializes_with_tag_and_data() {
        let event = DiscoveryEvent::JobStarted {
            job_id: Uuid::nil(),
            query: "Denver".to_string(),
            urls_found: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "job_started");
        assert_eq!(json["data"]["urls_found"], 5);
        assert_eq!(json["data"]["query"], "Denver");
    }

    #[test]
    fn complete_roundtrips() {
        let event = DiscoveryEvent::Complete {
            found: 5,
            failed: 0,
            skipped: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: DiscoveryEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            DiscoveryEvent::Complete {
                found: 5,
                failed: 0,
                skipped: 2
            }
        ));
    }

    #[test]
    fn names_match_wire_format() {
        let skipped = DiscoveryEvent::PantrySkipped {
            place_id: "p1".to_string(),
            reason: "already_known".to_string(),
        };
        assert_eq!(skipped.name(), "pantry_skipped");
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["event"], skipped.name());
    }

    #[test]
    fn only_complete_is_terminal() {
        assert!(DiscoveryEvent::Complete {
            found: 0,
            failed: 0,
            skipped: 0
        }
        .is_terminal());
        assert!(!DiscoveryEvent::ErrorEvent {
            message: "boom".to_string()
        }
        .is_terminal());
    }
}

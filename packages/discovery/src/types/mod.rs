//! Data types for the discovery core.

pub mod candidate;
pub mod event;
pub mod job;
pub mod pantry;

pub use candidate::{Candidate, CandidateSet, PlacesCacheEntry};
pub use event::DiscoveryEvent;
pub use job::{JobCounters, JobSnapshot, JobState};
pub use pantry::{CitySummary, GeoPoint, Pantry, PantryStatus, PantryUpdate, RawExtraction};

//! Trait abstractions at the collaborator seams.
//!
//! These are infrastructure traits only - no business logic. The
//! orchestrator and pipeline consume them as `Arc<dyn Trait>` so tests
//! can swap in the mocks from [`crate::testing`].

pub mod ai;
pub mod places;
pub mod scraper;
pub mod store;

pub use ai::AI;
pub use places::PlacesApi;
pub use scraper::Scraper;
pub use store::{PantryFilter, PantryStore, PlacesCache};

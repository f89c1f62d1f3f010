//! Per-caller rate limiting at orchestrator entry.
//!
//! Uses the governor crate's keyed limiters: one token bucket per
//! caller, with separate quotas for starting jobs and for opening
//! event subscriptions. The orchestrator does not distinguish callers
//! itself; the transport collaborator supplies the caller id.

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::error::{DiscoveryError, Result};

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Token buckets per caller for the two entry operations.
pub struct CallerLimits {
    start_jobs: KeyedLimiter,
    subscribes: KeyedLimiter,
}

impl CallerLimits {
    pub fn new(start_jobs_per_minute: u32, subscribes_per_minute: u32) -> Self {
        Self {
            start_jobs: RateLimiter::keyed(per_minute(start_jobs_per_minute)),
            subscribes: RateLimiter::keyed(per_minute(subscribes_per_minute)),
        }
    }

    pub fn check_start_job(&self, caller_id: &str) -> Result<()> {
        self.start_jobs
            .check_key(&caller_id.to_string())
            .map_err(|_| DiscoveryError::RateLimited {
                operation: "start_job",
            })
    }

    pub fn check_subscribe(&self, caller_id: &str) -> Result<()> {
        self.subscribes
            .check_key(&caller_id.to_string())
            .map_err(|_| DiscoveryError::RateLimited {
                operation: "subscribe",
            })
    }
}

fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n.max(1)).unwrap_or(NonZeroU32::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separate_buckets_per_caller() {
        let limits = CallerLimits::new(2, 2);

        assert!(limits.check_start_job("alice").is_ok());
        assert!(limits.check_start_job("alice").is_ok());
        assert!(limits.check_start_job("alice").is_err());

        // A different caller has its own bucket.
        assert!(limits.check_start_job("bob").is_ok());
    }

    #[test]
    fn start_and_subscribe_are_independent() {
        let limits = CallerLimits::new(1, 3);

        assert!(limits.check_start_job("alice").is_ok());
        assert!(limits.check_start_job("alice").is_err());

        assert!(limits.check_subscribe("alice").is_ok());
        assert!(limits.check_subscribe("alice").is_ok());
        assert!(limits.check_subscribe("alice").is_ok());
        assert!(limits.check_subscribe("alice").is_err());
    }

    #[test]
    fn rate_limit_error_names_operation() {
        let limits = CallerLimits::new(1, 1);
        let _ = limits.check_start_job("carol");
        let err = limits.check_start_job("carol").unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::RateLimited {
                operation: "start_job"
            }
        ));
    }
}

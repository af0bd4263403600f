//! Backoff policy for rate-limited fetches

use crate::constants::{BACKOFF_BASE_SECS, MAX_RETRY_ATTEMPTS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Exponential backoff applied after HTTP 429
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the initial request)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRY_ATTEMPTS,
            initial_delay: Duration::from_secs(BACKOFF_BASE_SECS),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-indexed)
    ///
    /// With the defaults this is 2s, 4s, 8s.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        self.initial_delay
            .mul_f64(self.backoff_factor.powi(exponent))
    }

    /// True if retry number `attempt` (1-indexed) is still within budget
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_retries
    }
}

/// Guards against overlapping background retry chains
#[derive(Debug, Default)]
pub(crate) struct RetryGate {
    in_flight: AtomicBool,
}

impl RetryGate {
    /// Claims the gate; returns None if a retry chain is already running
    ///
    /// The permit owns a handle to the gate so it can move into a spawned task.
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Option<RetryPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RetryPermit {
                gate: Arc::clone(self),
            })
    }

    pub(crate) fn is_retrying(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped
pub(crate) struct RetryPermit {
    gate: Arc<RetryGate>,
}

impl Drop for RetryPermit {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays_double_from_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_budget() {
        let policy = RetryPolicy::default();
        assert!(!policy.allows(0));
        assert!(policy.allows(1));
        assert!(policy.allows(3));
        assert!(!policy.allows(4));
        assert!(!RetryPolicy::none().allows(1));
    }

    #[test]
    fn test_gate_is_exclusive_until_dropped() {
        let gate = Arc::new(RetryGate::default());
        let permit = gate.try_acquire();
        assert!(permit.is_some());
        assert!(gate.is_retrying());
        assert!(gate.try_acquire().is_none());

        drop(permit);
        assert!(!gate.is_retrying());
        assert!(gate.try_acquire().is_some());
    }
}

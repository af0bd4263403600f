//! Client configuration
//!
//! Defaults come from `constants`; override individual fields as needed:
//!
//! ```
//! use coin_watch_sdk::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig {
//!     freshness_threshold: Duration::from_secs(60),
//!     ..ClientConfig::default()
//! };
//! assert_eq!(config.retry.max_retries, 3);
//! ```

use crate::{
    constants::{FRESHNESS_THRESHOLD_SECS, PRIMARY_DETAILS_TIMEOUT_SECS, REFRESH_INTERVAL_SECS},
    retry::RetryPolicy,
};
use std::time::Duration;

/// Tunables for `CoinPriceClient`
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Snapshots younger than this are served without a network call
    pub freshness_threshold: Duration,
    /// Upper bound on the primary coin lookup
    pub primary_details_timeout: Duration,
    /// Interval of the polling task started by `start_polling`
    pub refresh_interval: Duration,
    /// Backoff after rate-limited responses
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            freshness_threshold: Duration::from_secs(FRESHNESS_THRESHOLD_SECS),
            primary_details_timeout: Duration::from_secs(PRIMARY_DETAILS_TIMEOUT_SECS),
            refresh_interval: Duration::from_secs(REFRESH_INTERVAL_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

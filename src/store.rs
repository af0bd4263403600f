//! In-memory snapshot cache for the latest fetched prices
//!
//! The cache holds exactly one immutable snapshot. Readers clone an `Arc` to it and
//! never observe a half-written list; writers swap the whole snapshot.

use crate::types::Coin;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One successful fetch result
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    /// Coins in provider order
    pub coins: Vec<Coin>,
    /// Monotonic fetch time, used for freshness checks
    pub fetched_at: Instant,
    /// Wall-clock fetch time, for display
    pub fetched_at_utc: DateTime<Utc>,
}

impl CacheSnapshot {
    /// Age of the snapshot
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// True if the snapshot is younger than `threshold`
    pub fn is_fresh(&self, threshold: Duration) -> bool {
        self.age() < threshold
    }

    /// Finds a coin by symbol, case-insensitively
    pub fn find_symbol(&self, symbol: &str) -> Option<&Coin> {
        self.coins.iter().find(|coin| coin.has_symbol(symbol))
    }
}

/// Latest-snapshot price cache
#[derive(Debug, Default)]
pub struct PriceCache {
    snapshot: RwLock<Option<Arc<CacheSnapshot>>>,
}

impl PriceCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot, if one with at least one coin exists
    pub fn snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        self.snapshot
            .read()
            .as_ref()
            .filter(|snapshot| !snapshot.coins.is_empty())
            .cloned()
    }

    /// Returns the snapshot only if it is younger than `threshold`
    pub fn fresh_snapshot(&self, threshold: Duration) -> Option<Arc<CacheSnapshot>> {
        self.snapshot()
            .filter(|snapshot| snapshot.is_fresh(threshold))
    }

    /// Coins of the current snapshot, or an empty list
    pub fn coins_or_empty(&self) -> Vec<Coin> {
        self.snapshot()
            .map(|snapshot| snapshot.coins.clone())
            .unwrap_or_default()
    }

    /// Replaces the whole snapshot and returns the new one
    pub fn replace(&self, coins: Vec<Coin>) -> Arc<CacheSnapshot> {
        let snapshot = Arc::new(CacheSnapshot {
            coins,
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
        });
        *self.snapshot.write() = Some(snapshot.clone());

        tracing::debug!(count = snapshot.coins.len(), "Replaced price snapshot");
        snapshot
    }

    /// Finds a cached coin by symbol
    pub fn find_symbol(&self, symbol: &str) -> Option<Coin> {
        self.snapshot()
            .and_then(|snapshot| snapshot.find_symbol(symbol).cloned())
    }

    /// Checks if any price data exists
    pub fn has_prices(&self) -> bool {
        self.snapshot().is_some()
    }

    /// True if there is no snapshot or it is older than `threshold`
    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.fresh_snapshot(threshold).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins() -> Vec<Coin> {
        vec![
            Coin::new("bitcoin", "BTC", "Bitcoin", 64000.0),
            Coin::new("ethereum", "ETH", "Ethereum", 3100.0),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_freshness_follows_clock() {
        let cache = PriceCache::new();
        assert!(cache.snapshot().is_none());
        assert!(cache.is_stale(Duration::from_secs(300)));

        cache.replace(coins());
        assert!(cache.fresh_snapshot(Duration::from_secs(300)).is_some());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(!cache.is_stale(Duration::from_secs(300)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.is_stale(Duration::from_secs(300)));
        assert!(cache.has_prices());
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let cache = PriceCache::new();
        let before = cache.replace(coins());

        cache.replace(vec![Coin::new("solana", "SOL", "Solana", 150.0)]);
        let after = cache.snapshot().unwrap();

        assert_eq!(before.coins.len(), 2);
        assert_eq!(after.coins.len(), 1);
        assert!(cache.find_symbol("btc").is_none());
        assert_eq!(cache.find_symbol("sol").unwrap().id, "solana");
    }

    #[tokio::test]
    async fn test_empty_snapshot_counts_as_missing() {
        let cache = PriceCache::new();
        cache.replace(Vec::new());
        assert!(cache.snapshot().is_none());
        assert!(cache.coins_or_empty().is_empty());
    }
}

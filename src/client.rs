//! Coin price client
//!
//! Serves the latest known prices for every tracked coin, fetching from the
//! provider only when the cached snapshot is older than the freshness threshold.
//!
//! # Failure policy
//!
//! Fetch failures never reach the caller as errors. A rate-limited fetch is
//! retried with exponential backoff; if a snapshot exists it is returned at once
//! and the retries continue in a background task. Any other failure returns the
//! last snapshot, or an empty list if nothing was ever fetched. Only watchlist
//! edits (`add_custom_coin` and friends) return `CoinError`.
//!
//! ```no_run
//! use coin_watch_sdk::{ClientConfig, CoinGeckoProvider, CoinPriceClient, MemorySettings};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CoinPriceClient::new(
//!     Arc::new(CoinGeckoProvider::new()?),
//!     Arc::new(MemorySettings::new()),
//!     ClientConfig::default(),
//! );
//!
//! for coin in client.get_prices().await {
//!     println!("{}: {}", coin.symbol, coin.formatted_price());
//! }
//! # Ok(())
//! # }
//! ```

use crate::{
    config::ClientConfig,
    constants::EVENT_CHANNEL_CAPACITY,
    error::{CoinError, ProviderError},
    metrics::{MetricsCollector, ProviderMetrics},
    provider::PriceProvider,
    registry::SymbolRegistry,
    retry::RetryGate,
    settings::SettingsStore,
    store::PriceCache,
    types::{normalize_symbol, Coin, ComponentHealth, HealthStatus, PriceEvent},
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

/// Cached price client for a persisted coin watchlist
///
/// Cloning is cheap and every clone shares the same cache and registry.
#[derive(Clone)]
pub struct CoinPriceClient {
    provider: Arc<dyn PriceProvider>,
    registry: Arc<RwLock<SymbolRegistry>>,
    cache: Arc<PriceCache>,
    metrics: Arc<MetricsCollector>,
    retry_gate: Arc<RetryGate>,
    events: broadcast::Sender<PriceEvent>,
    config: Arc<ClientConfig>,
}

impl CoinPriceClient {
    /// Creates a client, loading the watchlist from `settings`
    ///
    /// Unreadable stored values are replaced by their defaults, so construction
    /// never fails.
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        settings: Arc<dyn SettingsStore>,
        config: ClientConfig,
    ) -> Self {
        let registry = SymbolRegistry::load(settings);
        Self::with_registry(provider, registry, config)
    }

    /// Creates a client around an already loaded registry
    pub fn with_registry(
        provider: Arc<dyn PriceProvider>,
        registry: SymbolRegistry,
        config: ClientConfig,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new(provider.provider_name()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            provider,
            registry: Arc::new(RwLock::new(registry)),
            cache: Arc::new(PriceCache::new()),
            metrics,
            retry_gate: Arc::new(RetryGate::default()),
            events,
            config: Arc::new(config),
        }
    }

    /// Returns prices for every tracked coin
    ///
    /// A snapshot younger than the freshness threshold is returned without a
    /// network call.
    pub async fn get_prices(&self) -> Vec<Coin> {
        if let Some(snapshot) = self.cache.fresh_snapshot(self.config.freshness_threshold) {
            tracing::debug!(
                age_secs = snapshot.age().as_secs(),
                count = snapshot.coins.len(),
                "Using cached prices"
            );
            return snapshot.coins.clone();
        }

        self.fetch_and_update().await
    }

    /// Fetches immediately, ignoring the freshness threshold
    pub async fn refresh_now(&self) -> Vec<Coin> {
        self.fetch_and_update().await
    }

    /// Cached coins for the current favorites, in favorites order
    pub fn favorite_coins(&self) -> Vec<Coin> {
        let favorites = self.favorites();
        let Some(snapshot) = self.cache.snapshot() else {
            return Vec::new();
        };
        favorites
            .iter()
            .filter_map(|symbol| snapshot.find_symbol(symbol).cloned())
            .collect()
    }

    async fn fetch_and_update(&self) -> Vec<Coin> {
        let ids = self.registry.read().tracked_ids();
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            let error = match self.fetch_batch(&ids).await {
                Ok(coins) => return coins,
                Err(e) => e,
            };

            if !error.is_rate_limited() {
                tracing::warn!(error = %error, "Failed to fetch prices, serving last snapshot");
                self.emit(PriceEvent::fetch_failed(error.to_string()));
                return self.cache.coins_or_empty();
            }

            attempt += 1;
            if !retry.allows(attempt) {
                tracing::warn!(
                    retries = retry.max_retries,
                    "Rate limit retries exhausted, serving last snapshot"
                );
                self.emit(PriceEvent::fetch_failed(error.to_string()));
                return self.cache.coins_or_empty();
            }

            let delay = retry.delay_for_attempt(attempt);

            if let Some(stale) = self.cache.snapshot() {
                if self.spawn_retry(ids, attempt) {
                    tracing::info!(
                        attempt = attempt,
                        delay_secs = delay.as_secs(),
                        "Rate limited, serving cached prices while retrying in background"
                    );
                } else {
                    tracing::debug!("Rate limited, background retry already in flight");
                }
                return stale.coins.clone();
            }

            self.emit(PriceEvent::rate_limited(attempt, delay.as_secs()));
            tracing::info!(
                attempt = attempt,
                max_attempts = retry.max_retries,
                delay_secs = delay.as_secs(),
                "Rate limited, retrying"
            );
            sleep(delay).await;
        }
    }

    /// Runs the remaining retries of a rate-limited fetch in the background
    ///
    /// Returns false without scheduling anything if a chain is already running.
    fn spawn_retry(&self, ids: Vec<String>, first_attempt: u32) -> bool {
        let Some(permit) = self.retry_gate.try_acquire() else {
            return false;
        };

        let delay = self.config.retry.delay_for_attempt(first_attempt);
        self.emit(PriceEvent::rate_limited(first_attempt, delay.as_secs()));

        let client = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let retry = &client.config.retry;
            let mut attempt = first_attempt;
            loop {
                sleep(retry.delay_for_attempt(attempt)).await;

                match client.fetch_batch(&ids).await {
                    Ok(coins) => {
                        tracing::info!(
                            attempt = attempt,
                            count = coins.len(),
                            "Background retry succeeded"
                        );
                        break;
                    }
                    Err(e) if e.is_rate_limited() => {
                        attempt += 1;
                        if !retry.allows(attempt) {
                            tracing::warn!(
                                retries = retry.max_retries,
                                "Rate limit retries exhausted"
                            );
                            client.emit(PriceEvent::fetch_failed(e.to_string()));
                            break;
                        }
                        let delay = retry.delay_for_attempt(attempt);
                        tracing::info!(
                            attempt = attempt,
                            delay_secs = delay.as_secs(),
                            "Still rate limited, retrying"
                        );
                        client.emit(PriceEvent::rate_limited(attempt, delay.as_secs()));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Background retry failed");
                        client.emit(PriceEvent::fetch_failed(e.to_string()));
                        break;
                    }
                }
            }
        });
        true
    }

    /// One batch request; replaces the cache on success
    async fn fetch_batch(&self, ids: &[String]) -> Result<Vec<Coin>, ProviderError> {
        let start = Instant::now();

        match self.provider.fetch_coins(ids).await {
            Ok(coins) => {
                self.metrics.record_success(start.elapsed()).await;
                tracing::debug!(
                    count = coins.len(),
                    provider = self.provider.provider_name(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Successfully fetched prices"
                );

                let snapshot = self.cache.replace(coins);
                self.emit(PriceEvent::prices_updated(snapshot.coins.len()));
                Ok(snapshot.coins.clone())
            }
            Err(e) => {
                self.metrics.record_failure(e.kind()).await;
                Err(e)
            }
        }
    }

    /// Details for the primary coin
    ///
    /// Served from the cache when possible. Otherwise a single-coin request is
    /// spawned and awaited for at most `primary_details_timeout`; on failure or
    /// timeout a zero-priced placeholder is returned and a late response is
    /// simply dropped. Returns `None` only if the primary symbol resolves to no
    /// known coin.
    pub async fn primary_coin_details(&self) -> Option<Coin> {
        let (symbol, id) = {
            let registry = self.registry.read();
            let symbol = registry.primary().to_string();
            let id = registry.resolve(&symbol).ok();
            (symbol, id)
        };

        if let Some(coin) = self.cache.find_symbol(&symbol) {
            return Some(coin);
        }

        let Some(id) = id else {
            tracing::warn!(symbol = %symbol, "Primary coin does not resolve to a known id");
            return None;
        };

        let provider = self.provider.clone();
        let metrics = self.metrics.clone();
        let request_id = id.clone();
        let request = tokio::spawn(async move {
            let start = Instant::now();
            let result = provider.fetch_coin(&request_id).await;
            match &result {
                Ok(_) => metrics.record_success(start.elapsed()).await,
                Err(e) => metrics.record_failure(e.kind()).await,
            }
            result
        });

        match timeout(self.config.primary_details_timeout, request).await {
            Ok(Ok(Ok(coin))) => Some(coin),
            Ok(Ok(Err(e))) => {
                tracing::warn!(symbol = %symbol, error = %e, "Failed to fetch primary coin");
                Some(Coin::placeholder(&id, &symbol))
            }
            Ok(Err(e)) => {
                tracing::warn!(symbol = %symbol, error = %e, "Primary coin request task failed");
                Some(Coin::placeholder(&id, &symbol))
            }
            Err(_) => {
                tracing::warn!(
                    symbol = %symbol,
                    timeout_secs = self.config.primary_details_timeout.as_secs(),
                    "Primary coin request timed out, using placeholder"
                );
                Some(Coin::placeholder(&id, &symbol))
            }
        }
    }

    /// Blocking form of [`primary_coin_details`](Self::primary_coin_details)
    ///
    /// For threads outside the runtime, such as a UI thread. Panics if called
    /// from within an async context, like `Handle::block_on`.
    pub fn primary_coin_details_blocking(&self, runtime: &tokio::runtime::Handle) -> Option<Coin> {
        runtime.block_on(self.primary_coin_details())
    }

    /// Adds a coin by ticker, looking its id up through provider search
    ///
    /// An exact (case-insensitive) ticker match wins; otherwise the first search
    /// result is used.
    ///
    /// # Returns
    /// The provider id of the added coin
    pub async fn add_custom_coin(&self, symbol: &str) -> Result<String, CoinError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(CoinError::not_found(&symbol));
        }

        let already_tracked = self.registry.read().contains_symbol(&symbol);
        if already_tracked {
            return Err(CoinError::duplicate_symbol(&symbol));
        }

        let hits = match self.provider.search_coins(&symbol).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Coin search failed");
                return Err(CoinError::not_found(&symbol));
            }
        };

        let id = hits
            .iter()
            .find(|hit| hit.symbol.eq_ignore_ascii_case(&symbol))
            .or_else(|| hits.first())
            .map(|hit| hit.id.clone())
            .ok_or_else(|| CoinError::not_found(&symbol))?;

        self.registry.write().add_custom(&symbol, &id)?;
        Ok(id)
    }

    /// Removes a user-added coin; built-ins are left alone
    pub fn remove_custom_coin(&self, symbol: &str) -> Result<(), CoinError> {
        self.registry.write().remove_custom(symbol)
    }

    /// Makes `symbol` the primary coin
    pub fn set_primary(&self, symbol: &str) -> Result<(), CoinError> {
        self.registry.write().set_primary(symbol)
    }

    /// Adds or removes a favorite; returns true if it is a favorite afterwards
    pub fn toggle_favorite(&self, symbol: &str) -> Result<bool, CoinError> {
        self.registry.write().toggle_favorite(symbol)
    }

    /// Restores the default favorites
    pub fn reset_favorites(&self) -> Result<(), CoinError> {
        self.registry.write().reset_favorites()
    }

    pub fn favorites(&self) -> Vec<String> {
        self.registry.read().favorites().to_vec()
    }

    pub fn primary(&self) -> String {
        self.registry.read().primary().to_string()
    }

    pub fn custom_coins(&self) -> BTreeMap<String, String> {
        self.registry.read().custom_coins().clone()
    }

    /// Provider id for a symbol
    pub fn resolve(&self, symbol: &str) -> Result<String, CoinError> {
        self.registry.read().resolve(symbol)
    }

    /// Symbol for a provider id, or the uppercased id
    pub fn reverse_resolve(&self, id: &str) -> String {
        self.registry.read().reverse_resolve(id)
    }

    /// Subscribes to fetch results
    pub fn subscribe(&self) -> broadcast::Receiver<PriceEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: PriceEvent) {
        tracing::trace!(event = %event, "Emitting price event");
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Starts the timer-driven refresh task
    ///
    /// Each tick goes through `get_prices`, so a tick that lands inside the
    /// freshness window costs no network call.
    pub fn start_polling(&self) -> JoinHandle<()> {
        let client = self.clone();
        let interval = self.config.refresh_interval;

        tokio::spawn(async move {
            tracing::info!(
                refresh_interval_secs = interval.as_secs(),
                "Starting price polling task"
            );

            loop {
                let coins = client.get_prices().await;
                tracing::debug!(count = coins.len(), "Polling tick finished");
                sleep(interval).await;
            }
        })
    }

    /// Returns the name of the current provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// True while a background retry chain is running
    pub fn is_retrying(&self) -> bool {
        self.retry_gate.is_retrying()
    }

    /// Gets provider metrics including latency percentiles and success rates
    pub async fn provider_metrics(&self) -> ProviderMetrics {
        self.metrics.get_metrics().await
    }

    /// Perform a health check on the client
    pub async fn health_check(&self) -> ComponentHealth {
        let mut details = std::collections::HashMap::new();
        let snapshot = self.cache.snapshot();

        details.insert(
            "cached_coins".to_string(),
            serde_json::json!(snapshot.as_ref().map(|s| s.coins.len()).unwrap_or(0)),
        );
        details.insert(
            "provider_name".to_string(),
            serde_json::json!(self.provider_name()),
        );
        details.insert(
            "retrying".to_string(),
            serde_json::json!(self.is_retrying()),
        );
        if let Some(snapshot) = &snapshot {
            details.insert(
                "last_updated".to_string(),
                serde_json::json!(snapshot.fetched_at_utc.to_rfc3339()),
            );
            details.insert(
                "age_secs".to_string(),
                serde_json::json!(snapshot.age().as_secs()),
            );
        }

        let status = match &snapshot {
            None => HealthStatus::Unhealthy,
            Some(s) if !s.is_fresh(self.config.freshness_threshold) => HealthStatus::Degraded,
            Some(_) => HealthStatus::Healthy,
        };

        let message = match status {
            HealthStatus::Healthy => "Price cache is fresh".to_string(),
            HealthStatus::Degraded => "Price cache is stale".to_string(),
            HealthStatus::Unhealthy => "No price data has been fetched".to_string(),
        };

        ComponentHealth {
            name: "coin_price_client".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }
}

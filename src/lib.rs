//! # Coin Watch SDK
//!
//! A cached price client for a small, user-editable list of cryptocurrencies.
//! Prices come from CoinGecko's markets endpoint and are kept as a single
//! snapshot that is reused for five minutes.
//!
//! ## Usage
//!
//! The client is an explicitly constructed handle; clone it to share it between
//! a polling task and on-demand callers:
//!
//! ```no_run
//! use coin_watch_sdk::{ClientConfig, CoinGeckoProvider, CoinPriceClient, JsonFileSettings};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = JsonFileSettings::open("settings.json")?;
//! let client = CoinPriceClient::new(
//!     Arc::new(CoinGeckoProvider::new()?),
//!     Arc::new(settings),
//!     ClientConfig::default(),
//! );
//!
//! // Prices for every tracked coin (served from cache when fresh)
//! for coin in client.get_prices().await {
//!     println!("{}", coin);
//! }
//!
//! // The coin shown most prominently; a placeholder if the network is slow
//! if let Some(primary) = client.primary_coin_details().await {
//!     println!("Primary: {} {}", primary.symbol, primary.formatted_price());
//! }
//!
//! // Add a coin by ticker, resolved through provider search
//! client.add_custom_coin("PEPE").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! CoinPriceClient
//!     ├── SymbolRegistry ── SettingsStore (favorites, primary, custom coins)
//!     ├── PriceCache (latest snapshot)
//!     └── PriceProvider (CoinGecko)
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod settings;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use client::CoinPriceClient;
pub use config::ClientConfig;
pub use error::{CoinError, FetchFailure, ProviderError, SettingsError};
pub use metrics::ProviderMetrics;
pub use provider::PriceProvider;
pub use providers::CoinGeckoProvider;
pub use registry::SymbolRegistry;
pub use retry::RetryPolicy;
pub use settings::{JsonFileSettings, MemorySettings, SettingsKey, SettingsStore};
pub use types::{
    format_price, format_price_change, Coin, ComponentHealth, HealthStatus, PriceEvent,
    SearchHit,
};

//! Terminal price watcher.
//!
//! Polls CoinGecko for the watchlist stored in the settings file and prints the
//! primary coin and the favorites on every refresh.

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use coin_watch_sdk::{
    constants::{COINGECKO_API_URL, REFRESH_INTERVAL_SECS},
    ClientConfig, CoinGeckoProvider, CoinPriceClient, JsonFileSettings, MemorySettings, PriceEvent,
    SettingsStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Watch cryptocurrency prices for your favorite coins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Clear favorites, primary coin and custom coins before starting
    #[arg(long)]
    reset: bool,

    /// Settings file (defaults to the user config directory)
    #[arg(long, env = "COIN_WATCH_SETTINGS", value_hint = ValueHint::FilePath)]
    settings: Option<PathBuf>,

    /// CoinGecko API key
    #[arg(long = "api-key", env = "COINGECKO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// CoinGecko API base URL
    #[arg(long = "base-url", env = "COINGECKO_API_URL", default_value = COINGECKO_API_URL)]
    base_url: String,

    /// Seconds between refreshes
    #[arg(short = 'i', long, default_value_t = REFRESH_INTERVAL_SECS)]
    interval: u64,

    /// Print prices once and exit
    #[arg(long)]
    once: bool,

    /// Add a coin by ticker before starting
    #[arg(long = "add", value_name = "SYMBOL")]
    add: Vec<String>,

    /// Make SYMBOL the primary coin
    #[arg(long = "primary", value_name = "SYMBOL")]
    primary: Option<String>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

/// Prints the primary coin and the favorites from the current snapshot
async fn print_prices(client: &CoinPriceClient) {
    match client.primary_coin_details().await {
        Some(primary) => println!(
            "★ {} ({}) {} {}",
            primary.symbol,
            primary.name,
            primary.formatted_price(),
            primary.formatted_price_change()
        ),
        None => println!("★ {} (unknown coin)", client.primary()),
    }

    for coin in client.favorite_coins() {
        let marker = if coin.is_positive_change() { "▲" } else { "▼" };
        let change = coin.formatted_price_change();
        if change.is_empty() {
            println!("  {:<6} {:>14}", coin.symbol, coin.formatted_price());
        } else {
            println!(
                "  {:<6} {:>14}  {} {}",
                coin.symbol,
                coin.formatted_price(),
                marker,
                change
            );
        }
    }
}

/// Opens the settings file, falling back to in-memory settings
fn open_settings(path: Option<PathBuf>) -> Arc<dyn SettingsStore> {
    let Some(path) = path.or_else(JsonFileSettings::default_path) else {
        tracing::warn!("No config directory found, watchlist changes will not be saved");
        return Arc::new(MemorySettings::new());
    };

    match JsonFileSettings::open(&path) {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not open settings, watchlist changes will not be saved"
            );
            Arc::new(MemorySettings::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let settings = open_settings(args.settings);
    if args.reset {
        match settings.reset() {
            Ok(()) => println!("Settings reset."),
            Err(e) => eprintln!("Could not reset settings: {}", e),
        }
    }

    let provider = CoinGeckoProvider::with_config(args.base_url, args.api_key)
        .context("failed to build HTTP client")?;
    let config = ClientConfig {
        refresh_interval: Duration::from_secs(args.interval.max(1)),
        ..ClientConfig::default()
    };
    let client = CoinPriceClient::new(Arc::new(provider), settings, config);

    for symbol in &args.add {
        match client.add_custom_coin(symbol).await {
            Ok(id) => println!("Added {} ({})", symbol.to_uppercase(), id),
            Err(e) => eprintln!("Could not add {}: {}", symbol, e),
        }
    }

    if let Some(primary) = &args.primary {
        if let Err(e) = client.set_primary(primary) {
            eprintln!("Could not set primary coin {}: {}", primary, e);
        }
    }

    if args.once {
        client.get_prices().await;
        print_prices(&client).await;
        return Ok(());
    }

    let mut events = client.subscribe();
    let polling = client.start_polling();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PriceEvent::PricesUpdated { .. }) => print_prices(&client).await,
                Ok(event @ PriceEvent::RateLimited { .. }) => {
                    tracing::info!(%event, "Provider is rate limiting");
                }
                Ok(event @ PriceEvent::FetchFailed { .. }) => {
                    tracing::warn!(%event, "Showing last known prices");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Missed price events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    polling.abort();
    Ok(())
}

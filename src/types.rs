//! Types for the coin price client

use chrono::{DateTime, Utc};
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Market data for a single tracked coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    /// Provider identifier (e.g. `bitcoin`)
    pub id: String,

    /// Ticker symbol, always uppercase
    pub symbol: String,

    /// Display name
    pub name: String,

    /// Price in USD
    pub price: f64,

    /// 24h price change percentage
    pub price_change_percentage_24h: Option<f64>,

    /// Logo URL, passed through untouched
    pub image_url: Option<String>,
}

impl Coin {
    /// Creates a coin with no change percentage or image
    pub fn new(
        id: impl Into<String>,
        symbol: impl AsRef<str>,
        name: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: normalize_symbol(symbol.as_ref()),
            name: name.into(),
            price,
            price_change_percentage_24h: None,
            image_url: None,
        }
    }

    /// Sets the 24h change percentage
    pub fn with_change(mut self, change: Option<f64>) -> Self {
        self.price_change_percentage_24h = change;
        self
    }

    /// Sets the logo URL
    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    /// Builds the stand-in record used when live data is unavailable
    ///
    /// The name is derived from the identifier: `avalanche-2` becomes `Avalanche 2`.
    pub fn placeholder(id: &str, symbol: &str) -> Self {
        Self::new(id, symbol, display_name_from_id(id), 0.0)
    }

    /// Case-insensitive symbol comparison
    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(symbol.trim())
    }

    /// Price as US-dollar text
    pub fn formatted_price(&self) -> String {
        format_price(self.price)
    }

    /// 24h change as signed percentage text, empty when unknown
    pub fn formatted_price_change(&self) -> String {
        format_price_change(self.price_change_percentage_24h)
    }

    /// True when the 24h change is known and not negative
    pub fn is_positive_change(&self) -> bool {
        self.price_change_percentage_24h
            .map(|change| change >= 0.0)
            .unwrap_or(false)
    }
}

impl std::fmt::Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let change = self.formatted_price_change();
        if change.is_empty() {
            write!(f, "{} {}", self.symbol, self.formatted_price())
        } else {
            write!(f, "{} {} ({})", self.symbol, self.formatted_price(), change)
        }
    }
}

/// Uppercases and trims a user-supplied ticker
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Title-cases each dash-separated part of a provider id
pub fn display_name_from_id(id: &str) -> String {
    id.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats a USD price
///
/// Below 1.0 the price keeps 4 fractional digits, below 10.0 it keeps 2, and
/// anything larger is shown as a whole number. The integer part is grouped with
/// commas.
pub fn format_price(price: f64) -> String {
    let decimals = if price < 1.0 {
        4
    } else if price < 10.0 {
        2
    } else {
        0
    };

    let formatted = format!("{:.*}", decimals, price.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let grouped = integer
        .parse::<u128>()
        .map(|whole| whole.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| integer.to_string());

    let sign = if price < 0.0 { "-" } else { "" };
    match fraction {
        Some(fraction) => format!("{}${}.{}", sign, grouped, fraction),
        None => format!("{}${}", sign, grouped),
    }
}

/// Formats a 24h change percentage, `+` prefixed when not negative
pub fn format_price_change(change: Option<f64>) -> String {
    // -0.0 would otherwise print as "+-0.00%".
    match change.map(|change| if change == 0.0 { 0.0 } else { change }) {
        Some(change) if change >= 0.0 => format!("+{:.2}%", change),
        Some(change) => format!("{:.2}%", change),
        None => String::new(),
    }
}

/// A coin returned by the provider's free-text search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// Events emitted by the client whenever a fetch completes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceEvent {
    /// The cache was replaced with a new snapshot
    PricesUpdated {
        id: Uuid,
        coin_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Provider answered 429; a retry is scheduled after `retry_in_secs`
    RateLimited {
        id: Uuid,
        attempt: u32,
        retry_in_secs: u64,
        timestamp: DateTime<Utc>,
    },

    /// Fetch failed and the previous snapshot (if any) is still served
    FetchFailed {
        id: Uuid,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl PriceEvent {
    pub(crate) fn prices_updated(coin_count: usize) -> Self {
        Self::PricesUpdated {
            id: Uuid::new_v4(),
            coin_count,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn rate_limited(attempt: u32, retry_in_secs: u64) -> Self {
        Self::RateLimited {
            id: Uuid::new_v4(),
            attempt,
            retry_in_secs,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn fetch_failed(error_message: impl Into<String>) -> Self {
        Self::FetchFailed {
            id: Uuid::new_v4(),
            error_message: error_message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            PriceEvent::PricesUpdated { id, .. } => *id,
            PriceEvent::RateLimited { id, .. } => *id,
            PriceEvent::FetchFailed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            PriceEvent::PricesUpdated { .. } => "PRICES_UPDATED",
            PriceEvent::RateLimited { .. } => "RATE_LIMITED",
            PriceEvent::FetchFailed { .. } => "FETCH_FAILED",
        }
    }
}

impl std::fmt::Display for PriceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceEvent::PricesUpdated { coin_count, .. } => {
                write!(f, "Prices updated for {} coins", coin_count)
            }
            PriceEvent::RateLimited {
                attempt,
                retry_in_secs,
                ..
            } => write!(
                f,
                "Rate limited, retry {} in {}s",
                attempt, retry_in_secs
            ),
            PriceEvent::FetchFailed { error_message, .. } => {
                write!(f, "Price fetch failed: {}", error_message)
            }
        }
    }
}

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Fresh data is available
    Healthy,
    /// Only stale data is available
    Degraded,
    /// No data has been fetched
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}

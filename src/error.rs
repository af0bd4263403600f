//! Error types for the coin price client

use thiserror::Error;

/// Errors that can occur when talking to a price provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed (connection, TLS, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider answered with HTTP 429
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Provider answered with a non-success status other than 429
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Parse(String),

    /// Provider returned no data for the requested coin
    #[error("Unknown coin: {0}")]
    UnknownCoin(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,
}

/// Coarse classification of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    /// HTTP 429, retried with backoff
    RateLimited,
    /// Transport failure, timeout or unexpected status
    Network,
    /// Malformed response body
    Parse,
}

impl ProviderError {
    /// Classifies the error for the fetch state machine
    pub fn kind(&self) -> FetchFailure {
        match self {
            ProviderError::RateLimited => FetchFailure::RateLimited,
            ProviderError::Parse(_) | ProviderError::UnknownCoin(_) => FetchFailure::Parse,
            ProviderError::Network(e) if e.is_decode() => FetchFailure::Parse,
            ProviderError::Network(_) | ProviderError::Http { .. } | ProviderError::Timeout => {
                FetchFailure::Network
            }
        }
    }

    /// Returns true if the request should be retried after a backoff delay
    pub fn is_rate_limited(&self) -> bool {
        self.kind() == FetchFailure::RateLimited
    }
}

/// Errors from the settings store
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the backing file failed
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value had an unexpected shape
    #[error("Settings format error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Atomic replace of the settings file failed
    #[error("Failed to persist settings: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Errors surfaced to callers of watchlist operations
#[derive(Debug, Error)]
pub enum CoinError {
    /// Symbol or identifier could not be resolved
    #[error("Could not find coin {symbol}")]
    NotFound { symbol: String },

    /// Symbol is already tracked
    #[error("{symbol} is already in your list")]
    DuplicateSymbol { symbol: String },

    /// Identifier is already tracked under another symbol
    #[error("Coin id {id} is already tracked")]
    DuplicateId { id: String },

    /// Persisting the watchlist failed
    #[error(transparent)]
    Storage(#[from] SettingsError),
}

impl CoinError {
    /// Creates a NotFound error
    pub fn not_found(symbol: &str) -> Self {
        Self::NotFound {
            symbol: symbol.to_string(),
        }
    }

    /// Creates a DuplicateSymbol error
    pub fn duplicate_symbol(symbol: &str) -> Self {
        Self::DuplicateSymbol {
            symbol: symbol.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_kinds() {
        assert_eq!(ProviderError::RateLimited.kind(), FetchFailure::RateLimited);
        assert_eq!(ProviderError::Timeout.kind(), FetchFailure::Network);
        assert_eq!(
            ProviderError::Http {
                status: 500,
                body: String::new()
            }
            .kind(),
            FetchFailure::Network
        );
        assert_eq!(
            ProviderError::Parse("bad json".to_string()).kind(),
            FetchFailure::Parse
        );
        assert!(ProviderError::RateLimited.is_rate_limited());
        assert!(!ProviderError::Timeout.is_rate_limited());
    }

    #[test]
    fn test_coin_error_messages() {
        assert_eq!(
            CoinError::duplicate_symbol("BTC").to_string(),
            "BTC is already in your list"
        );
        assert_eq!(CoinError::not_found("XYZ").to_string(), "Could not find coin XYZ");
    }
}

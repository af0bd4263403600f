//! Constants for the coin price client
//!
//! Default configuration is centralized here. `ClientConfig` starts from these
//! values and callers may override individual fields.

/// How long a fetched snapshot is served without a new network call (in seconds)
pub const FRESHNESS_THRESHOLD_SECS: u64 = 300;

/// How often the polling task refreshes prices (in seconds)
pub const REFRESH_INTERVAL_SECS: u64 = 300;

/// HTTP request timeout when talking to the provider (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Upper bound on how long the primary coin lookup waits for the network (in seconds)
pub const PRIMARY_DETAILS_TIMEOUT_SECS: u64 = 5;

/// Maximum number of retries after a rate-limited response
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Delay before the first rate-limit retry (in seconds); doubles on each attempt
pub const BACKOFF_BASE_SECS: u64 = 2;

/// Number of coins requested per page from the markets endpoint
pub const MARKETS_PAGE_SIZE: usize = 100;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko endpoint for market data
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// CoinGecko endpoint for free-text coin search
pub const COINGECKO_SEARCH_ENDPOINT: &str = "/search";

/// Query parameter carrying the optional API key
pub const COINGECKO_API_KEY_PARAM: &str = "x_cg_pro_api_key";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "coin-watch/0.1.0";

/// Symbol used when the primary selection has to be repaired
pub const FALLBACK_PRIMARY: &str = "BTC";

/// Favorites applied on first start and by `reset_favorites`
pub const DEFAULT_FAVORITES: &[&str] = &["BTC", "ETH", "SOL"];

/// Built-in coins as (provider id, symbol) pairs
pub const BUILTIN_COINS: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("ethereum", "ETH"),
    ("solana", "SOL"),
    ("cardano", "ADA"),
    ("binancecoin", "BNB"),
    ("dogecoin", "DOGE"),
    ("ripple", "XRP"),
    ("pi-network-iou", "PI"),
    ("sui", "SUI"),
    ("avalanche-2", "AVAX"),
    ("matic-network", "MATIC"),
    ("litecoin", "LTC"),
    ("chainlink", "LINK"),
    ("the-open-network", "TON"),
    ("aave", "AAVE"),
    ("stellar", "XLM"),
    ("cosmos", "ATOM"),
    ("polkadot", "DOT"),
    ("uniswap", "UNI"),
];

/// Settings key holding the ordered favorite symbols
pub const KEY_FAVORITE_COINS: &str = "favoriteCoins";

/// Settings key holding the primary symbol
pub const KEY_PRIMARY_COIN: &str = "primaryCoin";

/// Settings key holding the custom id -> symbol map
pub const KEY_CUSTOM_COINS: &str = "customCoins";

/// Capacity of the price event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

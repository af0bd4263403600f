//! CoinGecko market data provider

use crate::{
    constants::{
        COINGECKO_API_KEY_PARAM, COINGECKO_API_URL, COINGECKO_MARKETS_ENDPOINT,
        COINGECKO_SEARCH_ENDPOINT, MARKETS_PAGE_SIZE, REQUEST_TIMEOUT_SECS, USER_AGENT,
    },
    error::ProviderError,
    provider::PriceProvider,
    types::{Coin, SearchHit},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// One entry of the `/coins/markets` response
#[derive(Debug, Deserialize)]
struct MarketEntry {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    image: Option<String>,
}

/// The `/search` response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchHit>,
}

/// CoinGecko market data provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    /// Creates a provider for the public CoinGecko API
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_config(COINGECKO_API_URL, None)
    }

    /// Creates a provider for a custom base URL and optional API key
    pub fn with_config(
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    /// Query parameters for the markets endpoint
    fn markets_query(&self, ids: &[String], per_page: usize) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("vs_currency", "usd".to_string()),
            ("ids", ids.join(",")),
            ("order", "market_cap_desc".to_string()),
            ("per_page", per_page.to_string()),
            ("page", "1".to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push((COINGECKO_API_KEY_PARAM, key.clone()));
        }
        query
    }

    /// Parses a `/coins/markets` body into coins, keeping the provider's order
    fn parse_markets(body: &str) -> Result<Vec<Coin>, ProviderError> {
        let entries: Vec<MarketEntry> = serde_json::from_str(body).map_err(|e| {
            ProviderError::Parse(format!(
                "Failed to parse CoinGecko markets response: {}. Response: {}",
                e, body
            ))
        })?;

        let coins = entries
            .into_iter()
            .filter_map(|entry| match entry.current_price {
                Some(price) => Some(
                    Coin::new(entry.id, &entry.symbol, entry.name, price)
                        .with_change(entry.price_change_percentage_24h)
                        .with_image(entry.image),
                ),
                None => {
                    tracing::debug!(id = %entry.id, "Skipping coin without a current price");
                    None
                }
            })
            .collect();

        Ok(coins)
    }

    /// Parses a `/search` body
    fn parse_search(body: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let response: SearchResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::Parse(format!("Failed to parse CoinGecko search response: {}", e))
        })?;
        Ok(response.coins)
    }

    /// Sends a GET request and returns the body of a successful response
    async fn get_text(
        &self,
        endpoint: &str,
        query: &[(&'static str, String)],
    ) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(url = %url, "Requesting CoinGecko");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e)
                }
            })?;

        // Check for rate limiting
        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }

        // Check for other errors
        if !response.status().is_success() {
            return Err(ProviderError::Http {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response.text().await.map_err(ProviderError::Network)
    }

    async fn fetch_markets(&self, ids: &[String], per_page: usize) -> Result<Vec<Coin>, ProviderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let body = self
            .get_text(COINGECKO_MARKETS_ENDPOINT, &self.markets_query(ids, per_page))
            .await?;
        let coins = Self::parse_markets(&body)?;

        tracing::debug!(
            requested = ids.len(),
            received = coins.len(),
            "Fetched market data from CoinGecko"
        );

        Ok(coins)
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    async fn fetch_coins(&self, ids: &[String]) -> Result<Vec<Coin>, ProviderError> {
        self.fetch_markets(ids, MARKETS_PAGE_SIZE).await
    }

    async fn fetch_coin(&self, id: &str) -> Result<Coin, ProviderError> {
        self.fetch_markets(&[id.to_string()], 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::UnknownCoin(id.to_string()))
    }

    async fn search_coins(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let params = [("query", query.trim().to_string())];
        let body = self.get_text(COINGECKO_SEARCH_ENDPOINT, &params).await?;
        let hits = Self::parse_search(&body)?;

        tracing::debug!(query = %query, results = hits.len(), "CoinGecko search finished");
        Ok(hits)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markets_query_shape() {
        let provider = CoinGeckoProvider::new().unwrap();
        let ids = vec!["bitcoin".to_string(), "ethereum".to_string()];
        let query = provider.markets_query(&ids, MARKETS_PAGE_SIZE);

        let get = |name: &str| {
            query
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("vs_currency"), Some("usd"));
        assert_eq!(get("ids"), Some("bitcoin,ethereum"));
        assert_eq!(get("order"), Some("market_cap_desc"));
        assert_eq!(get("per_page"), Some("100"));
        assert_eq!(get("page"), Some("1"));
        assert_eq!(get("sparkline"), Some("false"));
        assert_eq!(get("price_change_percentage"), Some("24h"));
        assert_eq!(get(COINGECKO_API_KEY_PARAM), None);
    }

    #[test]
    fn test_api_key_is_appended() {
        let provider =
            CoinGeckoProvider::with_config("https://example.test/api/v3/", Some("secret".into()))
                .unwrap();
        assert_eq!(provider.base_url, "https://example.test/api/v3");

        let query = provider.markets_query(&["solana".to_string()], 1);
        assert!(query.contains(&(COINGECKO_API_KEY_PARAM, "secret".to_string())));
        assert!(query.contains(&("per_page", "1".to_string())));

        let blank = CoinGeckoProvider::with_config(COINGECKO_API_URL, Some("  ".into())).unwrap();
        assert!(blank.api_key.is_none());
    }

    #[test]
    fn test_parse_markets() {
        let body = r#"[
            {"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":64250.5,
             "price_change_percentage_24h":-1.25,"image":"https://img.test/btc.png"},
            {"id":"ethereum","symbol":"eth","name":"Ethereum","current_price":3100.0,
             "price_change_percentage_24h":null},
            {"id":"ghost","symbol":"gst","name":"Ghost","current_price":null}
        ]"#;

        let coins = CoinGeckoProvider::parse_markets(body).unwrap();
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].symbol, "BTC");
        assert_eq!(coins[0].price, 64250.5);
        assert_eq!(coins[0].price_change_percentage_24h, Some(-1.25));
        assert_eq!(coins[0].image_url.as_deref(), Some("https://img.test/btc.png"));
        assert_eq!(coins[1].id, "ethereum");
        assert_eq!(coins[1].price_change_percentage_24h, None);
        assert_eq!(coins[1].image_url, None);
    }

    #[test]
    fn test_parse_markets_rejects_garbage() {
        let err = CoinGeckoProvider::parse_markets(r#"{"status":{"error_code":429}}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn test_parse_search() {
        let body = r#"{"coins":[
            {"id":"pepe","symbol":"PEPE","name":"Pepe","market_cap_rank":30},
            {"id":"pepe-2","symbol":"PEPE2","name":"Pepe 2.0"}
        ],"exchanges":[]}"#;
        let hits = CoinGeckoProvider::parse_search(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "pepe");
        assert_eq!(hits[1].symbol, "PEPE2");

        assert!(CoinGeckoProvider::parse_search("{}").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_ids_skip_the_network() {
        let provider = CoinGeckoProvider::with_config("http://127.0.0.1:9", None).unwrap();
        assert!(provider.fetch_coins(&[]).await.unwrap().is_empty());
    }
}

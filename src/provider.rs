//! Provider abstraction for fetching market data from external APIs

use crate::{
    error::ProviderError,
    types::{Coin, SearchHit},
};
use async_trait::async_trait;

/// Trait for market data providers
///
/// This is the transport seam of the client: the CoinGecko implementation talks
/// HTTP, tests plug in a scripted mock.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Fetches market data for several coins in a single request
    ///
    /// # Arguments
    /// * `ids` - Provider identifiers to fetch
    ///
    /// # Returns
    /// Coins in the order the provider returned them, or an error if the fetch fails
    async fn fetch_coins(&self, ids: &[String]) -> Result<Vec<Coin>, ProviderError>;

    /// Fetches market data for a single coin
    async fn fetch_coin(&self, id: &str) -> Result<Coin, ProviderError> {
        self.fetch_coins(&[id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::UnknownCoin(id.to_string()))
    }

    /// Searches the provider's coin catalogue by free text
    async fn search_coins(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Scripted outcome of one `fetch_coins` call
    pub enum MockResponse {
        Coins(Vec<Coin>),
        RateLimited,
        NetworkDown,
        Malformed,
        /// Sleeps before answering with the given coins
        Slow(Duration, Vec<Coin>),
    }

    /// Mock provider for testing
    ///
    /// Responses are consumed in order; once the script runs out the last
    /// response keeps repeating.
    #[derive(Default)]
    pub struct MockProvider {
        script: Mutex<VecDeque<MockResponse>>,
        search_results: Mutex<Option<Vec<SearchHit>>>,
        fetch_calls: Mutex<Vec<(Instant, Vec<String>)>>,
        search_calls: Mutex<usize>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, response: MockResponse) {
            self.script.lock().push_back(response);
        }

        pub fn set_search_results(&self, hits: Option<Vec<SearchHit>>) {
            *self.search_results.lock() = hits;
        }

        pub fn fetch_count(&self) -> usize {
            self.fetch_calls.lock().len()
        }

        pub fn search_count(&self) -> usize {
            *self.search_calls.lock()
        }

        /// Instants at which `fetch_coins` was called
        pub fn fetch_times(&self) -> Vec<Instant> {
            self.fetch_calls.lock().iter().map(|(at, _)| *at).collect()
        }

        /// Ids requested by the most recent call
        pub fn last_ids(&self) -> Option<Vec<String>> {
            self.fetch_calls.lock().last().map(|(_, ids)| ids.clone())
        }

        fn next_response(&self) -> Option<MockResponse> {
            let mut script = self.script.lock();
            if script.len() > 1 {
                return script.pop_front();
            }
            script.front().map(|response| match response {
                MockResponse::Coins(coins) => MockResponse::Coins(coins.clone()),
                MockResponse::RateLimited => MockResponse::RateLimited,
                MockResponse::NetworkDown => MockResponse::NetworkDown,
                MockResponse::Malformed => MockResponse::Malformed,
                MockResponse::Slow(delay, coins) => MockResponse::Slow(*delay, coins.clone()),
            })
        }
    }

    #[async_trait]
    impl PriceProvider for MockProvider {
        async fn fetch_coins(&self, ids: &[String]) -> Result<Vec<Coin>, ProviderError> {
            self.fetch_calls.lock().push((Instant::now(), ids.to_vec()));
            let response = self.next_response();

            let keep_requested = |coins: Vec<Coin>| -> Vec<Coin> {
                coins.into_iter().filter(|c| ids.contains(&c.id)).collect()
            };

            match response {
                Some(MockResponse::Coins(coins)) => Ok(keep_requested(coins)),
                Some(MockResponse::RateLimited) => Err(ProviderError::RateLimited),
                Some(MockResponse::NetworkDown) => Err(ProviderError::Http {
                    status: 503,
                    body: "unavailable".to_string(),
                }),
                Some(MockResponse::Malformed) => {
                    Err(ProviderError::Parse("unexpected token".to_string()))
                }
                Some(MockResponse::Slow(delay, coins)) => {
                    tokio::time::sleep(delay).await;
                    Ok(keep_requested(coins))
                }
                None => Err(ProviderError::Timeout),
            }
        }

        async fn search_coins(&self, _query: &str) -> Result<Vec<SearchHit>, ProviderError> {
            *self.search_calls.lock() += 1;
            self.search_results
                .lock()
                .clone()
                .ok_or(ProviderError::Timeout)
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }
}

//! Market data from the DEX's pool/price API

mod snapshot;

pub use snapshot::{MarketSnapshot, SnapshotBuilder};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::config::RuntimeEnv;
use crate::{Error, Result};

/// Header carrying the market API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// The two tokens of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolKey {
    pub currency0: String,
    pub currency1: String,
}

/// A liquidity pool as listed by the market API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    #[serde(rename = "poolKey")]
    pub pool_key: PoolKey,
}

impl Pool {
    pub fn new(currency0: impl Into<String>, currency1: impl Into<String>) -> Self {
        Self {
            pool_key: PoolKey {
                currency0: currency0.into(),
                currency1: currency1.into(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Option<f64>,
}

/// Read access to pools and prices
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn pools(&self) -> Result<Vec<Pool>>;

    /// Price of `token` relative to the base asset, if the API knows one
    async fn price(&self, token: &str) -> Result<Option<f64>>;
}

/// Every token appearing in any pool, each once, in first-seen order.
///
/// Addresses are compared case-insensitively; the first spelling seen is
/// kept.
pub fn token_universe(pools: &[Pool]) -> Vec<String> {
    let mut seen = HashSet::new();
    pools
        .iter()
        .flat_map(|p| [&p.pool_key.currency0, &p.pool_key.currency1])
        .filter(|address| seen.insert(address.to_ascii_lowercase()))
        .cloned()
        .collect()
}

/// HTTP client for the market API
pub struct MarketApi {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl MarketApi {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_env(env: &RuntimeEnv) -> Self {
        Self::new(env.api_url.clone(), env.api_key.clone())
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Market API request");

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "GET {} returned {}: {}",
                path, status, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MarketData for MarketApi {
    async fn pools(&self) -> Result<Vec<Pool>> {
        self.get("/v1/pools").await
    }

    async fn price(&self, token: &str) -> Result<Option<f64>> {
        let response: PriceResponse = self.get(&format!("/v1/price/{}", token)).await?;
        Ok(response.price)
    }
}

/// Fixed pools and prices
#[cfg(test)]
pub(crate) struct StaticMarket {
    pub pools: Vec<Pool>,
    pub prices: std::collections::HashMap<String, f64>,
}

#[cfg(test)]
#[async_trait]
impl MarketData for StaticMarket {
    async fn pools(&self) -> Result<Vec<Pool>> {
        Ok(self.pools.clone())
    }

    async fn price(&self, token: &str) -> Result<Option<f64>> {
        Ok(self.prices.get(token).copied())
    }
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cm_config::PriceFeedConfig;
use serde_json::Value;
use std::{collections::HashMap, time::Duration};
use tracing::debug;
use url::Url;

/// USD reference prices for the price target rule
#[async_trait]
pub trait PriceFeed: Send + Sync + 'static {
    async fn usd_price(&self, coin_id: &str) -> Result<f64>;
}

/// CoinGecko `simple/price` endpoint
#[derive(Clone, Debug)]
pub struct CoinGeckoFeed {
    client: reqwest::Client,
    base: Url,
}

impl CoinGeckoFeed {
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Could not build price feed client")?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &PriceFeedConfig) -> Result<Self> {
        let base = Url::parse(&config.url)
            .with_context(|| format!("Invalid price feed url '{}'", config.url))?;
        Self::new(base, Duration::from_millis(config.timeout_ms))
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn usd_price(&self, coin_id: &str) -> Result<f64> {
        let mut url = self.base.join("api/v3/simple/price")?;
        url.query_pairs_mut()
            .append_pair("ids", coin_id)
            .append_pair("vs_currencies", "usd");

        debug!("GET {url}");
        let body: Value = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.get(coin_id)
            .and_then(|quote| quote.get("usd"))
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow!("No usd quote for '{coin_id}' in {body}"))
    }
}

/// Prices supplied up front, for operators that already know the reference value
#[derive(Clone, Debug, Default)]
pub struct FixedPriceFeed {
    prices: HashMap<String, f64>,
}

impl FixedPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, coin_id: impl Into<String>, price: f64) -> Self {
        self.prices.insert(coin_id.into(), price);
        self
    }
}

#[async_trait]
impl PriceFeed for FixedPriceFeed {
    async fn usd_price(&self, coin_id: &str) -> Result<f64> {
        match self.prices.get(coin_id) {
            Some(price) => Ok(*price),
            None => bail!("No fixed price for '{coin_id}'"),
        }
    }
}

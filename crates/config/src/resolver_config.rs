// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use serde::{Deserialize, Serialize};

/// How a market's winning side is derived once the aggregate is known
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketRule {
    /// Yes wins when the decrypted aggregate reaches `threshold`
    AggregateThreshold { threshold: u128 },
    /// Yes wins when the reference price, scaled by `10^decimals`, reaches the
    /// market's on-chain target price
    PriceTarget {
        coin_id: String,
        #[serde(default)]
        decimals: u8,
    },
}

impl MarketRule {
    pub fn needs_price(&self) -> bool {
        matches!(self, MarketRule::PriceTarget { .. })
    }
}

impl Default for MarketRule {
    fn default() -> Self {
        MarketRule::PriceTarget {
            coin_id: "bitcoin".to_string(),
            decimals: 0,
        }
    }
}

/// What to do with a market that received no wagers at all
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoWagerPolicy {
    /// Evaluate the market rule against a zero aggregate
    ApplyRule,
    /// Resolve to a fixed side
    Fixed { side: bool },
}

impl Default for NoWagerPolicy {
    fn default() -> Self {
        NoWagerPolicy::ApplyRule
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MarketOverride {
    pub id: u64,
    pub rule: MarketRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PriceFeedConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            url: "https://api.coingecko.com".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// How often the watcher polls the chain head
    pub poll_interval_ms: u64,
    pub no_wager_policy: NoWagerPolicy,
    pub default_rule: MarketRule,
    /// Per market rule overrides
    pub markets: Vec<MarketOverride>,
    /// Markets to watch. Empty means every market the contract reports.
    pub watch: Vec<u64>,
    pub price_feed: PriceFeedConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 15_000,
            no_wager_policy: NoWagerPolicy::default(),
            default_rule: MarketRule::default(),
            markets: vec![],
            watch: vec![],
            price_feed: PriceFeedConfig::default(),
        }
    }
}

impl ResolverConfig {
    pub fn rule_for(&self, market_id: u64) -> &MarketRule {
        self.markets
            .iter()
            .find(|m| m.id == market_id)
            .map(|m| &m.rule)
            .unwrap_or(&self.default_rule)
    }
}

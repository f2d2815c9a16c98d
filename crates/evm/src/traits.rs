// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{BlockInfo, Market, TxReceipt, WagerRecord};
use alloy::primitives::{Address, Bytes, B256};
use anyhow::Result;
use async_trait::async_trait;

/// Read operations on the prediction market contract
#[async_trait]
pub trait MarketReader: Send + Sync + 'static {
    fn contract_address(&self) -> Address;

    async fn chain_id(&self) -> Result<u64>;

    async fn latest_block(&self) -> Result<BlockInfo>;

    async fn market_count(&self) -> Result<u64>;

    async fn market(&self, market_id: u64) -> Result<Market>;

    /// `BetPlaced` logs for `market_id` in `from_block..=to_block`
    async fn wagers(&self, market_id: u64, from_block: u64, to_block: u64)
        -> Result<Vec<WagerRecord>>;
}

/// Write operations on the prediction market contract
#[async_trait]
pub trait MarketWriter: Send + Sync + 'static {
    /// Send `placeEncryptedBet` for an encrypted amount and wait for the receipt
    async fn place_bet(
        &self,
        market_id: u64,
        handle: B256,
        proof: Bytes,
        side: bool,
    ) -> Result<TxReceipt>;

    /// Send `resolveMarket` and wait for the receipt
    async fn resolve_market(
        &self,
        market_id: u64,
        aggregated_handle: B256,
        proof: Bytes,
        winning_side: bool,
    ) -> Result<TxReceipt>;
}

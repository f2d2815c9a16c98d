// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// On-chain market as seen by the resolver. Owned by the contract, read-only here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: u64,
    pub question: String,
    pub category_id: u64,
    /// Unix seconds after which the market may be resolved
    pub deadline: u64,
    pub creator: Address,
    /// Once true never goes back
    pub resolved: bool,
    pub winning_side: bool,
    pub target_price: U256,
    pub participant_count: u64,
    pub aggregated_handle: B256,
    pub input_proof: Bytes,
}

impl Market {
    pub fn is_past_deadline(&self, now: u64) -> bool {
        now >= self.deadline
    }
}

/// One `BetPlaced` log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerRecord {
    pub market_id: u64,
    pub bettor: Address,
    pub handle: B256,
    pub proof: Bytes,
    pub timestamp: u64,
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
}

impl WagerRecord {
    /// Two records with the same key are the same log
    pub fn key(&self) -> (B256, u64) {
        (self.tx_hash, self.log_index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
}

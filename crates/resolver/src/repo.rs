// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{ResolutionRecord, ResolutionState, Transition};
use alloy::primitives::Address;
use anyhow::Result;
use cm_config::StoreKeys;
use cm_data::{DataStore, Repository, SharedStore};
use cm_evm::WagerRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Wagers collected so far and the first block not yet scanned
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerCheckpoint {
    pub next_block: Option<u64>,
    pub wagers: Vec<WagerRecord>,
}

impl WagerCheckpoint {
    /// Append `fresh` skipping logs already held. Returns how many were new.
    pub fn merge(&mut self, fresh: Vec<WagerRecord>) -> usize {
        let mut seen: HashSet<_> = self.wagers.iter().map(WagerRecord::key).collect();
        let before = self.wagers.len();
        for wager in fresh {
            if seen.insert(wager.key()) {
                self.wagers.push(wager);
            }
        }
        self.wagers.len() - before
    }
}

pub struct MarketRepositories<S> {
    pub wagers: Repository<S, WagerCheckpoint>,
    pub resolution: Repository<S, ResolutionRecord>,
}

impl<S: DataStore> MarketRepositories<S> {
    pub fn new(store: &SharedStore<S>, chain_id: u64, contract: Address, market_id: u64) -> Self {
        Self {
            wagers: Repository::new(
                store.clone(),
                StoreKeys::wagers(chain_id, &contract, market_id),
            ),
            resolution: Repository::new(
                store.clone(),
                StoreKeys::resolution(chain_id, &contract, market_id),
            ),
        }
    }

    pub async fn checkpoint(&self) -> Result<WagerCheckpoint> {
        Ok(self.wagers.read().await?.unwrap_or_default())
    }

    pub async fn record(&self) -> Result<ResolutionRecord> {
        Ok(self.resolution.read().await?.unwrap_or_default())
    }

    /// Append `state` to the market's resolution history
    pub async fn transition(&mut self, state: ResolutionState) -> Result<()> {
        let at = chrono::Utc::now().timestamp().max(0) as u64;
        self.resolution
            .update(|record| {
                let mut record = record.unwrap_or_default();
                record.history.push(Transition {
                    state: state.clone(),
                    at,
                });
                Some(record)
            })
            .await?;
        Ok(())
    }
}

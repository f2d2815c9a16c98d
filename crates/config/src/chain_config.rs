// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{contract::ContractAddresses, rpc::RPC};
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainConfig {
    pub name: String,
    pub rpc_url: String,
    /// Expected chain id. When set it is checked against the node on connect.
    pub chain_id: Option<u64>,
    pub contracts: ContractAddresses,
}

impl ChainConfig {
    pub fn rpc(&self) -> Result<RPC> {
        RPC::from_url(&self.rpc_url)
            .map_err(|e| anyhow!("Failed to parse RPC URL for chain {}: {}", self.name, e))
    }

    /// First block to scan for wager logs when no checkpoint exists
    pub fn start_block(&self) -> Result<u64> {
        let rpc = self.rpc()?;
        let contract = &self.contracts.prediction_market;
        let deploy_block = contract.deploy_block().unwrap_or(0);
        if deploy_block == 0 && !rpc.is_local() {
            let rpc_url = rpc.url().to_string();
            let contract_address = contract.address_str();
            error!(
                "Querying from block 0 on a non-local node ({}) without a specific deploy_block is not allowed.",
                rpc_url
            );
            bail!(
                "Misconfiguration: Attempted to query historical events from genesis on a non-local node. \
                 Please specify a `deploy_block` for contract address {contract_address} on rpc {rpc_url}"
            );
        }
        Ok(deploy_block)
    }
}

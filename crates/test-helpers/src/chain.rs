// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use cm_evm::{BlockInfo, Market, MarketReader, MarketWriter, TxReceipt, WagerRecord};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

pub const TEST_CHAIN_ID: u64 = 31337;
pub const TEST_GENESIS_TIME: u64 = 1_700_000_000;

/// One `resolveMarket` transaction as the contract saw it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveCall {
    pub market_id: u64,
    pub aggregated_handle: B256,
    pub proof: Bytes,
    pub winning_side: bool,
}

/// One `placeEncryptedBet` transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetCall {
    pub market_id: u64,
    pub bettor: Address,
    pub handle: B256,
    pub side: bool,
}

struct ChainState {
    markets: BTreeMap<u64, Market>,
    wagers: Vec<WagerRecord>,
    head: BlockInfo,
    resolve_calls: Vec<ResolveCall>,
    bet_calls: Vec<BetCall>,
    wager_queries: Vec<(u64, u64, u64)>,
    failing_reads: u32,
    failing_market_reads: u32,
    revert_resolves: bool,
    tx_count: u64,
}

impl ChainState {
    fn mine(&mut self) -> (BlockInfo, B256) {
        self.tx_count += 1;
        self.head.number += 1;
        self.head.timestamp += 12;
        (self.head, keccak256(self.tx_count.to_be_bytes()))
    }

    fn place_wager(
        &mut self,
        market_id: u64,
        bettor: Address,
        handle: B256,
        proof: Bytes,
    ) -> WagerRecord {
        let (block, tx_hash) = self.mine();
        let record = WagerRecord {
            market_id,
            bettor,
            handle,
            proof,
            timestamp: block.timestamp,
            block_number: block.number,
            tx_hash,
            log_index: 0,
        };
        self.wagers.push(record.clone());
        if let Some(market) = self.markets.get_mut(&market_id) {
            market.participant_count += 1;
        }
        record
    }

    fn read(&mut self) -> Result<()> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            bail!("connection refused");
        }
        Ok(())
    }
}

/// In-memory prediction market contract. Every wager and resolution mines a block.
pub struct MockChain {
    address: Address,
    sender: Address,
    chain_id: u64,
    state: Mutex<ChainState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self::with_address(Address::repeat_byte(0xcc))
    }

    /// Contract deployed at `address`. Writes are sent from [`MockChain::sender`].
    pub fn with_address(address: Address) -> Self {
        Self {
            address,
            sender: Address::repeat_byte(0x5e),
            chain_id: TEST_CHAIN_ID,
            state: Mutex::new(ChainState {
                markets: BTreeMap::new(),
                wagers: vec![],
                head: BlockInfo {
                    number: 1,
                    timestamp: TEST_GENESIS_TIME,
                },
                resolve_calls: vec![],
                bet_calls: vec![],
                wager_queries: vec![],
                failing_reads: 0,
                failing_market_reads: 0,
                revert_resolves: false,
                tx_count: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Send writes from `sender` instead of the default account
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn add_market(&self, market: Market) {
        self.state().markets.insert(market.id, market);
    }

    /// Record a `BetPlaced` log in a new block
    pub fn place_wager(
        &self,
        market_id: u64,
        bettor: Address,
        handle: B256,
        proof: Bytes,
    ) -> WagerRecord {
        self.state().place_wager(market_id, bettor, handle, proof)
    }

    pub fn head(&self) -> BlockInfo {
        self.state().head
    }

    /// Mine one empty block `seconds` after the current head
    pub fn advance_time(&self, seconds: u64) {
        let mut state = self.state();
        state.head.number += 1;
        state.head.timestamp += seconds;
    }

    pub fn market_snapshot(&self, market_id: u64) -> Option<Market> {
        self.state().markets.get(&market_id).cloned()
    }

    /// Mark a market resolved as if another resolver got there first
    pub fn resolve_externally(&self, market_id: u64, winning_side: bool) {
        if let Some(market) = self.state().markets.get_mut(&market_id) {
            market.resolved = true;
            market.winning_side = winning_side;
        }
    }

    pub fn resolve_calls(&self) -> Vec<ResolveCall> {
        self.state().resolve_calls.clone()
    }

    pub fn bet_calls(&self) -> Vec<BetCall> {
        self.state().bet_calls.clone()
    }

    /// `(market_id, from_block, to_block)` of every wager query
    pub fn wager_queries(&self) -> Vec<(u64, u64, u64)> {
        self.state().wager_queries.clone()
    }

    /// Fail the next `count` reads with a transport error
    pub fn fail_reads(&self, count: u32) {
        self.state().failing_reads = count;
    }

    /// Fail only the next `count` `getMarket` reads
    pub fn fail_market_reads(&self, count: u32) {
        self.state().failing_market_reads = count;
    }

    pub fn revert_resolves(&self, revert: bool) {
        self.state().revert_resolves = revert;
    }
}

#[async_trait]
impl MarketReader for MockChain {
    fn contract_address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn latest_block(&self) -> Result<BlockInfo> {
        let mut state = self.state();
        state.read()?;
        Ok(state.head)
    }

    async fn market_count(&self) -> Result<u64> {
        let mut state = self.state();
        state.read()?;
        Ok(state.markets.len() as u64)
    }

    async fn market(&self, market_id: u64) -> Result<Market> {
        let mut state = self.state();
        state.read()?;
        if state.failing_market_reads > 0 {
            state.failing_market_reads -= 1;
            bail!("getMarket timed out");
        }
        state
            .markets
            .get(&market_id)
            .cloned()
            .ok_or_else(|| anyhow!("execution reverted: Market does not exist"))
    }

    async fn wagers(
        &self,
        market_id: u64,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<WagerRecord>> {
        let mut state = self.state();
        state.read()?;
        state.wager_queries.push((market_id, from_block, to_block));
        Ok(state
            .wagers
            .iter()
            .filter(|w| w.market_id == market_id)
            .filter(|w| (from_block..=to_block).contains(&w.block_number))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MarketWriter for MockChain {
    async fn place_bet(
        &self,
        market_id: u64,
        handle: B256,
        proof: Bytes,
        side: bool,
    ) -> Result<TxReceipt> {
        let mut state = self.state();
        let open = match state.markets.get(&market_id) {
            Some(market) => !market.resolved,
            None => bail!("execution reverted: Market does not exist"),
        };
        state.bet_calls.push(BetCall {
            market_id,
            bettor: self.sender,
            handle,
            side,
        });
        if !open {
            let (block, tx_hash) = state.mine();
            return Ok(TxReceipt {
                tx_hash,
                block_number: Some(block.number),
                success: false,
            });
        }

        let record = state.place_wager(market_id, self.sender, handle, proof);
        Ok(TxReceipt {
            tx_hash: record.tx_hash,
            block_number: Some(record.block_number),
            success: true,
        })
    }

    async fn resolve_market(
        &self,
        market_id: u64,
        aggregated_handle: B256,
        proof: Bytes,
        winning_side: bool,
    ) -> Result<TxReceipt> {
        let mut state = self.state();
        state.resolve_calls.push(ResolveCall {
            market_id,
            aggregated_handle,
            proof: proof.clone(),
            winning_side,
        });
        let (block, tx_hash) = state.mine();
        let revert = state.revert_resolves;

        let Some(market) = state.markets.get_mut(&market_id) else {
            bail!("execution reverted: Market does not exist");
        };
        let success = !revert && !market.resolved;
        if success {
            market.resolved = true;
            market.winning_side = winning_side;
            market.aggregated_handle = aggregated_handle;
            market.input_proof = proof;
        }

        Ok(TxReceipt {
            tx_hash,
            block_number: Some(block.number),
            success,
        })
    }
}

/// Unresolved market with the given deadline and target price
pub fn test_market(id: u64, deadline: u64, target_price: u64) -> Market {
    Market {
        id,
        question: format!("Market #{id}"),
        category_id: 0,
        deadline,
        creator: Address::repeat_byte(0x11),
        resolved: false,
        winning_side: false,
        target_price: U256::from(target_price),
        participant_count: 0,
        aggregated_handle: B256::ZERO,
        input_proof: Bytes::new(),
    }
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{
    decide, FailureReason, MarketLocks, MarketRepositories, PriceFeed, ResolutionOutcome,
    ResolutionState, ResolveError,
};
use alloy::primitives::{Bytes, B256, U256};
use cm_config::{MarketRule, NoWagerPolicy, ResolverConfig};
use cm_data::{DataStore, SharedStore};
use cm_decrypt::{DecryptError, DecryptionCoordinator, DecryptionRequest, DecryptionStatus};
use cm_evm::{Market, MarketReader, MarketWriter};
use cm_relayer::{AggregateCiphertext, ConfidentialRelayer, ValueKind, WagerCiphertext};
use std::sync::Arc;
use tracing::{info, instrument, warn};

enum Halt {
    Failed(FailureReason),
    Store(anyhow::Error),
}

impl From<FailureReason> for Halt {
    fn from(reason: FailureReason) -> Self {
        Halt::Failed(reason)
    }
}

fn chain_read(e: anyhow::Error) -> Halt {
    Halt::Failed(FailureReason::ChainRead(format!("{e:#}")))
}

/// Drives one market from collected wagers to an on-chain resolution.
///
/// Safe to run again after any failure. The contract's `resolved` flag is read right
/// before submitting, so a market is never resolved twice.
pub struct ResolutionPipeline<S> {
    reader: Arc<dyn MarketReader>,
    writer: Arc<dyn MarketWriter>,
    relayer: Arc<dyn ConfidentialRelayer>,
    coordinator: DecryptionCoordinator<S>,
    price_feed: Arc<dyn PriceFeed>,
    store: SharedStore<S>,
    config: ResolverConfig,
    start_block: u64,
    locks: MarketLocks,
}

impl<S: DataStore> ResolutionPipeline<S> {
    pub fn new(
        reader: Arc<dyn MarketReader>,
        writer: Arc<dyn MarketWriter>,
        relayer: Arc<dyn ConfidentialRelayer>,
        coordinator: DecryptionCoordinator<S>,
        price_feed: Arc<dyn PriceFeed>,
        store: SharedStore<S>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            relayer,
            coordinator,
            price_feed,
            store,
            config,
            start_block: 0,
            locks: MarketLocks::new(),
        }
    }

    /// First block scanned for wagers when a market has no checkpoint
    pub fn with_start_block(mut self, start_block: u64) -> Self {
        self.start_block = start_block;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.coordinator.chain_id()
    }

    pub fn locks(&self) -> &MarketLocks {
        &self.locks
    }

    pub fn repositories(&self, market_id: u64) -> MarketRepositories<S> {
        MarketRepositories::new(
            &self.store,
            self.chain_id(),
            self.reader.contract_address(),
            market_id,
        )
    }

    /// Run the market to a terminal state. Failures are reported in the returned state,
    /// `Err` is reserved for contention and persistence.
    #[instrument(name = "resolve_market", skip(self), fields(chain_id = self.chain_id()))]
    pub async fn run(&self, market_id: u64) -> Result<ResolutionState, ResolveError> {
        let _guard = self
            .locks
            .try_lock(market_id)
            .ok_or(ResolveError::ResolutionInProgress(market_id))?;

        let market = match self.precheck(market_id).await {
            Ok(market) => market,
            Err(state) => {
                info!(state = ?state, "Nothing to do");
                return Ok(state);
            }
        };

        let mut repos = self.repositories(market_id);
        let state = match self.advance(&market, &mut repos).await {
            Ok(outcome) => ResolutionState::Resolved(outcome),
            Err(Halt::Failed(reason)) => ResolutionState::Failed(reason),
            Err(Halt::Store(e)) => return Err(ResolveError::Store(e)),
        };

        repos.transition(state.clone()).await?;
        match &state {
            ResolutionState::Failed(reason) => warn!(%reason, "Market resolution failed"),
            state => info!(state = ?state, "Market resolution finished"),
        }
        Ok(state)
    }

    /// Terminal state when the market needs no work yet. Nothing is persisted here.
    async fn precheck(&self, market_id: u64) -> Result<Market, ResolutionState> {
        let failed = |e: anyhow::Error| {
            ResolutionState::Failed(FailureReason::ChainRead(format!("{e:#}")))
        };

        let market = self.reader.market(market_id).await.map_err(failed)?;
        if market.resolved {
            return Err(ResolutionState::Resolved(
                ResolutionOutcome::AlreadyResolved {
                    winning_side: market.winning_side,
                },
            ));
        }

        let head = self.reader.latest_block().await.map_err(failed)?;
        if !market.is_past_deadline(head.timestamp) {
            return Err(ResolutionState::Failed(
                FailureReason::DeadlineNotReached {
                    deadline: market.deadline,
                    now: head.timestamp,
                },
            ));
        }

        Ok(market)
    }

    async fn enter(
        &self,
        repos: &mut MarketRepositories<S>,
        state: ResolutionState,
    ) -> Result<(), Halt> {
        info!(state = ?state, "Entering state");
        repos.transition(state).await.map_err(Halt::Store)
    }

    async fn advance(
        &self,
        market: &Market,
        repos: &mut MarketRepositories<S>,
    ) -> Result<ResolutionOutcome, Halt> {
        self.enter(repos, ResolutionState::Collecting).await?;
        let wagers = self.collect(market.id, repos).await?;

        let (aggregate, ciphertext) = if wagers.is_empty() {
            info!(market_id = market.id, "No wagers collected");
            (
                U256::ZERO,
                AggregateCiphertext {
                    handle: B256::ZERO,
                    proof: Bytes::new(),
                },
            )
        } else {
            self.enter(repos, ResolutionState::Aggregating).await?;
            let ciphertext = self.aggregate(&wagers).await?;

            self.enter(repos, ResolutionState::Decrypting).await?;
            let aggregate = self.decrypt(&ciphertext).await?;
            (aggregate, ciphertext)
        };

        self.enter(repos, ResolutionState::Deciding).await?;
        let winning_side = match (&self.config.no_wager_policy, wagers.is_empty()) {
            (NoWagerPolicy::Fixed { side }, true) => *side,
            _ => self.choose_side(market, aggregate).await?,
        };
        info!(market_id = market.id, %aggregate, winning_side, "Decided market");

        self.enter(repos, ResolutionState::Submitting).await?;
        let current = self.reader.market(market.id).await.map_err(chain_read)?;
        if current.resolved {
            info!(market_id = market.id, "Market was resolved by someone else");
            return Ok(ResolutionOutcome::AlreadyResolved {
                winning_side: current.winning_side,
            });
        }

        let receipt = self
            .writer
            .resolve_market(
                market.id,
                ciphertext.handle,
                ciphertext.proof.clone(),
                winning_side,
            )
            .await
            .map_err(|e| FailureReason::SubmissionReverted(format!("{e:#}")))?;
        if !receipt.success {
            return Err(FailureReason::SubmissionReverted(format!(
                "transaction {} reverted",
                receipt.tx_hash
            ))
            .into());
        }

        if wagers.is_empty() {
            Ok(ResolutionOutcome::NoWagersCollected {
                winning_side,
                tx_hash: receipt.tx_hash,
            })
        } else {
            Ok(ResolutionOutcome::Submitted {
                winning_side,
                aggregate,
                wagers: wagers.len(),
                tx_hash: receipt.tx_hash,
            })
        }
    }

    /// Scan from the checkpoint to the chain head and persist what was found
    async fn collect(
        &self,
        market_id: u64,
        repos: &mut MarketRepositories<S>,
    ) -> Result<Vec<WagerCiphertext>, Halt> {
        let mut checkpoint = repos.checkpoint().await.map_err(Halt::Store)?;
        let head = self.reader.latest_block().await.map_err(chain_read)?;
        let from = checkpoint.next_block.unwrap_or(self.start_block);

        if from <= head.number {
            let fresh = self
                .reader
                .wagers(market_id, from, head.number)
                .await
                .map_err(chain_read)?;
            let added = checkpoint.merge(fresh);
            checkpoint.next_block = Some(head.number + 1);
            repos.wagers.write(&checkpoint).await.map_err(Halt::Store)?;
            info!(
                market_id,
                from,
                to = head.number,
                added,
                total = checkpoint.wagers.len(),
                "Collected wagers"
            );
        }

        Ok(checkpoint
            .wagers
            .into_iter()
            .map(|wager| WagerCiphertext {
                handle: wager.handle,
                proof: wager.proof,
            })
            .collect())
    }

    async fn aggregate(&self, wagers: &[WagerCiphertext]) -> Result<AggregateCiphertext, Halt> {
        let contract = self.reader.contract_address();
        self.relayer
            .aggregate(contract, wagers)
            .await
            .map_err(|e| FailureReason::AggregationUnavailable(e.to_string()).into())
    }

    async fn decrypt(&self, ciphertext: &AggregateCiphertext) -> Result<U256, Halt> {
        let request = DecryptionRequest::new(
            ciphertext.handle,
            self.reader.contract_address(),
            ValueKind::Uint,
        );
        let id = request.id();

        // Explicit re-runs clear an earlier failure for the same aggregate
        let mut view = match self.coordinator.retry(vec![request]).await {
            Ok(view) => view,
            Err(DecryptError::NotAuthorized(e)) => {
                return Err(FailureReason::NoAuthorization(e.to_string()).into())
            }
        };

        let status = view
            .wait()
            .await
            .into_iter()
            .find(|(rid, _)| *rid == id)
            .map(|(_, status)| status)
            .unwrap_or(DecryptionStatus::NotSubmitted);

        match status {
            DecryptionStatus::Ready(value) => value.as_uint().ok_or_else(|| {
                FailureReason::DecryptionFailed(format!("aggregate is not an integer: {value}"))
                    .into()
            }),
            DecryptionStatus::Failed(cause) => {
                Err(FailureReason::DecryptionFailed(cause.to_string()).into())
            }
            DecryptionStatus::NotSubmitted | DecryptionStatus::Pending => Err(
                FailureReason::NoAuthorization("aggregate was not submitted".to_string()).into(),
            ),
        }
    }

    async fn choose_side(&self, market: &Market, aggregate: U256) -> Result<bool, Halt> {
        let rule = self.config.rule_for(market.id);
        let price = match rule {
            MarketRule::PriceTarget { coin_id, .. } => Some(
                self.price_feed
                    .usd_price(coin_id)
                    .await
                    .map_err(|e| FailureReason::ReferenceUnavailable(format!("{e:#}")))?,
            ),
            MarketRule::AggregateThreshold { .. } => None,
        };
        Ok(decide(rule, aggregate, price, market)?)
    }
}

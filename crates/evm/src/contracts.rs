// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::log_fetcher::{decode_wagers, fetch_logs_chunked};
use crate::market_sol::PredictionMarket::{self, BetPlaced};
use crate::{
    call_with_retry, BlockInfo, Market, MarketReader, MarketWriter, TxReceipt,
    WagerRecord,
};
use alloy::{
    eips::BlockNumberOrTag,
    network::EthereumWallet,
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::Filter,
    signers::local::PrivateKeySigner,
    sol_types::SolEvent,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use cm_config::ChainConfig;
use once_cell::sync::Lazy;
use std::marker::PhantomData;
use tokio::sync::Mutex;
use tracing::{info, instrument};

static NONCE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub async fn next_pending_nonce<P>(provider: &P, from: Address) -> Result<u64>
where
    P: Provider + ?Sized,
{
    provider
        .get_transaction_count(from)
        .pending()
        .await
        .map_err(Into::into)
}

/// Generic type to represent different provider capabilities
pub trait ProviderType: Send + Sync + 'static {}

/// Marker type for read-only provider
#[derive(Clone, Debug)]
pub struct ReadOnly;
impl ProviderType for ReadOnly {}

/// Marker type for read-write provider
#[derive(Clone, Debug)]
pub struct ReadWrite;
impl ProviderType for ReadWrite {}

/// Prediction market contract bound to a provider
#[derive(Clone)]
pub struct MarketContract<T: ProviderType> {
    provider: DynProvider,
    contract_address: Address,
    sender: Option<Address>,
    _marker: PhantomData<T>,
}

pub type MarketReadContract = MarketContract<ReadOnly>;
pub type MarketWriteContract = MarketContract<ReadWrite>;

impl<T: ProviderType> MarketContract<T> {
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn address(&self) -> &Address {
        &self.contract_address
    }
}

impl MarketContract<ReadWrite> {
    /// Account that signs transactions
    pub fn sender(&self) -> Option<Address> {
        self.sender
    }
}

// Factory for creating contract instances
pub struct MarketContractFactory;

impl MarketContractFactory {
    /// Create a write-capable contract
    pub async fn create_write(
        http_rpc_url: &str,
        contract_address: Address,
        signer: PrivateKeySigner,
    ) -> Result<MarketContract<ReadWrite>> {
        let sender = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect(http_rpc_url)
            .await?
            .erased();

        Ok(MarketContract::<ReadWrite> {
            provider,
            contract_address,
            sender: Some(sender),
            _marker: PhantomData,
        })
    }

    /// Create a read-only contract
    pub async fn create_read(
        http_rpc_url: &str,
        contract_address: Address,
    ) -> Result<MarketContract<ReadOnly>> {
        let provider = ProviderBuilder::new().connect(http_rpc_url).await?.erased();

        Ok(MarketContract::<ReadOnly> {
            provider,
            contract_address,
            sender: None,
            _marker: PhantomData,
        })
    }

    pub async fn read_from_config(chain: &ChainConfig) -> Result<MarketContract<ReadOnly>> {
        let contract = Self::create_read(
            &chain.rpc()?.as_http_url()?,
            chain.contracts.prediction_market.address()?,
        )
        .await?;
        ensure_chain_id(&contract, chain).await?;
        Ok(contract)
    }

    pub async fn write_from_config(
        chain: &ChainConfig,
        signer: PrivateKeySigner,
    ) -> Result<MarketContract<ReadWrite>> {
        let contract = Self::create_write(
            &chain.rpc()?.as_http_url()?,
            chain.contracts.prediction_market.address()?,
            signer,
        )
        .await?;
        ensure_chain_id(&contract, chain).await?;
        Ok(contract)
    }
}

async fn ensure_chain_id<T: ProviderType>(
    contract: &MarketContract<T>,
    chain: &ChainConfig,
) -> Result<()> {
    let Some(expected) = chain.chain_id else {
        return Ok(());
    };
    let actual = contract
        .chain_id()
        .await
        .with_context(|| format!("Could not reach rpc for chain {}", chain.name))?;
    if actual != expected {
        bail!(
            "Chain {} is configured with chain_id {expected} but the rpc reports {actual}",
            chain.name
        );
    }
    Ok(())
}

// Implement MarketReader for any MarketContract regardless of provider type
#[async_trait]
impl<T: ProviderType> MarketReader for MarketContract<T> {
    fn contract_address(&self) -> Address {
        self.contract_address
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn latest_block(&self) -> Result<BlockInfo> {
        call_with_retry("latest_block", &[], || async move {
            let block = self
                .provider
                .get_block_by_number(BlockNumberOrTag::Latest)
                .await?
                .context("Node returned no latest block")?;
            Ok(BlockInfo {
                number: block.header.number,
                timestamp: block.header.timestamp,
            })
        })
        .await
    }

    async fn market_count(&self) -> Result<u64> {
        let contract = PredictionMarket::new(self.contract_address, &self.provider);
        let count = contract.getMarketCount().call().await?;
        Ok(count.saturating_to())
    }

    async fn market(&self, market_id: u64) -> Result<Market> {
        call_with_retry("getMarket", &[], || async move {
            let contract = PredictionMarket::new(self.contract_address, &self.provider);
            let m = contract.getMarket(U256::from(market_id)).call().await?;
            Ok(Market {
                id: market_id,
                question: m.question,
                category_id: m.categoryId.saturating_to(),
                deadline: m.deadline.saturating_to(),
                creator: m.creator,
                resolved: m.resolved,
                winning_side: m.winningSide,
                target_price: m.targetPrice,
                participant_count: m.participantCount.saturating_to(),
                aggregated_handle: m.aggregatedHandle,
                input_proof: m.inputProof,
            })
        })
        .await
    }

    async fn wagers(
        &self,
        market_id: u64,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<WagerRecord>> {
        let filter = Filter::new()
            .address(self.contract_address)
            .event_signature(BetPlaced::SIGNATURE_HASH)
            .topic1(B256::from(U256::from(market_id)));

        let logs = fetch_logs_chunked(&self.provider, &filter, from_block, to_block).await?;
        decode_wagers(&logs, market_id)
    }
}

// Implement MarketWriter only for contracts with ReadWrite marker
#[async_trait]
impl MarketWriter for MarketContract<ReadWrite> {
    #[instrument(name = "place_bet_tx", skip(self, handle, proof))]
    async fn place_bet(
        &self,
        market_id: u64,
        handle: B256,
        proof: Bytes,
        side: bool,
    ) -> Result<TxReceipt> {
        let sender = self
            .sender
            .context("Contract was created without a signer")?;

        let _guard = NONCE_LOCK.lock().await;
        let nonce = next_pending_nonce(&self.provider, sender).await?;

        let contract = PredictionMarket::new(self.contract_address, &self.provider);
        let builder = contract
            .placeEncryptedBet(
                U256::from(market_id),
                Bytes::copy_from_slice(handle.as_slice()),
                proof,
                side,
            )
            .nonce(nonce);
        let receipt = builder.send().await?.get_receipt().await?;

        info!(
            tx = %receipt.transaction_hash,
            success = receipt.status(),
            "placeEncryptedBet mined"
        );

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            success: receipt.status(),
        })
    }

    #[instrument(name = "resolve_market_tx", skip(self, proof))]
    async fn resolve_market(
        &self,
        market_id: u64,
        aggregated_handle: B256,
        proof: Bytes,
        winning_side: bool,
    ) -> Result<TxReceipt> {
        let sender = self
            .sender
            .context("Contract was created without a signer")?;

        let _guard = NONCE_LOCK.lock().await;
        let nonce = next_pending_nonce(&self.provider, sender).await?;

        let contract = PredictionMarket::new(self.contract_address, &self.provider);
        let builder = contract
            .resolveMarket(U256::from(market_id), aggregated_handle, proof, winning_side)
            .nonce(nonce);
        let receipt = builder.send().await?.get_receipt().await?;

        info!(
            tx = %receipt.transaction_hash,
            success = receipt.status(),
            "resolveMarket mined"
        );

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            success: receipt.status(),
        })
    }
}

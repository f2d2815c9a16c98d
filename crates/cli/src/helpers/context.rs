// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use super::ensure_hex_zeroizing;
use anyhow::{Context as _, Result};
use cm_auth::{AuthorizationManager, AuthorizationPolicy, LocalWalletSigner};
use cm_config::AppConfig;
use cm_data::{SharedStore, SledStore};
use cm_decrypt::DecryptionCoordinator;
use cm_evm::{MarketContractFactory, MarketReader, MarketWriteContract};
use cm_relayer::{relayer_from_config, ConfidentialRelayer};
use cm_resolver::{CoinGeckoFeed, FixedPriceFeed, PriceFeed, ResolutionPipeline};
use std::sync::Arc;
use tracing::info;

const DB_TREE: &str = "cmarket";

/// Everything a command needs, wired from config
pub struct Context {
    pub config: AppConfig,
    pub store: SharedStore<SledStore>,
    pub signer: Arc<LocalWalletSigner>,
}

impl Context {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let key = config.operator_key().context(
            "No operator key configured. Set operator.private_key or CMARKET_OPERATOR__PRIVATE_KEY",
        )?;
        let key = ensure_hex_zeroizing(key)?;
        let signer = Arc::new(LocalWalletSigner::from_private_key(&key)?);

        let store = SharedStore::new(SledStore::new(&config.db_file(), DB_TREE)?);
        info!(operator = %signer.inner().address(), db = ?config.db_file(), "Context ready");

        Ok(Self {
            config: config.clone(),
            store,
            signer,
        })
    }

    pub fn auth(&self) -> AuthorizationManager<SledStore> {
        AuthorizationManager::new(
            self.store.clone(),
            self.signer.clone(),
            AuthorizationPolicy::from(self.config.authorization()),
        )
    }

    pub fn relayer(&self) -> Result<Arc<dyn ConfidentialRelayer>> {
        relayer_from_config(self.config.relayer())
    }

    pub async fn reader(&self) -> Result<Arc<dyn MarketReader>> {
        Ok(Arc::new(
            MarketContractFactory::read_from_config(self.config.chain()).await?,
        ))
    }

    /// Market contract sending transactions from the operator account
    pub async fn writer(&self) -> Result<Arc<MarketWriteContract>> {
        Ok(Arc::new(
            MarketContractFactory::write_from_config(
                self.config.chain(),
                self.signer.inner().clone(),
            )
            .await?,
        ))
    }

    pub async fn coordinator(&self) -> Result<DecryptionCoordinator<SledStore>> {
        let chain_id = self.reader().await?.chain_id().await?;
        Ok(DecryptionCoordinator::new(
            self.relayer()?,
            self.auth(),
            chain_id,
        ))
    }

    /// Resolution pipeline sending transactions from the operator account
    pub async fn pipeline(
        &self,
        price: Option<f64>,
    ) -> Result<(ResolutionPipeline<SledStore>, Arc<dyn MarketReader>)> {
        let chain = self.config.chain();
        let resolver = self.config.resolver();
        let writer = self.writer().await?;
        let reader: Arc<dyn MarketReader> = writer.clone();
        let chain_id = reader.chain_id().await?;

        let price_feed: Arc<dyn PriceFeed> = match price {
            Some(price) => {
                let mut feed = FixedPriceFeed::new();
                for rule in std::iter::once(&resolver.default_rule)
                    .chain(resolver.markets.iter().map(|m| &m.rule))
                {
                    if let cm_config::MarketRule::PriceTarget { coin_id, .. } = rule {
                        feed = feed.with_price(coin_id.clone(), price);
                    }
                }
                Arc::new(feed)
            }
            None => Arc::new(CoinGeckoFeed::from_config(&resolver.price_feed)?),
        };

        let coordinator = DecryptionCoordinator::new(self.relayer()?, self.auth(), chain_id);
        let pipeline = ResolutionPipeline::new(
            reader.clone(),
            writer,
            self.relayer()?,
            coordinator,
            price_feed,
            self.store.clone(),
            resolver.clone(),
        )
        .with_start_block(chain.start_block()?);

        Ok((pipeline, reader))
    }
}

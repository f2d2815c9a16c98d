// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::{Address, B256, U256};
use anyhow::{bail, Context, Result};
use cm_decrypt::DecryptionRequest;
use cm_evm::{MarketReader, MarketWriter, TxReceipt, WagerRecord};
use cm_relayer::{ClearValue, ConfidentialRelayer, ValueKind};
use tracing::{info, instrument};

/// A wager that made it on-chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedWager {
    pub handle: B256,
    pub receipt: TxReceipt,
}

/// Encrypt `amount` for `bettor` and place it on `market_id`.
///
/// Nothing is encrypted for a market that is resolved or past its deadline.
#[instrument(
    name = "place_wager",
    skip(relayer, reader, writer),
    fields(contract = %reader.contract_address())
)]
pub async fn place_wager(
    relayer: &dyn ConfidentialRelayer,
    reader: &dyn MarketReader,
    writer: &dyn MarketWriter,
    bettor: Address,
    market_id: u64,
    amount: u64,
    side: bool,
) -> Result<PlacedWager> {
    if amount == 0 {
        bail!("Wager amount must be positive");
    }

    let market = reader.market(market_id).await?;
    if market.resolved {
        bail!("Market {market_id} is already resolved");
    }
    let head = reader.latest_block().await?;
    if market.is_past_deadline(head.timestamp) {
        bail!(
            "Market {market_id} closed at {} (chain time {})",
            market.deadline,
            head.timestamp
        );
    }

    let input = relayer
        .encrypt(
            reader.contract_address(),
            bettor,
            &[ClearValue::Uint(U256::from(amount))],
        )
        .await
        .context("Could not encrypt wager amount")?;
    let handle = *input
        .handles
        .first()
        .context("Relayer returned no handle for the wager amount")?;

    let receipt = writer
        .place_bet(market_id, handle, input.proof, side)
        .await?;
    if !receipt.success {
        bail!("placeEncryptedBet transaction {} reverted", receipt.tx_hash);
    }

    info!(tx = %receipt.tx_hash, %handle, "Wager placed");
    Ok(PlacedWager { handle, receipt })
}

/// Wagers `bettor` placed on `market_id` between `from_block` and the chain head
pub async fn wagers_of(
    reader: &dyn MarketReader,
    bettor: Address,
    market_id: u64,
    from_block: u64,
) -> Result<Vec<WagerRecord>> {
    let head = reader.latest_block().await?;
    Ok(reader
        .wagers(market_id, from_block, head.number)
        .await?
        .into_iter()
        .filter(|wager| wager.bettor == bettor)
        .collect())
}

/// One amount decryption per wager
pub fn amount_requests(contract: Address, wagers: &[WagerRecord]) -> Vec<DecryptionRequest> {
    wagers
        .iter()
        .map(|wager| DecryptionRequest::new(wager.handle, contract, ValueKind::Uint))
        .collect()
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::cli::Side;
use crate::helpers::context::Context;
use anyhow::Result;
use cm_config::AppConfig;
use cm_resolver::bettor::place_wager;

pub async fn execute(config: &AppConfig, market_id: u64, amount: u64, side: Side) -> Result<()> {
    let ctx = Context::new(config)?;
    let writer = ctx.writer().await?;
    let relayer = ctx.relayer()?;
    let bettor = ctx.signer.inner().address();

    let placed = place_wager(
        relayer.as_ref(),
        writer.as_ref(),
        writer.as_ref(),
        bettor,
        market_id,
        amount,
        side == Side::Yes,
    )
    .await?;

    println!(
        "Wager {} placed on market {market_id} ({side:?}) in {}",
        placed.handle, placed.receipt.tx_hash
    );
    Ok(())
}

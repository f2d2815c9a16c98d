// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::context::Context;
use alloy::primitives::{Address, B256};
use anyhow::{bail, Result};
use cm_config::AppConfig;
use cm_decrypt::{DecryptionRequest, DecryptionStatus};
use cm_relayer::ValueKind;
use cm_resolver::bettor::{amount_requests, wagers_of};

pub async fn execute(
    config: &AppConfig,
    handles: Vec<B256>,
    kind: ValueKind,
    contract: Option<Address>,
    market: Option<u64>,
) -> Result<()> {
    let ctx = Context::new(config)?;

    let requests = match market {
        Some(market_id) => {
            let reader = ctx.reader().await?;
            let operator = ctx.signer.inner().address();
            let wagers = wagers_of(
                reader.as_ref(),
                operator,
                market_id,
                config.chain().start_block()?,
            )
            .await?;
            if wagers.is_empty() {
                println!("No wagers from {operator} on market {market_id}");
                return Ok(());
            }
            amount_requests(reader.contract_address(), &wagers)
        }
        None => {
            let contract = match contract {
                Some(contract) => contract,
                None => config.chain().contracts.prediction_market.address()?,
            };
            handles
                .into_iter()
                .map(|handle| DecryptionRequest::new(handle, contract, kind))
                .collect()
        }
    };

    let coordinator = ctx.coordinator().await?;
    let mut view = coordinator.submit(requests).await?;
    let mut failed = 0;
    for (id, status) in view.wait().await {
        match status {
            DecryptionStatus::Ready(value) => println!("{} {}", id.handle, value),
            DecryptionStatus::Failed(cause) => {
                failed += 1;
                println!("{} failed: {}", id.handle, cause);
            }
            other => println!("{} {:?}", id.handle, other),
        }
    }

    if failed > 0 {
        bail!("{failed} handle(s) could not be decrypted");
    }
    Ok(())
}

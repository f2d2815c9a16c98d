// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::context::Context;
use alloy::primitives::Address;
use anyhow::Result;
use chrono::DateTime;
use cm_auth::DecryptionAuthorization;
use cm_config::AppConfig;
use cm_evm::MarketReader;

pub async fn execute(
    config: &AppConfig,
    contracts: Vec<Address>,
    revoke: bool,
    check: bool,
) -> Result<()> {
    let ctx = Context::new(config)?;
    let contracts = if contracts.is_empty() {
        vec![config.chain().contracts.prediction_market.address()?]
    } else {
        contracts
    };

    let chain_id = ctx.reader().await?.chain_id().await?;
    let auth = ctx.auth();
    let user = auth.signer_address();

    if revoke {
        auth.revoke(user, chain_id, &contracts).await?;
        println!("Revoked decryption authorization for {user} on chain {chain_id}");
        return Ok(());
    }

    if check {
        match auth.lookup(user, chain_id, &contracts).await? {
            Some(authorization) => println!("{}", describe(&authorization)),
            None => println!("No valid decryption authorization for {user} on chain {chain_id}"),
        }
        return Ok(());
    }

    let authorization = auth.ensure(user, chain_id, &contracts).await?;
    println!("{}", describe(&authorization));
    Ok(())
}

fn describe(authorization: &DecryptionAuthorization) -> String {
    let expires = DateTime::from_timestamp(authorization.expires_at() as i64, 0)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| authorization.expires_at().to_string());
    let contracts = authorization
        .contract_addresses
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Decryption authorization for {} on chain {} covers [{}] until {}",
        authorization.user, authorization.chain_id, contracts, expires
    )
}

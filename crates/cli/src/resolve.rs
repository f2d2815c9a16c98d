// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::context::Context;
use anyhow::{bail, Result};
use cm_config::AppConfig;
use cm_resolver::{ResolutionOutcome, ResolutionState};

pub async fn execute(config: &AppConfig, market_id: u64, price: Option<f64>) -> Result<()> {
    let ctx = Context::new(config)?;
    let (pipeline, _) = ctx.pipeline(price).await?;

    match pipeline.run(market_id).await? {
        ResolutionState::Resolved(outcome) => {
            println!("{}", describe(market_id, &outcome));
            Ok(())
        }
        ResolutionState::Failed(reason) => bail!("Market {market_id} not resolved: {reason}"),
        state => bail!("Market {market_id} stopped in {state:?}"),
    }
}

fn describe(market_id: u64, outcome: &ResolutionOutcome) -> String {
    let side = if outcome.winning_side() { "YES" } else { "NO" };
    match outcome {
        ResolutionOutcome::Submitted {
            aggregate,
            wagers,
            tx_hash,
            ..
        } => format!(
            "Market {market_id} resolved {side} from {wagers} wagers (aggregate {aggregate}) in {tx_hash}"
        ),
        ResolutionOutcome::NoWagersCollected { tx_hash, .. } => {
            format!("Market {market_id} had no wagers and resolved {side} in {tx_hash}")
        }
        ResolutionOutcome::AlreadyResolved { .. } => {
            format!("Market {market_id} was already resolved {side}")
        }
    }
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{authorize, bet, decrypt, resolve, watch};
use crate::helpers::telemetry::setup_simple_tracing;
use alloy::primitives::{Address, B256};
use anyhow::Result;
use clap::{command, ArgAction, Parser, Subcommand, ValueEnum};
use cm_config::{load_config, AppConfig};
use cm_data::SledStore;
use cm_relayer::ValueKind;
use tracing::{info, instrument, Level};

#[derive(Parser, Debug)]
#[command(name = "cmarket")]
#[command(about = "Operator tooling for confidential prediction markets: decryption authorization, batched decryption and market resolution", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,

    /// Indicate error levels by adding additional `-v` arguments. Eg. `cmarket -vvv` will give
    /// you trace level output
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true
    )]
    pub verbose: u8,

    /// Silence all output. This argument cannot be used alongside `-v`
    #[arg(
        short,
        long,
        action = ArgAction::SetTrue,
        conflicts_with = "verbose",
        global = true
    )]
    quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,  //
                1 => Level::INFO,  // -v
                2 => Level::DEBUG, // -vv
                _ => Level::TRACE, // -vvv
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn execute(self) -> Result<()> {
        setup_simple_tracing(self.log_level());
        let config = self.load_config()?;
        info!("Config loaded from: {:?}", config.config_file());

        let result = match self.command {
            Commands::Resolve { market, price } => resolve::execute(&config, market, price).await,
            Commands::Watch { markets } => watch::execute(&config, markets).await,
            Commands::Bet {
                market,
                amount,
                side,
            } => bet::execute(&config, market, amount, side).await,
            Commands::Decrypt {
                handles,
                kind,
                contract,
                market,
            } => decrypt::execute(&config, handles, kind, contract, market).await,
            Commands::Authorize {
                contracts,
                revoke,
                check,
            } => authorize::execute(&config, contracts, revoke, check).await,
        };

        SledStore::close_all_connections();
        result
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        load_config(self.config.clone())
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve one market now
    Resolve {
        /// Market id on the prediction market contract
        #[arg(long, short)]
        market: u64,

        /// Use this USD price instead of querying the price feed
        #[arg(long)]
        price: Option<f64>,
    },

    /// Resolve markets as their deadlines pass
    Watch {
        /// Only watch these markets (overrides `resolver.watch`)
        #[arg(long = "market", action = ArgAction::Append)]
        markets: Vec<u64>,
    },

    /// Encrypt a wager from the operator account and place it on a market
    Bet {
        #[arg(long, short)]
        market: u64,

        /// Amount in the token's smallest unit
        #[arg(long)]
        amount: u64,

        #[arg(long, value_enum)]
        side: Side,
    },

    /// Decrypt handles owned by the operator account
    Decrypt {
        /// Ciphertext handle (0x-prefixed, 32 bytes)
        #[arg(
            long = "handle",
            required_unless_present = "market",
            action = ArgAction::Append
        )]
        handles: Vec<B256>,

        /// Declared plaintext type
        #[arg(long, default_value = "uint")]
        kind: ValueKind,

        /// Contract the handles belong to. Defaults to the configured market contract.
        #[arg(long)]
        contract: Option<Address>,

        /// Decrypt the amounts of the operator's own wagers on this market instead
        #[arg(long, conflicts_with_all = ["handles", "contract", "kind"])]
        market: Option<u64>,
    },

    /// Create, inspect or revoke the operator's decryption authorization
    Authorize {
        /// Contracts to authorize. Defaults to the configured market contract.
        #[arg(long = "contract", action = ArgAction::Append)]
        contracts: Vec<Address>,

        /// Evict the stored authorization
        #[arg(long, conflicts_with = "check")]
        revoke: bool,

        /// Only report whether a valid authorization is stored. Never prompts.
        #[arg(long)]
        check: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Side {
    Yes,
    No,
}

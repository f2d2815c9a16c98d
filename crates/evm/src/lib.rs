// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod contracts;
mod log_fetcher;
mod market;
mod market_sol;
mod retry;
mod traits;

pub use contracts::*;
pub use log_fetcher::{decode_wager, decode_wagers, fetch_logs_chunked, LogProvider};
pub use market::*;
pub use market_sol::PredictionMarket;
pub use retry::*;
pub use traits::*;

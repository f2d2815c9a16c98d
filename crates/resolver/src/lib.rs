// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Off-chain market resolution. Wagers are collected from chain logs, aggregated by the
//! relayer and only the aggregate is ever decrypted. The bettor side, placing an
//! encrypted wager and finding one's own, lives in [`bettor`].

pub mod bettor;
mod locks;
mod pipeline;
mod price_feed;
mod repo;
mod rules;
mod service;
mod state;

pub use locks::*;
pub use pipeline::*;
pub use price_feed::*;
pub use repo::*;
pub use rules::*;
pub use service::*;
pub use state::*;

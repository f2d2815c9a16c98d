// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod chain;
mod clock;
mod relayer;
mod signer;
mod utils;

pub use chain::*;
pub use clock::*;
pub use relayer::*;
pub use signer::*;
pub use utils::*;

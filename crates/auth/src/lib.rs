// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod authorization;
mod clock;
mod error;
mod keys;
mod manager;
mod signer;
mod store;

pub use authorization::*;
pub use clock::*;
pub use error::*;
pub use keys::*;
pub use manager::*;
pub use signer::*;
pub use store::*;

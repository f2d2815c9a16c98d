// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod in_mem;
mod repository;
mod shared_store;
mod sled_store;
mod sled_utils;
mod traits;

pub use in_mem::*;
pub use repository::*;
pub use shared_store::*;
pub use sled_store::*;
pub use traits::*;

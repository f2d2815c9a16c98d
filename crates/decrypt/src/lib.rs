// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod coordinator;
mod request;
mod table;
mod view;

pub use coordinator::*;
pub use request::*;
pub use view::*;

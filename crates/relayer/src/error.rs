// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayerError {
    #[error("Relayer does not support {0}")]
    Unsupported(String),

    #[error("Relayer unavailable: {0}")]
    Unavailable(String),

    #[error("Relayer rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Relayer transport error: {0}")]
    Transport(String),

    #[error("Could not decode relayer response: {0}")]
    Decode(String),
}

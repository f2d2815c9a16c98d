// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("At least one contract address is required to authorize decryption")]
    NoContracts,

    #[error("Signer {signer} does not control account {user}")]
    SignerMismatch { user: Address, signer: Address },

    #[error("Signing was declined: {0}")]
    SigningDeclined(String),

    #[error("Authorization store failure: {0}")]
    Store(#[from] anyhow::Error),
}

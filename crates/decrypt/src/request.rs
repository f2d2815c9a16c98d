// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::Address;
use cm_auth::AuthError;
use cm_relayer::{ClearValue, Handle, HandleContractPair, RelayerError, ValueKind};
use thiserror::Error;

/// Requests with the same handle and contract are the same request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId {
    pub handle: Handle,
    pub contract_address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptionRequest {
    pub handle: Handle,
    pub contract_address: Address,
    pub kind: ValueKind,
}

impl DecryptionRequest {
    pub fn new(handle: Handle, contract_address: Address, kind: ValueKind) -> Self {
        Self {
            handle,
            contract_address,
            kind,
        }
    }

    pub fn id(&self) -> RequestId {
        RequestId {
            handle: self.handle,
            contract_address: self.contract_address,
        }
    }

    pub fn pair(&self) -> HandleContractPair {
        HandleContractPair {
            handle: self.handle,
            contract_address: self.contract_address,
        }
    }
}

/// Why a single identity ended up failed
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum DecryptionFailure {
    #[error(transparent)]
    Relayer(#[from] RelayerError),

    #[error("Relayer returned no value for this handle")]
    Missing,

    #[error("Relayer value {raw} is not a valid {kind:?}")]
    Uncoercible { kind: ValueKind, raw: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecryptionStatus {
    /// Not in the table, usually because authorization could not be obtained
    NotSubmitted,
    Pending,
    Ready(ClearValue),
    Failed(DecryptionFailure),
}

impl DecryptionStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, DecryptionStatus::Pending)
    }

    pub fn value(&self) -> Option<&ClearValue> {
        match self {
            DecryptionStatus::Ready(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum DecryptError {
    #[error("Not authorized to decrypt: {0}")]
    NotAuthorized(#[source] AuthError),
}

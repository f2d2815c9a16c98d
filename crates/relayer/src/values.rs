// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Opaque 32-byte ciphertext reference
pub type Handle = B256;

/// Declared plaintext type behind a handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Uint,
    Bool,
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uint" | "u256" | "euint" => Ok(ValueKind::Uint),
            "bool" | "ebool" => Ok(ValueKind::Bool),
            other => Err(format!("unknown value kind '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearValue {
    Uint(U256),
    Bool(bool),
}

impl ClearValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ClearValue::Uint(_) => ValueKind::Uint,
            ClearValue::Bool(_) => ValueKind::Bool,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            ClearValue::Uint(v) => Some(*v),
            ClearValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ClearValue::Bool(v) => Some(*v),
            ClearValue::Uint(_) => None,
        }
    }
}

impl fmt::Display for ClearValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearValue::Uint(v) => write!(f, "{v}"),
            ClearValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Plaintext exactly as the relayer returned it, before coercion to a [`ValueKind`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(u64),
    Text(String),
    /// Anything else, such as a JSON number past `u64::MAX`. Never coerces.
    Other(serde_json::Value),
}

impl RawValue {
    /// Interpret the raw value as `kind`. Returns `None` when it does not fit.
    pub fn coerce(&self, kind: ValueKind) -> Option<ClearValue> {
        match kind {
            ValueKind::Uint => match self {
                RawValue::Number(n) => Some(ClearValue::Uint(U256::from(*n))),
                RawValue::Text(s) => U256::from_str(s.trim()).ok().map(ClearValue::Uint),
                RawValue::Bool(_) | RawValue::Other(_) => None,
            },
            ValueKind::Bool => match self {
                RawValue::Bool(b) => Some(ClearValue::Bool(*b)),
                RawValue::Number(0) => Some(ClearValue::Bool(false)),
                RawValue::Number(1) => Some(ClearValue::Bool(true)),
                RawValue::Number(_) | RawValue::Other(_) => None,
                RawValue::Text(s) => match s.trim() {
                    "true" => Some(ClearValue::Bool(true)),
                    "false" => Some(ClearValue::Bool(false)),
                    other => match U256::from_str(other).ok()? {
                        v if v.is_zero() => Some(ClearValue::Bool(false)),
                        v if v == U256::from(1) => Some(ClearValue::Bool(true)),
                        _ => None,
                    },
                },
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: Handle,
    pub contract_address: Address,
}

/// Output of client-side encryption: one handle per value, one proof for all of them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handles: Vec<Handle>,
    pub proof: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerCiphertext {
    pub handle: Handle,
    pub proof: Bytes,
}

/// Homomorphic sum of every wager of one market
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCiphertext {
    pub handle: Handle,
    pub proof: Bytes,
}

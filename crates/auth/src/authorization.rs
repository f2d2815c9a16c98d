// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Signed decryption authorizations.
//!
//! A [`DecryptionAuthorization`] binds an ephemeral keypair to a wallet owner. The owner
//! signs an EIP-712 `UserDecryptRequestVerification` naming the ephemeral public key, the
//! contracts whose ciphertexts may be decrypted, a start time and a duration in days. The
//! relayer re-encrypts plaintexts to the ephemeral public key only after checking that
//! signature.

use alloy::primitives::{Address, Bytes, Signature, B256, U256};
use alloy::sol;
use alloy::sol_types::{eip712_domain, SolStruct};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

pub const SECONDS_PER_DAY: u64 = 86_400;

sol! {
    #[derive(Debug)]
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 startTimestamp;
        uint256 durationDays;
    }
}

/// Sorted and deduplicated, so the same set always yields the same payload and store key
pub fn normalize_contracts(contracts: &[Address]) -> Vec<Address> {
    let mut contracts = contracts.to_vec();
    contracts.sort();
    contracts.dedup();
    contracts
}

/// Everything the owner signs over
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationPayload {
    pub chain_id: u64,
    pub verifying_contract: Address,
    pub public_key: Bytes,
    pub contract_addresses: Vec<Address>,
    pub issued_at: u64,
    pub validity_days: u64,
}

impl AuthorizationPayload {
    pub fn message(&self) -> UserDecryptRequestVerification {
        UserDecryptRequestVerification {
            publicKey: self.public_key.clone(),
            contractAddresses: self.contract_addresses.clone(),
            startTimestamp: U256::from(self.issued_at),
            durationDays: U256::from(self.validity_days),
        }
    }

    /// EIP-712 digest under the `Decryption` v1 domain
    pub fn signing_hash(&self) -> B256 {
        let domain = eip712_domain! {
            name: "Decryption",
            version: "1",
            chain_id: self.chain_id,
            verifying_contract: self.verifying_contract,
        };
        self.message().eip712_signing_hash(&domain)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DecryptionAuthorization {
    pub user: Address,
    pub chain_id: u64,
    pub verifying_contract: Address,
    /// Always sorted and deduplicated
    pub contract_addresses: Vec<Address>,
    /// Unix seconds
    pub issued_at: u64,
    pub validity_days: u64,
    pub public_key: Bytes,
    private_key: Zeroizing<Vec<u8>>,
    /// 65-byte owner signature (r ‖ s ‖ v) over [`AuthorizationPayload::signing_hash`]
    pub signature: Bytes,
}

impl fmt::Debug for DecryptionAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionAuthorization")
            .field("user", &self.user)
            .field("chain_id", &self.chain_id)
            .field("contract_addresses", &self.contract_addresses)
            .field("issued_at", &self.issued_at)
            .field("validity_days", &self.validity_days)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl DecryptionAuthorization {
    pub fn new(
        user: Address,
        payload: AuthorizationPayload,
        private_key: Zeroizing<Vec<u8>>,
        signature: &Signature,
    ) -> Self {
        Self {
            user,
            chain_id: payload.chain_id,
            verifying_contract: payload.verifying_contract,
            contract_addresses: normalize_contracts(&payload.contract_addresses),
            issued_at: payload.issued_at,
            validity_days: payload.validity_days,
            public_key: payload.public_key,
            private_key,
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
        }
    }

    pub fn payload(&self) -> AuthorizationPayload {
        AuthorizationPayload {
            chain_id: self.chain_id,
            verifying_contract: self.verifying_contract,
            public_key: self.public_key.clone(),
            contract_addresses: self.contract_addresses.clone(),
            issued_at: self.issued_at,
            validity_days: self.validity_days,
        }
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn expires_at(&self) -> u64 {
        self.issued_at
            .saturating_add(self.validity_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at()
    }

    pub fn covers(&self, contract: &Address) -> bool {
        self.contract_addresses.binary_search(contract).is_ok()
    }

    /// Valid iff unexpired, on the same chain and naming `contract`
    pub fn is_valid_for(&self, now: u64, chain_id: u64, contract: &Address) -> bool {
        !self.is_expired(now) && self.chain_id == chain_id && self.covers(contract)
    }

    pub fn is_valid_for_all(&self, now: u64, chain_id: u64, contracts: &[Address]) -> bool {
        !contracts.is_empty()
            && contracts
                .iter()
                .all(|contract| self.is_valid_for(now, chain_id, contract))
    }

    /// Recover the address that produced the owner signature.
    pub fn recover_signer(&self) -> Result<Address> {
        let sig = Signature::try_from(&self.signature[..])
            .map_err(|e| anyhow!("Invalid signature: {e}"))?;
        sig.recover_address_from_prehash(&self.payload().signing_hash())
            .map_err(|e| anyhow!("Failed to recover signer address: {e}"))
    }

    pub fn verify_signer(&self) -> Result<bool> {
        Ok(self.recover_signer()? == self.user)
    }
}

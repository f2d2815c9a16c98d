// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! The relayer is the external service that owns the homomorphic keys. This crate only
//! speaks its HTTP surface: encrypting inputs, aggregating wager ciphertexts and
//! decrypting handles for a signed [`cm_auth::DecryptionAuthorization`].

mod error;
mod http;
mod relayer;
mod v1;
mod v2;
mod values;

pub use error::*;
pub use relayer::*;
pub use v1::*;
pub use v2::*;
pub use values::*;

#[cfg(test)]
pub(crate) fn test_authorization() -> cm_auth::DecryptionAuthorization {
    use alloy::primitives::{Address, Bytes};
    use alloy::signers::{local::PrivateKeySigner, SignerSync};
    use cm_auth::{AuthorizationPayload, DecryptionAuthorization};

    let owner = PrivateKeySigner::random();
    let payload = AuthorizationPayload {
        chain_id: 31337,
        verifying_contract: Address::ZERO,
        public_key: Bytes::from(vec![4u8; 65]),
        contract_addresses: vec![Address::repeat_byte(0xcc)],
        issued_at: 1_700_000_000,
        validity_days: 365,
    };
    let signature = owner.sign_hash_sync(&payload.signing_hash()).unwrap();
    DecryptionAuthorization::new(
        owner.address(),
        payload,
        zeroize::Zeroizing::new(vec![1u8; 32]),
        &signature,
    )
}

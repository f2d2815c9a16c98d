// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::Bytes;
use alloy::signers::k256::elliptic_curve::sec1::ToEncodedPoint;
use alloy::signers::local::PrivateKeySigner;
use zeroize::Zeroizing;

/// Keypair used only to receive re-encrypted plaintexts from the relayer
pub struct EphemeralKeypair {
    /// Uncompressed SEC1 public key
    pub public_key: Bytes,
    pub private_key: Zeroizing<Vec<u8>>,
}

pub trait KeypairGenerator: Send + Sync + 'static {
    fn generate(&self) -> EphemeralKeypair;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Secp256k1Generator;

impl KeypairGenerator for Secp256k1Generator {
    fn generate(&self) -> EphemeralKeypair {
        let signer = PrivateKeySigner::random();
        let public_key = signer
            .credential()
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        EphemeralKeypair {
            public_key: Bytes::from(public_key),
            private_key: Zeroizing::new(signer.to_bytes().to_vec()),
        }
    }
}

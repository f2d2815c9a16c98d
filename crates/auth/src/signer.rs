// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::{Address, Signature, B256};
use alloy::signers::{local::PrivateKeySigner, Signer};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Wallet capable of signing the authorization digest. Implementations may decline.
#[async_trait]
pub trait AuthorizationSigner: Send + Sync + 'static {
    fn address(&self) -> Address;
    async fn sign_hash(&self, hash: B256) -> Result<Signature>;
}

/// Signs with a key held in process, used by the resolver operator
#[derive(Clone, Debug)]
pub struct LocalWalletSigner {
    signer: PrivateKeySigner,
}

impl LocalWalletSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer = private_key
            .trim()
            .parse::<PrivateKeySigner>()
            .context("Invalid operator private key")?;
        Ok(Self::new(signer))
    }

    pub fn inner(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

#[async_trait]
impl AuthorizationSigner for LocalWalletSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_hash(&self, hash: B256) -> Result<Signature> {
        Ok(Signer::sign_hash(&self.signer, &hash).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_wallet_signs_recoverable_hash() -> Result<()> {
        let wallet = LocalWalletSigner::new(PrivateKeySigner::random());
        let hash = B256::repeat_byte(9);
        let sig = wallet.sign_hash(hash).await?;
        assert_eq!(sig.recover_address_from_prehash(&hash)?, wallet.address());
        Ok(())
    }

    #[test]
    fn test_rejects_garbage_key() {
        assert!(LocalWalletSigner::from_private_key("0xnothex").is_err());
    }
}

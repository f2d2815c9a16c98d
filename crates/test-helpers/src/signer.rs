// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::{Address, Signature, B256};
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use anyhow::{bail, Result};
use async_trait::async_trait;
use cm_auth::AuthorizationSigner;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Wallet that counts signature prompts and can be told to decline them
#[derive(Debug)]
pub struct CountingSigner {
    key: PrivateKeySigner,
    prompts: AtomicUsize,
    decline: AtomicBool,
}

impl CountingSigner {
    pub fn new(key: PrivateKeySigner) -> Self {
        Self {
            key,
            prompts: AtomicUsize::new(0),
            decline: AtomicBool::new(false),
        }
    }

    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    pub fn key(&self) -> &PrivateKeySigner {
        &self.key
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthorizationSigner for CountingSigner {
    fn address(&self) -> Address {
        self.key.address()
    }

    async fn sign_hash(&self, hash: B256) -> Result<Signature> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.decline.load(Ordering::SeqCst) {
            bail!("User rejected the request");
        }
        Ok(self.key.sign_hash_sync(&hash)?)
    }
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::DecryptionAuthorization;
use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use cm_config::StoreKeys;
use cm_data::{DataStore, SharedStore};

/// Persists one authorization per (user, chain, contract set)
pub struct AuthorizationStore<S> {
    store: SharedStore<S>,
}

impl<S: DataStore> Clone for AuthorizationStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DataStore> AuthorizationStore<S> {
    pub fn new(store: SharedStore<S>) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        user: &Address,
        chain_id: u64,
        contracts: &[Address],
    ) -> Result<Option<DecryptionAuthorization>> {
        let key = StoreKeys::authorization(user, chain_id, contracts);
        self.store
            .get(&key)
            .await
            .map_err(|e| anyhow!("Could not read authorization '{key}': {e}"))
    }

    /// Replaces whatever was stored for the same key
    pub async fn put(&self, authorization: &DecryptionAuthorization) -> Result<()> {
        let key = StoreKeys::authorization(
            &authorization.user,
            authorization.chain_id,
            &authorization.contract_addresses,
        );
        let mut store = self.store.clone();
        store
            .insert(&key, authorization)
            .await
            .map_err(|e| anyhow!("Could not store authorization '{key}': {e}"))
    }

    pub async fn remove(&self, user: &Address, chain_id: u64, contracts: &[Address]) -> Result<()> {
        let key = StoreKeys::authorization(user, chain_id, contracts);
        let mut store = self.store.clone();
        store
            .remove(&key)
            .await
            .map_err(|e| anyhow!("Could not remove authorization '{key}': {e}"))
    }
}

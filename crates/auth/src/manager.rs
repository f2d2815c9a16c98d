// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{
    normalize_contracts, AuthError, AuthorizationPayload, AuthorizationSigner, AuthorizationStore,
    Clock, DecryptionAuthorization, KeypairGenerator, Secp256k1Generator, SystemClock,
};
use alloy::primitives::Address;
use cm_config::AuthorizationConfig;
use cm_data::{DataStore, SharedStore};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Clone, Debug)]
pub struct AuthorizationPolicy {
    pub validity_days: u64,
    pub verifying_contract: Address,
    pub sign_timeout: Duration,
}

impl From<&AuthorizationConfig> for AuthorizationPolicy {
    fn from(config: &AuthorizationConfig) -> Self {
        Self {
            validity_days: config.validity_days,
            verifying_contract: config.verifying_contract,
            sign_timeout: Duration::from_millis(config.sign_timeout_ms),
        }
    }
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self::from(&AuthorizationConfig::default())
    }
}

/// Hands out valid decryption authorizations, asking the signer only when nothing usable
/// is stored.
pub struct AuthorizationManager<S> {
    store: AuthorizationStore<S>,
    signer: Arc<dyn AuthorizationSigner>,
    keys: Arc<dyn KeypairGenerator>,
    clock: Arc<dyn Clock>,
    policy: AuthorizationPolicy,
    creating: Arc<Mutex<()>>,
}

impl<S: DataStore> Clone for AuthorizationManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            signer: self.signer.clone(),
            keys: self.keys.clone(),
            clock: self.clock.clone(),
            policy: self.policy.clone(),
            creating: self.creating.clone(),
        }
    }
}

impl<S: DataStore> AuthorizationManager<S> {
    pub fn new(
        store: SharedStore<S>,
        signer: Arc<dyn AuthorizationSigner>,
        policy: AuthorizationPolicy,
    ) -> Self {
        Self {
            store: AuthorizationStore::new(store),
            signer,
            keys: Arc::new(Secp256k1Generator),
            clock: Arc::new(SystemClock),
            policy,
            creating: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_keypair_generator(mut self, keys: Arc<dyn KeypairGenerator>) -> Self {
        self.keys = keys;
        self
    }

    /// Account the configured signer controls
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Return a stored authorization that is valid right now, without prompting.
    pub async fn lookup(
        &self,
        user: Address,
        chain_id: u64,
        contracts: &[Address],
    ) -> Result<Option<DecryptionAuthorization>, AuthError> {
        let contracts = normalize_contracts(contracts);
        if contracts.is_empty() {
            return Err(AuthError::NoContracts);
        }

        let Some(authorization) = self.store.get(&user, chain_id, &contracts).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if authorization.user != user || !authorization.is_valid_for_all(now, chain_id, &contracts)
        {
            debug!(
                user = %user,
                chain_id,
                expires_at = authorization.expires_at(),
                now,
                "Stored authorization is no longer usable"
            );
            return Ok(None);
        }

        if !authorization.verify_signer().unwrap_or(false) {
            warn!(user = %user, chain_id, "Stored authorization is not signed by its user");
            return Ok(None);
        }

        Ok(Some(authorization))
    }

    /// Return a valid authorization, creating and persisting a fresh one when needed.
    #[instrument(name = "ensure_authorization", skip_all, fields(user = %user, chain_id = chain_id))]
    pub async fn ensure(
        &self,
        user: Address,
        chain_id: u64,
        contracts: &[Address],
    ) -> Result<DecryptionAuthorization, AuthError> {
        let contracts = normalize_contracts(contracts);
        if contracts.is_empty() {
            return Err(AuthError::NoContracts);
        }

        let signer = self.signer.address();
        if signer != user {
            return Err(AuthError::SignerMismatch { user, signer });
        }

        if let Some(authorization) = self.lookup(user, chain_id, &contracts).await? {
            return Ok(authorization);
        }

        let _creating = self.creating.lock().await;

        // Someone else may have finished creating it while we waited
        if let Some(authorization) = self.lookup(user, chain_id, &contracts).await? {
            return Ok(authorization);
        }

        let authorization = self.create(user, chain_id, contracts).await?;
        self.store.put(&authorization).await?;
        info!(
            contracts = authorization.contract_addresses.len(),
            expires_at = authorization.expires_at(),
            "Stored new decryption authorization"
        );

        Ok(authorization)
    }

    /// Evict the stored authorization for this contract set
    pub async fn revoke(
        &self,
        user: Address,
        chain_id: u64,
        contracts: &[Address],
    ) -> Result<(), AuthError> {
        let contracts = normalize_contracts(contracts);
        if contracts.is_empty() {
            return Err(AuthError::NoContracts);
        }
        self.store.remove(&user, chain_id, &contracts).await?;
        info!(user = %user, chain_id, "Revoked decryption authorization");
        Ok(())
    }

    async fn create(
        &self,
        user: Address,
        chain_id: u64,
        contracts: Vec<Address>,
    ) -> Result<DecryptionAuthorization, AuthError> {
        let keypair = self.keys.generate();
        let payload = AuthorizationPayload {
            chain_id,
            verifying_contract: self.policy.verifying_contract,
            public_key: keypair.public_key,
            contract_addresses: contracts,
            issued_at: self.clock.now(),
            validity_days: self.policy.validity_days,
        };

        let hash = payload.signing_hash();
        let signature =
            match tokio::time::timeout(self.policy.sign_timeout, self.signer.sign_hash(hash)).await
            {
                Ok(Ok(signature)) => signature,
                Ok(Err(e)) => {
                    warn!("Authorization signature declined: {e}");
                    return Err(AuthError::SigningDeclined(e.to_string()));
                }
                Err(_) => {
                    warn!("Authorization signature timed out");
                    return Err(AuthError::SigningDeclined(format!(
                        "no signature after {:?}",
                        self.policy.sign_timeout
                    )));
                }
            };

        let authorization =
            DecryptionAuthorization::new(user, payload, keypair.private_key, &signature);
        match authorization.recover_signer() {
            Ok(recovered) if recovered == user => Ok(authorization),
            Ok(recovered) => Err(AuthError::SignerMismatch {
                user,
                signer: recovered,
            }),
            Err(e) => Err(AuthError::SigningDeclined(e.to_string())),
        }
    }
}

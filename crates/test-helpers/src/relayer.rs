// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::{keccak256, Address, Bytes, U256};
use async_trait::async_trait;
use cm_auth::DecryptionAuthorization;
use cm_relayer::{
    AggregateCiphertext, ClearValue, ConfidentialRelayer, EncryptedInput, Handle,
    HandleContractPair, RawValue, RelayerError, ValueKind, WagerCiphertext,
};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};
use tokio::sync::watch;

#[derive(Default)]
struct State {
    values: HashMap<Handle, RawValue>,
    decrypt_batches: Vec<Vec<Handle>>,
    aggregate_inputs: Vec<Vec<Handle>>,
    encrypt_calls: usize,
    decrypt_error: Option<RelayerError>,
    aggregate_error: Option<RelayerError>,
    aggregate_override: Option<RawValue>,
    nonce: u64,
}

/// In-memory relayer. Ciphertexts are plain lookups and aggregation sums the known
/// plaintexts of its inputs.
pub struct MockRelayer {
    state: Mutex<State>,
    paused: watch::Sender<bool>,
}

impl Default for MockRelayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRelayer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            paused: watch::Sender::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_value(&self, handle: Handle, value: RawValue) {
        self.state().values.insert(handle, value);
    }

    /// Hold every `user_decrypt` call until [`MockRelayer::resume`]
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn fail_decrypt(&self, error: Option<RelayerError>) {
        self.state().decrypt_error = error;
    }

    pub fn fail_aggregate(&self, error: Option<RelayerError>) {
        self.state().aggregate_error = error;
    }

    /// Report this plaintext for any aggregate instead of the computed sum
    pub fn override_aggregate(&self, value: Option<RawValue>) {
        self.state().aggregate_override = value;
    }

    pub fn decrypt_calls(&self) -> usize {
        self.state().decrypt_batches.len()
    }

    pub fn decrypted_batches(&self) -> Vec<Vec<Handle>> {
        self.state().decrypt_batches.clone()
    }

    pub fn decrypted_handles(&self) -> Vec<Handle> {
        self.state().decrypt_batches.iter().flatten().copied().collect()
    }

    pub fn aggregate_calls(&self) -> usize {
        self.state().aggregate_inputs.len()
    }

    pub fn aggregate_inputs(&self) -> Vec<Vec<Handle>> {
        self.state().aggregate_inputs.clone()
    }

    pub fn encrypt_calls(&self) -> usize {
        self.state().encrypt_calls
    }
}

fn flatten(handles: &[Handle]) -> Vec<u8> {
    handles.iter().flat_map(|h| h.0).collect()
}

fn raw(value: &ClearValue) -> RawValue {
    match value {
        ClearValue::Uint(v) => RawValue::Text(v.to_string()),
        ClearValue::Bool(b) => RawValue::Bool(*b),
    }
}

#[async_trait]
impl ConfidentialRelayer for MockRelayer {
    async fn encrypt(
        &self,
        contract: Address,
        user: Address,
        values: &[ClearValue],
    ) -> Result<EncryptedInput, RelayerError> {
        let mut state = self.state();
        state.encrypt_calls += 1;
        let mut handles = vec![];
        for value in values {
            state.nonce += 1;
            let handle = keccak256(
                [
                    contract.as_slice(),
                    user.as_slice(),
                    &state.nonce.to_be_bytes(),
                ]
                .concat(),
            );
            state.values.insert(handle, raw(value));
            handles.push(handle);
        }
        let proof = Bytes::from(keccak256(flatten(&handles)).to_vec());
        Ok(EncryptedInput { handles, proof })
    }

    async fn aggregate(
        &self,
        _contract: Address,
        inputs: &[WagerCiphertext],
    ) -> Result<AggregateCiphertext, RelayerError> {
        let mut state = self.state();
        if let Some(error) = state.aggregate_error.clone() {
            return Err(error);
        }

        let handles: Vec<Handle> = inputs.iter().map(|input| input.handle).collect();
        state.aggregate_inputs.push(handles.clone());

        let sum = handles
            .iter()
            .filter_map(|handle| state.values.get(handle))
            .filter_map(|value| value.coerce(ValueKind::Uint))
            .filter_map(|value| value.as_uint())
            .fold(U256::ZERO, |acc, v| acc.saturating_add(v));

        let handle = keccak256([b"aggregate".as_slice(), &flatten(&handles)].concat());
        let value = state
            .aggregate_override
            .clone()
            .unwrap_or(RawValue::Text(sum.to_string()));
        state.values.insert(handle, value);

        Ok(AggregateCiphertext {
            handle,
            proof: Bytes::from(handle.to_vec()),
        })
    }

    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        _authorization: &DecryptionAuthorization,
    ) -> Result<HashMap<Handle, RawValue>, RelayerError> {
        self.state()
            .decrypt_batches
            .push(pairs.iter().map(|pair| pair.handle).collect());

        let mut paused = self.paused.subscribe();
        let _ = paused.wait_for(|paused| !*paused).await;

        let state = self.state();
        if let Some(error) = state.decrypt_error.clone() {
            return Err(error);
        }
        Ok(pairs
            .iter()
            .filter_map(|pair| {
                state
                    .values
                    .get(&pair.handle)
                    .map(|value| (pair.handle, value.clone()))
            })
            .collect())
    }
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{
    AggregateCiphertext, ClearValue, EncryptedInput, Handle, HandleContractPair, RawValue,
    RelayerError, RelayerV1, RelayerV2, WagerCiphertext,
};
use alloy::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use cm_auth::DecryptionAuthorization;
use cm_config::{RelayerApiVersion, RelayerConfig};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Capabilities of the confidential computation relayer. One adapter per API version.
#[async_trait]
pub trait ConfidentialRelayer: Send + Sync + 'static {
    /// Encrypt plaintexts for use as inputs to `contract` by `user`
    async fn encrypt(
        &self,
        contract: Address,
        user: Address,
        values: &[ClearValue],
    ) -> Result<EncryptedInput, RelayerError>;

    /// Homomorphically sum the given wager ciphertexts into a single handle
    async fn aggregate(
        &self,
        contract: Address,
        inputs: &[WagerCiphertext],
    ) -> Result<AggregateCiphertext, RelayerError>;

    /// Decrypt handles on behalf of the owner of `authorization`
    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        authorization: &DecryptionAuthorization,
    ) -> Result<HashMap<Handle, RawValue>, RelayerError>;
}

pub fn relayer_from_config(config: &RelayerConfig) -> Result<Arc<dyn ConfidentialRelayer>> {
    let url = config.url()?;
    let timeout = Duration::from_millis(config.timeout_ms);
    Ok(match config.api_version {
        RelayerApiVersion::V1 => Arc::new(RelayerV1::new(url, timeout)?),
        RelayerApiVersion::V2 => Arc::new(RelayerV2::new(url, timeout)?),
    })
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::http::HttpRelayerClient;
use crate::v1::{parse_results, TypedValue};
use crate::{
    AggregateCiphertext, ClearValue, ConfidentialRelayer, EncryptedInput, Handle,
    HandleContractPair, RawValue, RelayerError, WagerCiphertext,
};
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use cm_auth::DecryptionAuthorization;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Serialize)]
struct InputsRequest {
    contract: Address,
    user: Address,
    values: Vec<TypedValue>,
}

#[derive(Deserialize)]
struct InputsResponse {
    handles: Vec<Handle>,
    proof: Bytes,
}

#[derive(Serialize)]
struct Ciphertext {
    handle: Handle,
    proof: Bytes,
}

#[derive(Serialize)]
struct AggregationRequest {
    contract: Address,
    ciphertexts: Vec<Ciphertext>,
}

#[derive(Deserialize)]
struct AggregationResponse {
    handle: Handle,
    proof: Bytes,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest {
    user: Address,
    chain_id: u64,
    contracts: Vec<Address>,
    public_key: Bytes,
    signature: Bytes,
    start_timestamp: u64,
    duration_days: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: String,
}

#[derive(Serialize)]
struct SessionHandle {
    handle: Handle,
    contract: Address,
}

#[derive(Serialize)]
struct SessionDecryptRequest {
    handles: Vec<SessionHandle>,
}

#[derive(Deserialize)]
struct SessionValue {
    handle: String,
    value: RawValue,
}

#[derive(Deserialize)]
struct SessionDecryptResponse {
    values: Vec<SessionValue>,
}

/// Session-style `/v2/...` relayer API.
///
/// A decryption session is opened once per authorization and reused for later batches.
/// Aggregation is optional on this API, a relayer without it answers 404.
#[derive(Clone, Debug)]
pub struct RelayerV2 {
    http: HttpRelayerClient,
    sessions: Arc<Mutex<HashMap<Bytes, String>>>,
}

impl RelayerV2 {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, RelayerError> {
        Ok(Self {
            http: HttpRelayerClient::new(url, timeout)?,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn cached_session(&self, public_key: &Bytes) -> Option<String> {
        self.sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(public_key).cloned())
    }

    fn forget_session(&self, public_key: &Bytes) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(public_key);
        }
    }

    async fn session(&self, authorization: &DecryptionAuthorization) -> Result<String, RelayerError> {
        if let Some(session) = self.cached_session(&authorization.public_key) {
            return Ok(session);
        }

        let request = SessionRequest {
            user: authorization.user,
            chain_id: authorization.chain_id,
            contracts: authorization.contract_addresses.clone(),
            public_key: authorization.public_key.clone(),
            signature: authorization.signature.clone(),
            start_timestamp: authorization.issued_at,
            duration_days: authorization.validity_days,
        };
        let response: SessionResponse = self.http.post("v2/sessions", &request).await?;
        info!(user = %authorization.user, "Opened relayer decryption session");

        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(authorization.public_key.clone(), response.session_id.clone());
        }
        Ok(response.session_id)
    }

    async fn decrypt_in_session(
        &self,
        session: &str,
        pairs: &[HandleContractPair],
    ) -> Result<HashMap<Handle, RawValue>, RelayerError> {
        let request = SessionDecryptRequest {
            handles: pairs
                .iter()
                .map(|pair| SessionHandle {
                    handle: pair.handle,
                    contract: pair.contract_address,
                })
                .collect(),
        };
        let response: SessionDecryptResponse = self
            .http
            .post(&format!("v2/sessions/{session}/decrypt"), &request)
            .await?;
        parse_results(
            response
                .values
                .into_iter()
                .map(|value| (value.handle, value.value)),
        )
    }
}

#[async_trait]
impl ConfidentialRelayer for RelayerV2 {
    async fn encrypt(
        &self,
        contract: Address,
        user: Address,
        values: &[ClearValue],
    ) -> Result<EncryptedInput, RelayerError> {
        let request = InputsRequest {
            contract,
            user,
            values: values.iter().map(TypedValue::from).collect(),
        };
        let response: InputsResponse = self.http.post("v2/inputs", &request).await?;
        if response.handles.len() != values.len() {
            return Err(RelayerError::Decode(format!(
                "expected {} handles, got {}",
                values.len(),
                response.handles.len()
            )));
        }
        Ok(EncryptedInput {
            handles: response.handles,
            proof: response.proof,
        })
    }

    #[instrument(name = "relayer_v2_aggregate", skip_all, fields(inputs = inputs.len()))]
    async fn aggregate(
        &self,
        contract: Address,
        inputs: &[WagerCiphertext],
    ) -> Result<AggregateCiphertext, RelayerError> {
        let request = AggregationRequest {
            contract,
            ciphertexts: inputs
                .iter()
                .map(|input| Ciphertext {
                    handle: input.handle,
                    proof: input.proof.clone(),
                })
                .collect(),
        };
        let response: AggregationResponse = self.http.post("v2/aggregations", &request).await?;
        Ok(AggregateCiphertext {
            handle: response.handle,
            proof: response.proof,
        })
    }

    #[instrument(name = "relayer_v2_user_decrypt", skip_all, fields(handles = pairs.len()))]
    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        authorization: &DecryptionAuthorization,
    ) -> Result<HashMap<Handle, RawValue>, RelayerError> {
        let session = self.session(authorization).await?;
        match self.decrypt_in_session(&session, pairs).await {
            // Sessions expire relayer side. Reopen once.
            Err(RelayerError::Unsupported(_)) => {
                debug!("Relayer session {session} is gone, reopening");
                self.forget_session(&authorization.public_key);
                let session = self.session(authorization).await?;
                self.decrypt_in_session(&session, pairs).await
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server::serve;
    use crate::test_authorization;
    use alloy::primitives::B256;
    use serde_json::json;

    #[tokio::test]
    async fn test_session_is_reused_and_reopened_when_gone() {
        let handle = B256::repeat_byte(0x44);
        let values = json!({ "values": [{ "handle": handle, "value": 12 }] }).to_string();
        let (url, mut rx) = serve(vec![
            (200, json!({ "sessionId": "s1" }).to_string()),
            (200, values.clone()),
            (200, values.clone()),
            (404, "{}".into()),
            (200, json!({ "sessionId": "s2" }).to_string()),
            (200, values),
        ])
        .await;
        let relayer = RelayerV2::new(url, Duration::from_secs(5)).unwrap();
        let authorization = test_authorization();
        let pairs = vec![HandleContractPair {
            handle,
            contract_address: authorization.contract_addresses[0],
        }];

        for _ in 0..3 {
            let values = relayer.user_decrypt(&pairs, &authorization).await.unwrap();
            assert_eq!(values[&handle], RawValue::Number(12));
        }

        let mut paths = vec![];
        while let Ok(request) = rx.try_recv() {
            paths.push(request.path);
        }
        assert_eq!(
            paths,
            vec![
                "/v2/sessions",
                "/v2/sessions/s1/decrypt",
                "/v2/sessions/s1/decrypt",
                "/v2/sessions/s1/decrypt",
                "/v2/sessions",
                "/v2/sessions/s2/decrypt",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_aggregation_is_unsupported() {
        let (url, _rx) = serve(vec![(404, "{}".into())]).await;
        let relayer = RelayerV2::new(url, Duration::from_secs(5)).unwrap();
        let result = relayer
            .aggregate(
                Address::repeat_byte(1),
                &[WagerCiphertext {
                    handle: B256::repeat_byte(3),
                    proof: Bytes::from(vec![1]),
                }],
            )
            .await;
        assert!(matches!(result, Err(RelayerError::Unsupported(_))));
    }
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::http::HttpRelayerClient;
use crate::{
    AggregateCiphertext, ClearValue, ConfidentialRelayer, EncryptedInput, Handle,
    HandleContractPair, RawValue, RelayerError, ValueKind, WagerCiphertext,
};
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use cm_auth::DecryptionAuthorization;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, str::FromStr, time::Duration};
use tracing::{debug, instrument};
use url::Url;

#[derive(Serialize)]
pub(crate) struct TypedValue {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub value: String,
}

impl From<&ClearValue> for TypedValue {
    fn from(value: &ClearValue) -> Self {
        Self {
            kind: value.kind(),
            value: value.to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputProofRequest {
    contract_address: Address,
    user_address: Address,
    values: Vec<TypedValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputProofResponse {
    handles: Vec<Handle>,
    input_proof: Bytes,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateInput {
    handle: Handle,
    input_proof: Bytes,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateRequest {
    contract_address: Address,
    inputs: Vec<AggregateInput>,
}

#[derive(Deserialize)]
struct AggregateResponse {
    handle: Handle,
    proof: Bytes,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PairJson {
    handle: Handle,
    contract_address: Address,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestValidity {
    start_timestamp: String,
    duration_days: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDecryptRequest {
    handle_contract_pairs: Vec<PairJson>,
    contract_addresses: Vec<Address>,
    user_address: Address,
    chain_id: u64,
    public_key: Bytes,
    signature: Bytes,
    request_validity: RequestValidity,
}

#[derive(Deserialize)]
struct UserDecryptResponse {
    results: HashMap<String, RawValue>,
}

/// Parse handle keys leniently since some relayers drop the `0x` prefix
pub(crate) fn parse_results(
    results: impl IntoIterator<Item = (String, RawValue)>,
) -> Result<HashMap<Handle, RawValue>, RelayerError> {
    results
        .into_iter()
        .map(|(handle, value)| {
            Handle::from_str(&handle)
                .map(|handle| (handle, value))
                .map_err(|e| RelayerError::Decode(format!("bad handle '{handle}': {e}")))
        })
        .collect()
}

/// Functional `/v1/...` relayer API
#[derive(Clone, Debug)]
pub struct RelayerV1 {
    http: HttpRelayerClient,
}

impl RelayerV1 {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, RelayerError> {
        Ok(Self {
            http: HttpRelayerClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl ConfidentialRelayer for RelayerV1 {
    async fn encrypt(
        &self,
        contract: Address,
        user: Address,
        values: &[ClearValue],
    ) -> Result<EncryptedInput, RelayerError> {
        let request = InputProofRequest {
            contract_address: contract,
            user_address: user,
            values: values.iter().map(TypedValue::from).collect(),
        };
        let response: InputProofResponse = self.http.post("v1/input-proof", &request).await?;
        if response.handles.len() != values.len() {
            return Err(RelayerError::Decode(format!(
                "expected {} handles, got {}",
                values.len(),
                response.handles.len()
            )));
        }
        Ok(EncryptedInput {
            handles: response.handles,
            proof: response.input_proof,
        })
    }

    #[instrument(name = "relayer_v1_aggregate", skip_all, fields(inputs = inputs.len()))]
    async fn aggregate(
        &self,
        contract: Address,
        inputs: &[WagerCiphertext],
    ) -> Result<AggregateCiphertext, RelayerError> {
        let request = AggregateRequest {
            contract_address: contract,
            inputs: inputs
                .iter()
                .map(|input| AggregateInput {
                    handle: input.handle,
                    input_proof: input.proof.clone(),
                })
                .collect(),
        };
        let response: AggregateResponse = self.http.post("v1/aggregate", &request).await?;
        Ok(AggregateCiphertext {
            handle: response.handle,
            proof: response.proof,
        })
    }

    #[instrument(name = "relayer_v1_user_decrypt", skip_all, fields(handles = pairs.len()))]
    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        authorization: &DecryptionAuthorization,
    ) -> Result<HashMap<Handle, RawValue>, RelayerError> {
        let request = UserDecryptRequest {
            handle_contract_pairs: pairs
                .iter()
                .map(|pair| PairJson {
                    handle: pair.handle,
                    contract_address: pair.contract_address,
                })
                .collect(),
            contract_addresses: authorization.contract_addresses.clone(),
            user_address: authorization.user,
            chain_id: authorization.chain_id,
            public_key: authorization.public_key.clone(),
            signature: authorization.signature.clone(),
            request_validity: RequestValidity {
                start_timestamp: authorization.issued_at.to_string(),
                duration_days: authorization.validity_days.to_string(),
            },
        };
        let response: UserDecryptResponse = self.http.post("v1/user-decrypt", &request).await?;
        debug!("Relayer returned {} values", response.results.len());
        parse_results(response.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server::serve;
    use crate::test_authorization;
    use alloy::primitives::{B256, U256};
    use serde_json::json;

    #[tokio::test]
    async fn test_user_decrypt_posts_signed_request() {
        let handle = B256::repeat_byte(0x11);
        let (url, mut rx) = serve(vec![(
            200,
            json!({ "results": { (handle.to_string()): "1500", "2222222222222222222222222222222222222222222222222222222222222222": true } })
                .to_string(),
        )])
        .await;
        let relayer = RelayerV1::new(url, Duration::from_secs(5)).unwrap();
        let authorization = test_authorization();
        let pairs = vec![HandleContractPair {
            handle,
            contract_address: authorization.contract_addresses[0],
        }];

        let values = relayer.user_decrypt(&pairs, &authorization).await.unwrap();
        assert_eq!(values[&handle], RawValue::Text("1500".into()));
        assert_eq!(values[&B256::repeat_byte(0x22)], RawValue::Bool(true));

        let request = rx.recv().await.unwrap();
        assert_eq!(request.path, "/v1/user-decrypt");
        assert_eq!(request.body["userAddress"], json!(authorization.user));
        assert_eq!(request.body["requestValidity"]["durationDays"], json!("365"));
        assert_eq!(request.body["handleContractPairs"][0]["handle"], json!(handle));
        assert!(request.body.get("privateKey").is_none());
    }

    #[tokio::test]
    async fn test_user_decrypt_keeps_batch_with_oversized_number() {
        let wide = B256::repeat_byte(0x11);
        let small = B256::repeat_byte(0x22);
        let body = format!(
            r#"{{"results":{{"{wide}":123456789012345678901234567890,"{small}":"7"}}}}"#
        );
        let (url, _rx) = serve(vec![(200, body)]).await;
        let relayer = RelayerV1::new(url, Duration::from_secs(5)).unwrap();
        let authorization = test_authorization();
        let pairs: Vec<_> = [wide, small]
            .into_iter()
            .map(|handle| HandleContractPair {
                handle,
                contract_address: authorization.contract_addresses[0],
            })
            .collect();

        let values = relayer.user_decrypt(&pairs, &authorization).await.unwrap();
        assert!(matches!(values[&wide], RawValue::Other(_)));
        assert_eq!(values[&small], RawValue::Text("7".into()));
    }

    #[tokio::test]
    async fn test_encrypt_checks_handle_count() {
        let (url, mut rx) = serve(vec![(
            200,
            json!({ "handles": [B256::repeat_byte(1)], "inputProof": "0xabcd" }).to_string(),
        )])
        .await;
        let relayer = RelayerV1::new(url, Duration::from_secs(5)).unwrap();

        let result = relayer
            .encrypt(
                Address::repeat_byte(1),
                Address::repeat_byte(2),
                &[ClearValue::Uint(U256::from(10)), ClearValue::Bool(true)],
            )
            .await;
        assert!(matches!(result, Err(RelayerError::Decode(_))));

        let request = rx.recv().await.unwrap();
        assert_eq!(
            request.body["values"],
            json!([{ "type": "uint", "value": "10" }, { "type": "bool", "value": "true" }])
        );
    }

    #[tokio::test]
    async fn test_aggregate() {
        let (url, _rx) = serve(vec![(
            200,
            json!({ "handle": B256::repeat_byte(9), "proof": "0x0102" }).to_string(),
        )])
        .await;
        let relayer = RelayerV1::new(url, Duration::from_secs(5)).unwrap();
        let aggregate = relayer
            .aggregate(
                Address::repeat_byte(1),
                &[WagerCiphertext {
                    handle: B256::repeat_byte(3),
                    proof: Bytes::from(vec![1]),
                }],
            )
            .await
            .unwrap();
        assert_eq!(aggregate.handle, B256::repeat_byte(9));
        assert_eq!(aggregate.proof, Bytes::from(vec![1, 2]));
    }
}

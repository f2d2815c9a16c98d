// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::table::ResultTable;
use crate::{DecryptError, DecryptionRequest, DecryptionView, RequestId};
use alloy::primitives::Address;
use cm_auth::{AuthorizationManager, DecryptionAuthorization};
use cm_data::DataStore;
use cm_relayer::ConfidentialRelayer;
use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};
use tracing::{debug, info, instrument, warn};

/// Batches and deduplicates user decryption against the relayer.
///
/// Every identity is decrypted at most once per success. Overlapping submissions join
/// the batch already in flight and relayer calls run on their own task.
pub struct DecryptionCoordinator<S> {
    relayer: Arc<dyn ConfidentialRelayer>,
    auth: AuthorizationManager<S>,
    chain_id: u64,
    table: Arc<ResultTable>,
}

impl<S: DataStore> Clone for DecryptionCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            relayer: self.relayer.clone(),
            auth: self.auth.clone(),
            chain_id: self.chain_id,
            table: self.table.clone(),
        }
    }
}

impl<S: DataStore> DecryptionCoordinator<S> {
    pub fn new(
        relayer: Arc<dyn ConfidentialRelayer>,
        auth: AuthorizationManager<S>,
        chain_id: u64,
    ) -> Self {
        Self {
            relayer,
            auth,
            chain_id,
            table: Arc::new(ResultTable::default()),
        }
    }

    /// Account whose ciphertexts this coordinator decrypts
    pub fn user(&self) -> Address {
        self.auth.signer_address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Whether a stored authorization already covers `contracts`. Never prompts.
    pub async fn can_decrypt(&self, contracts: &[Address]) -> bool {
        matches!(
            self.auth.lookup(self.user(), self.chain_id, contracts).await,
            Ok(Some(_))
        )
    }

    /// Track `requests` and start one relayer call for the identities nobody has asked for
    /// yet.
    #[instrument(name = "decrypt_submit", skip_all, fields(requests = requests.len()))]
    pub async fn submit(
        &self,
        requests: Vec<DecryptionRequest>,
    ) -> Result<DecryptionView, DecryptError> {
        let ids = unique_ids(&requests);
        let batch = self.table.reserve(&requests);
        if batch.is_empty() {
            debug!("Nothing new to decrypt, joining existing results");
            return Ok(DecryptionView::new(ids, self.table.clone()));
        }

        // Only what goes to the relayer needs authorizing
        let contracts: Vec<Address> = batch
            .iter()
            .map(|request| request.contract_address)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let authorization = match self.auth.ensure(self.user(), self.chain_id, &contracts).await
        {
            Ok(authorization) => authorization,
            Err(e) => {
                warn!("Cannot decrypt without authorization: {e}");
                self.table.release(&batch);
                return Err(DecryptError::NotAuthorized(e));
            }
        };

        info!(batch = batch.len(), "Submitting decryption batch");
        tokio::spawn(run_batch(
            self.relayer.clone(),
            self.table.clone(),
            batch,
            authorization,
        ));

        Ok(DecryptionView::new(ids, self.table.clone()))
    }

    /// Forget failures among `requests` and submit them again
    pub async fn retry(
        &self,
        requests: Vec<DecryptionRequest>,
    ) -> Result<DecryptionView, DecryptError> {
        let ids: HashSet<RequestId> = requests.iter().map(DecryptionRequest::id).collect();
        let cleared = self.table.clear_failed(&ids);
        debug!(cleared, "Retrying failed decryptions");
        self.submit(requests).await
    }

    /// Current view of `requests` without submitting anything
    pub fn view(&self, requests: &[DecryptionRequest]) -> DecryptionView {
        DecryptionView::new(unique_ids(requests), self.table.clone())
    }
}

fn unique_ids(requests: &[DecryptionRequest]) -> Vec<RequestId> {
    let mut seen = HashSet::new();
    requests
        .iter()
        .map(DecryptionRequest::id)
        .filter(|id| seen.insert(*id))
        .collect()
}

async fn run_batch(
    relayer: Arc<dyn ConfidentialRelayer>,
    table: Arc<ResultTable>,
    batch: Vec<DecryptionRequest>,
    authorization: DecryptionAuthorization,
) {
    let pairs: Vec<_> = batch.iter().map(DecryptionRequest::pair).collect();
    let outcome = relayer.user_decrypt(&pairs, &authorization).await;
    match &outcome {
        Ok(values) => debug!(
            requested = pairs.len(),
            returned = values.len(),
            "Decryption batch complete"
        ),
        Err(e) => warn!(requested = pairs.len(), "Decryption batch failed: {e}"),
    }
    table.complete(&batch, outcome);
}

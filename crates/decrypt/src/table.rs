// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{DecryptionFailure, DecryptionRequest, DecryptionStatus, RequestId};
use cm_relayer::{Handle, RawValue, RelayerError};
use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::watch;

/// Shared in-flight and result table keyed by request identity.
///
/// Entries only move `Pending -> Ready` or `Pending -> Failed`. Failed entries are
/// removed by an explicit retry, ready entries are never touched again.
#[derive(Debug)]
pub(crate) struct ResultTable {
    entries: Mutex<HashMap<RequestId, DecryptionStatus>>,
    generation: watch::Sender<u64>,
}

impl Default for ResultTable {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generation: watch::Sender::new(0),
        }
    }
}

impl ResultTable {
    fn entries(&self) -> MutexGuard<'_, HashMap<RequestId, DecryptionStatus>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Mark every unknown identity as pending and return those requests. Known
    /// identities, whatever their state, are left alone.
    pub fn reserve(&self, requests: &[DecryptionRequest]) -> Vec<DecryptionRequest> {
        let mut entries = self.entries();
        let mut batch = vec![];
        for request in requests {
            let id = request.id();
            if entries.contains_key(&id) {
                continue;
            }
            entries.insert(id, DecryptionStatus::Pending);
            batch.push(request.clone());
        }
        drop(entries);

        if !batch.is_empty() {
            self.bump();
        }
        batch
    }

    /// Undo a reservation that never reached the relayer
    pub fn release(&self, batch: &[DecryptionRequest]) {
        let mut entries = self.entries();
        for request in batch {
            if let Some(DecryptionStatus::Pending) = entries.get(&request.id()) {
                entries.remove(&request.id());
            }
        }
        drop(entries);
        self.bump();
    }

    pub fn complete(
        &self,
        batch: &[DecryptionRequest],
        outcome: Result<HashMap<Handle, RawValue>, RelayerError>,
    ) {
        let mut entries = self.entries();
        for request in batch {
            let Some(entry) = entries.get_mut(&request.id()) else {
                continue;
            };
            if !entry.is_pending() {
                continue;
            }

            *entry = match &outcome {
                Err(e) => DecryptionStatus::Failed(e.clone().into()),
                Ok(values) => match values.get(&request.handle) {
                    None => DecryptionStatus::Failed(DecryptionFailure::Missing),
                    Some(raw) => match raw.coerce(request.kind) {
                        Some(value) => DecryptionStatus::Ready(value),
                        None => DecryptionStatus::Failed(DecryptionFailure::Uncoercible {
                            kind: request.kind,
                            raw: format!("{raw:?}"),
                        }),
                    },
                },
            };
        }
        drop(entries);
        self.bump();
    }

    /// Drop failed entries among `ids` so they can be submitted again
    pub fn clear_failed(&self, ids: &HashSet<RequestId>) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|id, status| {
            !(ids.contains(id) && matches!(status, DecryptionStatus::Failed(_)))
        });
        before - entries.len()
    }

    pub fn snapshot(&self, ids: &[RequestId]) -> Vec<(RequestId, DecryptionStatus)> {
        let entries = self.entries();
        ids.iter()
            .map(|id| {
                let status = entries
                    .get(id)
                    .cloned()
                    .unwrap_or(DecryptionStatus::NotSubmitted);
                (*id, status)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256, U256};
    use cm_relayer::{ClearValue, ValueKind};

    fn request(byte: u8, kind: ValueKind) -> DecryptionRequest {
        DecryptionRequest::new(B256::repeat_byte(byte), Address::repeat_byte(0xcc), kind)
    }

    #[test]
    fn test_reserve_skips_known_identities() {
        let table = ResultTable::default();
        let a = request(1, ValueKind::Uint);
        let b = request(2, ValueKind::Bool);

        assert_eq!(table.reserve(&[a.clone()]), vec![a.clone()]);
        assert_eq!(table.reserve(&[a.clone(), b.clone(), b.clone()]), vec![b]);
    }

    #[test]
    fn test_complete_partitions_and_never_overwrites_ready() {
        let table = ResultTable::default();
        let a = request(1, ValueKind::Uint);
        let b = request(2, ValueKind::Bool);
        let c = request(3, ValueKind::Bool);
        let batch = table.reserve(&[a.clone(), b.clone(), c.clone()]);

        let values = HashMap::from([
            (a.handle, RawValue::Text("77".into())),
            (b.handle, RawValue::Text("nope".into())),
        ]);
        table.complete(&batch, Ok(values));
        table.complete(&batch, Err(RelayerError::Unavailable("down".into())));

        let snapshot = table.snapshot(&[a.id(), b.id(), c.id()]);
        assert_eq!(snapshot[0].1, DecryptionStatus::Ready(ClearValue::Uint(U256::from(77))));
        assert!(matches!(
            snapshot[1].1,
            DecryptionStatus::Failed(DecryptionFailure::Uncoercible { .. })
        ));
        assert_eq!(snapshot[2].1, DecryptionStatus::Failed(DecryptionFailure::Missing));
    }

    #[test]
    fn test_clear_failed_keeps_ready() {
        let table = ResultTable::default();
        let a = request(1, ValueKind::Uint);
        let b = request(2, ValueKind::Uint);
        let batch = table.reserve(&[a.clone(), b.clone()]);
        table.complete(&batch, Ok(HashMap::from([(a.handle, RawValue::Number(1))])));

        let ids = HashSet::from([a.id(), b.id()]);
        assert_eq!(table.clear_failed(&ids), 1);
        let snapshot = table.snapshot(&[a.id(), b.id()]);
        assert!(snapshot[0].1.value().is_some());
        assert_eq!(snapshot[1].1, DecryptionStatus::NotSubmitted);
    }
}

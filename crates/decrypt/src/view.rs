// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::table::ResultTable;
use crate::{DecryptionStatus, RequestId};
use cm_relayer::{ClearValue, Handle};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::watch;

/// Summary of a view, enough for a caller to tell the cases apart
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewStatus {
    NotAuthorized,
    Pending,
    Ready,
    Failed,
}

/// Live view over the identities of one submission.
///
/// Dropping the view does not cancel anything. Results stay in the coordinator for the
/// next consumer.
pub struct DecryptionView {
    ids: Vec<RequestId>,
    table: Arc<ResultTable>,
    changes: watch::Receiver<u64>,
}

impl DecryptionView {
    pub(crate) fn new(ids: Vec<RequestId>, table: Arc<ResultTable>) -> Self {
        let changes = table.subscribe();
        Self {
            ids,
            table,
            changes,
        }
    }

    pub fn ids(&self) -> &[RequestId] {
        &self.ids
    }

    pub fn snapshot(&self) -> Vec<(RequestId, DecryptionStatus)> {
        self.table.snapshot(&self.ids)
    }

    pub fn status(&self) -> ViewStatus {
        summarize(&self.snapshot())
    }

    /// Ready values keyed by handle
    pub fn values(&self) -> HashMap<Handle, ClearValue> {
        self.snapshot()
            .into_iter()
            .filter_map(|(id, status)| match status {
                DecryptionStatus::Ready(value) => Some((id.handle, value)),
                _ => None,
            })
            .collect()
    }

    /// Wait until no identity in the view is pending
    pub async fn wait(&mut self) -> Vec<(RequestId, DecryptionStatus)> {
        loop {
            self.changes.borrow_and_update();
            let snapshot = self.snapshot();
            if !snapshot.iter().any(|(_, status)| status.is_pending()) {
                return snapshot;
            }
            if self.changes.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}

pub(crate) fn summarize(snapshot: &[(RequestId, DecryptionStatus)]) -> ViewStatus {
    let statuses = || snapshot.iter().map(|(_, status)| status);
    if statuses().any(|s| matches!(s, DecryptionStatus::Failed(_))) {
        ViewStatus::Failed
    } else if statuses().any(DecryptionStatus::is_pending) {
        ViewStatus::Pending
    } else if statuses().any(|s| matches!(s, DecryptionStatus::NotSubmitted)) {
        ViewStatus::NotAuthorized
    } else {
        ViewStatus::Ready
    }
}

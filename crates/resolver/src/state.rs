// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    #[error("No decryption authorization for the aggregate: {0}")]
    NoAuthorization(String),

    #[error("Relayer cannot aggregate wagers: {0}")]
    AggregationUnavailable(String),

    #[error("Aggregate decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("resolveMarket was not accepted: {0}")]
    SubmissionReverted(String),

    #[error("Deadline {deadline} not reached at block time {now}")]
    DeadlineNotReached { deadline: u64, now: u64 },

    #[error("Reference data unavailable: {0}")]
    ReferenceUnavailable(String),

    #[error("Chain read failed: {0}")]
    ChainRead(String),
}

impl FailureReason {
    /// Failures that clear up on their own. Everything else needs an operator.
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureReason::ChainRead(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionOutcome {
    /// This run sent the resolution transaction
    Submitted {
        winning_side: bool,
        aggregate: U256,
        wagers: usize,
        tx_hash: B256,
    },
    /// No wagers existed so the no-wager policy picked the side
    NoWagersCollected { winning_side: bool, tx_hash: B256 },
    /// The contract was already resolved when we looked
    AlreadyResolved { winning_side: bool },
}

impl ResolutionOutcome {
    pub fn winning_side(&self) -> bool {
        match self {
            ResolutionOutcome::Submitted { winning_side, .. }
            | ResolutionOutcome::NoWagersCollected { winning_side, .. }
            | ResolutionOutcome::AlreadyResolved { winning_side } => *winning_side,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionState {
    Collecting,
    Aggregating,
    Decrypting,
    Deciding,
    Submitting,
    Resolved(ResolutionOutcome),
    Failed(FailureReason),
}

impl ResolutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolutionState::Resolved(_) | ResolutionState::Failed(_)
        )
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionState::Resolved(_))
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            ResolutionState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub state: ResolutionState,
    /// Unix seconds
    pub at: u64,
}

/// Every state a market has passed through, across runs
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub history: Vec<Transition>,
}

impl ResolutionRecord {
    pub fn latest(&self) -> Option<&ResolutionState> {
        self.history.last().map(|t| &t.state)
    }

    /// Number of times a run started collecting
    pub fn runs(&self) -> usize {
        self.history
            .iter()
            .filter(|t| t.state == ResolutionState::Collecting)
            .count()
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Resolution of market {0} is already in progress")]
    ResolutionInProgress(u64),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

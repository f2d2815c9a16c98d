// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

/// In-process mutual exclusion per market
#[derive(Clone, Default)]
pub struct MarketLocks {
    held: Arc<Mutex<HashSet<u64>>>,
}

impl MarketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another run already holds `market_id`
    pub fn try_lock(&self, market_id: u64) -> Option<MarketGuard> {
        let mut held = self
            .held
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !held.insert(market_id) {
            return None;
        }
        Some(MarketGuard {
            held: self.held.clone(),
            market_id,
        })
    }

    pub fn is_locked(&self, market_id: u64) -> bool {
        self.held
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(&market_id)
    }
}

pub struct MarketGuard {
    held: Arc<Mutex<HashSet<u64>>>,
    market_id: u64,
}

impl Drop for MarketGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&self.market_id);
    }
}

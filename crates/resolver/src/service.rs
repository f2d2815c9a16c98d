// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{FailureReason, ResolutionPipeline, ResolutionState, ResolveError};
use anyhow::Result;
use cm_data::DataStore;
use cm_evm::MarketReader;
use futures::future::join_all;
use std::{
    collections::{BTreeSet, HashSet},
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Markets waiting for their deadline, earliest first
#[derive(Debug, Default)]
pub struct DeadlineQueue {
    queue: BTreeSet<(u64, u64)>,
    known: HashSet<u64>,
}

impl DeadlineQueue {
    /// Track `market_id`. Markets already seen are ignored.
    pub fn track(&mut self, market_id: u64, deadline: u64) -> bool {
        if !self.known.insert(market_id) {
            return false;
        }
        self.queue.insert((deadline, market_id));
        true
    }

    pub fn requeue(&mut self, market_id: u64, deadline: u64) {
        self.known.insert(market_id);
        self.queue.insert((deadline, market_id));
    }

    /// Remove and return every market whose deadline is at or before `now`
    pub fn due(&mut self, now: u64) -> Vec<(u64, u64)> {
        let later = self.queue.split_off(&(now.saturating_add(1), 0));
        std::mem::replace(&mut self.queue, later)
            .into_iter()
            .collect()
    }

    pub fn is_known(&self, market_id: u64) -> bool {
        self.known.contains(&market_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub resolved: Vec<u64>,
    pub failed: Vec<(u64, FailureReason)>,
    pub requeued: Vec<u64>,
}

/// Watches the chain head and resolves markets as their deadlines pass
pub struct ResolverService<S> {
    pipeline: Arc<ResolutionPipeline<S>>,
    reader: Arc<dyn MarketReader>,
    watch: Vec<u64>,
    poll_interval: Duration,
    queue: DeadlineQueue,
}

impl<S: DataStore> ResolverService<S> {
    pub fn new(
        pipeline: Arc<ResolutionPipeline<S>>,
        reader: Arc<dyn MarketReader>,
        watch: Vec<u64>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pipeline,
            reader,
            watch,
            poll_interval,
            queue: DeadlineQueue::default(),
        }
    }

    pub fn queue(&self) -> &DeadlineQueue {
        &self.queue
    }

    /// Pick up markets created since the last refresh
    pub async fn refresh(&mut self) -> Result<usize> {
        let ids: Vec<u64> = if self.watch.is_empty() {
            (0..self.reader.market_count().await?).collect()
        } else {
            self.watch.clone()
        };

        let mut added = 0;
        for id in ids {
            if self.queue.is_known(id) {
                continue;
            }
            let market = self.reader.market(id).await?;
            if market.resolved {
                self.queue.known.insert(id);
                continue;
            }
            if self.queue.track(id, market.deadline) {
                added += 1;
            }
        }
        if added > 0 {
            info!(added, queued = self.queue.len(), "Tracking new markets");
        }
        Ok(added)
    }

    /// Run the pipeline for every market whose deadline has passed at the chain head
    #[instrument(name = "resolver_tick", skip_all)]
    pub async fn tick(&mut self) -> Result<TickReport> {
        self.refresh().await?;
        let head = self.reader.latest_block().await?;
        let mut report = TickReport::default();

        let pipeline = self.pipeline.clone();
        let (busy, due): (Vec<_>, Vec<_>) = self
            .queue
            .due(head.timestamp)
            .into_iter()
            .partition(|(_, market_id)| pipeline.locks().is_locked(*market_id));
        for (deadline, market_id) in busy {
            debug!(market_id, "Resolution already running, keeping market queued");
            self.queue.requeue(market_id, deadline);
            report.requeued.push(market_id);
        }

        // Markets are independent, each run holds its own market lock
        let results = join_all(due.iter().map(|(_, market_id)| pipeline.run(*market_id))).await;

        for ((deadline, market_id), result) in due.into_iter().zip(results) {
            match result {
                Ok(ResolutionState::Failed(reason)) if reason.is_transient() => {
                    warn!(market_id, %reason, "Transient failure, will retry");
                    self.queue.requeue(market_id, deadline);
                    report.requeued.push(market_id);
                }
                Ok(ResolutionState::Failed(reason)) => {
                    error!(market_id, %reason, "Market needs operator action");
                    report.failed.push((market_id, reason));
                }
                Ok(_) => report.resolved.push(market_id),
                Err(ResolveError::ResolutionInProgress(_)) => {
                    self.queue.requeue(market_id, deadline);
                    report.requeued.push(market_id);
                }
                Err(ResolveError::Store(e)) => {
                    error!(market_id, "Could not persist resolution: {e:#}");
                    self.queue.requeue(market_id, deadline);
                    report.requeued.push(market_id);
                }
            }
        }

        Ok(report)
    }

    /// Poll until `shutdown` completes
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Resolver watching for expired markets"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Resolver shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!("Resolver tick failed: {e:#}");
                    }
                }
            }
        }
    }
}

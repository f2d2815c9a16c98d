// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{PredictionMarket::BetPlaced, WagerRecord};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

const GET_LOGS_CHUNK_SIZE: u64 = 10_000;
const GET_LOGS_MAX_RETRIES: u32 = 3;

/// Trait abstracting provider methods needed for log fetching.
/// Enables unit testing without a real EVM provider.
#[async_trait]
pub trait LogProvider: Send + Sync {
    async fn fetch_logs(&self, filter: &Filter) -> Result<Vec<Log>>;
}

#[async_trait]
impl<P: Provider + Send + Sync> LogProvider for P {
    async fn fetch_logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.get_logs(filter).await.map_err(|e| anyhow!("{}", e))
    }
}

/// Fetch logs in chunks from `from_block` to `to_block` with retry logic per chunk.
pub async fn fetch_logs_chunked<L: LogProvider + ?Sized>(
    provider: &L,
    filter: &Filter,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<Log>> {
    if to_block < from_block {
        return Ok(vec![]);
    }

    let total_blocks = to_block - from_block + 1;
    let total_chunks = total_blocks.div_ceil(GET_LOGS_CHUNK_SIZE);

    info!(from_block, to_block, total_chunks, "Fetching logs in chunks");

    let mut cursor = from_block;
    let mut chunk_idx = 0u64;
    let mut collected = vec![];

    while cursor <= to_block {
        let chunk_end = cursor.saturating_add(GET_LOGS_CHUNK_SIZE - 1).min(to_block);
        chunk_idx += 1;

        let chunk_filter = filter.clone().from_block(cursor).to_block(chunk_end);

        let mut success = false;
        for attempt in 1..=GET_LOGS_MAX_RETRIES {
            match provider.fetch_logs(&chunk_filter).await {
                Ok(logs) => {
                    info!(
                        chunk = chunk_idx,
                        total_chunks,
                        from = cursor,
                        to = chunk_end,
                        events = logs.len(),
                        "Fetched log chunk"
                    );
                    collected.extend(logs);
                    success = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        chunk = chunk_idx,
                        from = cursor, to = chunk_end,
                        attempt, max_retries = GET_LOGS_MAX_RETRIES,
                        error = %e, "Failed to fetch log chunk, retrying"
                    );
                    if attempt < GET_LOGS_MAX_RETRIES {
                        tokio::time::sleep(std::time::Duration::from_secs(2u64.pow(attempt))).await;
                    }
                }
            }
        }

        if !success {
            return Err(anyhow!(
                "Failed to fetch logs for blocks {}..={} after {} retries",
                cursor,
                chunk_end,
                GET_LOGS_MAX_RETRIES
            ));
        }

        if chunk_end == u64::MAX {
            break;
        }
        cursor = chunk_end + 1;
    }

    info!(chunks_fetched = chunk_idx, "Log fetch complete");
    Ok(collected)
}

/// Turn a raw `BetPlaced` log into a [`WagerRecord`]
pub fn decode_wager(log: &Log) -> Result<WagerRecord> {
    let decoded = log
        .log_decode::<BetPlaced>()
        .context("Log is not a BetPlaced event")?;
    let event = &decoded.inner.data;

    Ok(WagerRecord {
        market_id: event.marketId.saturating_to(),
        bettor: event.bettor,
        handle: event.handle,
        proof: event.inputProof.clone(),
        timestamp: event.timestamp.saturating_to(),
        block_number: log.block_number.context("BetPlaced log without block number")?,
        tx_hash: log
            .transaction_hash
            .context("BetPlaced log without transaction hash")?,
        log_index: log.log_index.unwrap_or_default(),
    })
}

/// Decode the `BetPlaced` logs of `market_id`. A log that does not decode fails the whole
/// range, so callers never advance past a wager they could not read.
pub fn decode_wagers(logs: &[Log], market_id: u64) -> Result<Vec<WagerRecord>> {
    let mut wagers = Vec::with_capacity(logs.len());
    for log in logs {
        let wager = decode_wager(log).with_context(|| {
            format!(
                "Undecodable BetPlaced log at block {:?} in tx {:?}",
                log.block_number, log.transaction_hash
            )
        })?;
        if wager.market_id == market_id {
            wagers.push(wager);
        }
    }
    Ok(wagers)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes, B256, U256};
    use alloy::sol_types::SolEvent;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct MockLogProvider {
        inner: Arc<Mutex<MockState>>,
    }

    struct MockState {
        log_responses: VecDeque<Result<Vec<Log>, String>>,
        ranges: Vec<(u64, u64)>,
    }

    impl MockLogProvider {
        fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(MockState {
                    log_responses: VecDeque::new(),
                    ranges: vec![],
                })),
            }
        }

        fn push_logs(&self, logs: Vec<Log>) {
            self.inner.lock().unwrap().log_responses.push_back(Ok(logs));
        }

        fn push_error(&self, msg: &str) {
            self.inner
                .lock()
                .unwrap()
                .log_responses
                .push_back(Err(msg.to_string()));
        }

        fn ranges(&self) -> Vec<(u64, u64)> {
            self.inner.lock().unwrap().ranges.clone()
        }
    }

    #[async_trait]
    impl LogProvider for MockLogProvider {
        async fn fetch_logs(&self, filter: &Filter) -> Result<Vec<Log>> {
            let mut state = self.inner.lock().unwrap();
            state.ranges.push((
                filter.get_from_block().unwrap_or_default(),
                filter.get_to_block().unwrap_or_default(),
            ));
            match state.log_responses.pop_front() {
                Some(Ok(logs)) => Ok(logs),
                Some(Err(msg)) => Err(anyhow!("{}", msg)),
                None => Ok(vec![]),
            }
        }
    }

    pub(crate) fn bet_log(market_id: u64, block_number: u64, log_index: u64) -> Log {
        let event = BetPlaced {
            marketId: U256::from(market_id),
            bettor: Address::repeat_byte(0xbe),
            handle: B256::repeat_byte(block_number as u8),
            inputProof: Bytes::from(vec![0xaa, 0xbb]),
            timestamp: U256::from(1_700_000_000u64 + block_number),
        };
        Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0xcc),
                data: event.encode_log_data(),
            },
            block_number: Some(block_number),
            transaction_hash: Some(B256::repeat_byte(0x70)),
            log_index: Some(log_index),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_logs_empty_range() -> Result<()> {
        let mock = MockLogProvider::new();
        let logs = fetch_logs_chunked(&mock, &Filter::new(), 200, 100).await?;
        assert!(logs.is_empty());
        assert!(mock.ranges().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_logs_multiple_chunks() -> Result<()> {
        // 25k blocks → 3 chunks: [0..9999], [10000..19999], [20000..24999]
        let mock = MockLogProvider::new();
        mock.push_logs(vec![bet_log(1, 5000, 0)]);
        mock.push_logs(vec![bet_log(1, 15000, 0)]);
        mock.push_logs(vec![bet_log(1, 22000, 0), bet_log(1, 22000, 1)]);

        let logs = fetch_logs_chunked(&mock, &Filter::new(), 0, 24999).await?;

        assert_eq!(logs.len(), 4);
        assert_eq!(
            mock.ranges(),
            vec![(0, 9999), (10000, 19999), (20000, 24999)]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_logs_retry_then_success() -> Result<()> {
        let mock = MockLogProvider::new();
        mock.push_error("temporary RPC error");
        mock.push_logs(vec![bet_log(1, 100, 0)]);

        let logs = fetch_logs_chunked(&mock, &Filter::new(), 0, 5000).await?;

        assert_eq!(logs.len(), 1);
        assert_eq!(mock.ranges().len(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_logs_all_retries_exhausted() {
        let mock = MockLogProvider::new();
        for _ in 0..GET_LOGS_MAX_RETRIES {
            mock.push_error("persistent RPC error");
        }

        let err = fetch_logs_chunked(&mock, &Filter::new(), 0, 5000)
            .await
            .expect_err("expected error after all retries exhausted");
        assert!(
            err.to_string().contains("Failed to fetch logs"),
            "unexpected error: {err}"
        );
        assert_eq!(mock.ranges().len() as u32, GET_LOGS_MAX_RETRIES);
    }

    #[test]
    fn test_decode_wager() -> Result<()> {
        let wager = decode_wager(&bet_log(4, 120, 3))?;
        assert_eq!(wager.market_id, 4);
        assert_eq!(wager.bettor, Address::repeat_byte(0xbe));
        assert_eq!(wager.handle, B256::repeat_byte(120));
        assert_eq!(wager.proof, Bytes::from(vec![0xaa, 0xbb]));
        assert_eq!(wager.timestamp, 1_700_000_120);
        assert_eq!(wager.key(), (B256::repeat_byte(0x70), 3));
        Ok(())
    }

    #[test]
    fn test_decode_rejects_other_events() {
        let log = Log {
            block_number: Some(1),
            ..Default::default()
        };
        assert!(decode_wager(&log).is_err());
    }

    #[tokio::test]
    async fn test_malformed_log_fails_the_range() -> Result<()> {
        let mock = MockLogProvider::new();
        let mut malformed = bet_log(1, 12, 0);
        malformed.inner.data.data = Bytes::from(vec![0u8; 3]);
        mock.push_logs(vec![bet_log(1, 10, 0), malformed, bet_log(2, 14, 0)]);

        let logs = fetch_logs_chunked(&mock, &Filter::new(), 0, 100).await?;
        let err = decode_wagers(&logs, 1).expect_err("malformed log must not be skipped");
        assert!(err.to_string().contains("block Some(12)"), "unexpected error: {err}");

        let wagers = decode_wagers(&[bet_log(1, 10, 0), bet_log(2, 14, 0)], 1)?;
        assert_eq!(wagers.len(), 1);
        assert_eq!(wagers[0].block_number, 10);
        Ok(())
    }
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use anyhow::Result;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::info;

const RETRY_MAX_ATTEMPTS: u32 = 3;
const RETRY_INITIAL_DELAY_MS: u64 = 2000;

fn should_retry_error(error: &str, retry_on_errors: &[&str]) -> bool {
    if retry_on_errors.is_empty() {
        return true;
    }
    retry_on_errors.iter().any(|code| error.contains(code))
}

/// Run `read_fn` up to three times with doubling delays.
///
/// An empty `retry_on_errors` retries every error, otherwise only errors whose message
/// contains one of the given fragments.
pub async fn call_with_retry<F, Fut, T>(
    operation_name: &str,
    retry_on_errors: &[&str],
    read_fn: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    let mut delay = RETRY_INITIAL_DELAY_MS;

    loop {
        attempts += 1;
        match read_fn().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let error_str = format!("{e}");
                if should_retry_error(&error_str, retry_on_errors) && attempts < RETRY_MAX_ATTEMPTS
                {
                    info!(
                        "{}: error (attempt {}/{}), will retry after {}ms: {}",
                        operation_name, attempts, RETRY_MAX_ATTEMPTS, delay, e
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay *= 2;
                } else {
                    return Err(e);
                }
            }
        }
    }
}

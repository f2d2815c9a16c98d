// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::primitives::Address;
use rand::Rng;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{fmt, EnvFilter};

/// Route tracing output through the test harness for the lifetime of the guard
pub fn init_test_tracing() -> DefaultGuard {
    let subscriber = fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_test_writer()
        .finish();
    tracing::subscriber::set_default(subscriber)
}

pub fn rand_eth_addr() -> Address {
    let bytes = rand::thread_rng().gen::<[u8; 20]>();
    Address::from_slice(&bytes)
}

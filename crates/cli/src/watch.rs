// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::context::Context;
use anyhow::Result;
use cm_config::AppConfig;
use cm_resolver::ResolverService;
use std::{sync::Arc, time::Duration};
use tracing::info;

pub async fn execute(config: &AppConfig, markets: Vec<u64>) -> Result<()> {
    let ctx = Context::new(config)?;
    let (pipeline, reader) = ctx.pipeline(None).await?;

    let resolver = config.resolver();
    let watch = if markets.is_empty() {
        resolver.watch.clone()
    } else {
        markets
    };

    let service = ResolverService::new(
        Arc::new(pipeline),
        reader,
        watch,
        Duration::from_millis(resolver.poll_interval_ms),
    );

    service
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received interrupt");
        })
        .await
}

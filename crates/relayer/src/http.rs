// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::RelayerError;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// JSON-over-HTTP plumbing shared by every relayer API version
#[derive(Clone, Debug)]
pub(crate) struct HttpRelayerClient {
    client: reqwest::Client,
    base: Url,
}

impl HttpRelayerClient {
    pub fn new(mut base: Url, timeout: Duration) -> Result<Self, RelayerError> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder().timeout(timeout);
        if is_loopback(&base) {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| RelayerError::Transport(e.to_string()))?;

        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// POST `body` to `path` (relative to the base url) and decode the JSON reply
    pub async fn post<Req, Res>(&self, path: &str, body: &Req) -> Result<Res, RelayerError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let url = self
            .base
            .join(path)
            .map_err(|e| RelayerError::Transport(format!("bad endpoint '{path}': {e}")))?;

        trace!("POST {url}");
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RelayerError::Transport(e.to_string()))?;

        match status {
            s if s.is_success() => serde_json::from_str(&text)
                .map_err(|e| RelayerError::Decode(format!("{path}: {e}"))),
            StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED => {
                debug!("Relayer at {} has no endpoint {path}", self.base);
                Err(RelayerError::Unsupported(path.to_string()))
            }
            s if s.is_server_error() => Err(RelayerError::Unavailable(format!("{s}: {text}"))),
            s => Err(RelayerError::Rejected {
                status: s.as_u16(),
                message: text,
            }),
        }
    }
}

fn map_send_error(e: reqwest::Error) -> RelayerError {
    if e.is_timeout() || e.is_connect() {
        RelayerError::Unavailable(e.to_string())
    } else {
        RelayerError::Transport(e.to_string())
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

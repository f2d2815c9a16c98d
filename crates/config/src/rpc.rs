// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use anyhow::{anyhow, bail, Context, Result};
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcProtocol {
    Http,
    Https,
    Ws,
    Wss,
}

impl RpcProtocol {
    pub fn is_websocket(&self) -> bool {
        matches!(self, RpcProtocol::Ws | RpcProtocol::Wss)
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, RpcProtocol::Https | RpcProtocol::Wss)
    }
}

/// A validated chain endpoint
#[derive(Clone, Debug)]
pub struct RPC {
    protocol: RpcProtocol,
    url: Url,
}

impl RPC {
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).context("Invalid URL format")?;
        let protocol = match parsed.scheme() {
            "http" => RpcProtocol::Http,
            "https" => RpcProtocol::Https,
            "ws" => RpcProtocol::Ws,
            "wss" => RpcProtocol::Wss,
            _ => bail!("Invalid protocol. Expected: http://, https://, ws://, wss://"),
        };

        if parsed.host_str().is_none() {
            bail!("URL must contain a host");
        }

        Ok(RPC {
            protocol,
            url: parsed,
        })
    }

    pub fn protocol(&self) -> RpcProtocol {
        self.protocol
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Log queries and transactions go over http(s) so websocket endpoints are rewritten
    pub fn as_http_url(&self) -> Result<String> {
        if !self.protocol.is_websocket() {
            return Ok(self.url.to_string());
        }
        let mut parsed = self.url.clone();
        let scheme = if self.protocol.is_secure() {
            "https"
        } else {
            "http"
        };
        parsed
            .set_scheme(scheme)
            .map_err(|_| anyhow!("http(s) are valid schemes"))?;
        Ok(parsed.to_string())
    }

    pub fn is_local(&self) -> bool {
        match self.url.host_str() {
            Some("localhost") | Some("127.0.0.1") | Some("::1") | Some("[::1]") => true,
            Some(host) => host.starts_with("127."),
            None => false,
        }
    }
}

// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::chain_config::ChainConfig;
use crate::load_config::{find_in_parent, resolve_config_path, DEFAULT_CONFIG_NAME};
use crate::resolver_config::ResolverConfig;
use crate::yaml::load_yaml_with_env;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use path_clean::clean;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt,
    path::{Path, PathBuf},
};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelayerApiVersion {
    #[default]
    V1,
    V2,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayerConfig {
    pub url: String,
    pub api_version: RelayerApiVersion,
    pub timeout_ms: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            api_version: RelayerApiVersion::V1,
            timeout_ms: 30_000,
        }
    }
}

impl RelayerConfig {
    pub fn url(&self) -> Result<Url> {
        Url::parse(&self.url).with_context(|| format!("Invalid relayer url '{}'", self.url))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// How long a signed decryption authorization stays usable
    pub validity_days: u64,
    /// `verifyingContract` of the EIP-712 domain the owner signs under
    pub verifying_contract: Address,
    pub sign_timeout_ms: u64,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            validity_days: 365,
            verifying_contract: Address::ZERO,
            sign_timeout_ms: 120_000,
        }
    }
}

/// Signing key for the resolver. Usually injected as `${OPERATOR_PRIVATE_KEY}`.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub private_key: Option<String>,
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Configuration as written in the yaml file
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct UnscopedAppConfig {
    chain: Option<ChainConfig>,
    relayer: RelayerConfig,
    authorization: AuthorizationConfig,
    operator: OperatorConfig,
    resolver: ResolverConfig,
    /// Defaults to `~/.local/share/cmarket`
    data_dir: Option<PathBuf>,
    /// The config file as found before loading. Not for use within configuration files.
    found_config_file: Option<PathBuf>,
}

impl UnscopedAppConfig {
    pub fn into_app_config(self) -> Result<AppConfig> {
        AppConfig::try_from_unscoped(self, &OsDirs::data_dir(), &OsDirs::config_dir())
    }

    pub fn into_app_config_with_defaults(
        self,
        default_data_dir: &Path,
        default_config_dir: &Path,
    ) -> Result<AppConfig> {
        AppConfig::try_from_unscoped(self, default_data_dir, default_config_dir)
    }
}

/// The config actually used throughout the app
#[derive(Debug, Clone)]
pub struct AppConfig {
    chain: ChainConfig,
    relayer: RelayerConfig,
    authorization: AuthorizationConfig,
    operator: OperatorConfig,
    resolver: ResolverConfig,
    data_dir: PathBuf,
    config_file: PathBuf,
}

impl AppConfig {
    pub fn try_from_unscoped(
        config: UnscopedAppConfig,
        default_data_dir: &Path,
        default_config_dir: &Path,
    ) -> Result<Self> {
        let chain = config
            .chain
            .context("No `chain` section found. A chain with a prediction_market contract is required.")?;
        chain.rpc()?;
        chain.contracts.prediction_market.address()?;
        config.relayer.url()?;

        let config_file = config
            .found_config_file
            .unwrap_or_else(|| default_config_dir.join(DEFAULT_CONFIG_NAME));

        // Relative data dirs are relative to the config file
        let data_dir = match config.data_dir {
            Some(dir) if dir.is_absolute() => clean(dir),
            Some(dir) => {
                let base = config_file
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| default_config_dir.to_path_buf());
                clean(base.join(dir))
            }
            None => default_data_dir.to_path_buf(),
        };

        Ok(AppConfig {
            chain,
            relayer: config.relayer,
            authorization: config.authorization,
            operator: config.operator,
            resolver: config.resolver,
            data_dir,
            config_file,
        })
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn relayer(&self) -> &RelayerConfig {
        &self.relayer
    }

    pub fn authorization(&self) -> &AuthorizationConfig {
        &self.authorization
    }

    pub fn resolver(&self) -> &ResolverConfig {
        &self.resolver
    }

    pub fn operator_key(&self) -> Option<&str> {
        self.operator.private_key.as_deref()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the database file
    pub fn db_file(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    /// Get the config file path
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}

/// Value struct for passing configuration from the cli to the configuration
#[derive(Default, Serialize, Deserialize, Clone, Debug)]
struct CliOverrides {
    pub found_config_file: Option<PathBuf>,
}

/// Load the config at the config_file or the default location if not provided.
///
/// Layers: defaults, then the yaml file, then `CMARKET_*` env vars (`__` separates nesting).
pub fn load_config(config_file: Option<String>) -> Result<AppConfig> {
    let config_file = config_file.map(PathBuf::from);
    let cwd = env::current_dir()?;
    let config_dir = OsDirs::config_dir();

    let resolved_config_path = resolve_config_path(
        find_in_parent,
        &cwd,
        &config_dir,
        DEFAULT_CONFIG_NAME,
        config_file.as_deref(),
    );

    let loaded_yaml =
        load_yaml_with_env(&resolved_config_path).context("Configuration file not found")?;

    let config: UnscopedAppConfig =
        Figment::from(Serialized::defaults(&UnscopedAppConfig::default()))
            .merge(Yaml::string(&loaded_yaml))
            .merge(Env::prefixed("CMARKET_").split("__"))
            .merge(Serialized::defaults(&CliOverrides {
                found_config_file: Some(resolved_config_path),
            }))
            .extract()
            .context("Could not parse configuration")?;

    config.into_app_config()
}

pub struct OsDirs;
impl OsDirs {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cmarket")
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cmarket")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MarketRule, NoWagerPolicy};
    use anyhow::bail;
    use figment::Jail;

    const CONFIG: &str = r#"
data_dir: "./data"
chain:
  name: "sepolia"
  rpc_url: "wss://sepolia.example.org"
  chain_id: 11155111
  contracts:
    prediction_market:
      address: "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"
      deploy_block: 7000000
relayer:
  url: "https://relayer.example.org"
  api_version: "v2"
authorization:
  validity_days: 7
resolver:
  no_wager_policy:
    type: fixed
    side: false
  default_rule:
    type: price_target
    coin_id: ethereum
    decimals: 2
  markets:
    - id: 4
      rule:
        type: aggregate_threshold
        threshold: 1000
"#;

    #[test]
    fn test_deserialization() -> Result<()> {
        let mut unscoped: UnscopedAppConfig = serde_yaml::from_str(CONFIG)?;
        unscoped.found_config_file = Some(PathBuf::from("/etc/cmarket/cmarket.config.yaml"));
        let config = unscoped.into_app_config_with_defaults(
            Path::new("/default/data"),
            Path::new("/default/config"),
        )?;

        assert_eq!(config.data_dir(), Path::new("/etc/cmarket/data"));
        assert_eq!(config.db_file(), PathBuf::from("/etc/cmarket/data/db"));
        assert_eq!(config.chain().chain_id, Some(11155111));
        assert_eq!(config.relayer().api_version, RelayerApiVersion::V2);
        assert_eq!(config.authorization().validity_days, 7);
        assert_eq!(
            config.resolver().no_wager_policy,
            NoWagerPolicy::Fixed { side: false }
        );
        assert_eq!(
            config.resolver().rule_for(4),
            &MarketRule::AggregateThreshold { threshold: 1000 }
        );
        assert_eq!(
            config.resolver().rule_for(5),
            &MarketRule::PriceTarget {
                coin_id: "ethereum".to_string(),
                decimals: 2
            }
        );
        assert!(config.operator_key().is_none());
        Ok(())
    }

    #[test]
    fn test_missing_chain_is_rejected() {
        let unscoped = UnscopedAppConfig::default();
        assert!(unscoped
            .into_app_config_with_defaults(Path::new("/d"), Path::new("/c"))
            .is_err());
    }

    #[test]
    fn test_file_not_found() -> Result<()> {
        let Err(err) = load_config(Some("/nope/cmarket.config.yaml".to_string())) else {
            bail!("error expected");
        };
        let Some(e) = err.downcast_ref::<std::io::Error>() else {
            bail!("io error expected");
        };

        assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
        Ok(())
    }

    #[test]
    fn test_config_env_vars() {
        Jail::expect_with(|jail| {
            jail.set_env("OPERATOR_PRIVATE_KEY", "0x01");
            jail.set_env("CMARKET_AUTHORIZATION__VALIDITY_DAYS", "3");
            jail.create_file(
                DEFAULT_CONFIG_NAME,
                r#"
chain:
  name: "hardhat"
  rpc_url: "http://localhost:8545"
  contracts:
    prediction_market: "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"
operator:
  private_key: "${OPERATOR_PRIVATE_KEY}"
"#,
            )?;

            let config = load_config(None).map_err(|err| err.to_string())?;
            assert_eq!(config.operator_key(), Some("0x01"));
            assert_eq!(config.authorization().validity_days, 3);
            assert_eq!(config.chain().start_block().map_err(|e| e.to_string())?, 0);
            assert!(config.config_file().ends_with(DEFAULT_CONFIG_NAME));
            Ok(())
        });
    }
}

//! Configuration management for PressLedger

use crate::error::LedgerError;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_ENV_VAR: &str = "PRESSLEDGER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "pressledger.toml";

/// Placeholder substituted with the content identifier in gateway templates.
pub const CID_PLACEHOLDER: &str = "{cid}";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: String,
    /// Number of leading zero hex characters a proof guess digest must carry.
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            difficulty: default_difficulty(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateways")]
    pub gateways: Vec<String>,
    #[serde(
        default = "default_gateway_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
    /// Responses larger than this are skipped like any other failed attempt.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateways: default_gateways(),
            timeout: default_gateway_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Payload keys tried, in order, for a block's content identifier.
    #[serde(default = "default_content_keys")]
    pub content_keys: Vec<String>,
    #[serde(default = "default_list_limit")]
    pub default_limit: usize,
    /// Upper bound on blocks whose content is fetched at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            content_keys: default_content_keys(),
            default_limit: default_list_limit(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Loads the configuration from `$PRESSLEDGER_CONFIG`, falling back to
/// `pressledger.toml` in the working directory. A missing file yields defaults.
pub fn load_config() -> Result<Config, LedgerError> {
    let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(path)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, LedgerError> {
    let path = path.as_ref();
    let config_str = if path.exists() {
        fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("Failed to read {}: {}", path.display(), e)))?
    } else {
        String::new()
    };
    parse_config(&config_str)
}

pub fn parse_config(config_str: &str) -> Result<Config, LedgerError> {
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(config_str).map_err(|e| LedgerError::Config(e.to_string()))?
    };
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.ledger.path.is_empty() {
            return Err(LedgerError::Config("ledger.path must be set".into()));
        }
        if self.ledger.difficulty == 0 || self.ledger.difficulty > 64 {
            return Err(LedgerError::Config(format!(
                "ledger.difficulty must be between 1 and 64, got {}",
                self.ledger.difficulty
            )));
        }
        if self.gateway.gateways.is_empty() {
            return Err(LedgerError::Config("gateway.gateways must list at least one template".into()));
        }
        if let Some(bad) = self
            .gateway
            .gateways
            .iter()
            .find(|g| !g.contains(CID_PLACEHOLDER))
        {
            return Err(LedgerError::Config(format!(
                "gateway template {} is missing the {} placeholder",
                bad, CID_PLACEHOLDER
            )));
        }
        if self.gateway.timeout.is_zero() {
            return Err(LedgerError::Config("gateway.timeout must be non-zero".into()));
        }
        if self.gateway.max_body_bytes == 0 {
            return Err(LedgerError::Config("gateway.max_body_bytes must be positive".into()));
        }
        if self.resolver.content_keys.is_empty() {
            return Err(LedgerError::Config("resolver.content_keys must not be empty".into()));
        }
        if self.resolver.default_limit == 0 {
            return Err(LedgerError::Config("resolver.default_limit must be positive".into()));
        }
        if self.resolver.concurrency == 0 {
            return Err(LedgerError::Config("resolver.concurrency must be positive".into()));
        }
        Ok(())
    }
}

fn default_ledger_path() -> String {
    "data/blockchain.json".to_string()
}

fn default_difficulty() -> usize {
    4
}

pub fn default_gateways() -> Vec<String> {
    vec![
        "https://gateway.pinata.cloud/ipfs/{cid}".to_string(),
        "https://ipfs.io/ipfs/{cid}".to_string(),
        "https://dweb.link/ipfs/{cid}".to_string(),
    ]
}

fn default_gateway_timeout() -> Duration {
    Duration::from_secs(15)
}

pub fn default_content_keys() -> Vec<String> {
    vec!["metadata_hash".to_string()]
}

fn default_max_body_bytes() -> u64 {
    crate::gateway::DEFAULT_MAX_BODY_BYTES
}

fn default_concurrency() -> usize {
    crate::resolver::DEFAULT_CONCURRENCY
}

fn default_api_port() -> u16 {
    5000
}

fn default_list_limit() -> usize {
    15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.ledger.path, "data/blockchain.json");
        assert_eq!(config.ledger.difficulty, 4);
        assert_eq!(config.gateway.gateways.len(), 3);
        assert_eq!(config.gateway.timeout, Duration::from_secs(15));
        assert_eq!(config.resolver.default_limit, 15);
        assert_eq!(config.resolver.content_keys, vec!["metadata_hash"]);
        assert_eq!(config.resolver.concurrency, 8);
        assert_eq!(config.gateway.max_body_bytes, 8 * 1024 * 1024);
    }

    #[test]
    fn test_partial_config_and_humantime_timeout() {
        let config = parse_config(
            r#"
            [ledger]
            difficulty = 2

            [gateway]
            timeout = "500ms"
            "#,
        )
        .unwrap();
        assert_eq!(config.ledger.difficulty, 2);
        assert_eq!(config.ledger.path, "data/blockchain.json");
        assert_eq!(config.gateway.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_template_without_placeholder() {
        let err = parse_config(
            r#"
            [gateway]
            gateways = ["https://ipfs.io/ipfs/"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn test_rejects_zero_limit() {
        assert!(parse_config("[resolver]\ndefault_limit = 0\n").is_err());
    }

    #[test]
    fn test_rejects_zero_concurrency_and_body_limit() {
        assert!(parse_config("[resolver]\nconcurrency = 0\n").is_err());
        assert!(parse_config("[gateway]\nmax_body_bytes = 0\n").is_err());
        let config = parse_config("[resolver]\nconcurrency = 2\n").unwrap();
        assert_eq!(config.resolver.concurrency, 2);
    }

    #[test]
    fn test_rejects_zero_difficulty() {
        assert!(parse_config("[ledger]\ndifficulty = 0\n").is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.api.port, 5000);
    }
}

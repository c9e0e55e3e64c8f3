//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::commitment_config::CommitmentConfig;
use std::path::Path;
use std::time::Duration;

use crate::custody::kdf::MIN_ITERATIONS;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    /// Upper bound for every RPC call, including confirmation waits
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// processed | confirmed | finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

impl RpcConfig {
    pub fn commitment_config(&self) -> crate::error::Result<CommitmentConfig> {
        match self.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(crate::error::Error::Config(format!(
                "Unknown commitment level: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Environment variable holding the master secret
    #[serde(default = "default_master_secret_env")]
    pub master_secret_env: String,
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            master_secret_env: default_master_secret_env(),
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Pause between two accounts of the same batch
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl BatchConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

// Default value functions
fn default_rpc_endpoint() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_master_secret_env() -> String {
    "ENCRYPTION_KEY".to_string()
}

fn default_kdf_iterations() -> u32 {
    MIN_ITERATIONS
}

fn default_throttle_ms() -> u64 {
    2_000
}

fn default_storage_path() -> String {
    "data/store.json".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            .set_default("rpc.commitment", default_commitment())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (SWEEPER__SECTION__KEY)
            .add_source(
                config::Environment::with_prefix("SWEEPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.rpc.endpoint.trim().is_empty() {
            anyhow::bail!("rpc.endpoint must not be empty");
        }

        if self.rpc.timeout_ms == 0 {
            anyhow::bail!("rpc.timeout_ms must be positive");
        }

        self.rpc.commitment_config()?;

        if self.vault.kdf_iterations < MIN_ITERATIONS {
            anyhow::bail!(
                "vault.kdf_iterations must be at least {}, got {}",
                MIN_ITERATIONS,
                self.vault.kdf_iterations
            );
        }

        if self.vault.master_secret_env.trim().is_empty() {
            anyhow::bail!("vault.master_secret_env must name an environment variable");
        }

        if self.batch.throttle_ms == 0 {
            tracing::warn!(
                "batch.throttle_ms is 0 - transfers will be sent back to back and may hit RPC rate limits"
            );
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let secret_state = match std::env::var(&self.vault.master_secret_env) {
            Ok(v) if !v.trim().is_empty() => "***",
            _ => "(not set)",
        };

        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    timeout: {}ms
    commitment: {}
  Vault:
    master secret ({}): {}
    kdf_iterations: {}
  Batch:
    throttle: {}ms
  Storage:
    path: {}
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.rpc.commitment,
            self.vault.master_secret_env,
            secret_state,
            self.vault.kdf_iterations,
            self.batch.throttle_ms,
            self.storage.path,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                endpoint: default_rpc_endpoint(),
                timeout_ms: default_timeout_ms(),
                commitment: default_commitment(),
            },
            vault: VaultConfig::default(),
            batch: BatchConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.vault.kdf_iterations, 100_000);
        assert_eq!(config.vault.master_secret_env, "ENCRYPTION_KEY");
        assert_eq!(config.batch.throttle(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sweeper.toml");
        std::fs::write(
            &path,
            r#"
[rpc]
endpoint = "http://localhost:8899"
commitment = "finalized"

[vault]
kdf_iterations = 200000

[batch]
throttle_ms = 500
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.rpc.endpoint, "http://localhost:8899");
        assert_eq!(config.vault.kdf_iterations, 200_000);
        assert_eq!(config.batch.throttle_ms, 500);
        assert_eq!(config.storage.path, "data/store.json");
    }

    #[test]
    fn test_low_kdf_iterations_rejected() {
        let mut config = Config::default();
        config.vault.kdf_iterations = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_commitment_rejected() {
        let mut config = Config::default();
        config.rpc.commitment = "eventually".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://rpc.example.com?api-key=secret"),
            "https://rpc.example.com?***"
        );
        assert_eq!(mask_url("https://rpc.example.com"), "https://rpc.example.com");
    }
}

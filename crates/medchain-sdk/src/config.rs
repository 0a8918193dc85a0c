use std::fs;
use std::path::{Path, PathBuf};

use medchain_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Chaincode name stamped on transactions built by the SDK.
pub const DEFAULT_CHAINCODE: &str = "medchain-cc";

/// Blocks checked by [`MedChain::verify_recent`](crate::MedChain::verify_recent)
/// when no window is configured.
pub const DEFAULT_VERIFY_WINDOW: u64 = 64;

/// Top-level MedChain configuration.
///
/// # File format
///
/// ```toml
/// chaincode = "medchain-cc"
/// journal_path = "data/medchain.jsonl"
/// verify_window = 64
///
/// [ledger]
/// genesis_marker = "genesis_block_medchain"
/// max_block_transactions = 0
///
/// [ledger.clock]
/// kind = "manual"
/// start_ms = 1704096000000
/// step_ms = 60000
/// ```
///
/// Every key is optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedChainConfig {
    pub chaincode: String,
    pub ledger: LedgerConfig,
    /// Block journal location. `None` keeps the ledger in memory only.
    pub journal_path: Option<PathBuf>,
    /// Number of trailing blocks checked by a bounded verification.
    pub verify_window: u64,
}

impl Default for MedChainConfig {
    fn default() -> Self {
        Self {
            chaincode: DEFAULT_CHAINCODE.to_string(),
            ledger: LedgerConfig::default(),
            journal_path: None,
            verify_window: DEFAULT_VERIFY_WINDOW,
        }
    }
}

impl MedChainConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chaincode.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "chaincode",
                reason: "must not be blank".into(),
            });
        }
        if self.ledger.genesis_marker.is_empty() {
            return Err(ConfigError::Invalid {
                field: "ledger.genesis_marker",
                reason: "must not be empty".into(),
            });
        }
        if self.verify_window == 0 {
            return Err(ConfigError::Invalid {
                field: "verify_window",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Deterministic in-memory configuration with a manual clock.
    pub fn manual(start_ms: u64, step_ms: u64) -> Self {
        Self {
            ledger: LedgerConfig::manual(start_ms, step_ms),
            ..Self::default()
        }
    }

    pub fn with_journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }
}

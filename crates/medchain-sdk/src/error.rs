use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a [`MedChainConfig`](crate::MedChainConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// SDK-level errors.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("ledger error: {0}")]
    Ledger(#[from] medchain_ledger::LedgerError),

    #[error("audit error: {0}")]
    Audit(#[from] medchain_audit::AuditError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("block not found: {0}")]
    BlockNotFound(u64),

    #[error("journal holds {journal} blocks but the ledger has {ledger}; rebuild to resynchronize")]
    JournalBehind { ledger: u64, journal: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type SdkResult<T> = Result<T, SdkError>;

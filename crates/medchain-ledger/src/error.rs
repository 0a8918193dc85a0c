/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("malformed transaction: missing required field `{field}`")]
    MalformedTransaction { field: &'static str },

    #[error("ledger has no genesis block; initialize it before appending")]
    EmptyLedger,

    #[error("invalid block index: expected {expected}, got {got}")]
    InvalidIndex { expected: u64, got: u64 },

    #[error("chain integrity violation at block {index}: {reason}")]
    ChainIntegrityViolation { index: u64, reason: String },

    #[error("duplicate transaction id: {0}")]
    DuplicateTransaction(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("journal error: {0}")]
    Journal(String),
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<medchain_crypto::DigestError> for LedgerError {
    fn from(e: medchain_crypto::DigestError) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        Self::Journal(e.to_string())
    }
}

use medchain_ledger::LedgerError;

/// Errors produced by audit queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("unknown status filter `{0}` (expected all, complete, pending, or waiting)")]
    UnknownStatusFilter(String),

    #[error("unknown sort key `{0}` (expected timestamp, action, or status)")]
    UnknownSortKey(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

//! High-level SDK for MedChain.
//!
//! [`MedChain`] owns one ledger together with its world-state projection,
//! classified audit index, and optional block journal, and exposes the
//! ingest, read, verification, and maintenance operations over them.

pub mod config;
pub mod error;
pub mod repository;
pub mod sample;

pub use config::{MedChainConfig, DEFAULT_CHAINCODE, DEFAULT_VERIFY_WINDOW};
pub use error::{ConfigError, SdkError, SdkResult};
pub use repository::{CommitResult, MedChain};

// Re-export the types SDK callers handle directly.
pub use medchain_audit::{
    AuditEvent, AuditQuery, AuditStatus, CustodyHop, CustodyStage, CustodyTrail, EventKind,
    SortKey, StatusFilter,
};
pub use medchain_ledger::{
    Block, LedgerSnapshot, Transaction, TransactionDraft, ValidationReport, Violation,
    ViolationKind, WorldState, WorldStateValue,
};
pub use medchain_types::{Fingerprint, LedgerTime, TimeSource};

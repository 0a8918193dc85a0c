//! Append-only block ledger for MedChain.
//!
//! This crate is the heart of MedChain. It provides:
//! - Transaction and block records with hash-linked integrity
//! - `LedgerWriter` / `LedgerReader` trait boundaries
//! - `InMemoryLedger` implementation with an ingest pool
//! - Chain validation (linkage, fingerprints, Merkle roots, data hashes)
//! - World-state projection, full and incremental
//! - Case-insensitive ledger search
//! - CRC-framed JSON-lines journals for sealed blocks and pending transactions

pub mod builder;
pub mod config;
pub mod error;
pub mod journal;
pub mod memory;
pub mod projection;
pub mod records;
pub mod search;
pub mod traits;
pub mod validation;

pub use builder::{BlockBuilder, GENESIS_MARKER};
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use journal::{pending_log_path, BlockJournal, Journal, JournalEntry, PendingLog};
pub use memory::InMemoryLedger;
pub use projection::{WorldState, WorldStateProjector, WorldStateValue};
pub use records::{
    value_as_string, Block, LedgerSnapshot, Payload, Transaction, TransactionDraft,
    BUSINESS_KEY_FIELDS, VALID,
};
pub use search::search;
pub use traits::{LedgerReader, LedgerWriter};
pub use validation::{ChainValidator, ValidationReport, Violation, ViolationKind};

use std::sync::Arc;

use crate::error::LedgerError;
use crate::records::{Block, LedgerSnapshot, Transaction, TransactionDraft};

/// Write boundary for MedChain ledger operations.
pub trait LedgerWriter: Send + Sync {
    /// Validate a draft, assign its id and timestamp, and queue it for the
    /// next block. Returns the assigned id.
    fn submit_transaction(&self, draft: TransactionDraft) -> Result<String, LedgerError>;

    /// Append pending transactions as one block. `None` when nothing is pending.
    fn seal(&self) -> Result<Option<Arc<Block>>, LedgerError>;

    /// Append already-identified transactions as the next block.
    fn append(&self, transactions: Vec<Transaction>) -> Result<Arc<Block>, LedgerError>;
}

/// Read boundary for MedChain ledger queries.
pub trait LedgerReader: Send + Sync {
    /// Immutable view of every block appended so far.
    fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError>;

    /// Number of blocks, genesis included.
    fn height(&self) -> Result<u64, LedgerError>;

    fn block(&self, index: u64) -> Result<Option<Arc<Block>>, LedgerError>;

    fn latest_block(&self) -> Result<Option<Arc<Block>>, LedgerError>;

    /// Locate a transaction by id: `(block_index, transaction)`.
    fn find_transaction(&self, id: &str) -> Result<Option<(u64, Transaction)>, LedgerError>;
}

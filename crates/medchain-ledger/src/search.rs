use std::sync::Arc;

use crate::error::LedgerError;
use crate::records::{Block, LedgerSnapshot, Transaction};

/// Blocks containing at least one transaction whose id, arguments, or
/// canonical payload JSON contains `term`, case-insensitively. Blocks keep
/// ledger order. Genesis never matches since it holds no transactions.
pub fn search(snapshot: &LedgerSnapshot, term: &str) -> Result<Vec<Arc<Block>>, LedgerError> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Err(LedgerError::InvalidQuery("search term is empty".into()));
    }

    let hits: Vec<Arc<Block>> = snapshot
        .blocks()
        .iter()
        .filter(|block| block.transactions.iter().any(|tx| matches(tx, &needle)))
        .cloned()
        .collect();
    tracing::debug!(term = %needle, hits = hits.len(), "ledger search");
    Ok(hits)
}

/// Case-insensitive match of a lowercased needle against one transaction.
pub fn matches(tx: &Transaction, needle: &str) -> bool {
    tx.id.to_lowercase().contains(needle)
        || tx.args.iter().any(|arg| arg.to_lowercase().contains(needle))
        || tx.payload_json().to_lowercase().contains(needle)
}

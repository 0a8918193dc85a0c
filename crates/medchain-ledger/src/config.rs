use medchain_types::TimeSource;
use serde::{Deserialize, Serialize};

use crate::builder::GENESIS_MARKER;

/// Ledger construction parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// String whose digest becomes the genesis fingerprint.
    pub genesis_marker: String,
    pub clock: TimeSource,
    /// Upper bound on transactions sealed into one block. `0` means unbounded.
    pub max_block_transactions: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            genesis_marker: GENESIS_MARKER.to_string(),
            clock: TimeSource::Wall,
            max_block_transactions: 0,
        }
    }
}

impl LedgerConfig {
    /// Deterministic configuration used by tests and the sample dataset.
    pub fn manual(start_ms: u64, step_ms: u64) -> Self {
        Self {
            clock: TimeSource::Manual { start_ms, step_ms },
            ..Self::default()
        }
    }

    pub fn with_max_block_transactions(mut self, max: usize) -> Self {
        self.max_block_transactions = max;
        self
    }
}

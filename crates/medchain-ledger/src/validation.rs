use std::ops::RangeInclusive;
use std::sync::Arc;

use medchain_crypto::{ChainError, HashChainVerifier};
use serde::Serialize;

use crate::builder::BlockBuilder;
use crate::error::LedgerError;
use crate::records::Block;

/// Result of a chain integrity scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Total blocks in the ledger when the scan ran.
    pub block_count: u64,
    /// Block indices actually examined.
    pub checked: Option<(u64, u64)>,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// The lowest-index violation found, if any.
    pub fn first_violation(&self) -> Option<&Violation> {
        self.violations.first()
    }

    /// Convert the first violation into an error.
    pub fn into_result(self) -> Result<(), LedgerError> {
        match self.violations.into_iter().next() {
            None => Ok(()),
            Some(v) => Err(LedgerError::ChainIntegrityViolation {
                index: v.index,
                reason: v.description,
            }),
        }
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub index: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    IndexGap,
    GenesisMismatch,
    BrokenLink,
    FingerprintMismatch,
    MerkleRootMismatch,
    DataHashMismatch,
}

/// Chain integrity validator.
///
/// A scan is O(n) in the number of blocks examined: every fingerprint, Merkle
/// root, and data hash is recomputed. Use [`validate_range`](Self::validate_range)
/// to bound the cost on long chains.
pub struct ChainValidator<'a> {
    genesis_marker: &'a str,
}

impl<'a> ChainValidator<'a> {
    pub fn new(genesis_marker: &'a str) -> Self {
        Self { genesis_marker }
    }

    /// Validate every block.
    pub fn validate(&self, blocks: &[Arc<Block>]) -> ValidationReport {
        let last = (blocks.len() as u64).saturating_sub(1);
        self.validate_range(blocks, 0..=last)
    }

    /// Validate the blocks whose index falls in `range`. Linkage of the first
    /// examined block is still checked against its predecessor.
    pub fn validate_range(
        &self,
        blocks: &[Arc<Block>],
        range: RangeInclusive<u64>,
    ) -> ValidationReport {
        let block_count = blocks.len() as u64;
        let start = *range.start();
        let end = (*range.end()).min(block_count.saturating_sub(1));

        let mut violations = Vec::new();
        if block_count == 0 || start > end {
            return ValidationReport {
                block_count,
                checked: None,
                violations,
            };
        }

        for position in start..=end {
            let i = position as usize;
            let block = blocks[i].as_ref();
            if position == 0 {
                self.check_genesis(block, &mut violations);
            } else {
                let prev = blocks[i - 1].as_ref();
                if let Err(err) = HashChainVerifier::check_link(Some(prev), block, position) {
                    violations.push(chain_violation(err));
                }
                check_contents(block, position, &mut violations);
            }
        }

        for v in &violations {
            tracing::warn!(index = v.index, kind = ?v.kind, "{}", v.description);
        }

        ValidationReport {
            block_count,
            checked: Some((start, end)),
            violations,
        }
    }

    fn check_genesis(&self, block: &Block, violations: &mut Vec<Violation>) {
        if block.index != 0 {
            violations.push(Violation {
                index: 0,
                kind: ViolationKind::IndexGap,
                description: format!("expected index 0, found {}", block.index),
            });
        }
        let expected = BlockBuilder::genesis(self.genesis_marker);
        let shape_ok = block.prev_fingerprint == expected.prev_fingerprint
            && block.merkle_root == expected.merkle_root
            && block.data_hash == expected.data_hash
            && block.transactions.is_empty();
        if !shape_ok {
            violations.push(Violation {
                index: 0,
                kind: ViolationKind::GenesisMismatch,
                description: "genesis block carries transactions or non-sentinel links".into(),
            });
        }
        if block.fingerprint != expected.fingerprint {
            violations.push(Violation {
                index: 0,
                kind: ViolationKind::FingerprintMismatch,
                description: "genesis fingerprint does not match the genesis marker".into(),
            });
        }
    }
}

fn chain_violation(err: ChainError) -> Violation {
    let kind = match &err {
        ChainError::PositionGap { .. } => ViolationKind::IndexGap,
        ChainError::GenesisHasPrev => ViolationKind::GenesisMismatch,
        ChainError::BrokenLink { .. } => ViolationKind::BrokenLink,
        ChainError::FingerprintMismatch { .. } => ViolationKind::FingerprintMismatch,
    };
    Violation {
        index: err.index(),
        kind,
        description: err.to_string(),
    }
}

fn check_contents(block: &Block, index: u64, violations: &mut Vec<Violation>) {
    if BlockBuilder::merkle_root(&block.transactions) != block.merkle_root {
        violations.push(Violation {
            index,
            kind: ViolationKind::MerkleRootMismatch,
            description: "merkle root does not match transactions".into(),
        });
    }
    match BlockBuilder::data_hash(&block.transactions) {
        Ok(hash) if hash == block.data_hash => {}
        Ok(_) => violations.push(Violation {
            index,
            kind: ViolationKind::DataHashMismatch,
            description: "data hash does not match transaction contents".into(),
        }),
        Err(err) => violations.push(Violation {
            index,
            kind: ViolationKind::DataHashMismatch,
            description: format!("transactions could not be encoded: {err}"),
        }),
    }
}

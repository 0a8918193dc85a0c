use medchain_crypto::{digest, Digester, MerkleTree};
use medchain_types::{Fingerprint, LedgerTime};

use crate::error::LedgerError;
use crate::records::{Block, Transaction};

/// Default genesis marker string.
pub const GENESIS_MARKER: &str = "genesis_block_medchain";

/// Pure block constructor.
pub struct BlockBuilder;

impl BlockBuilder {
    /// Merkle root over `(id, timestamp)` leaves, in list order.
    /// The zero sentinel for an empty list.
    pub fn merkle_root(transactions: &[Transaction]) -> Fingerprint {
        Self::merkle_tree(transactions).root()
    }

    pub fn merkle_tree(transactions: &[Transaction]) -> MerkleTree {
        MerkleTree::from_leaves(transactions.iter().map(Transaction::leaf).collect())
    }

    /// Digest of the canonical JSON encoding of the transaction list.
    pub fn data_hash(transactions: &[Transaction]) -> Result<Fingerprint, LedgerError> {
        if transactions.is_empty() {
            return Ok(Fingerprint::zero());
        }
        Ok(Digester::DATA.hash_json(&transactions)?)
    }

    /// Build a non-genesis block. Index 0 is reserved for genesis.
    pub fn build_block(
        index: u64,
        timestamp: LedgerTime,
        prev_fingerprint: Fingerprint,
        transactions: Vec<Transaction>,
    ) -> Result<Block, LedgerError> {
        if index == 0 {
            return Err(LedgerError::InvalidIndex {
                expected: 1,
                got: 0,
            });
        }

        let merkle_root = Self::merkle_root(&transactions);
        let data_hash = Self::data_hash(&transactions)?;
        let fingerprint =
            Block::header_fingerprint(index, timestamp, &prev_fingerprint, &merkle_root);

        Ok(Block {
            index,
            timestamp,
            prev_fingerprint,
            merkle_root,
            data_hash,
            fingerprint,
            transactions,
        })
    }

    /// The genesis block for `marker`.
    pub fn genesis(marker: &str) -> Block {
        Block {
            index: 0,
            timestamp: LedgerTime::zero(),
            prev_fingerprint: Fingerprint::zero(),
            merkle_root: Fingerprint::zero(),
            data_hash: Fingerprint::zero(),
            fingerprint: Self::genesis_fingerprint(marker),
            transactions: Vec::new(),
        }
    }

    pub fn genesis_fingerprint(marker: &str) -> Fingerprint {
        digest(marker.as_bytes())
    }
}

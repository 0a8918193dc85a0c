use medchain_types::Fingerprint;
use serde::{Deserialize, Serialize};

/// Side of a sibling in a Merkle proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Binary Merkle tree over an ordered list of leaf fingerprints.
///
/// The root is order-sensitive: every internal node hashes `(left, right)`
/// in that order, so permuting distinct leaves changes the root.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    root: Fingerprint,
    /// Level 0 = leaves, last level = `[root]`.
    levels: Vec<Vec<Fingerprint>>,
}

impl MerkleTree {
    /// Build a tree from leaf fingerprints.
    ///
    /// An empty list produces the zero sentinel root. A single leaf is its
    /// own root. An odd node at any level is paired with itself.
    pub fn from_leaves(leaves: Vec<Fingerprint>) -> Self {
        if leaves.is_empty() {
            return Self {
                root: Fingerprint::zero(),
                levels: vec![],
            };
        }

        let mut levels: Vec<Vec<Fingerprint>> = vec![leaves];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<Fingerprint> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [odd] => hash_pair(odd, odd),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            levels.push(next);
        }

        let root = levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_else(Fingerprint::zero);
        Self { root, levels }
    }

    pub fn root(&self) -> Fingerprint {
        self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Generate an inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves = self.levels.first()?;
        let leaf = *leaves.get(index)?;

        let mut path = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            let sibling = level.get(sibling_idx).copied().unwrap_or(level[idx]);
            let side = if idx % 2 == 0 { Side::Right } else { Side::Left };
            path.push((sibling, side));
            idx /= 2;
        }

        Some(MerkleProof {
            leaf,
            path,
            root: self.root,
        })
    }
}

/// Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: Fingerprint,
    /// `(sibling, sibling side)` pairs from leaf to root.
    pub path: Vec<(Fingerprint, Side)>,
    pub root: Fingerprint,
}

impl MerkleProof {
    /// Recompute the root from the leaf and path.
    pub fn verify(&self) -> bool {
        let computed = self
            .path
            .iter()
            .fold(self.leaf, |current, (sibling, side)| match side {
                Side::Left => hash_pair(sibling, &current),
                Side::Right => hash_pair(&current, sibling),
            });
        computed == self.root
    }
}

fn hash_pair(left: &Fingerprint, right: &Fingerprint) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"medchain-merkle-v1:");
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Fingerprint::from_hash(*hasher.finalize().as_bytes())
}

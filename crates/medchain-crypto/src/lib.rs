//! Hashing primitives for the MedChain ledger.
//!
//! Provides the ledger's digest function (BLAKE3, optionally domain
//! separated), a binary Merkle tree with inclusion proofs, and a generic
//! hash-chain verifier.
//!
//! Strength is not a goal here; determinism and fixed width are. BLAKE3 is
//! used because it is fast and already deterministic, not for security.

pub mod chain;
pub mod digest;
pub mod merkle;

pub use chain::{ChainError, ChainLink, HashChainVerifier};
pub use digest::{digest, Digester, DigestError};
pub use merkle::{MerkleProof, MerkleTree, Side};

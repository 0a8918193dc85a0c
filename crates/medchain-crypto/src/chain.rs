use medchain_types::Fingerprint;

/// An element of a hash-linked chain.
pub trait ChainLink {
    /// Position in the chain (0 = genesis).
    fn position(&self) -> u64;
    /// The stored fingerprint of this link.
    fn fingerprint(&self) -> Fingerprint;
    /// The stored fingerprint of the predecessor (zero sentinel for genesis).
    fn prev_fingerprint(&self) -> Fingerprint;
    /// Fingerprint recomputed from the link's stored fields.
    fn recompute_fingerprint(&self) -> Fingerprint;
}

/// Hash chain integrity verifier.
///
/// Checks that positions run `0, 1, 2, …`, that each link's previous
/// fingerprint equals its predecessor's fingerprint, that genesis points at
/// the zero sentinel, and that every stored fingerprint can be recomputed.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a whole chain, stopping at the first broken link.
    pub fn verify_chain<L: ChainLink>(links: &[L]) -> Result<(), ChainError> {
        let mut prev: Option<&L> = None;
        for (index, link) in links.iter().enumerate() {
            Self::check_link(prev, link, index as u64)?;
            prev = Some(link);
        }
        Ok(())
    }

    /// Verify one link against its predecessor (`None` for genesis).
    pub fn check_link<L: ChainLink>(
        prev: Option<&L>,
        link: &L,
        expected_position: u64,
    ) -> Result<(), ChainError> {
        if link.position() != expected_position {
            return Err(ChainError::PositionGap {
                index: expected_position,
                found: link.position(),
            });
        }

        match prev {
            None if !link.prev_fingerprint().is_zero() => {
                return Err(ChainError::GenesisHasPrev);
            }
            Some(p) if p.fingerprint() != link.prev_fingerprint() => {
                return Err(ChainError::BrokenLink {
                    index: expected_position,
                });
            }
            _ => {}
        }

        if link.recompute_fingerprint() != link.fingerprint() {
            return Err(ChainError::FingerprintMismatch {
                index: expected_position,
            });
        }

        Ok(())
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("expected position {index}, found {found}")]
    PositionGap { index: u64, found: u64 },

    #[error("genesis link has a non-zero previous fingerprint")]
    GenesisHasPrev,

    #[error("broken link at index {index}: previous fingerprint does not match")]
    BrokenLink { index: u64 },

    #[error("fingerprint mismatch at index {index}: recomputed value differs from stored")]
    FingerprintMismatch { index: u64 },
}

impl ChainError {
    /// Index of the offending link.
    pub fn index(&self) -> u64 {
        match self {
            Self::PositionGap { index, .. }
            | Self::BrokenLink { index }
            | Self::FingerprintMismatch { index } => *index,
            Self::GenesisHasPrev => 0,
        }
    }
}

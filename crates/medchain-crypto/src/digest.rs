use medchain_types::Fingerprint;

/// The ledger digest function.
///
/// Pure and deterministic: the same bytes always give the same 64-hex
/// fingerprint, whatever their length. Empty input is valid.
pub fn digest(data: &[u8]) -> Fingerprint {
    Fingerprint::from_hash(*blake3::hash(data).as_bytes())
}

/// Domain-separated BLAKE3 digester.
///
/// Each digester carries a domain tag that is prepended to every hash
/// computation, so a transaction id and a Merkle leaf over identical bytes
/// never collide.
pub struct Digester {
    domain: &'static str,
}

impl Digester {
    /// Transaction identifiers.
    pub const TRANSACTION: Self = Self {
        domain: "medchain-tx-v1",
    };
    /// Merkle leaves over `(id, timestamp)`.
    pub const LEAF: Self = Self {
        domain: "medchain-leaf-v1",
    };
    /// Block data hash over the serialized transaction list.
    pub const DATA: Self = Self {
        domain: "medchain-data-v1",
    };
    /// Block header fingerprints.
    pub const BLOCK: Self = Self {
        domain: "medchain-block-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Fingerprint {
        self.hash_parts(&[data])
    }

    /// Hash a sequence of byte slices as if concatenated, with domain separation.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        Fingerprint::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<Fingerprint, DigestError> {
        let data =
            serde_json::to_vec(value).map_err(|e| DigestError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected fingerprint.
    pub fn verify(&self, data: &[u8], expected: &Fingerprint) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

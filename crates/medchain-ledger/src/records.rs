use std::collections::BTreeMap;
use std::sync::Arc;

use medchain_crypto::{ChainLink, Digester};
use medchain_types::{Fingerprint, LedgerTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LedgerError;

/// Opaque business record carried by a transaction.
///
/// A `BTreeMap` keeps field order canonical, so the serialized payload (and
/// everything hashed or searched over it) is deterministic.
pub type Payload = BTreeMap<String, Value>;

/// Payload fields recognized as the business key, in priority order.
pub const BUSINESS_KEY_FIELDS: [&str; 2] = ["batchId", "batch_id"];

/// Validation code of a transaction that may affect world state.
pub const VALID: u32 = 0;

/// Producer-side description of a transaction, before the ledger assigns an
/// identifier and timestamp.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub chaincode: String,
    pub function: String,
    pub args: Vec<String>,
    pub creator: String,
    pub endorser: String,
    pub payload: Payload,
    pub validation_code: u32,
}

impl TransactionDraft {
    pub fn new(
        chaincode: impl Into<String>,
        function: impl Into<String>,
        creator: impl Into<String>,
    ) -> Self {
        Self {
            chaincode: chaincode.into(),
            function: function.into(),
            creator: creator.into(),
            ..Default::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_endorser(mut self, endorser: impl Into<String>) -> Self {
        self.endorser = endorser.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Mark the transaction invalid. It is still stored, never projected.
    pub fn with_validation_code(mut self, code: u32) -> Self {
        self.validation_code = code;
        self
    }

    /// Reject drafts missing chaincode, function, or creator.
    pub fn validate(&self) -> Result<(), LedgerError> {
        for (field, value) in [
            ("chaincode", &self.chaincode),
            ("function", &self.function),
            ("creator", &self.creator),
        ] {
            if value.trim().is_empty() {
                return Err(LedgerError::MalformedTransaction { field });
            }
        }
        Ok(())
    }

    /// Derive the transaction identifier from the draft content and a
    /// disambiguating counter: `tx_` followed by 16 hex characters.
    pub fn derive_id(&self, counter: u64) -> Result<String, LedgerError> {
        let digest = Digester::TRANSACTION.hash_json(&(self, counter))?;
        Ok(format!("tx_{}", &digest.to_hex()[..16]))
    }

    pub fn into_transaction(self, id: String, timestamp: LedgerTime) -> Transaction {
        Transaction {
            id,
            timestamp,
            chaincode: self.chaincode,
            function: self.function,
            args: self.args,
            endorser: self.endorser,
            creator: self.creator,
            payload: self.payload,
            validation_code: self.validation_code,
        }
    }
}

/// A transaction as stored in a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub timestamp: LedgerTime,
    pub chaincode: String,
    pub function: String,
    pub args: Vec<String>,
    pub endorser: String,
    pub creator: String,
    pub payload: Payload,
    pub validation_code: u32,
}

impl Transaction {
    pub fn is_valid(&self) -> bool {
        self.validation_code == VALID
    }

    /// The business key (batch id) this transaction refers to, if any.
    pub fn business_key(&self) -> Option<String> {
        BUSINESS_KEY_FIELDS
            .iter()
            .filter_map(|field| self.payload.get(*field))
            .find_map(value_as_string)
            .filter(|key| !key.is_empty())
    }

    /// String value of a payload field. Numbers and booleans are rendered.
    pub fn field(&self, name: &str) -> Option<String> {
        self.payload.get(name).and_then(value_as_string)
    }

    /// Canonical JSON of the payload.
    pub fn payload_json(&self) -> String {
        serde_json::to_string(&self.payload).unwrap_or_default()
    }

    /// Merkle leaf: digest over `(id, timestamp)`.
    pub fn leaf(&self) -> Fingerprint {
        Digester::LEAF.hash_parts(&[self.id.as_bytes(), &self.timestamp.to_le_bytes()])
    }

    /// Check the fields every stored transaction must carry.
    pub(crate) fn validate(&self) -> Result<(), LedgerError> {
        if self.id.trim().is_empty() {
            return Err(LedgerError::MalformedTransaction { field: "id" });
        }
        for (field, value) in [
            ("chaincode", &self.chaincode),
            ("function", &self.function),
            ("creator", &self.creator),
        ] {
            if value.trim().is_empty() {
                return Err(LedgerError::MalformedTransaction { field });
            }
        }
        Ok(())
    }
}

/// Render a JSON scalar as a plain string. Objects, arrays, and null give `None`.
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// An immutable, sequence-numbered container of transactions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: LedgerTime,
    pub prev_fingerprint: Fingerprint,
    pub merkle_root: Fingerprint,
    /// Digest of the canonical JSON of `transactions`.
    pub data_hash: Fingerprint,
    pub fingerprint: Fingerprint,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Header fingerprint over `(index, timestamp, prev, merkle_root)`.
    pub fn header_fingerprint(
        index: u64,
        timestamp: LedgerTime,
        prev_fingerprint: &Fingerprint,
        merkle_root: &Fingerprint,
    ) -> Fingerprint {
        Digester::BLOCK.hash_parts(&[
            &index.to_le_bytes(),
            &timestamp.to_le_bytes(),
            prev_fingerprint.as_bytes(),
            merkle_root.as_bytes(),
        ])
    }
}

impl ChainLink for Block {
    fn position(&self) -> u64 {
        self.index
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    fn prev_fingerprint(&self) -> Fingerprint {
        self.prev_fingerprint
    }

    fn recompute_fingerprint(&self) -> Fingerprint {
        Self::header_fingerprint(
            self.index,
            self.timestamp,
            &self.prev_fingerprint,
            &self.merkle_root,
        )
    }
}

/// Immutable view of an already-appended prefix of the ledger.
///
/// Cloning a snapshot only clones `Arc`s; readers holding one never observe
/// blocks appended after it was taken, nor a partially built block.
#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    blocks: Vec<Arc<Block>>,
}

impl LedgerSnapshot {
    pub fn new(blocks: Vec<Arc<Block>>) -> Self {
        Self { blocks }
    }

    /// Snapshot over owned blocks, e.g. records read back from a journal.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self::new(blocks.into_iter().map(Arc::new).collect())
    }

    pub fn blocks(&self) -> &[Arc<Block>] {
        &self.blocks
    }

    pub fn block(&self, index: u64) -> Option<&Arc<Block>> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn latest(&self) -> Option<&Arc<Block>> {
        self.blocks.last()
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All transactions as `(block_index, transaction)`, blocks in index
    /// order and transactions in list order. Restartable: call it again for
    /// a fresh pass.
    pub fn transactions(&self) -> impl Iterator<Item = (u64, &Transaction)> + '_ {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions.iter().map(move |tx| (block.index, tx)))
    }

    /// Transactions in blocks with index strictly greater than `after`.
    pub fn transactions_after(
        &self,
        after: Option<u64>,
    ) -> impl Iterator<Item = (u64, &Transaction)> + '_ {
        let start = after.map_or(0, |h| h.saturating_add(1));
        self.blocks
            .iter()
            .filter(move |block| block.index >= start)
            .flat_map(|block| block.transactions.iter().map(move |tx| (block.index, tx)))
    }

    pub fn transaction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.transactions.len()).sum()
    }

    pub fn into_blocks(self) -> Vec<Arc<Block>> {
        self.blocks
    }
}

use std::collections::BTreeMap;

use medchain_types::{Fingerprint, LedgerTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::{Block, LedgerSnapshot, Payload, Transaction};

/// Latest value of one business key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldStateValue {
    attributes: Payload,
    updated_at: LedgerTime,
    last_tx_id: String,
    last_block: u64,
    version: u64,
}

impl WorldStateValue {
    /// Payload fields accumulated from every valid transaction for this key.
    pub fn attributes(&self) -> &Payload {
        &self.attributes
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// A field rendered as a plain string, when it is a string or scalar.
    pub fn get_str(&self, field: &str) -> Option<String> {
        self.attributes
            .get(field)
            .and_then(crate::records::value_as_string)
    }

    pub fn status(&self) -> Option<String> {
        self.get_str("status")
    }

    pub fn current_location(&self) -> Option<String> {
        self.get_str(CURRENT_LOCATION)
    }

    pub fn updated_at(&self) -> LedgerTime {
        self.updated_at
    }

    pub fn last_tx_id(&self) -> &str {
        &self.last_tx_id
    }

    pub fn last_block(&self) -> u64 {
        self.last_block
    }

    /// Number of valid transactions applied to this key.
    pub fn version(&self) -> u64 {
        self.version
    }
}

const LOCATION: &str = "location";
const CURRENT_LOCATION: &str = "currentLocation";

/// Key to latest value, derived by replaying valid transactions in ledger order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    entries: BTreeMap<String, WorldStateValue>,
}

impl WorldState {
    /// Lookup by business key. A key never referenced is `None`.
    pub fn get(&self, key: &str) -> Option<&WorldStateValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorldStateValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply one transaction. Returns `true` if an entry was created or updated.
    pub fn apply(&mut self, block_index: u64, tx: &Transaction) -> bool {
        if !tx.is_valid() {
            return false;
        }
        let Some(key) = tx.business_key() else {
            return false;
        };

        let entry = self.entries.entry(key).or_insert_with(|| WorldStateValue {
            attributes: Payload::new(),
            updated_at: tx.timestamp,
            last_tx_id: String::new(),
            last_block: block_index,
            version: 0,
        });
        for (field, value) in &tx.payload {
            let field = if field == LOCATION {
                CURRENT_LOCATION
            } else {
                field.as_str()
            };
            entry.attributes.insert(field.to_string(), value.clone());
        }
        entry.updated_at = tx.timestamp;
        entry.last_tx_id = tx.id.clone();
        entry.last_block = block_index;
        entry.version += 1;
        true
    }

    fn apply_block(&mut self, block: &Block) -> usize {
        block
            .transactions
            .iter()
            .filter(|tx| self.apply(block.index, tx))
            .count()
    }
}

/// Maintains a world state incrementally against a growing ledger.
///
/// [`catch_up`](Self::catch_up) applies only blocks newer than the last
/// applied one and always yields the same mapping as a full
/// [`project`](Self::project). If the ledger was reset or diverged below the
/// applied height, the projector rebuilds from scratch.
#[derive(Clone, Debug, Default)]
pub struct WorldStateProjector {
    state: WorldState,
    /// Index and fingerprint of the last applied block.
    applied: Option<(u64, Fingerprint)>,
}

impl WorldStateProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full projection from genesis.
    pub fn project(snapshot: &LedgerSnapshot) -> WorldState {
        let mut state = WorldState::default();
        for block in snapshot.blocks() {
            state.apply_block(block);
        }
        state
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn applied_height(&self) -> Option<u64> {
        self.applied.map(|(index, _)| index)
    }

    /// Apply blocks appended since the last call. Returns the number of
    /// blocks applied.
    pub fn catch_up(&mut self, snapshot: &LedgerSnapshot) -> usize {
        if let Some((index, fingerprint)) = self.applied {
            let still_there = snapshot
                .block(index)
                .is_some_and(|block| block.fingerprint == fingerprint);
            if !still_there {
                tracing::debug!(applied = index, "ledger diverged below projection, rebuilding");
                return self.rebuild(snapshot);
            }
        }

        let mut applied = 0;
        let mut updated = 0;
        let start = self.applied.map_or(0, |(index, _)| index as usize + 1);
        for block in snapshot.blocks().iter().skip(start) {
            updated += self.state.apply_block(block);
            self.applied = Some((block.index, block.fingerprint));
            applied += 1;
        }
        if applied > 0 {
            tracing::debug!(blocks = applied, keys_updated = updated, "world state caught up");
        }
        applied
    }

    /// Discard the cached state and replay the whole snapshot.
    pub fn rebuild(&mut self, snapshot: &LedgerSnapshot) -> usize {
        self.state = WorldState::default();
        self.applied = None;
        self.catch_up(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::config::LedgerConfig;
    use crate::memory::InMemoryLedger;
    use crate::records::TransactionDraft;
    use crate::traits::{LedgerReader, LedgerWriter};

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(LedgerConfig::manual(1_000, 10))
    }

    fn create(batch: &str) -> TransactionDraft {
        TransactionDraft::new("medchain-cc", "createDrugBatch", "manufacturer-admin")
            .with_args([batch, "Paracetamol"])
            .with_field("batchId", batch)
            .with_field("quantity", "1000")
            .with_field("status", "pending")
    }

    fn update(batch: &str, status: &str) -> TransactionDraft {
        TransactionDraft::new("medchain-cc", "updateBatchStatus", "distributor-admin")
            .with_args([batch, status])
            .with_field("batchId", batch)
            .with_field("status", status)
    }

    fn seal(ledger: &InMemoryLedger, draft: TransactionDraft) {
        ledger.submit_transaction(draft).unwrap();
        ledger.seal().unwrap();
    }

    #[test]
    fn created_batch_maps_to_payload() {
        let ledger = ledger();
        seal(&ledger, create("batch001"));

        let state = WorldStateProjector::project(&ledger.snapshot().unwrap());
        let entry = state.get("batch001").unwrap();
        let expected: Payload = [
            ("batchId".to_string(), json!("batch001")),
            ("quantity".to_string(), json!("1000")),
            ("status".to_string(), json!("pending")),
        ]
        .into_iter()
        .collect();
        assert_eq!(entry.attributes(), &expected);
        assert_eq!(entry.version(), 1);
        assert_eq!(entry.last_block(), 1);
    }

    #[test]
    fn status_update_overwrites_and_history_is_kept() {
        let ledger = ledger();
        seal(&ledger, create("batch001"));
        let original = ledger.block(1).unwrap().unwrap();
        seal(&ledger, update("batch001", "waiting"));

        let state = WorldStateProjector::project(&ledger.snapshot().unwrap());
        let entry = state.get("batch001").unwrap();
        assert_eq!(entry.status().as_deref(), Some("waiting"));
        assert_eq!(entry.get_str("quantity").as_deref(), Some("1000"));
        assert_eq!(entry.version(), 2);
        assert_eq!(ledger.block(1).unwrap().unwrap(), original);
        assert_eq!(original.transactions[0].function, "createDrugBatch");
    }

    #[test]
    fn invalid_transactions_change_ledger_not_state() {
        let ledger = ledger();
        seal(&ledger, create("batch001"));
        let before = WorldStateProjector::project(&ledger.snapshot().unwrap());

        seal(&ledger, update("batch001", "recalled").with_validation_code(11));
        seal(&ledger, create("batch999").with_validation_code(1));

        assert_eq!(ledger.height().unwrap(), 4);
        let after = WorldStateProjector::project(&ledger.snapshot().unwrap());
        assert_eq!(before, after);
    }

    #[test]
    fn location_is_normalized() {
        let ledger = ledger();
        seal(&ledger, create("batch001").with_field("location", "Factory A"));
        let state = WorldStateProjector::project(&ledger.snapshot().unwrap());
        let entry = state.get("batch001").unwrap();
        assert_eq!(entry.current_location().as_deref(), Some("Factory A"));
        assert!(entry.get("location").is_none());
    }

    #[test]
    fn transactions_without_key_are_ignored() {
        let ledger = ledger();
        seal(
            &ledger,
            TransactionDraft::new("medchain-cc", "verifyPatient", "hospital-admin")
                .with_field("patientId", "P-1"),
        );
        let state = WorldStateProjector::project(&ledger.snapshot().unwrap());
        assert!(state.is_empty());
        assert!(state.get("P-1").is_none());
    }

    #[test]
    fn snake_case_key_is_recognized() {
        let ledger = ledger();
        seal(
            &ledger,
            TransactionDraft::new("medchain-cc", "dispenseDrug", "pharmacy-admin")
                .with_field("batch_id", "batch042")
                .with_field("status", "dispensed"),
        );
        let state = WorldStateProjector::project(&ledger.snapshot().unwrap());
        assert_eq!(state.get("batch042").unwrap().status().as_deref(), Some("dispensed"));
    }

    #[test]
    fn projection_is_deterministic() {
        let ledger = ledger();
        seal(&ledger, create("batch001"));
        seal(&ledger, update("batch001", "shipped"));
        let snapshot = ledger.snapshot().unwrap();
        assert_eq!(
            WorldStateProjector::project(&snapshot),
            WorldStateProjector::project(&snapshot)
        );
    }

    #[test]
    fn catch_up_applies_only_new_blocks() {
        let ledger = ledger();
        let mut projector = WorldStateProjector::new();
        assert_eq!(projector.catch_up(&ledger.snapshot().unwrap()), 1);

        seal(&ledger, create("batch001"));
        assert_eq!(projector.catch_up(&ledger.snapshot().unwrap()), 1);
        assert_eq!(projector.catch_up(&ledger.snapshot().unwrap()), 0);
        assert_eq!(projector.applied_height(), Some(1));
    }

    #[test]
    fn reset_triggers_rebuild() {
        let ledger = ledger();
        let mut projector = WorldStateProjector::new();
        seal(&ledger, create("batch001"));
        seal(&ledger, create("batch002"));
        projector.catch_up(&ledger.snapshot().unwrap());
        assert_eq!(projector.state().len(), 2);

        ledger.reset().unwrap();
        seal(&ledger, create("batch003"));
        seal(&ledger, create("batch004"));
        let snapshot = ledger.snapshot().unwrap();
        projector.catch_up(&snapshot);
        assert_eq!(projector.state(), &WorldStateProjector::project(&snapshot));
        assert!(!projector.state().contains_key("batch001"));
    }

    #[derive(Clone, Debug)]
    struct Op {
        batch: u8,
        status: &'static str,
        valid: bool,
        seal_after: bool,
    }

    fn op() -> impl Strategy<Value = Op> {
        (
            0u8..4,
            prop::sample::select(vec!["pending", "waiting", "shipped", "received", "dispensed"]),
            prop::bool::weighted(0.8),
            any::<bool>(),
        )
            .prop_map(|(batch, status, valid, seal_after)| Op {
                batch,
                status,
                valid,
                seal_after,
            })
    }

    proptest! {
        #[test]
        fn incremental_equals_full(ops in prop::collection::vec(op(), 1..40)) {
            let ledger = ledger();
            let mut projector = WorldStateProjector::new();
            for op in &ops {
                let code = if op.valid { 0 } else { 1 };
                let draft = update(&format!("batch{:03}", op.batch), op.status)
                    .with_validation_code(code);
                ledger.submit_transaction(draft).unwrap();
                if op.seal_after {
                    ledger.seal().unwrap();
                    let snapshot = ledger.snapshot().unwrap();
                    projector.catch_up(&snapshot);
                    prop_assert_eq!(projector.state(), &WorldStateProjector::project(&snapshot));
                }
            }
            ledger.seal().unwrap();
            let snapshot = ledger.snapshot().unwrap();
            projector.catch_up(&snapshot);
            prop_assert_eq!(projector.state(), &WorldStateProjector::project(&snapshot));
        }

        #[test]
        fn projection_is_idempotent(ops in prop::collection::vec(op(), 0..30)) {
            let ledger = ledger();
            for op in &ops {
                ledger.submit_transaction(update(&format!("batch{:03}", op.batch), op.status)).unwrap();
                if op.seal_after {
                    ledger.seal().unwrap();
                }
            }
            ledger.seal().unwrap();
            let snapshot = ledger.snapshot().unwrap();
            prop_assert_eq!(
                WorldStateProjector::project(&snapshot),
                WorldStateProjector::project(&snapshot)
            );
        }
    }
}

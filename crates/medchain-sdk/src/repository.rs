use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockWriteGuard};

use medchain_audit::{filter_and_sort, trace, AuditEvent, AuditQuery, AuditStatus, CustodyTrail, StatusIndex};
use medchain_crypto::MerkleProof;
use medchain_ledger::{
    pending_log_path, search, Block, BlockJournal, InMemoryLedger, LedgerReader, LedgerSnapshot,
    LedgerWriter, PendingLog, Transaction, TransactionDraft, ValidationReport, WorldState,
    WorldStateProjector, WorldStateValue,
};
use tracing::{debug, error, info, warn};

use crate::config::MedChainConfig;
use crate::error::{SdkError, SdkResult};
use crate::sample::{sample_blocks, SAMPLE_EPOCH_MS, SAMPLE_STEP_MS};

/// A committed transaction and the block that sealed it.
#[derive(Clone, Debug)]
pub struct CommitResult {
    pub tx_id: String,
    pub block: Arc<Block>,
}

/// High-level MedChain API.
///
/// Owns the ledger, the cached world-state and audit views, and the optional
/// block journal. Views follow the ledger lazily: each read catches them up
/// with the blocks sealed since the previous read.
///
/// Writes hold one facade-wide lock from the ledger update until its
/// journal record is flushed, so records land on disk in index order. If a
/// block cannot be journaled, further writes fail with
/// [`SdkError::JournalBehind`] until [`rebuild`](Self::rebuild).
pub struct MedChain {
    config: MedChainConfig,
    ledger: InMemoryLedger,
    projector: RwLock<WorldStateProjector>,
    audit: RwLock<StatusIndex>,
    journal: Option<Persistence>,
    writer: Mutex<WriterState>,
}

/// On-disk side of a persistent ledger.
struct Persistence {
    blocks: BlockJournal,
    pending: PendingLog,
}

struct WriterState {
    /// Blocks known to be in the block journal.
    journaled: u64,
}

impl MedChain {
    /// A ledger holding only genesis, never persisted. Any configured
    /// journal path is ignored.
    pub fn in_memory(config: MedChainConfig) -> SdkResult<Self> {
        config.validate()?;
        let ledger = InMemoryLedger::new(config.ledger.clone());
        Ok(Self::assemble(config, ledger, None, 0))
    }

    /// Open the ledger described by `config`. With a journal path, blocks are
    /// restored from the journal (validated on load) and every sealed block
    /// is appended to it; a missing journal starts a new ledger. Unsealed
    /// submissions are kept in a pending log next to the journal and
    /// re-queued here.
    pub fn open(config: MedChainConfig) -> SdkResult<Self> {
        config.validate()?;
        let Some(path) = config.journal_path.clone() else {
            return Self::in_memory(config);
        };
        let pending_path = pending_log_path(&path);

        let blocks = BlockJournal::recover(&path)?;
        let pending = PendingLog::recover(&pending_path)?;
        let journal = Persistence {
            blocks: BlockJournal::open(&path)?,
            pending: PendingLog::open(&pending_path)?,
        };
        let ledger = if blocks.is_empty() {
            let ledger = InMemoryLedger::new(config.ledger.clone());
            for block in ledger.snapshot()?.blocks() {
                journal.blocks.append(block)?;
            }
            info!(path = %path.display(), "new journal created");
            ledger
        } else {
            InMemoryLedger::from_blocks(config.ledger.clone(), blocks)?
        };
        ledger.restore_pending(pending)?;
        journal.pending.rewrite(&ledger.pending()?)?;

        let height = ledger.height()?;
        let chain = Self::assemble(config, ledger, Some(journal), height);
        chain.refresh()?;
        Ok(chain)
    }

    /// In-memory ledger loaded with the sample dataset on a deterministic
    /// clock starting 2024-01-01T08:00:00Z.
    pub fn demo() -> SdkResult<Self> {
        let chain = Self::in_memory(MedChainConfig::manual(SAMPLE_EPOCH_MS, SAMPLE_STEP_MS))?;
        chain.load_sample()?;
        Ok(chain)
    }

    fn assemble(
        config: MedChainConfig,
        ledger: InMemoryLedger,
        journal: Option<Persistence>,
        journaled: u64,
    ) -> Self {
        Self {
            config,
            ledger,
            projector: RwLock::new(WorldStateProjector::new()),
            audit: RwLock::new(StatusIndex::new()),
            journal,
            writer: Mutex::new(WriterState { journaled }),
        }
    }

    pub fn config(&self) -> &MedChainConfig {
        &self.config
    }

    /// The underlying ledger, for operations not wrapped here.
    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    pub fn is_persistent(&self) -> bool {
        self.journal.is_some()
    }

    // ---- Ingest ----

    /// Draft stamped with the configured chaincode name.
    pub fn draft(&self, function: impl Into<String>, creator: impl Into<String>) -> TransactionDraft {
        TransactionDraft::new(self.config.chaincode.clone(), function, creator)
    }

    /// Validate and queue a transaction. Returns its assigned identifier.
    pub fn submit_transaction(&self, draft: TransactionDraft) -> SdkResult<String> {
        let _writer = self.lock_writer()?;
        let tx = self.ledger.submit(draft)?;
        if let Some(journal) = &self.journal {
            journal.pending.append(&tx)?;
        }
        Ok(tx.id)
    }

    /// Transactions waiting for the next seal.
    pub fn pending(&self) -> SdkResult<Vec<Transaction>> {
        Ok(self.ledger.pending()?)
    }

    /// Seal pending transactions into one block and journal it. `None` when
    /// nothing is pending.
    pub fn seal(&self) -> SdkResult<Option<Arc<Block>>> {
        let mut writer = self.lock_writer()?;
        self.ensure_journal_current(&writer)?;
        let Some(block) = self.ledger.seal()? else {
            return Ok(None);
        };
        self.journal_block(&mut writer, &block)?;
        Ok(Some(block))
    }

    /// Seal until nothing is pending. More than one block results when the
    /// ledger caps transactions per block.
    pub fn seal_all(&self) -> SdkResult<Vec<Arc<Block>>> {
        let mut sealed = Vec::new();
        while let Some(block) = self.seal()? {
            sealed.push(block);
        }
        Ok(sealed)
    }

    /// Submit one transaction and seal everything pending.
    pub fn commit(&self, draft: TransactionDraft) -> SdkResult<CommitResult> {
        let tx_id = self.submit_transaction(draft)?;
        self.seal_all()?;
        let (index, _) = self
            .ledger
            .find_transaction(&tx_id)?
            .ok_or_else(|| SdkError::TransactionNotFound(tx_id.clone()))?;
        let block = self.ledger.block(index)?.ok_or(SdkError::BlockNotFound(index))?;
        Ok(CommitResult { tx_id, block })
    }

    /// Append already-identified transactions as one block and journal it.
    pub fn append(&self, transactions: Vec<Transaction>) -> SdkResult<Arc<Block>> {
        let mut writer = self.lock_writer()?;
        self.ensure_journal_current(&writer)?;
        let block = self.ledger.append(transactions)?;
        self.journal_block(&mut writer, &block)?;
        Ok(block)
    }

    /// Load the sample dataset onto the current ledger. Returns the number
    /// of blocks sealed.
    pub fn load_sample(&self) -> SdkResult<usize> {
        let mut sealed = 0;
        for drafts in sample_blocks(&self.config.chaincode) {
            for draft in drafts {
                self.submit_transaction(draft)?;
            }
            sealed += self.seal_all()?.len();
        }
        info!(blocks = sealed, "sample dataset loaded");
        Ok(sealed)
    }

    fn lock_writer(&self) -> SdkResult<MutexGuard<'_, WriterState>> {
        self.writer
            .lock()
            .map_err(|_| SdkError::Internal("writer lock poisoned".into()))
    }

    fn ensure_journal_current(&self, writer: &WriterState) -> SdkResult<()> {
        if self.journal.is_none() {
            return Ok(());
        }
        let ledger = self.ledger.height()?;
        if writer.journaled != ledger {
            return Err(SdkError::JournalBehind {
                ledger,
                journal: writer.journaled,
            });
        }
        Ok(())
    }

    /// Record a freshly appended block. Called with the writer lock held.
    fn journal_block(&self, writer: &mut WriterState, block: &Block) -> SdkResult<()> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };
        if let Err(e) = journal.blocks.append(block) {
            error!(index = block.index, error = %e, "block not journaled; writes stopped until rebuild");
            return Err(e.into());
        }
        writer.journaled = block.index + 1;
        journal.pending.rewrite(&self.ledger.pending()?)?;
        Ok(())
    }

    /// Rewrite both journals from the in-memory ledger if a failed write
    /// left them behind.
    fn sync_journal(&self) -> SdkResult<()> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };
        let mut writer = self.lock_writer()?;
        let height = self.ledger.height()?;
        if writer.journaled == height {
            return Ok(());
        }
        let snapshot = self.ledger.snapshot()?;
        journal.blocks.rewrite(snapshot.blocks().iter().map(|b| b.as_ref()))?;
        journal.pending.rewrite(&self.ledger.pending()?)?;
        info!(from = writer.journaled, to = height, "journal resynchronized");
        writer.journaled = height;
        Ok(())
    }

    // ---- Reads ----

    /// Immutable view of every appended block, in index order.
    pub fn get_ledger(&self) -> SdkResult<LedgerSnapshot> {
        Ok(self.ledger.snapshot()?)
    }

    pub fn height(&self) -> SdkResult<u64> {
        Ok(self.ledger.height()?)
    }

    pub fn block(&self, index: u64) -> SdkResult<Option<Arc<Block>>> {
        Ok(self.ledger.block(index)?)
    }

    /// A sealed transaction and the index of its block.
    pub fn find_transaction(&self, id: &str) -> SdkResult<Option<(u64, Transaction)>> {
        Ok(self.ledger.find_transaction(id)?)
    }

    pub fn inclusion_proof(&self, tx_id: &str) -> SdkResult<Option<MerkleProof>> {
        Ok(self.ledger.inclusion_proof(tx_id)?)
    }

    /// Key to latest value over valid transactions.
    pub fn get_world_state(&self) -> SdkResult<WorldState> {
        let snapshot = self.ledger.snapshot()?;
        let mut projector = write_view(&self.projector)?;
        projector.catch_up(&snapshot);
        Ok(projector.state().clone())
    }

    /// One world-state entry. `None` for a key no valid transaction touched.
    pub fn world_state_entry(&self, key: &str) -> SdkResult<Option<WorldStateValue>> {
        let snapshot = self.ledger.snapshot()?;
        let mut projector = write_view(&self.projector)?;
        projector.catch_up(&snapshot);
        Ok(projector.state().get(key).cloned())
    }

    /// Classified audit rows, filtered and sorted by `query`.
    pub fn get_audit_events(&self, query: &AuditQuery) -> SdkResult<Vec<AuditEvent>> {
        let snapshot = self.ledger.snapshot()?;
        let mut index = write_view(&self.audit)?;
        index.catch_up(&snapshot);
        Ok(filter_and_sort(index.events(), query))
    }

    /// Status of the latest dispatch/receive step of `key`.
    pub fn step_status(&self, key: &str) -> SdkResult<Option<AuditStatus>> {
        let snapshot = self.ledger.snapshot()?;
        let mut index = write_view(&self.audit)?;
        index.catch_up(&snapshot);
        Ok(index.step_status(key))
    }

    /// Chain of custody for one batch.
    pub fn trace(&self, key: &str) -> SdkResult<Option<CustodyTrail>> {
        let snapshot = self.ledger.snapshot()?;
        let mut index = write_view(&self.audit)?;
        index.catch_up(&snapshot);
        Ok(trace(key, &index.events_for(key)))
    }

    /// Blocks with a transaction mentioning `term`, case-insensitively.
    pub fn search_ledger(&self, term: &str) -> SdkResult<Vec<Arc<Block>>> {
        let snapshot = self.ledger.snapshot()?;
        Ok(search(&snapshot, term)?)
    }

    // ---- Verification ----

    /// Full integrity scan. O(n) in ledger length.
    pub fn verify(&self) -> SdkResult<ValidationReport> {
        let report = self.ledger.verify()?;
        if !report.is_valid() {
            warn!(violations = report.violations.len(), "ledger failed verification");
        }
        Ok(report)
    }

    /// Integrity scan over the last `verify_window` blocks.
    pub fn verify_recent(&self) -> SdkResult<ValidationReport> {
        let height = self.ledger.height()?;
        if height == 0 {
            return self.verify();
        }
        let last = height - 1;
        let first = height.saturating_sub(self.config.verify_window);
        Ok(self.ledger.verify_range(first..=last)?)
    }

    // ---- Maintenance ----

    /// Recompute the world state and audit index from the whole ledger, and
    /// bring a lagging journal back in line with it.
    pub fn rebuild(&self) -> SdkResult<()> {
        self.sync_journal()?;
        self.rebuild_views()
    }

    fn rebuild_views(&self) -> SdkResult<()> {
        let snapshot = self.ledger.snapshot()?;
        let blocks = write_view(&self.projector)?.rebuild(&snapshot);
        let events = write_view(&self.audit)?.rebuild(&snapshot);
        debug!(blocks, events, "views rebuilt");
        Ok(())
    }

    /// Drop every block after genesis and every pending transaction, and
    /// truncate the journal to match.
    pub fn reset(&self) -> SdkResult<()> {
        {
            let mut writer = self.lock_writer()?;
            self.ledger.reset()?;
            if let Some(journal) = &self.journal {
                let snapshot = self.ledger.snapshot()?;
                journal.blocks.rewrite(snapshot.blocks().iter().map(|b| b.as_ref()))?;
                journal.pending.rewrite(&[])?;
                writer.journaled = snapshot.len() as u64;
            }
        }
        self.rebuild_views()
    }

    fn refresh(&self) -> SdkResult<()> {
        let snapshot = self.ledger.snapshot()?;
        write_view(&self.projector)?.catch_up(&snapshot);
        write_view(&self.audit)?.catch_up(&snapshot);
        Ok(())
    }
}

impl std::fmt::Debug for MedChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MedChain")
            .field("ledger", &self.ledger)
            .field("journal", &self.journal.as_ref().map(|j| j.blocks.path().to_path_buf()))
            .finish()
    }
}

fn write_view<T>(lock: &RwLock<T>) -> SdkResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| SdkError::Internal("view lock poisoned".into()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use medchain_audit::{CustodyStage, SortKey, StatusFilter};
    use medchain_ledger::LedgerError;
    use serde_json::json;

    use super::*;

    fn chain() -> MedChain {
        MedChain::in_memory(MedChainConfig::manual(1_000, 10)).unwrap()
    }

    fn create_batch(chain: &MedChain) -> CommitResult {
        chain
            .commit(
                chain
                    .draft("createDrugBatch", "manufacturer-admin")
                    .with_args(["batch001", "Paracetamol", "Acme Pharma", "1000"])
                    .with_endorser("peer0.manufacturer.medchain.com")
                    .with_field("batchId", "batch001")
                    .with_field("quantity", "1000")
                    .with_field("status", "pending"),
            )
            .unwrap()
    }

    fn update_status(chain: &MedChain, status: &str) -> CommitResult {
        chain
            .commit(
                chain
                    .draft("updateBatchStatus", "distributor-admin")
                    .with_args(["batch001", status])
                    .with_field("batchId", "batch001")
                    .with_field("status", status),
            )
            .unwrap()
    }

    fn transfer(chain: &MedChain, function: &str, key: &str, from: &str, to: &str) -> String {
        chain
            .commit(
                chain
                    .draft(function, "logistics-admin")
                    .with_field("batchId", key)
                    .with_field("fromEntity", from)
                    .with_field("toEntity", to),
            )
            .unwrap()
            .tx_id
    }

    #[test]
    fn create_batch_appears_in_world_state() {
        let chain = chain();
        let result = create_batch(&chain);
        assert_eq!(result.block.index, 1);

        let state = chain.get_world_state().unwrap();
        let entry = state.get("batch001").unwrap();
        assert_eq!(entry.get("batchId"), Some(&json!("batch001")));
        assert_eq!(entry.get("quantity"), Some(&json!("1000")));
        assert_eq!(entry.status().as_deref(), Some("pending"));
        assert_eq!(entry.attributes(), &result.block.transactions[0].payload);
    }

    #[test]
    fn status_update_keeps_history() {
        let chain = chain();
        let created = create_batch(&chain);
        update_status(&chain, "waiting");

        let entry = chain.world_state_entry("batch001").unwrap().unwrap();
        assert_eq!(entry.status().as_deref(), Some("waiting"));
        assert_eq!(entry.get_str("quantity").as_deref(), Some("1000"));

        let ledger = chain.get_ledger().unwrap();
        let block1 = ledger.block(1).unwrap();
        assert_eq!(block1.transactions[0].id, created.tx_id);
        assert_eq!(block1.transactions[0].function, "createDrugBatch");
        assert_eq!(block1.transactions[0].field("status").as_deref(), Some("pending"));
        assert_eq!(block1.as_ref(), created.block.as_ref());
    }

    #[test]
    fn invalid_transaction_changes_ledger_not_state() {
        let chain = chain();
        create_batch(&chain);
        let before = chain.get_world_state().unwrap();
        let height = chain.height().unwrap();

        chain
            .commit(
                chain
                    .draft("updateBatchStatus", "distributor-admin")
                    .with_field("batchId", "batch001")
                    .with_field("status", "recalled")
                    .with_validation_code(11),
            )
            .unwrap();

        assert_eq!(chain.height().unwrap(), height + 1);
        assert_eq!(chain.get_world_state().unwrap(), before);
    }

    #[test]
    fn unknown_key_is_none() {
        let chain = chain();
        create_batch(&chain);
        assert!(chain.world_state_entry("batch999").unwrap().is_none());
        assert!(chain.trace("batch999").unwrap().is_none());
        assert_eq!(chain.step_status("batch999").unwrap(), None);
    }

    #[test]
    fn dispatch_waits_until_received() {
        let chain = chain();
        let dispatch = transfer(&chain, "dispatchBatch", "X", "A", "B");
        assert_eq!(chain.step_status("X").unwrap(), Some(AuditStatus::Waiting));
        let rows = chain.get_audit_events(&AuditQuery::new()).unwrap();
        assert_eq!(rows[0].tx_id, dispatch);
        assert_eq!(rows[0].status, AuditStatus::Waiting);

        transfer(&chain, "receiveBatch", "X", "A", "B");
        assert_eq!(chain.step_status("X").unwrap(), Some(AuditStatus::Complete));
        let rows = chain.get_audit_events(&AuditQuery::new()).unwrap();
        let row = rows.iter().find(|r| r.tx_id == dispatch).unwrap();
        assert_eq!(row.status, AuditStatus::Complete);
    }

    #[test]
    fn search_finds_batch_blocks_but_not_genesis() {
        let chain = chain();
        create_batch(&chain);
        update_status(&chain, "waiting");
        chain
            .commit(chain.draft("createDrugBatch", "manufacturer-admin").with_field("batchId", "batch002"))
            .unwrap();

        let hits = chain.search_ledger("batch001").unwrap();
        let indices: Vec<u64> = hits.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(chain.search_ledger("nothing-here").unwrap().is_empty());
        assert!(matches!(
            chain.search_ledger("  "),
            Err(SdkError::Ledger(LedgerError::InvalidQuery(_)))
        ));
    }

    #[test]
    fn reopen_rejects_tampered_block_at_its_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medchain.jsonl");
        let config = MedChainConfig::manual(1_000, 10).with_journal(&path);
        {
            let chain = MedChain::open(config.clone()).unwrap();
            create_batch(&chain);
            update_status(&chain, "waiting");
            update_status(&chain, "success");
            assert!(chain.verify().unwrap().is_valid());
        }

        // Rewriting through the journal keeps every checksum consistent, so
        // only chain validation can catch the edit.
        let mut blocks = BlockJournal::load(&path).unwrap();
        blocks[2].transactions[0].payload.insert("status".into(), json!("recalled"));
        BlockJournal::open(&path).unwrap().rewrite(&blocks).unwrap();

        match MedChain::open(config) {
            Err(SdkError::Ledger(LedgerError::ChainIntegrityViolation { index, .. })) => {
                assert_eq!(index, 2)
            }
            other => panic!("expected integrity violation, got {other:?}"),
        }
    }

    #[test]
    fn verify_recent_covers_window() {
        let mut config = MedChainConfig::manual(0, 1);
        config.verify_window = 2;
        let chain = MedChain::in_memory(config).unwrap();
        for _ in 0..4 {
            update_status(&chain, "waiting");
        }
        let report = chain.verify_recent().unwrap();
        assert!(report.is_valid());
        assert_eq!(report.checked, Some((3, 4)));
    }

    #[test]
    fn malformed_submission_leaves_ledger_untouched() {
        let chain = chain();
        let err = chain
            .submit_transaction(chain.draft("createDrugBatch", " "))
            .unwrap_err();
        assert!(matches!(
            err,
            SdkError::Ledger(LedgerError::MalformedTransaction { field: "creator" })
        ));
        assert_eq!(chain.height().unwrap(), 1);
        assert!(chain.pending().unwrap().is_empty());
    }

    #[test]
    fn seal_without_pending_is_noop() {
        let chain = chain();
        assert!(chain.seal().unwrap().is_none());
        assert!(chain.seal_all().unwrap().is_empty());
    }

    #[test]
    fn reset_returns_to_genesis() {
        let chain = chain();
        create_batch(&chain);
        assert_eq!(chain.get_world_state().unwrap().len(), 1);

        chain.reset().unwrap();
        assert_eq!(chain.height().unwrap(), 1);
        assert!(chain.get_world_state().unwrap().is_empty());
        assert!(chain.get_audit_events(&AuditQuery::new()).unwrap().is_empty());

        create_batch(&chain);
        assert_eq!(chain.get_world_state().unwrap().len(), 1);
        assert!(chain.verify().unwrap().is_valid());
    }

    #[test]
    fn rebuild_matches_incremental_views() {
        let chain = MedChain::demo().unwrap();
        let state = chain.get_world_state().unwrap();
        let rows = chain.get_audit_events(&AuditQuery::new()).unwrap();
        chain.rebuild().unwrap();
        assert_eq!(chain.get_world_state().unwrap(), state);
        assert_eq!(chain.get_audit_events(&AuditQuery::new()).unwrap(), rows);
    }

    #[test]
    fn demo_dataset() {
        let chain = MedChain::demo().unwrap();
        assert_eq!(chain.height().unwrap(), 15);
        assert!(chain.verify().unwrap().is_valid());

        let state = chain.get_world_state().unwrap();
        let batch001 = state.get("batch001").unwrap();
        assert_eq!(batch001.status().as_deref(), Some("success"));
        assert_eq!(batch001.current_location().as_deref(), Some("City Hospital"));
        // The rejected "recalled" update is stored but never projected.
        let batch002 = state.get("batch002").unwrap();
        assert_eq!(batch002.status().as_deref(), Some("waiting"));
        assert_eq!(chain.search_ledger("recalled").unwrap().len(), 1);

        assert_eq!(chain.step_status("BATCH-1ldf2g-ABCDE").unwrap(), Some(AuditStatus::Complete));
        assert_eq!(chain.step_status("BATCH-2mxk9p-FGHIJ").unwrap(), Some(AuditStatus::Pending));
        assert_eq!(chain.step_status("BATCH-3qrt7w-KLMNO").unwrap(), Some(AuditStatus::Waiting));
        assert_eq!(chain.step_status("batch001").unwrap(), None);
    }

    #[test]
    fn demo_audit_queries() {
        let chain = MedChain::demo().unwrap();
        let all = chain.get_audit_events(&AuditQuery::new()).unwrap();
        assert_eq!(all.len(), 19);
        assert!(all.windows(2).all(|w| w[0].order_key() > w[1].order_key()));

        let waiting = chain
            .get_audit_events(&AuditQuery::new().with_status(StatusFilter::Waiting))
            .unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].key.as_deref(), Some("BATCH-3qrt7w-KLMNO"));

        let pending = chain
            .get_audit_events(&AuditQuery::new().with_status(StatusFilter::Pending))
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key.as_deref(), Some("BATCH-2mxk9p-FGHIJ"));

        let aiims = chain
            .get_audit_events(&AuditQuery::new().with_text("aiims").sorted_by(SortKey::Action))
            .unwrap();
        assert!(!aiims.is_empty());
        assert!(aiims
            .windows(2)
            .all(|w| w[0].action.to_lowercase() <= w[1].action.to_lowercase()));
    }

    #[test]
    fn demo_trace() {
        let chain = MedChain::demo().unwrap();
        let trail = chain.trace("BATCH-1ldf2g-ABCDE").unwrap().unwrap();
        assert_eq!(trail.len(), 6);
        assert_eq!(trail.stage, CustodyStage::Dispensed);
        assert_eq!(trail.origin.as_deref(), Some("Sun Pharma Manufacturing Team"));
        assert_eq!(trail.current_location.as_deref(), Some("AIIMS Delhi Pharmacy Counter"));
        assert_eq!(trail.hops[4].role, "Hospital Staff");
        assert_eq!(trail.hops[5].role, "Pharmacy Staff");
    }

    #[test]
    fn journal_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medchain.jsonl");
        let config = MedChainConfig::manual(1_000, 10).with_journal(&path);

        let tip = {
            let chain = MedChain::open(config.clone()).unwrap();
            assert!(chain.is_persistent());
            create_batch(&chain);
            update_status(&chain, "waiting");
            chain.get_ledger().unwrap().latest().cloned().unwrap()
        };

        let reopened = MedChain::open(config.clone()).unwrap();
        assert_eq!(reopened.height().unwrap(), 3);
        assert_eq!(reopened.get_ledger().unwrap().latest().unwrap(), &tip);
        assert_eq!(
            reopened.world_state_entry("batch001").unwrap().unwrap().status().as_deref(),
            Some("waiting")
        );

        // New ids never collide with restored ones.
        let next = update_status(&reopened, "success");
        assert_eq!(next.block.index, 3);

        reopened.reset().unwrap();
        drop(reopened);
        let after_reset = MedChain::open(config).unwrap();
        assert_eq!(after_reset.height().unwrap(), 1);
    }

    #[test]
    fn edited_journal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medchain.jsonl");
        let config = MedChainConfig::manual(1_000, 10).with_journal(&path);
        {
            let chain = MedChain::open(config.clone()).unwrap();
            create_batch(&chain);
        }

        let contents = fs::read_to_string(&path).unwrap();
        fs::write(&path, contents.replace("\"1000\"", "\"9000\"")).unwrap();
        assert!(matches!(
            MedChain::open(config),
            Err(SdkError::Ledger(LedgerError::Journal(_)))
        ));
    }

    #[test]
    fn in_memory_ignores_journal_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unused.jsonl");
        let chain = MedChain::in_memory(MedChainConfig::default().with_journal(&path)).unwrap();
        create_batch(&chain);
        assert!(!chain.is_persistent());
        assert!(!path.exists());
    }

    #[test]
    fn capped_blocks_split_on_seal() {
        let mut config = MedChainConfig::manual(0, 1);
        config.ledger = config.ledger.with_max_block_transactions(2);
        let chain = MedChain::in_memory(config).unwrap();
        for i in 0..5 {
            chain
                .submit_transaction(chain.draft("createDrugBatch", "m").with_field("batchId", format!("b{i}")))
                .unwrap();
        }
        let sealed = chain.seal_all().unwrap();
        let sizes: Vec<usize> = sealed.iter().map(|b| b.transaction_count()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(chain.get_world_state().unwrap().len(), 5);
    }

    #[test]
    fn torn_journal_tail_is_repaired_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medchain.jsonl");
        let config = MedChainConfig::manual(1_000, 10).with_journal(&path);
        {
            let chain = MedChain::open(config.clone()).unwrap();
            create_batch(&chain);
            update_status(&chain, "waiting");
        }
        let mut contents = fs::read(&path).unwrap();
        contents.extend_from_slice(br#"{"crc":1,"entry":{"index":3,"#);
        fs::write(&path, contents).unwrap();

        {
            let chain = MedChain::open(config.clone()).unwrap();
            assert_eq!(chain.height().unwrap(), 3);
            update_status(&chain, "success");
            update_status(&chain, "dispensed");
        }

        let reopened = MedChain::open(config).unwrap();
        assert_eq!(reopened.height().unwrap(), 5);
        assert!(reopened.verify().unwrap().is_valid());
        assert_eq!(
            reopened.world_state_entry("batch001").unwrap().unwrap().status().as_deref(),
            Some("dispensed")
        );
    }

    #[test]
    fn concurrent_commits_reopen_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medchain.jsonl");
        let config = MedChainConfig::manual(1_000, 10).with_journal(&path);
        let chain = MedChain::open(config.clone()).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let chain = &chain;
                scope.spawn(move || {
                    for i in 0..25 {
                        chain
                            .commit(
                                chain
                                    .draft("createDrugBatch", format!("worker-{worker}"))
                                    .with_field("batchId", format!("w{worker}-b{i}")),
                            )
                            .unwrap();
                    }
                });
            }
        });
        let height = chain.height().unwrap();
        let tip = chain.get_ledger().unwrap().latest().cloned().unwrap();
        drop(chain);

        let reopened = MedChain::open(config).unwrap();
        assert_eq!(reopened.height().unwrap(), height);
        assert_eq!(reopened.get_ledger().unwrap().latest().unwrap(), &tip);
        assert_eq!(reopened.get_world_state().unwrap().len(), 200);
        assert!(reopened.pending().unwrap().is_empty());
    }

    #[test]
    fn pending_transactions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medchain.jsonl");
        let config = MedChainConfig::manual(1_000, 10).with_journal(&path);
        let queued = {
            let chain = MedChain::open(config.clone()).unwrap();
            chain
                .submit_transaction(chain.draft("createDrugBatch", "m").with_field("batchId", "b1"))
                .unwrap()
        };

        {
            let chain = MedChain::open(config.clone()).unwrap();
            let pending = chain.pending().unwrap();
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].id, queued);
            let block = chain.seal().unwrap().unwrap();
            assert_eq!(block.index, 1);
        }

        let reopened = MedChain::open(config).unwrap();
        assert_eq!(reopened.height().unwrap(), 2);
        assert!(reopened.pending().unwrap().is_empty());
        assert!(reopened.find_transaction(&queued).unwrap().is_some());
    }

    #[test]
    fn lagging_journal_blocks_writes_until_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medchain.jsonl");
        let config = MedChainConfig::manual(1_000, 10).with_journal(&path);
        let chain = MedChain::open(config.clone()).unwrap();
        create_batch(&chain);

        // A block sealed past the facade never reaches the journal.
        chain
            .ledger()
            .submit_transaction(chain.draft("updateBatchStatus", "d").with_field("batchId", "batch001"))
            .unwrap();
        chain.ledger().seal().unwrap().unwrap();

        let err = chain
            .commit(chain.draft("updateBatchStatus", "d").with_field("batchId", "batch001"))
            .unwrap_err();
        assert!(matches!(err, SdkError::JournalBehind { ledger: 3, journal: 2 }));
        assert_eq!(chain.height().unwrap(), 3);

        chain.rebuild().unwrap();
        chain.seal_all().unwrap();
        assert_eq!(chain.height().unwrap(), 4);
        drop(chain);

        let reopened = MedChain::open(config).unwrap();
        assert_eq!(reopened.height().unwrap(), 4);
        assert!(reopened.verify().unwrap().is_valid());
    }
}

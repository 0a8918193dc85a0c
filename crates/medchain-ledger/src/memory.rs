use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use medchain_crypto::MerkleProof;
use medchain_types::LedgerClock;

use crate::builder::BlockBuilder;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::records::{Block, LedgerSnapshot, Transaction, TransactionDraft};
use crate::traits::{LedgerReader, LedgerWriter};
use crate::validation::{ChainValidator, ValidationReport};

/// In-memory MedChain ledger for tests, local demos, and embedding.
///
/// A single writer appends under the write lock, so index assignment and
/// previous-fingerprint linkage happen atomically. Blocks are stored behind
/// `Arc` and never mutated; readers take a [`LedgerSnapshot`] of the
/// appended prefix.
pub struct InMemoryLedger {
    config: LedgerConfig,
    clock: LedgerClock,
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    blocks: Vec<Arc<Block>>,
    pending: Vec<Transaction>,
    /// tx id -> (block index, position in block)
    tx_index: HashMap<String, (u64, usize)>,
    counter: u64,
}

impl LedgerState {
    fn contains_id(&self, id: &str) -> bool {
        self.tx_index.contains_key(id) || self.pending.iter().any(|tx| tx.id == id)
    }
}

impl InMemoryLedger {
    /// A ledger holding only its genesis block.
    pub fn new(config: LedgerConfig) -> Self {
        let ledger = Self::uninitialized(config);
        let genesis = Arc::new(BlockBuilder::genesis(&ledger.config.genesis_marker));
        ledger
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .blocks
            .push(genesis);
        ledger
    }

    /// A ledger with no genesis block. Appends fail with
    /// [`LedgerError::EmptyLedger`] until [`init_genesis`](Self::init_genesis).
    pub fn uninitialized(config: LedgerConfig) -> Self {
        let clock = LedgerClock::new(config.clock.clone());
        Self {
            config,
            clock,
            inner: RwLock::new(LedgerState::default()),
        }
    }

    /// Restore a ledger from previously appended blocks after validating the
    /// whole chain.
    pub fn from_blocks(config: LedgerConfig, blocks: Vec<Block>) -> Result<Self, LedgerError> {
        let blocks: Vec<Arc<Block>> = blocks.into_iter().map(Arc::new).collect();
        ChainValidator::new(&config.genesis_marker)
            .validate(&blocks)
            .into_result()?;

        let ledger = Self::uninitialized(config);
        let mut state = ledger.write_state()?;
        for block in &blocks {
            for (position, tx) in block.transactions.iter().enumerate() {
                if state
                    .tx_index
                    .insert(tx.id.clone(), (block.index, position))
                    .is_some()
                {
                    return Err(LedgerError::DuplicateTransaction(tx.id.clone()));
                }
                ledger.clock.observe(tx.timestamp);
            }
            ledger.clock.observe(block.timestamp);
        }
        state.counter = state.tx_index.len() as u64;
        state.blocks = blocks;
        tracing::info!(height = state.blocks.len(), "ledger restored");
        drop(state);
        Ok(ledger)
    }

    /// Create the genesis block if absent. Returns the genesis block.
    pub fn init_genesis(&self) -> Result<Arc<Block>, LedgerError> {
        let mut state = self.write_state()?;
        if let Some(genesis) = state.blocks.first() {
            return Ok(Arc::clone(genesis));
        }
        let genesis = Arc::new(BlockBuilder::genesis(&self.config.genesis_marker));
        state.blocks.push(Arc::clone(&genesis));
        tracing::info!(fingerprint = %genesis.fingerprint, "genesis block created");
        Ok(genesis)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn clock(&self) -> &LedgerClock {
        &self.clock
    }

    /// Transactions submitted but not yet sealed, in submission order.
    pub fn pending(&self) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.read_state()?.pending.clone())
    }

    /// Validate and queue a draft. Returns the queued transaction.
    pub fn submit(&self, draft: TransactionDraft) -> Result<Transaction, LedgerError> {
        let mut state = self.write_state()?;
        let tx = self.prepare(&mut state, draft)?;
        tracing::debug!(tx_id = %tx.id, function = %tx.function, "transaction submitted");
        state.pending.push(tx.clone());
        Ok(tx)
    }

    /// Re-queue transactions submitted before a restart. Ones already sealed
    /// or already pending are skipped. Returns the number queued.
    pub fn restore_pending(&self, transactions: Vec<Transaction>) -> Result<usize, LedgerError> {
        let mut state = self.write_state()?;
        let mut restored = 0;
        for tx in transactions {
            tx.validate()?;
            if state.contains_id(&tx.id) {
                tracing::debug!(tx_id = %tx.id, "pending transaction already known; skipping");
                continue;
            }
            self.clock.observe(tx.timestamp);
            state.counter += 1;
            state.pending.push(tx);
            restored += 1;
        }
        if restored > 0 {
            tracing::info!(restored, "pending transactions restored");
        }
        Ok(restored)
    }

    /// Full integrity scan. O(n) in ledger length.
    pub fn verify(&self) -> Result<ValidationReport, LedgerError> {
        let snapshot = self.snapshot()?;
        Ok(ChainValidator::new(&self.config.genesis_marker).validate(snapshot.blocks()))
    }

    /// Integrity scan restricted to the blocks whose index falls in `range`.
    pub fn verify_range(&self, range: RangeInclusive<u64>) -> Result<ValidationReport, LedgerError> {
        let snapshot = self.snapshot()?;
        Ok(ChainValidator::new(&self.config.genesis_marker).validate_range(snapshot.blocks(), range))
    }

    /// Full scan that fails with [`LedgerError::ChainIntegrityViolation`] at
    /// the first offending block.
    pub fn ensure_valid(&self) -> Result<(), LedgerError> {
        self.verify()?.into_result()
    }

    /// Merkle inclusion proof for a sealed transaction.
    pub fn inclusion_proof(&self, tx_id: &str) -> Result<Option<MerkleProof>, LedgerError> {
        let state = self.read_state()?;
        let Some(&(index, position)) = state.tx_index.get(tx_id) else {
            return Ok(None);
        };
        let Some(block) = state.blocks.get(index as usize) else {
            return Ok(None);
        };
        Ok(BlockBuilder::merkle_tree(&block.transactions).proof(position))
    }

    /// Drop every block after genesis and every pending transaction.
    pub fn reset(&self) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        state.blocks.truncate(1);
        state.pending.clear();
        state.tx_index.clear();
        tracing::info!("ledger reset to genesis");
        Ok(())
    }

    fn prepare(&self, state: &mut LedgerState, draft: TransactionDraft) -> Result<Transaction, LedgerError> {
        draft.validate()?;
        state.counter += 1;
        let id = draft.derive_id(state.counter)?;
        if state.contains_id(&id) {
            return Err(LedgerError::DuplicateTransaction(id));
        }
        Ok(draft.into_transaction(id, self.clock.tick()))
    }

    fn append_locked(
        &self,
        state: &mut LedgerState,
        transactions: Vec<Transaction>,
    ) -> Result<Arc<Block>, LedgerError> {
        let prev = state.blocks.last().ok_or(LedgerError::EmptyLedger)?;
        let index = state.blocks.len() as u64;
        if prev.index + 1 != index {
            return Err(LedgerError::InvalidIndex {
                expected: prev.index + 1,
                got: index,
            });
        }
        let prev_fingerprint = prev.fingerprint;

        {
            let mut batch_ids = HashSet::new();
            for tx in &transactions {
                tx.validate()?;
                if state.tx_index.contains_key(&tx.id) || !batch_ids.insert(tx.id.as_str()) {
                    return Err(LedgerError::DuplicateTransaction(tx.id.clone()));
                }
            }
        }
        for tx in &transactions {
            self.clock.observe(tx.timestamp);
        }

        let block = Arc::new(BlockBuilder::build_block(
            index,
            self.clock.tick(),
            prev_fingerprint,
            transactions,
        )?);
        for (position, tx) in block.transactions.iter().enumerate() {
            state.tx_index.insert(tx.id.clone(), (index, position));
        }
        state.blocks.push(Arc::clone(&block));

        tracing::debug!(
            index,
            transactions = block.transactions.len(),
            fingerprint = %block.fingerprint.short_hex(),
            "block appended"
        );
        Ok(block)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let height = self.height().unwrap_or_default();
        f.debug_struct("InMemoryLedger")
            .field("config", &self.config)
            .field("height", &height)
            .finish()
    }
}

impl LedgerWriter for InMemoryLedger {
    fn submit_transaction(&self, draft: TransactionDraft) -> Result<String, LedgerError> {
        Ok(self.submit(draft)?.id)
    }

    fn seal(&self) -> Result<Option<Arc<Block>>, LedgerError> {
        let mut state = self.write_state()?;
        if state.blocks.is_empty() {
            return Err(LedgerError::EmptyLedger);
        }
        if state.pending.is_empty() {
            return Ok(None);
        }

        let take = match self.config.max_block_transactions {
            0 => state.pending.len(),
            max => max.min(state.pending.len()),
        };
        let batch = state.pending[..take].to_vec();
        let block = self.append_locked(&mut state, batch)?;
        state.pending.drain(..take);
        Ok(Some(block))
    }

    fn append(&self, transactions: Vec<Transaction>) -> Result<Arc<Block>, LedgerError> {
        let mut state = self.write_state()?;
        self.append_locked(&mut state, transactions)
    }
}

impl LedgerReader for InMemoryLedger {
    fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        Ok(LedgerSnapshot::new(self.read_state()?.blocks.clone()))
    }

    fn height(&self) -> Result<u64, LedgerError> {
        Ok(self.read_state()?.blocks.len() as u64)
    }

    fn block(&self, index: u64) -> Result<Option<Arc<Block>>, LedgerError> {
        Ok(self.read_state()?.blocks.get(index as usize).cloned())
    }

    fn latest_block(&self) -> Result<Option<Arc<Block>>, LedgerError> {
        Ok(self.read_state()?.blocks.last().cloned())
    }

    fn find_transaction(&self, id: &str) -> Result<Option<(u64, Transaction)>, LedgerError> {
        let state = self.read_state()?;
        let Some(&(index, position)) = state.tx_index.get(id) else {
            return Ok(None);
        };
        Ok(state
            .blocks
            .get(index as usize)
            .and_then(|block| block.transactions.get(position))
            .map(|tx| (index, tx.clone())))
    }
}

use crate::crypto::{hash_value, HexDigest};
use crate::error::LedgerError;
use crate::miner::{Sealer, GENESIS_PROOF};
use crate::persistence::{InMemoryPersistence, JsonFilePersistence, Persistence};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::validation::{audit_chain, validate_linkage, ChainAudit};

/// Application-defined block payload. The ledger never interprets its keys.
pub type Payload = Map<String, Value>;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_MESSAGE: &str = "Genesis Block";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub data: Payload,
    pub previous_hash: HexDigest,
    pub hash: HexDigest,
    pub proof: u64,
}

impl Block {
    /// Builds a block and seals it with its own hash.
    pub fn new(index: u64, timestamp: f64, data: Payload, previous_hash: HexDigest, proof: u64) -> Self {
        let mut block = Block {
            index,
            timestamp,
            data,
            previous_hash,
            hash: String::new(),
            proof,
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn genesis(timestamp: f64) -> Self {
        let mut data = Payload::new();
        data.insert("message".to_string(), Value::String(GENESIS_MESSAGE.to_string()));
        Block::new(1, timestamp, data, GENESIS_PREVIOUS_HASH.to_string(), GENESIS_PROOF)
    }

    /// Hash over every field except `hash` itself.
    pub fn compute_hash(&self) -> HexDigest {
        hash_value(&json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "data": self.data,
            "previous_hash": self.previous_hash,
            "proof": self.proof,
        }))
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// String field of the payload, if present and a string.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Converts an arbitrary JSON document into a block payload.
pub fn payload_from_value(value: Value) -> Result<Payload, LedgerError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(LedgerError::InvalidPayload(format!(
            "block data must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Ledger handle shared by the API layer and the resolver.
pub type SharedLedger = Arc<tokio::sync::RwLock<Ledger>>;

/// How many times [`append_shared`] re-seals after losing the tip to another writer.
pub const MAX_SEAL_ATTEMPTS: usize = 5;

/// The block a new block has to build on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTip {
    /// Index the next block will take.
    pub next_index: u64,
    pub proof: u64,
    /// Fresh hash of the last block.
    pub hash: HexDigest,
}

pub struct Ledger {
    blocks: Vec<Block>,
    sealer: Sealer,
    persistence: Box<dyn Persistence>,
    path: Option<PathBuf>,
}

impl Ledger {
    /// Opens the JSON ledger at `path`, creating it with a genesis block when absent.
    pub fn open(path: impl Into<PathBuf>, difficulty: usize) -> Result<Self, LedgerError> {
        let path = path.into();
        let persistence = JsonFilePersistence::open(&path)?;
        let mut ledger = Self::with_persistence(Box::new(persistence), difficulty)?;
        ledger.path = Some(path);
        Ok(ledger)
    }

    /// Create a new `Ledger` using an in-memory persistence backend.
    pub fn in_memory(difficulty: usize) -> Result<Self, LedgerError> {
        Self::with_persistence(Box::new(InMemoryPersistence::new()), difficulty)
    }

    /// Create a new `Ledger` with the provided persistence backend.
    pub fn with_persistence(
        persistence: Box<dyn Persistence>,
        difficulty: usize,
    ) -> Result<Self, LedgerError> {
        let sealer = Sealer::new(difficulty);
        let blocks = match persistence.load()? {
            Some(blocks) => {
                info!(store = %persistence.describe(), blocks = blocks.len(), "ledger loaded");
                blocks
            }
            None => {
                let genesis = Block::genesis(now_timestamp());
                persistence.save(std::slice::from_ref(&genesis))?;
                info!(store = %persistence.describe(), hash = %genesis.hash, "ledger initialised with genesis block");
                vec![genesis]
            }
        };

        Ok(Ledger {
            blocks,
            sealer,
            persistence,
            path: None,
        })
    }

    pub fn into_shared(self) -> SharedLedger {
        Arc::new(tokio::sync::RwLock::new(self))
    }

    pub fn tip(&self) -> Result<ChainTip, LedgerError> {
        let last = self
            .blocks
            .last()
            .ok_or_else(|| LedgerError::Corruption("ledger has no genesis block".to_string()))?;
        Ok(ChainTip {
            next_index: self.blocks.len() as u64 + 1,
            proof: last.proof,
            hash: last.compute_hash(),
        })
    }

    /// Reloads, seals `payload` into the next block and rewrites the backing store.
    /// The in-memory chain only grows once the store accepted the new state.
    pub fn append(&mut self, payload: Payload) -> Result<Block, LedgerError> {
        self.reload();
        let tip = self.tip()?;
        let proof = self.sealer.seal(tip.proof);
        self.commit(&tip, payload, proof)
    }

    /// Pushes a block sealed against `tip`. Fails with `Conflict` when the
    /// chain no longer ends at `tip`, and with the store's error when the save
    /// fails; either way the chain is left as it was.
    pub fn commit(&mut self, tip: &ChainTip, payload: Payload, proof: u64) -> Result<Block, LedgerError> {
        if self.tip()? != *tip {
            return Err(LedgerError::Conflict(format!(
                "chain tip moved past block {} while sealing",
                tip.next_index - 1
            )));
        }
        if !self.sealer.verify(tip.proof, proof) {
            return Err(LedgerError::InvalidPayload(format!(
                "proof {} does not satisfy difficulty {}",
                proof,
                self.sealer.difficulty()
            )));
        }

        let block = Block::new(tip.next_index, now_timestamp(), payload, tip.hash.clone(), proof);

        self.blocks.push(block.clone());
        if let Err(e) = self.persistence.save(&self.blocks) {
            self.blocks.pop();
            return Err(e);
        }

        info!(index = block.index, hash = %block.hash, proof, "block appended");
        Ok(block)
    }

    /// Re-reads the backing store and replaces the in-memory chain wholesale.
    ///
    /// Any read or parse failure leaves the current chain untouched and returns
    /// `None`; on success the new length is returned.
    pub fn reload(&mut self) -> Option<usize> {
        match self.persistence.load() {
            Ok(Some(blocks)) => {
                self.blocks = blocks;
                Some(self.blocks.len())
            }
            Ok(None) => {
                warn!(store = %self.persistence.describe(), "ledger store vanished; keeping in-memory chain");
                None
            }
            Err(e) => {
                warn!(store = %self.persistence.describe(), error = %e, "ledger reload failed; keeping in-memory chain");
                None
            }
        }
    }

    /// Linkage check: every block's `previous_hash` equals a fresh hash of its predecessor.
    pub fn validate(&self) -> bool {
        validate_linkage(&self.blocks)
    }

    /// Stricter check covering genesis shape, indices, self-hashes and proofs.
    pub fn audit(&self) -> ChainAudit {
        audit_chain(&self.blocks, &self.sealer)
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn find_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    pub fn sealer(&self) -> Sealer {
        self.sealer
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Appends through a shared handle without holding the lock during the proof
/// search. The tip is read under a short write lock, the proof is sealed on a
/// blocking thread, and the block is committed only if the tip is unchanged.
pub async fn append_shared(ledger: &SharedLedger, payload: Payload) -> Result<Block, LedgerError> {
    for attempt in 1..=MAX_SEAL_ATTEMPTS {
        let (tip, sealer) = {
            let mut guard = ledger.write().await;
            guard.reload();
            (guard.tip()?, guard.sealer())
        };

        let previous_proof = tip.proof;
        let proof = tokio::task::spawn_blocking(move || sealer.seal(previous_proof))
            .await
            .map_err(|e| LedgerError::Storage(format!("Seal task failed: {}", e)))?;

        let mut guard = ledger.write().await;
        guard.reload();
        if guard.tip()? == tip {
            return guard.commit(&tip, payload, proof);
        }
        debug!(attempt, index = tip.next_index, "chain tip moved while sealing; resealing");
    }

    Err(LedgerError::Conflict(format!(
        "gave up after {} sealing attempts",
        MAX_SEAL_ATTEMPTS
    )))
}

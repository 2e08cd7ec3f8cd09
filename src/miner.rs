//! Proof-of-work sealing
//!
//! A new proof is the smallest positive integer `p` such that the SHA-256 of the
//! decimal text of `p² − previous²` starts with `difficulty` zero hex characters.
//! The search is deterministic, so any validator replaying it from the same
//! previous proof lands on the same value. It has no iteration cap.

use crate::crypto::sha256_hex;
use tracing::debug;

pub const DEFAULT_DIFFICULTY: usize = 4;

/// Proof value stored in the genesis block.
pub const GENESIS_PROOF: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sealer {
    difficulty: usize,
}

impl Default for Sealer {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl Sealer {
    /// `difficulty` is clamped to the digest width (64 hex characters).
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty: difficulty.min(64),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Searches for the proof following `previous_proof`.
    pub fn seal(&self, previous_proof: u64) -> u64 {
        let mut proof: u64 = 1;
        while !self.verify(previous_proof, proof) {
            proof += 1;
        }
        debug!(previous_proof, proof, difficulty = self.difficulty, "proof sealed");
        proof
    }

    /// Whether `proof` satisfies the difficulty predicate relative to `previous_proof`.
    pub fn verify(&self, previous_proof: u64, proof: u64) -> bool {
        let digest = sha256_hex(guess(proof, previous_proof).as_bytes());
        digest.bytes().take(self.difficulty).all(|b| b == b'0')
    }
}

/// Decimal text of `proof² − previous_proof²`.
pub fn guess(proof: u64, previous_proof: u64) -> String {
    let p = proof as i128;
    let q = previous_proof as i128;
    (p * p - q * q).to_string()
}

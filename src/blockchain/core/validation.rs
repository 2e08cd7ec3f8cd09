use crate::miner::{Sealer, GENESIS_PROOF};
use serde::Serialize;

use super::chain::{Block, GENESIS_PREVIOUS_HASH};

/// Returns `false` on the first block whose `previous_hash` differs from a
/// fresh hash of its predecessor. Proofs and self-hashes are not examined.
pub fn validate_linkage(blocks: &[Block]) -> bool {
    blocks
        .windows(2)
        .all(|pair| pair[1].previous_hash == pair[0].compute_hash())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditIssue {
    MalformedGenesis,
    IndexGap { expected: u64, found: u64 },
    BrokenLink,
    HashMismatch { stored: String, computed: String },
    InvalidProof { previous_proof: u64, proof: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFailure {
    pub index: u64,
    pub issue: AuditIssue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainAudit {
    pub valid: bool,
    pub blocks: usize,
    pub difficulty: usize,
    pub failure: Option<AuditFailure>,
}

/// Full structural audit of a chain. Stops at the first failing block.
pub fn audit_chain(blocks: &[Block], sealer: &Sealer) -> ChainAudit {
    let failure = first_failure(blocks, sealer);
    ChainAudit {
        valid: failure.is_none(),
        blocks: blocks.len(),
        difficulty: sealer.difficulty(),
        failure,
    }
}

fn first_failure(blocks: &[Block], sealer: &Sealer) -> Option<AuditFailure> {
    let genesis = blocks.first()?;
    if genesis.index != 1
        || genesis.previous_hash != GENESIS_PREVIOUS_HASH
        || genesis.proof != GENESIS_PROOF
    {
        return Some(AuditFailure {
            index: genesis.index,
            issue: AuditIssue::MalformedGenesis,
        });
    }

    for (position, block) in blocks.iter().enumerate() {
        let expected = position as u64 + 1;
        if block.index != expected {
            return Some(AuditFailure {
                index: block.index,
                issue: AuditIssue::IndexGap {
                    expected,
                    found: block.index,
                },
            });
        }

        let computed = block.compute_hash();
        if block.hash != computed {
            return Some(AuditFailure {
                index: block.index,
                issue: AuditIssue::HashMismatch {
                    stored: block.hash.clone(),
                    computed,
                },
            });
        }

        if position == 0 {
            continue;
        }
        let previous = &blocks[position - 1];
        if block.previous_hash != previous.compute_hash() {
            return Some(AuditFailure {
                index: block.index,
                issue: AuditIssue::BrokenLink,
            });
        }
        if !sealer.verify(previous.proof, block.proof) {
            return Some(AuditFailure {
                index: block.index,
                issue: AuditIssue::InvalidProof {
                    previous_proof: previous.proof,
                    proof: block.proof,
                },
            });
        }
    }
    None
}

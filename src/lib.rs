//! PressLedger - a tamper-evident ledger of published articles
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Ledger
//! - [`blockchain`] - Blocks, the append-only ledger and chain validation
//! - [`miner`] - Proof-of-work sealing
//! - [`crypto`] - Canonical hashing (SHA-256)
//! - [`persistence`] - Storage backends (atomic JSON file, in-memory)
//!
//! ## Read Path
//! - [`gateway`] - Sequential content gateway fetching
//! - [`card`] - Card mapping from content objects or block payloads
//! - [`resolver`] - Newest-first card resolution over the ledger
//!
//! ## Integration
//! - [`api`] - HTTP API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger
// ============================================================================
pub mod blockchain;
pub mod crypto;
pub mod miner;
pub mod persistence;

// ============================================================================
// Read Path
// ============================================================================
pub mod card;
pub mod gateway;
pub mod resolver;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

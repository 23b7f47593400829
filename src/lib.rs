//! naivechain - a minimal proof-of-work block format and chain validator
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Blockchain
//! - [`blockchain`] - Block format, wire codec, chain storage and validation
//! - [`transaction`] - Transaction data shape
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work evaluation and cancellable nonce search
//!
//! ## Cryptography
//! - [`crypto`] - Block ownership signatures (ECDSA P-256)
//!
//! ## Node
//! - [`node`] - Lifecycle state machine, gossip topics and block production
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Blockchain
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Node
// ============================================================================
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

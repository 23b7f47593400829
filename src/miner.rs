//! Proof-of-work evaluation and nonce search.
//!
//! A block satisfies difficulty `d` when its content hash, read as a
//! big-endian 256-bit number, starts with at least `d` zero bits. Nonces are
//! drawn as the SHA-256 of fresh OS randomness, so the search has no ordering
//! and no upper bound on attempts; callers that need to give up pass a
//! [`CancelToken`].

use crate::blockchain::{Block, Sha256Hash};
use crate::error::ChainError;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Bytes of randomness hashed into each candidate nonce.
pub const NONCE_ENTROPY_SIZE: usize = 512;

/// Counts zero bits from the most significant bit of `digest` up to the first set bit.
pub fn leading_zero_bits(digest: &Sha256Hash) -> u32 {
    let mut count = 0;
    for byte in digest {
        count += byte.leading_zeros();
        if *byte != 0 {
            break;
        }
    }
    count
}

/// Returns true when the block's content hash meets `difficulty`.
pub fn is_valid(block: &Block, difficulty: u32) -> bool {
    let hash = block.hash();
    let zeros = leading_zero_bits(&hash);
    trace!("{} ---> c={}", hex::encode(hash), zeros);
    zeros >= difficulty
}

/// Shared flag used to abandon a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

fn next_nonce(buf: &mut [u8; NONCE_ENTROPY_SIZE]) -> Result<Sha256Hash, ChainError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| ChainError::Randomness(e.to_string()))?;
    Ok(Sha256::digest(&buf[..]).into())
}

fn search(
    block: Block,
    difficulty: u32,
    cancel: Option<&CancelToken>,
) -> Result<Block, ChainError> {
    let mut block = block;
    let mut buf = [0u8; NONCE_ENTROPY_SIZE];
    let mut attempts: u64 = 0;
    let started = Instant::now();

    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            info!(attempts, difficulty, "proof-of-work search cancelled");
            return Err(ChainError::MiningCancelled);
        }

        block.header.nonce = next_nonce(&mut buf)?;
        attempts += 1;

        if is_valid(&block, difficulty) {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            debug!(
                attempts,
                difficulty,
                elapsed_ms,
                hash = %block.hash_str(),
                "proof-of-work found"
            );
            return Ok(block);
        }
    }
}

/// Searches nonces until the block meets `difficulty`.
///
/// Only a failing randomness source ends the search without success.
pub fn search_proof_of_work(block: Block, difficulty: u32) -> Result<Block, ChainError> {
    search(block, difficulty, None)
}

/// Like [`search_proof_of_work`], checking `cancel` once per attempt.
pub fn search_proof_of_work_cancellable(
    block: Block,
    difficulty: u32,
    cancel: &CancelToken,
) -> Result<Block, ChainError> {
    search(block, difficulty, Some(cancel))
}

/// Runs a cancellable search on the blocking thread pool.
pub async fn mine_block(
    block: Block,
    difficulty: u32,
    cancel: CancelToken,
) -> Result<Block, ChainError> {
    tokio::task::spawn_blocking(move || {
        search_proof_of_work_cancellable(block, difficulty, &cancel)
    })
    .await
    .map_err(|e| ChainError::Node(format!("mining task failed: {}", e)))?
}

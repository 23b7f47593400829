use crate::miner::{is_valid, leading_zero_bits};
use tracing::debug;

use super::block::{Block, GENESIS_PREV};

/// What chain validation checks beyond hash linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// When set, every block must also satisfy this proof-of-work difficulty.
    pub difficulty: Option<u32>,
}

impl ValidationPolicy {
    /// Linkage only, as blocks were originally checked.
    pub fn linkage_only() -> Self {
        Self { difficulty: None }
    }

    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty: Some(difficulty),
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::with_difficulty(crate::blockchain::PROOF_OF_WORK_DIFFICULTY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// `prev` does not match the content hash of the preceding block.
    BrokenLinkage,
    /// Content hash has fewer leading zero bits than required.
    InsufficientWork { required: u32, actual: u32 },
    /// Raw bytes did not decode into a block.
    Malformed(String),
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidReason::BrokenLinkage => write!(f, "previous hash mismatch"),
            InvalidReason::InsufficientWork { required, actual } => write!(
                f,
                "insufficient proof of work: {} leading zero bits, {} required",
                actual, required
            ),
            InvalidReason::Malformed(msg) => write!(f, "malformed block: {}", msg),
        }
    }
}

/// Outcome of a chain scan. Invalid chains are an expected result, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerdict {
    Valid,
    Invalid { index: usize, reason: InvalidReason },
}

impl ChainVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, ChainVerdict::Valid)
    }

    /// Index of the first block that failed, if any.
    pub fn first_invalid(&self) -> Option<usize> {
        match self {
            ChainVerdict::Valid => None,
            ChainVerdict::Invalid { index, .. } => Some(*index),
        }
    }
}

/// Checks a single block against its expected predecessor hash.
///
/// `expected_prev` is `None` for the head of a sequence, whose `prev` is not checked.
pub fn check_block(
    block: &Block,
    expected_prev: Option<&[u8; 32]>,
    policy: &ValidationPolicy,
) -> Result<(), InvalidReason> {
    if let Some(expected) = expected_prev {
        if &block.header.prev != expected {
            return Err(InvalidReason::BrokenLinkage);
        }
    }

    if let Some(required) = policy.difficulty {
        if !is_valid(block, required) {
            return Err(InvalidReason::InsufficientWork {
                required,
                actual: leading_zero_bits(&block.hash()),
            });
        }
    }
    Ok(())
}

/// Walks `blocks` in order, failing fast on the first broken link or
/// (with a difficulty policy) the first block lacking proof-of-work.
/// An empty sequence is valid.
pub fn validate_chain(blocks: &[Block], policy: &ValidationPolicy) -> ChainVerdict {
    let mut expected_prev = GENESIS_PREV;

    for (index, block) in blocks.iter().enumerate() {
        let expected = if index == 0 { None } else { Some(&expected_prev) };
        if let Err(reason) = check_block(block, expected, policy) {
            debug!(index, %reason, "chain validation failed");
            return ChainVerdict::Invalid { index, reason };
        }
        expected_prev = block.hash();
    }

    ChainVerdict::Valid
}

/// Decodes and checks each frame in order. A frame that is not a
/// well-formed block makes the chain invalid at that position, unless an
/// earlier block already failed.
pub fn validate_encoded_chain<T: AsRef<[u8]>>(
    frames: &[T],
    policy: &ValidationPolicy,
) -> ChainVerdict {
    let mut expected_prev = GENESIS_PREV;

    for (index, frame) in frames.iter().enumerate() {
        let block = match Block::decode(frame.as_ref()) {
            Ok(block) => block,
            Err(e) => {
                debug!(index, error = %e, "chain validation failed to decode block");
                return ChainVerdict::Invalid {
                    index,
                    reason: InvalidReason::Malformed(e.to_string()),
                };
            }
        };
        let expected = if index == 0 { None } else { Some(&expected_prev) };
        if let Err(reason) = check_block(&block, expected, policy) {
            debug!(index, %reason, "chain validation failed");
            return ChainVerdict::Invalid { index, reason };
        }
        expected_prev = block.hash();
    }

    ChainVerdict::Valid
}

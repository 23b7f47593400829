use crate::error::ChainError;
use std::collections::HashMap;
use tracing::debug;

use super::block::{Block, Sha256Hash, GENESIS_PREV};
use super::validation::{check_block, validate_chain, ChainVerdict, ValidationPolicy};

/// Append-only, insertion-ordered sequence of blocks.
#[derive(Debug, Clone, Default)]
pub struct Blockchain {
    blocks: Vec<Block>,
    index: HashMap<Sha256Hash, usize>,
}

impl Blockchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends without any checks. The chain may become invalid.
    pub fn append(&mut self, block: Block) {
        // A repeated block keeps its first position in the index.
        self.index.entry(block.hash()).or_insert(self.blocks.len());
        self.blocks.push(block);
    }

    /// Appends `block` only if it links to the current tip and satisfies `policy`.
    ///
    /// The first block of an empty chain must carry the all-zero `prev`.
    pub fn try_append(
        &mut self,
        block: Block,
        policy: &ValidationPolicy,
    ) -> Result<(), ChainError> {
        let height = self.blocks.len();
        let tip = self.tip_hash();

        check_block(&block, Some(&tip), policy).map_err(|reason| ChainError::InvalidChain {
            index: height,
            reason: reason.to_string(),
        })?;

        debug!(height, hash = %block.hash_str(), "appending block");
        self.append(block);
        Ok(())
    }

    /// Content hash of the last block, or the genesis `prev` for an empty chain.
    pub fn tip_hash(&self) -> Sha256Hash {
        self.blocks.last().map_or(GENESIS_PREV, Block::hash)
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn get_by_hash(&self, hash: &Sha256Hash) -> Option<&Block> {
        self.index.get(hash).map(|i| &self.blocks[*i])
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

    pub fn validate(&self, policy: &ValidationPolicy) -> ChainVerdict {
        validate_chain(&self.blocks, policy)
    }

    pub fn is_valid(&self, policy: &ValidationPolicy) -> bool {
        self.validate(policy).is_valid()
    }
}

//! Fixed-width wire format.
//!
//! A block is the concatenation of `prev`, `nonce`, `root` and `owner` with no
//! framing. A signed block appends a one-byte signature length and a
//! zero-padded signature slot so that every frame has the same size.

use crate::error::ChainError;

use super::block::{
    Block, BlockSignature, Header, SignedBlock, BLOCK_SIZE, HASH_SIZE, MAX_SIGNATURE_SIZE,
    OWNER_SIZE,
};

const PREV_OFFSET: usize = 0;
const NONCE_OFFSET: usize = PREV_OFFSET + HASH_SIZE;
const ROOT_OFFSET: usize = NONCE_OFFSET + HASH_SIZE;
const OWNER_OFFSET: usize = ROOT_OFFSET + HASH_SIZE;

/// Size of an encoded [`SignedBlock`].
pub const SIGNED_BLOCK_SIZE: usize = BLOCK_SIZE + 1 + MAX_SIGNATURE_SIZE;

fn check_length(data: &[u8], expected: usize) -> Result<(), ChainError> {
    if data.len() < expected {
        return Err(ChainError::TruncatedInput {
            expected,
            actual: data.len(),
        });
    }
    if data.len() > expected {
        return Err(ChainError::TrailingData {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn read_hash(data: &[u8], offset: usize) -> [u8; HASH_SIZE] {
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&data[offset..offset + HASH_SIZE]);
    out
}

impl Block {
    /// Encodes the block into its canonical 187-byte image.
    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut out = [0u8; BLOCK_SIZE];
        out[PREV_OFFSET..NONCE_OFFSET].copy_from_slice(&self.header.prev);
        out[NONCE_OFFSET..ROOT_OFFSET].copy_from_slice(&self.header.nonce);
        out[ROOT_OFFSET..OWNER_OFFSET].copy_from_slice(&self.header.root);
        out[OWNER_OFFSET..].copy_from_slice(&self.owner);
        out
    }

    /// Decodes exactly one block. Short input and trailing bytes are both rejected.
    pub fn decode(data: &[u8]) -> Result<Self, ChainError> {
        check_length(data, BLOCK_SIZE)?;

        let mut owner = [0u8; OWNER_SIZE];
        owner.copy_from_slice(&data[OWNER_OFFSET..BLOCK_SIZE]);

        Ok(Block {
            header: Header {
                prev: read_hash(data, PREV_OFFSET),
                nonce: read_hash(data, NONCE_OFFSET),
                root: read_hash(data, ROOT_OFFSET),
            },
            owner,
        })
    }
}

impl SignedBlock {
    pub fn encode(&self) -> [u8; SIGNED_BLOCK_SIZE] {
        let mut out = [0u8; SIGNED_BLOCK_SIZE];
        out[..BLOCK_SIZE].copy_from_slice(&self.block.encode());

        let sig = self.signature.as_bytes();
        // BlockSignature guarantees len <= MAX_SIGNATURE_SIZE < 256.
        out[BLOCK_SIZE] = sig.len() as u8;
        out[BLOCK_SIZE + 1..BLOCK_SIZE + 1 + sig.len()].copy_from_slice(sig);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, ChainError> {
        check_length(data, SIGNED_BLOCK_SIZE)?;

        let block = Block::decode(&data[..BLOCK_SIZE])?;
        let sig_len = data[BLOCK_SIZE] as usize;
        if sig_len == 0 || sig_len > MAX_SIGNATURE_SIZE {
            return Err(ChainError::InvalidSignature(format!(
                "signature length {} outside 1..={}",
                sig_len, MAX_SIGNATURE_SIZE
            )));
        }

        let slot = &data[BLOCK_SIZE + 1..];
        if slot[sig_len..].iter().any(|b| *b != 0) {
            return Err(ChainError::InvalidSignature(
                "non-zero padding after signature".to_string(),
            ));
        }

        let signature = BlockSignature::from_der(&slot[..sig_len])?;
        Ok(SignedBlock { block, signature })
    }
}

use crate::error::ChainError;
use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

/// Size of every header field.
pub const HASH_SIZE: usize = 32;

/// Size of a PKIX (SubjectPublicKeyInfo) DER encoded, uncompressed P-256 public key.
pub const OWNER_SIZE: usize = 91;

/// Size of an encoded block: Prev + Nonce + Root + Owner.
pub const BLOCK_SIZE: usize = 3 * HASH_SIZE + OWNER_SIZE;

/// Reference proof-of-work difficulty in leading zero bits.
pub const PROOF_OF_WORK_DIFFICULTY: u32 = 9;

/// `Prev` value of the first block of every chain.
pub const GENESIS_PREV: Sha256Hash = [0u8; HASH_SIZE];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Header {
    /// Content hash of the predecessor block.
    pub prev: Sha256Hash,
    /// Proof-of-work search input.
    pub nonce: Sha256Hash,
    /// Transaction-set commitment slot. Stored and transported, never derived or checked.
    pub root: Sha256Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub header: Header,
    /// DER encoded public key of the block producer.
    pub owner: [u8; OWNER_SIZE],
}

impl Default for Block {
    fn default() -> Self {
        Block {
            header: Header::default(),
            owner: [0u8; OWNER_SIZE],
        }
    }
}

impl Block {
    /// Creates an unsigned, unmined block linked to `prev`.
    pub fn new(prev: Sha256Hash, root: Sha256Hash) -> Self {
        Block {
            header: Header {
                prev,
                nonce: [0u8; HASH_SIZE],
                root,
            },
            owner: [0u8; OWNER_SIZE],
        }
    }

    /// Content hash: SHA-256 over the canonical 187-byte encoding.
    pub fn hash(&self) -> Sha256Hash {
        Sha256::digest(self.encode()).into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn is_genesis(&self) -> bool {
        self.header.prev == GENESIS_PREV
    }
}

/// Largest ASN.1 DER encoding of a P-256 ECDSA signature.
pub const MAX_SIGNATURE_SIZE: usize = 72;

/// DER encoded ECDSA signature over a block's `Prev` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockSignature(Vec<u8>);

impl BlockSignature {
    pub fn from_der(bytes: &[u8]) -> Result<Self, ChainError> {
        if bytes.is_empty() || bytes.len() > MAX_SIGNATURE_SIZE {
            return Err(ChainError::InvalidSignature(format!(
                "DER signature must be 1..={} bytes, got {}",
                MAX_SIGNATURE_SIZE,
                bytes.len()
            )));
        }
        Ok(BlockSignature(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A block together with its producer's signature.
///
/// The signature is kept beside the block rather than inside the hashed
/// image, so `header.prev` always holds the predecessor's content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBlock {
    pub block: Block,
    pub signature: BlockSignature,
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_NONCE: Sha256Hash = [
        26, 40, 18, 41, 246, 84, 101, 88, 229, 243, 242, 66, 210, 31, 237, 17, 78, 78, 6, 29, 111,
        30, 182, 10, 187, 101, 182, 53, 188, 21, 217, 201,
    ];

    #[test]
    fn test_block_size() {
        assert_eq!(BLOCK_SIZE, 187);
    }

    #[test]
    fn test_zero_block_hash_vector() {
        let block = Block::default();
        assert_eq!(
            block.hash_str(),
            "9708fd0c3a64591c024c02167f3b7cad1dcda62d1d41b6d0a27b96989b63864f"
        );
    }

    #[test]
    fn test_reference_block_hash_vector() {
        let block = Block {
            header: Header {
                prev: GENESIS_PREV,
                nonce: REFERENCE_NONCE,
                root: REFERENCE_NONCE,
            },
            owner: [0u8; OWNER_SIZE],
        };
        assert_eq!(
            block.hash_str(),
            "555b34911ed66648663c25693d74b60a870dc8535b2db40655bbd62f78c76157"
        );
    }

    #[test]
    fn test_hash_is_deterministic() {
        let hello: Sha256Hash = Sha256::digest(b"Hello world!").into();
        let block = Block {
            header: Header {
                prev: hello,
                nonce: hello,
                root: hello,
            },
            owner: [7u8; OWNER_SIZE],
        };
        assert_eq!(block.hash(), block.hash());
        let copy = block;
        assert_eq!(block.hash(), copy.hash());
    }

    #[test]
    fn test_hash_covers_every_field() {
        let base = Block::default();
        let base_hash = base.hash();

        let mut b = base;
        b.header.prev[31] = 1;
        assert_ne!(b.hash(), base_hash);

        let mut b = base;
        b.header.nonce[0] = 1;
        assert_ne!(b.hash(), base_hash);

        let mut b = base;
        b.header.root[5] = 1;
        assert_ne!(b.hash(), base_hash);

        let mut b = base;
        b.owner[90] = 1;
        assert_ne!(b.hash(), base_hash);
    }

    #[test]
    fn test_new_block_is_unmined_and_unowned() {
        let block = Block::new([3u8; 32], [4u8; 32]);
        assert_eq!(block.header.prev, [3u8; 32]);
        assert_eq!(block.header.root, [4u8; 32]);
        assert_eq!(block.header.nonce, [0u8; 32]);
        assert_eq!(block.owner, [0u8; OWNER_SIZE]);
        assert!(!block.is_genesis());
        assert!(Block::default().is_genesis());
    }
}

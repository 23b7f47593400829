//! Integration tests for block production, wire transfer and chain validation

use naivechain::blockchain::{
    validate_chain, validate_encoded_chain, Block, Blockchain, ChainVerdict, InvalidReason,
    SignedBlock, ValidationPolicy, BLOCK_SIZE, GENESIS_PREV,
};
use naivechain::crypto::{sign_block, verify_block_signature, KeyPair};
use naivechain::error::ChainError;
use naivechain::miner::{is_valid, search_proof_of_work};

const DIFFICULTY: u32 = 6;

/// Produces a block the way a node does: sign, then search.
fn produce(prev: [u8; 32], keypair: &KeyPair) -> Result<SignedBlock, ChainError> {
    let signed = sign_block(Block::new(prev, [0u8; 32]), keypair)?;
    let block = search_proof_of_work(signed.block, DIFFICULTY)?;
    Ok(SignedBlock {
        block,
        signature: signed.signature,
    })
}

#[test]
fn test_produced_chain_survives_the_wire() -> Result<(), Box<dyn std::error::Error>> {
    let keypair = KeyPair::generate();
    let policy = ValidationPolicy::with_difficulty(DIFFICULTY);

    let mut producer = Blockchain::new();
    let mut frames = Vec::new();
    for _ in 0..4 {
        let signed = produce(producer.tip_hash(), &keypair)?;
        producer.try_append(signed.block, &policy)?;
        frames.push(signed.encode().to_vec());
    }

    let mut receiver = Blockchain::new();
    for frame in &frames {
        let signed = SignedBlock::decode(frame)?;
        verify_block_signature(&signed)?;
        assert!(is_valid(&signed.block, DIFFICULTY));
        receiver.try_append(signed.block, &policy)?;
    }

    assert_eq!(receiver.blocks(), producer.blocks());
    assert!(receiver.is_valid(&policy));
    assert_eq!(receiver.blocks()[0].header.prev, GENESIS_PREV);
    Ok(())
}

#[test]
fn test_signing_after_search_breaks_proof_of_work() -> Result<(), Box<dyn std::error::Error>> {
    // Owner is part of the hashed image: stamping it late changes the hash.
    let keypair = KeyPair::generate();
    let mined = search_proof_of_work(Block::new(GENESIS_PREV, [0u8; 32]), 12)?;
    let signed = sign_block(mined, &keypair)?;
    assert_ne!(signed.block.hash(), mined.hash());
    assert_eq!(signed.block.header.nonce, mined.header.nonce);
    Ok(())
}

#[test]
fn test_tampered_block_is_detected() -> Result<(), Box<dyn std::error::Error>> {
    let keypair = KeyPair::generate();
    let first = produce(GENESIS_PREV, &keypair)?;
    let second = produce(first.block.hash(), &keypair)?;

    let mut blocks = vec![first.block, second.block];
    assert!(validate_chain(&blocks, &ValidationPolicy::linkage_only()).is_valid());

    blocks[0].header.root = [0xaa; 32];
    let verdict = validate_chain(&blocks, &ValidationPolicy::linkage_only());
    assert_eq!(
        verdict,
        ChainVerdict::Invalid {
            index: 1,
            reason: InvalidReason::BrokenLinkage
        }
    );
    Ok(())
}

#[test]
fn test_raw_frames_with_garbage_are_invalid() {
    let frames: Vec<Vec<u8>> = vec![vec![0u8; BLOCK_SIZE], vec![0u8; BLOCK_SIZE + 1]];
    let verdict = validate_encoded_chain(&frames, &ValidationPolicy::linkage_only());
    assert_eq!(verdict.first_invalid(), Some(1));

    let empty: Vec<Vec<u8>> = Vec::new();
    assert!(validate_encoded_chain(&empty, &ValidationPolicy::default()).is_valid());
}

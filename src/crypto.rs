//! Ownership signing for naivechain (ECDSA over P-256)

use crate::blockchain::{Block, BlockSignature, Sha256Hash, SignedBlock, OWNER_SIZE};
use crate::error::ChainError;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use std::fs;
use std::path::Path;
use tracing::info;

/// Anything able to stamp ownership on a block.
///
/// The public key must encode (PKIX DER) to exactly [`OWNER_SIZE`] bytes,
/// which pins the whole system to a single curve.
pub trait BlockSigner {
    /// PKIX (SubjectPublicKeyInfo) DER encoding of the public key.
    fn public_key_der(&self) -> Result<Vec<u8>, ChainError>;

    /// ASN.1 DER ECDSA signature over a 32-byte digest, used as-is.
    fn sign_prehash(&self, digest: &Sha256Hash) -> Result<Vec<u8>, ChainError>;
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        KeyPair {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn from_pkcs8_der(bytes: &[u8]) -> Result<Self, ChainError> {
        let signing_key = SigningKey::from_pkcs8_der(bytes)
            .map_err(|e| ChainError::InvalidKey(format!("Invalid PKCS#8 DER key: {}", e)))?;
        Ok(KeyPair { signing_key })
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, ChainError> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| ChainError::InvalidKey(format!("Invalid PKCS#8 PEM key: {}", e)))?;
        Ok(KeyPair { signing_key })
    }

    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, ChainError> {
        let doc = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| ChainError::InvalidKey(format!("Cannot encode private key: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    pub fn to_pkcs8_pem(&self) -> Result<String, ChainError> {
        let pem = self
            .signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| ChainError::InvalidKey(format!("Cannot encode private key: {}", e)))?;
        Ok(pem.as_str().to_owned())
    }

    /// Reads a PEM key from `path`, or generates one and writes it there.
    pub fn load_or_generate(path: &Path) -> Result<Self, ChainError> {
        if path.exists() {
            let pem = fs::read_to_string(path)?;
            return Self::from_pkcs8_pem(&pem);
        }

        let keypair = Self::generate();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, keypair.to_pkcs8_pem()?)?;
        info!("Generated new signing key at {}", path.display());
        Ok(keypair)
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The key as it appears in a block's `owner` field.
    pub fn owner_bytes(&self) -> Result<[u8; OWNER_SIZE], ChainError> {
        owner_from_der(&self.public_key_der()?)
    }
}

impl BlockSigner for KeyPair {
    fn public_key_der(&self) -> Result<Vec<u8>, ChainError> {
        let doc = self
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| ChainError::InvalidKey(format!("Cannot encode public key: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    fn sign_prehash(&self, digest: &Sha256Hash) -> Result<Vec<u8>, ChainError> {
        let signature: Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|e| ChainError::Signing(format!("Cannot sign previous block's hash: {}", e)))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }
}

fn owner_from_der(der: &[u8]) -> Result<[u8; OWNER_SIZE], ChainError> {
    der.try_into().map_err(|_| ChainError::KeyEncodingLength {
        expected: OWNER_SIZE,
        actual: der.len(),
    })
}

/// Signs the block's `prev` hash and records the signer's public key as owner.
///
/// `prev` and `nonce` are left untouched. `owner` is part of the content
/// hash, so blocks are signed before the proof-of-work search.
pub fn sign_block<S: BlockSigner>(block: Block, signer: &S) -> Result<SignedBlock, ChainError> {
    let owner = owner_from_der(&signer.public_key_der()?)?;
    let der = signer.sign_prehash(&block.header.prev)?;
    let signature = BlockSignature::from_der(&der)
        .map_err(|e| ChainError::Signing(format!("Unexpected signature encoding: {}", e)))?;

    let mut block = block;
    block.owner = owner;
    Ok(SignedBlock { block, signature })
}

/// Checks that the signature covers `prev` under the key stored in `owner`.
pub fn verify_block_signature(signed: &SignedBlock) -> Result<(), ChainError> {
    let verifying_key = VerifyingKey::from_public_key_der(&signed.block.owner)
        .map_err(|e| ChainError::InvalidKey(format!("Invalid owner key: {}", e)))?;
    let signature = Signature::from_der(signed.signature.as_bytes())
        .map_err(|e| ChainError::InvalidSignature(format!("Malformed DER signature: {}", e)))?;

    verifying_key
        .verify_prehash(&signed.block.header.prev, &signature)
        .map_err(|_| ChainError::InvalidSignature("Signature verification failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{GENESIS_PREV, MAX_SIGNATURE_SIZE};
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    fn test_hash() -> Sha256Hash {
        Sha256::digest(b"Hello world!").into()
    }

    struct ShortKeySigner;

    impl BlockSigner for ShortKeySigner {
        fn public_key_der(&self) -> Result<Vec<u8>, ChainError> {
            // Same length as a secp256k1 SubjectPublicKeyInfo.
            Ok(vec![0x30; 88])
        }

        fn sign_prehash(&self, _digest: &Sha256Hash) -> Result<Vec<u8>, ChainError> {
            Ok(vec![0x30, 0x00])
        }
    }

    struct BrokenSigner(KeyPair);

    impl BlockSigner for BrokenSigner {
        fn public_key_der(&self) -> Result<Vec<u8>, ChainError> {
            self.0.public_key_der()
        }

        fn sign_prehash(&self, _digest: &Sha256Hash) -> Result<Vec<u8>, ChainError> {
            Err(ChainError::Signing("device unavailable".to_string()))
        }
    }

    #[test]
    fn test_public_key_is_91_bytes() {
        let keypair = KeyPair::generate();
        let der = keypair.public_key_der().unwrap();
        assert_eq!(der.len(), OWNER_SIZE);
        // SEQUENCE, length 89
        assert_eq!(&der[..2], &[0x30, 0x59]);
        // Uncompressed point marker
        assert_eq!(der[OWNER_SIZE - 65], 0x04);
    }

    #[test]
    fn test_sign_sets_owner_and_keeps_linkage() {
        let keypair = KeyPair::generate();
        let mut block = Block::new(test_hash(), test_hash());
        block.header.nonce = test_hash();

        let signed = sign_block(block, &keypair).unwrap();
        assert_eq!(signed.block.header.prev, test_hash());
        assert_eq!(signed.block.header.nonce, test_hash());
        assert_eq!(signed.block.owner, keypair.owner_bytes().unwrap());
        assert!(signed.signature.len() <= MAX_SIGNATURE_SIZE);
        assert!(verify_block_signature(&signed).is_ok());
    }

    #[test]
    fn test_signature_survives_nonce_changes() {
        let keypair = KeyPair::generate();
        let mut signed = sign_block(Block::new(GENESIS_PREV, [0u8; 32]), &keypair).unwrap();
        signed.block.header.nonce = [0xab; 32];
        assert!(verify_block_signature(&signed).is_ok());
    }

    #[test]
    fn test_wrong_owner_fails_verification() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let mut signed = sign_block(Block::new(test_hash(), [0u8; 32]), &alice).unwrap();
        signed.block.owner = bob.owner_bytes().unwrap();

        let result = verify_block_signature(&signed);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Invalid signature: Signature verification failed"
        );
    }

    #[test]
    fn test_tampered_prev_fails_verification() {
        let keypair = KeyPair::generate();
        let mut signed = sign_block(Block::new(test_hash(), [0u8; 32]), &keypair).unwrap();
        signed.block.header.prev[0] ^= 0xff;
        assert!(verify_block_signature(&signed).is_err());
    }

    #[test]
    fn test_unowned_block_fails_verification() {
        let keypair = KeyPair::generate();
        let mut signed = sign_block(Block::default(), &keypair).unwrap();
        signed.block.owner = [0u8; OWNER_SIZE];
        assert!(matches!(
            verify_block_signature(&signed),
            Err(ChainError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_key_length_mismatch_is_rejected() {
        let block = Block::new(test_hash(), [0u8; 32]);
        let err = sign_block(block, &ShortKeySigner).unwrap_err();
        assert_eq!(
            err,
            ChainError::KeyEncodingLength {
                expected: OWNER_SIZE,
                actual: 88
            }
        );
    }

    #[test]
    fn test_signing_failure_is_surfaced() {
        let signer = BrokenSigner(KeyPair::generate());
        let err = sign_block(Block::default(), &signer).unwrap_err();
        assert!(matches!(err, ChainError::Signing(msg) if msg.contains("device unavailable")));
    }

    #[test]
    fn test_pkcs8_der_roundtrip() {
        let keypair = KeyPair::generate();
        let der = keypair.to_pkcs8_der().unwrap();
        let restored = KeyPair::from_pkcs8_der(&der).unwrap();
        assert_eq!(
            restored.owner_bytes().unwrap(),
            keypair.owner_bytes().unwrap()
        );
    }

    #[test]
    fn test_invalid_pkcs8_is_rejected() {
        let result = KeyPair::from_pkcs8_der(&[0u8; 16]);
        assert!(matches!(result, Err(ChainError::InvalidKey(_))));
    }

    #[test]
    fn test_load_or_generate_persists_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys").join("node.pem");

        let first = KeyPair::load_or_generate(&path).unwrap();
        assert!(path.exists());
        let second = KeyPair::load_or_generate(&path).unwrap();
        assert_eq!(first.owner_bytes().unwrap(), second.owner_bytes().unwrap());
    }
}

//! SecretVault - AEAD Encryption
//!
//! AES-256-GCM with associated data for chunks, plus the
//! encrypt-then-MAC block used for metadata.

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::keys::{generate_nonce, KeyPair, VaultKey, HMAC_LEN, NONCE_LEN, TAG_LEN};
use crate::error::{VaultError, VaultResult};

type HmacSha256 = Hmac<Sha256>;

// ═══════════════════════════════════════════════════════════════════════════
// AES-256-GCM
// ═══════════════════════════════════════════════════════════════════════════

/// AES-256-GCM keyed once and reused for every chunk of a stream
pub struct ChunkCipher {
    cipher: Aes256Gcm,
}

impl ChunkCipher {
    pub fn new(key: &VaultKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(GenericArray::from_slice(key.expose())),
        }
    }

    /// Encrypt; output is `ciphertext || tag`
    pub fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8], aad: &[u8]) -> VaultResult<Vec<u8>> {
        self.cipher
            .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))
    }

    /// Decrypt `ciphertext || tag`
    pub fn open(&self, nonce: &[u8; NONCE_LEN], sealed: &[u8], aad: &[u8]) -> VaultResult<Vec<u8>> {
        if sealed.len() < TAG_LEN {
            return Err(VaultError::DecryptionFailed("Data too short".into()));
        }
        self.cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad })
            .map_err(|_| VaultError::DecryptionFailed("Authentication failed".into()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HMAC for integrity verification
// ═══════════════════════════════════════════════════════════════════════════

fn hmac(key: &VaultKey) -> VaultResult<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key.expose())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))
}

/// Compute HMAC-SHA256
pub fn compute_hmac(key: &VaultKey, data: &[u8]) -> VaultResult<[u8; HMAC_LEN]> {
    let mut mac = hmac(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Verify HMAC-SHA256 in constant time
pub fn verify_hmac(key: &VaultKey, data: &[u8], expected: &[u8]) -> VaultResult<bool> {
    let mut mac = hmac(key)?;
    mac.update(data);
    Ok(mac.verify_slice(expected).is_ok())
}

// ═══════════════════════════════════════════════════════════════════════════
// Sealed block: [nonce 12][hmac 32][ciphertext || tag]
// ═══════════════════════════════════════════════════════════════════════════

/// Smallest valid sealed block (empty plaintext)
pub const SEALED_OVERHEAD: usize = NONCE_LEN + HMAC_LEN + TAG_LEN;

/// AEAD-seal with the encryption key, then HMAC the ciphertext with the HMAC key
pub fn seal_with_integrity(keys: &KeyPair, plaintext: &[u8]) -> VaultResult<Vec<u8>> {
    let nonce = generate_nonce();
    let ciphertext = ChunkCipher::new(keys.encryption_key()).seal(&nonce, plaintext, &[])?;
    let mac = compute_hmac(keys.hmac_key(), &ciphertext)?;

    let mut block = Vec::with_capacity(NONCE_LEN + HMAC_LEN + ciphertext.len());
    block.extend_from_slice(&nonce);
    block.extend_from_slice(&mac);
    block.extend_from_slice(&ciphertext);
    Ok(block)
}

/// Reverse of [`seal_with_integrity`]. Both the HMAC and the AEAD tag must verify.
pub fn open_with_integrity(keys: &KeyPair, block: &[u8]) -> VaultResult<Vec<u8>> {
    if block.len() < SEALED_OVERHEAD {
        return Err(VaultError::DecryptionFailed("Sealed block too short".into()));
    }

    let (nonce, rest) = block.split_at(NONCE_LEN);
    let (mac, ciphertext) = rest.split_at(HMAC_LEN);

    if !verify_hmac(keys.hmac_key(), ciphertext, mac)? {
        return Err(VaultError::DecryptionFailed("HMAC verification failed".into()));
    }

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(nonce);
    ChunkCipher::new(keys.encryption_key()).open(&nonce_bytes, ciphertext, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_roundtrip_with_aad() {
        let key = VaultKey::generate();
        let cipher = ChunkCipher::new(&key);
        let nonce = generate_nonce();

        let sealed = cipher.seal(&nonce, b"chunk data", b"header").unwrap();
        assert_eq!(sealed.len(), b"chunk data".len() + TAG_LEN);

        let opened = cipher.open(&nonce, &sealed, b"header").unwrap();
        assert_eq!(opened, b"chunk data");
    }

    #[test]
    fn test_aad_mismatch_fails() {
        let cipher = ChunkCipher::new(&VaultKey::generate());
        let nonce = generate_nonce();
        let sealed = cipher.seal(&nonce, b"chunk data", b"header A").unwrap();

        let result = cipher.open(&nonce, &sealed, b"header B");
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn test_hmac() {
        let key = VaultKey::generate();
        let mac = compute_hmac(&key, b"Photo file content").unwrap();

        assert!(verify_hmac(&key, b"Photo file content", &mac).unwrap());
        assert!(!verify_hmac(&key, b"Tampered content", &mac).unwrap());
    }

    #[test]
    fn test_sealed_block_roundtrip() {
        let keys = KeyPair::generate();
        let block = seal_with_integrity(&keys, b"metadata").unwrap();
        assert_eq!(block.len(), SEALED_OVERHEAD + b"metadata".len());
        assert_eq!(open_with_integrity(&keys, &block).unwrap(), b"metadata");
    }

    #[test]
    fn test_sealed_block_wrong_hmac_key() {
        let keys = KeyPair::generate();
        let block = seal_with_integrity(&keys, b"metadata").unwrap();

        let other = KeyPair::new(keys.encryption_key().clone(), VaultKey::generate());
        let result = open_with_integrity(&other, &block);
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn test_sealed_block_wrong_encryption_key() {
        let keys = KeyPair::generate();
        let block = seal_with_integrity(&keys, b"metadata").unwrap();

        // HMAC passes, AEAD tag does not
        let other = KeyPair::new(VaultKey::generate(), keys.hmac_key().clone());
        let result = open_with_integrity(&other, &block);
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn test_sealed_block_bit_flips() {
        let keys = KeyPair::generate();
        let block = seal_with_integrity(&keys, b"metadata").unwrap();

        for i in [0, NONCE_LEN, NONCE_LEN + HMAC_LEN, block.len() - 1] {
            let mut tampered = block.clone();
            tampered[i] ^= 0x01;
            assert!(open_with_integrity(&keys, &tampered).is_err(), "flip at {}", i);
        }
    }
}

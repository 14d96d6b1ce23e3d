//! SecretVault - Key Material
//!
//! Key pair and verifier types handed to the codec by the caller.

use std::fmt;

use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Key length for AES-256 and HMAC-SHA256
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// HMAC-SHA256 output length
pub const HMAC_LEN: usize = 32;

/// Salt length for password derivation
pub const SALT_LEN: usize = 16;

/// Verifier length
pub const VERIFIER_LEN: usize = 32;

/// Salt for password derivation
pub type Salt = [u8; SALT_LEN];

/// Secure key wrapper with automatic zeroization
#[derive(Clone)]
pub struct VaultKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl VaultKey {
    /// Create a new vault key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let key = Self::new(bytes);
        zeroize::Zeroize::zeroize(&mut bytes);
        key
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

/// Encryption key and HMAC key, derived together from one password + salt.
///
/// Read-only once built, so a single pair can be shared across concurrent
/// container operations.
#[derive(Clone, Debug)]
pub struct KeyPair {
    encryption: VaultKey,
    hmac: VaultKey,
}

impl KeyPair {
    pub fn new(encryption: VaultKey, hmac: VaultKey) -> Self {
        Self { encryption, hmac }
    }

    /// Random pair, mostly useful for tests and throwaway containers
    pub fn generate() -> Self {
        Self::new(VaultKey::generate(), VaultKey::generate())
    }

    /// Key for chunk and metadata AEAD
    pub fn encryption_key(&self) -> &VaultKey {
        &self.encryption
    }

    /// Key for the metadata HMAC
    pub fn hmac_key(&self) -> &VaultKey {
        &self.hmac
    }
}

/// Password-check value. Cannot be turned back into the encryption key.
#[derive(Clone)]
pub struct PasswordVerifier {
    bytes: Zeroizing<[u8; VERIFIER_LEN]>,
}

impl PasswordVerifier {
    pub fn new(bytes: [u8; VERIFIER_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8; VERIFIER_LEN] {
        &self.bytes
    }

    /// Constant-time comparison
    pub fn matches(&self, other: &PasswordVerifier) -> bool {
        self.bytes.as_slice().ct_eq(other.bytes.as_slice()).into()
    }
}

impl fmt::Debug for PasswordVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordVerifier([REDACTED])")
    }
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let key = VaultKey::new([0x42; KEY_LEN]);
        let rendered = format!("{:?}", KeyPair::new(key.clone(), key));
        assert!(!rendered.contains("42"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_verifier_matches() {
        let a = PasswordVerifier::new([7u8; VERIFIER_LEN]);
        let b = PasswordVerifier::new([7u8; VERIFIER_LEN]);
        let mut other = [7u8; VERIFIER_LEN];
        other[31] = 8;
        let c = PasswordVerifier::new(other);

        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }

    #[test]
    fn test_nonces_differ() {
        assert_ne!(generate_nonce(), generate_nonce());
    }
}

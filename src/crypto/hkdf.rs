//! SecretVault - HKDF Key Expansion
//!
//! Splits one password-derived secret into independent, domain-separated keys.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::keys::KEY_LEN;
use crate::error::{VaultError, VaultResult};

/// HKDF info strings. Each output is independent of the others.
pub mod contexts {
    /// Chunk and metadata AEAD key
    pub const ENCRYPTION: &[u8] = b"SVF2:encryption:v1";

    /// Metadata HMAC key
    pub const HMAC: &[u8] = b"SVF2:hmac:v1";

    /// Password verifier
    pub const VERIFIER: &[u8] = b"SVF2:verifier:v1";
}

/// Expand `ikm` into a 32-byte subkey bound to `info`
pub fn expand_subkey(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
) -> VaultResult<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);

    hk.expand(info, &mut okm[..])
        .map_err(|e| VaultError::KeyDerivationFailed(e.to_string()))?;

    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_separated() {
        let ikm = [0x42u8; 32];

        let enc = expand_subkey(&ikm, None, contexts::ENCRYPTION).unwrap();
        let mac = expand_subkey(&ikm, None, contexts::HMAC).unwrap();
        let ver = expand_subkey(&ikm, None, contexts::VERIFIER).unwrap();

        assert_ne!(*enc, *mac);
        assert_ne!(*enc, *ver);
        assert_ne!(*mac, *ver);
    }

    #[test]
    fn test_expand_deterministic() {
        let ikm = [0x01u8; 32];
        let a = expand_subkey(&ikm, Some(b"salt"), contexts::ENCRYPTION).unwrap();
        let b = expand_subkey(&ikm, Some(b"salt"), contexts::ENCRYPTION).unwrap();
        assert_eq!(*a, *b);
    }
}

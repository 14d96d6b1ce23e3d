//! SecretVault - Argon2id Password Derivation
//!
//! password + salt → Argon2id master secret → HKDF-separated
//! (encryption key, HMAC key) and verifier.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::hkdf::{contexts, expand_subkey};
use super::keys::{KeyPair, PasswordVerifier, Salt, VaultKey, KEY_LEN, SALT_LEN};
use crate::error::{VaultError, VaultResult};

/// Argon2id parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_cost_kib: u32,
    /// Iterations (time cost)
    pub time_cost: u32,
    /// Parallelism
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost_kib: 64 * 1024, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Profile for constrained devices
    pub fn low_memory() -> Self {
        Self {
            memory_cost_kib: 16 * 1024, // 16 MiB
            time_cost: 4,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> VaultResult<Argon2<'static>> {
        let params = Params::new(
            self.memory_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| VaultError::KeyDerivationFailed(format!("Invalid Argon2 params: {}", e)))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Everything one password + salt yields
#[derive(Clone, Debug)]
pub struct DerivedKeys {
    pub keys: KeyPair,
    pub verifier: PasswordVerifier,
}

fn master_secret(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> VaultResult<Zeroizing<[u8; KEY_LEN]>> {
    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    params
        .argon2()?
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut output[..])
        .map_err(|e| VaultError::KeyDerivationFailed(format!("Hashing failed: {}", e)))?;
    Ok(output)
}

fn keys_from_master(master: &[u8], salt: &[u8]) -> VaultResult<KeyPair> {
    let encryption = expand_subkey(master, Some(salt), contexts::ENCRYPTION)?;
    let hmac = expand_subkey(master, Some(salt), contexts::HMAC)?;
    Ok(KeyPair::new(VaultKey::new(*encryption), VaultKey::new(*hmac)))
}

fn verifier_from_master(master: &[u8], salt: &[u8]) -> VaultResult<PasswordVerifier> {
    let verifier = expand_subkey(master, Some(salt), contexts::VERIFIER)?;
    Ok(PasswordVerifier::new(*verifier))
}

/// Derive the (encryption key, HMAC key) pair
pub fn derive_keys(password: &SecretString, salt: &[u8], params: &KdfParams) -> VaultResult<KeyPair> {
    let master = master_secret(password, salt, params)?;
    keys_from_master(&*master, salt)
}

/// Derive the password verifier
pub fn derive_verifier(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> VaultResult<PasswordVerifier> {
    let master = master_secret(password, salt, params)?;
    verifier_from_master(&*master, salt)
}

/// Derive keys and verifier with a single Argon2id pass
pub fn derive_all(password: &SecretString, salt: &[u8], params: &KdfParams) -> VaultResult<DerivedKeys> {
    let master = master_secret(password, salt, params)?;
    Ok(DerivedKeys {
        keys: keys_from_master(&*master, salt)?,
        verifier: verifier_from_master(&*master, salt)?,
    })
}

/// Fresh random salt from the OS RNG
pub fn generate_salt() -> VaultResult<Salt> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| VaultError::KeyDerivationFailed(format!("RNG failed: {}", e)))?;
    Ok(salt)
}

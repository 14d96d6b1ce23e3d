//! SecretVault - Cryptographic Core
//!
//! Argon2id + HKDF key hierarchy, AES-256-GCM chunk sealing, HMAC-SHA256.

pub mod keys;
pub mod aead;
pub mod hkdf;
pub mod kdf;

pub use keys::*;
pub use aead::*;
pub use kdf::{derive_all, derive_keys, derive_verifier, generate_salt, DerivedKeys, KdfParams};

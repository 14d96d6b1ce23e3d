//! # SecretVault Core
//!
//! Streaming encrypted media containers (SVF2) with password-derived keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    SECRETVAULT CORE                      │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ KEY PROVIDER│  │   WORKER    │  │  CLI (svf)      │  │
//! │  │ password rec│  │ spawn_block │  │  clap + indic.  │  │
//! │  └──────┬──────┘  └──────┬──────┘  └────────┬────────┘  │
//! │         │                │                   │           │
//! │  ┌──────┴────────────────┴───────────────────┴────────┐ │
//! │  │                 CONTAINER CODEC                     │ │
//! │  │   header ─ sealed metadata ─ AES-GCM chunks ─ EOF   │ │
//! │  └──────┬─────────────────────────────────────┬────────┘ │
//! │  ┌──────┴──────┐  ┌─────────────┐  ┌──────────┴──────┐  │
//! │  │   CRYPTO    │  │  ROTATION   │  │  SECURE DELETE  │  │
//! │  │ Argon2+HKDF │  │ atomic swap │  │  3-pass wipe    │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Argon2id stretches the password once; HKDF separates encryption,
//!   HMAC and verifier subkeys
//! - Every chunk is AES-256-GCM with a fresh nonce and the header as AAD
//! - A completion marker after the terminal record rejects truncated files
//! - Writes land atomically and never overwrite
//! - Key material is zeroized on drop

pub mod config;
pub mod container;
pub mod crypto;
pub mod error;
pub mod key_provider;
pub mod metadata;
pub mod rotation;
pub mod secure_fs;
pub mod worker;

pub use config::VaultConfig;
pub use container::{
    is_container, read_container, read_container_to_temporary_file, read_header, read_metadata,
    write_container, CancellationToken, ContainerHeader, MediaType, PlaintextSource, ProgressSink,
    StreamOptions,
};
pub use crypto::{derive_keys, KdfParams, KeyPair};
pub use error::{VaultError, VaultResult};
pub use key_provider::{KeyProvider, PasswordKeyProvider, PasswordRecord, StaticKeyProvider};
pub use metadata::{GeoLocation, MediaMetadata};
pub use rotation::{reencrypt_all, reencrypt_container, RotationReport};
pub use secure_fs::{secure_delete, DeleteOutcome};

/// SecretVault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

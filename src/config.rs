//! SecretVault - Configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::container::format::MAX_CHUNK_SIZE;
use crate::container::{StreamOptions, DEFAULT_CHUNK_SIZE};
use crate::crypto::KdfParams;
use crate::error::{VaultError, VaultResult};
use crate::secure_fs::SECURE_DELETE_MAX_SIZE;

/// Concurrent rotations/imports when not configured
pub const DEFAULT_IMPORT_CONCURRENCY: usize = 2;

/// Vault configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Argon2id cost for new password records
    pub kdf: KdfParams,
    /// Plaintext bytes per chunk for new containers
    pub chunk_size: u32,
    /// Secure delete overwrites files up to this size
    pub secure_delete_max_size: u64,
    pub import_concurrency: usize,
    /// Scratch directory for decrypted output; system temp dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            secure_delete_max_size: SECURE_DELETE_MAX_SIZE,
            import_concurrency: DEFAULT_IMPORT_CONCURRENCY,
            temp_dir: None,
        }
    }
}

impl VaultConfig {
    /// `<config dir>/secretvault/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("secretvault").join("config.json"))
    }

    pub fn load(path: &Path) -> VaultResult<Self> {
        let data = fs::read(path).map_err(|e| VaultError::io(path, e))?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults when the file does not exist; other errors still surface
    pub fn load_or_default(path: &Path) -> VaultResult<Self> {
        match Self::load(path) {
            Err(VaultError::FileNotFound(_)) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> VaultResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| VaultError::io(path, e))
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(VaultError::Serialization(format!(
                "chunk_size must be between 1 and {}",
                MAX_CHUNK_SIZE
            )));
        }
        if self.import_concurrency == 0 {
            return Err(VaultError::Serialization("import_concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// Stream options carrying the configured chunk size and scratch directory
    pub fn stream_options(&self) -> StreamOptions<'_> {
        let options = StreamOptions::new().with_chunk_size(self.chunk_size);
        match &self.temp_dir {
            Some(dir) => options.with_temp_dir(dir),
            None => options,
        }
    }
}

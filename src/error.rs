//! SecretVault - Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // FORMAT ERRORS
    // ═══════════════════════════════════════════════════════════════

    /// Magic mismatch or unsupported version: not a container this codec reads.
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    // ═══════════════════════════════════════════════════════════════
    // INTEGRITY ERRORS
    // ═══════════════════════════════════════════════════════════════

    /// Authentication, structure or truncation failure.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid password")]
    InvalidPassword,

    // ═══════════════════════════════════════════════════════════════
    // FILE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("File already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ═══════════════════════════════════════════════════════════════
    // CONTROL FLOW
    // ═══════════════════════════════════════════════════════════════

    /// Operation stopped at a chunk boundary; partial output was removed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl VaultError {
    /// Attach a path to an I/O error, mapping `NotFound` to [`VaultError::FileNotFound`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => VaultError::FileNotFound(path),
            std::io::ErrorKind::AlreadyExists => VaultError::FileAlreadyExists(path),
            _ => VaultError::Io { path, source },
        }
    }

    /// The file is not a container this codec understands
    pub fn is_format_error(&self) -> bool {
        matches!(self, VaultError::InvalidFileFormat(_))
    }

    /// Tampering, corruption or wrong key material
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, VaultError::DecryptionFailed(_))
    }

    /// Environment problem the caller may retry or report as-is
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            VaultError::FileNotFound(_)
                | VaultError::FileAlreadyExists(_)
                | VaultError::Io { .. }
                | VaultError::IoError(_)
        )
    }

    /// Cancellation is an outcome, not a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, VaultError::Cancelled)
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

impl From<base64::DecodeError> for VaultError {
    fn from(e: base64::DecodeError) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

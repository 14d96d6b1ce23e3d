//! SecretVault - Key Rotation
//!
//! Re-encrypts containers under a new key pair when the master password
//! changes. Nothing is mutated in place until a single atomic rename, so a
//! failure at any earlier stage leaves the original container untouched.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use uuid::Uuid;

use crate::container::{
    read_container_to_temporary_file, read_header, read_metadata, write_container, PlaintextSource,
    StreamOptions,
};
use crate::crypto::KeyPair;
use crate::error::{VaultError, VaultResult};

/// Stages of the rotation protocol, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStage {
    ReadOldMetadata,
    DecryptToTemp,
    EncryptToStagingFile,
    AtomicSwap,
    Cleanup,
}

impl fmt::Display for RotationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationStage::ReadOldMetadata => "read-old-metadata",
            RotationStage::DecryptToTemp => "decrypt-to-temp",
            RotationStage::EncryptToStagingFile => "encrypt-to-staging",
            RotationStage::AtomicSwap => "atomic-swap",
            RotationStage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Suffix of staging files; a random component keeps concurrent attempts apart
pub const STAGING_SUFFIX: &str = "reencrypt";

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.{}", Uuid::new_v4().simple(), STAGING_SUFFIX));
    path.with_file_name(name)
}

/// A fully written replacement container waiting to be swapped in.
/// Dropping it without [`commit`](Self::commit) removes the staging file.
#[derive(Debug)]
pub struct StagedReencryption {
    original: PathBuf,
    staging: PathBuf,
    committed: bool,
}

impl StagedReencryption {
    pub fn original_path(&self) -> &Path {
        &self.original
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Atomically replace the original with the staged container
    pub fn commit(mut self) -> VaultResult<()> {
        tracing::debug!(stage = %RotationStage::AtomicSwap, path = %self.original.display());
        fs::rename(&self.staging, &self.original).map_err(|e| VaultError::io(&self.original, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedReencryption {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.staging) {
                tracing::warn!(path = %self.staging.display(), error = %e, "could not remove staging file");
            }
        }
    }
}

/// Run every stage up to, but not including, the atomic swap.
///
/// Progress is reported for the encrypt pass only; cancellation is honoured
/// in both passes.
pub fn stage_reencryption(
    path: &Path,
    old_keys: &KeyPair,
    new_keys: &KeyPair,
    options: &StreamOptions<'_>,
) -> VaultResult<StagedReencryption> {
    let header = read_header(path)?;

    tracing::debug!(stage = %RotationStage::ReadOldMetadata, path = %path.display());
    let metadata = match read_metadata(path, old_keys) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "metadata unreadable, rotating without it");
            None
        }
    };

    tracing::debug!(stage = %RotationStage::DecryptToTemp, path = %path.display());
    let read_options = StreamOptions {
        progress: None,
        ..*options
    };
    let scratch = TempPath::from_path(read_container_to_temporary_file(path, None, old_keys, &read_options)?);

    tracing::debug!(stage = %RotationStage::EncryptToStagingFile, path = %path.display());
    let staging = staging_path(path);
    let write_options = options.with_chunk_size(header.chunk_size);
    write_container(
        PlaintextSource::File(&scratch),
        header.media_type,
        metadata.as_ref(),
        new_keys,
        &staging,
        &write_options,
    )?;

    tracing::debug!(stage = %RotationStage::Cleanup, path = %path.display());
    if let Err(e) = scratch.close() {
        tracing::warn!(error = %e, "could not remove scratch plaintext");
    }

    Ok(StagedReencryption {
        original: path.to_path_buf(),
        staging,
        committed: false,
    })
}

/// Re-encrypt one container from `old_keys` to `new_keys`, replacing it atomically.
///
/// Callers must not rotate the same path concurrently.
pub fn reencrypt_container(
    path: &Path,
    old_keys: &KeyPair,
    new_keys: &KeyPair,
    options: &StreamOptions<'_>,
) -> VaultResult<()> {
    stage_reencryption(path, old_keys, new_keys, options)?.commit()?;
    tracing::info!(path = %path.display(), "container re-encrypted");
    Ok(())
}

/// Outcome of rotating a collection
#[derive(Debug, Default)]
pub struct RotationReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, VaultError)>,
}

impl RotationReport {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn record(&mut self, path: PathBuf, result: VaultResult<()>) {
        match result {
            Ok(()) => self.succeeded.push(path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "rotation failed");
                self.failed.push((path, e));
            }
        }
    }
}

/// Rotate every container in `paths`, one after another, continuing past failures.
/// Stops early only on cancellation.
pub fn reencrypt_all<P: AsRef<Path>>(
    paths: &[P],
    old_keys: &KeyPair,
    new_keys: &KeyPair,
    options: &StreamOptions<'_>,
) -> RotationReport {
    let mut report = RotationReport::default();
    for path in paths {
        let path = path.as_ref();
        let result = reencrypt_container(path, old_keys, new_keys, options);
        let cancelled = matches!(result, Err(VaultError::Cancelled));
        report.record(path.to_path_buf(), result);
        if cancelled {
            break;
        }
    }
    tracing::info!(
        succeeded = report.succeeded_count(),
        failed = report.failed_count(),
        "collection rotation finished"
    );
    report
}

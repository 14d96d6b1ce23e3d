//! SecretVault - Secure Deletion
//!
//! Best-effort overwrite before unlink. On flash storage and copy-on-write
//! filesystems the old blocks may survive; callers should treat
//! [`DeleteOutcome::Overwritten`] as "overwrite attempted", not as a guarantee.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

use crate::error::{VaultError, VaultResult};

/// Files larger than this are unlinked without overwriting
pub const SECURE_DELETE_MAX_SIZE: u64 = 100 * 1024 * 1024;

const BLOCK_SIZE: usize = 1024 * 1024;

/// What a secure delete actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Three overwrite passes, each synced, then unlinked
    Overwritten,
    /// Above the size cap: unlinked only
    Unlinked,
}

#[derive(Clone, Copy)]
enum Pass {
    Random,
    Complement,
    Zeros,
}

/// Overwrite then unlink `path`, using [`SECURE_DELETE_MAX_SIZE`]
pub fn secure_delete(path: &Path) -> VaultResult<DeleteOutcome> {
    secure_delete_with_limit(path, SECURE_DELETE_MAX_SIZE)
}

/// Overwrite then unlink `path`; files above `max_size` bytes are only unlinked
pub fn secure_delete_with_limit(path: &Path, max_size: u64) -> VaultResult<DeleteOutcome> {
    let size = fs::metadata(path).map_err(|e| VaultError::io(path, e))?.len();

    if size > max_size {
        fs::remove_file(path).map_err(|e| VaultError::io(path, e))?;
        tracing::debug!(path = %path.display(), size, "file above overwrite cap, unlinked");
        return Ok(DeleteOutcome::Unlinked);
    }

    // The complement pass replays the random stream from the same seed
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);

    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| VaultError::io(path, e))?;
    for pass in [Pass::Random, Pass::Complement, Pass::Zeros] {
        overwrite_pass(&mut file, size, pass, seed).map_err(|e| VaultError::io(path, e))?;
    }
    drop(file);

    fs::remove_file(path).map_err(|e| VaultError::io(path, e))?;
    tracing::debug!(path = %path.display(), size, "file overwritten and unlinked");
    Ok(DeleteOutcome::Overwritten)
}

fn overwrite_pass(file: &mut fs::File, size: u64, pass: Pass, seed: [u8; 32]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    let mut rng = StdRng::from_seed(seed);
    let mut block = vec![0u8; BLOCK_SIZE];
    let mut remaining = size;

    while remaining > 0 {
        let len = remaining.min(BLOCK_SIZE as u64) as usize;
        let buf = &mut block[..len];
        match pass {
            Pass::Random => rng.fill_bytes(buf),
            Pass::Complement => {
                rng.fill_bytes(buf);
                buf.iter_mut().for_each(|b| *b = !*b);
            }
            Pass::Zeros => buf.fill(0),
        }
        file.write_all(buf)?;
        remaining -= len as u64;
    }

    file.sync_all()
}

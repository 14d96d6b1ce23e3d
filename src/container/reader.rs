//! Streaming container reader

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use super::format::{read_up_to, ContainerHeader, COMPLETION_MARKER, MAGIC, MAX_METADATA_LEN};
use super::progress::StreamOptions;
use crate::crypto::{ChunkCipher, KeyPair, NONCE_LEN, TAG_LEN};
use crate::error::{VaultError, VaultResult};
use crate::metadata::{open_metadata, MediaMetadata};

/// Decrypts chunk records in file order until the terminal record
pub(crate) struct ChunkReader<R: Read> {
    inner: R,
    cipher: ChunkCipher,
    aad: Vec<u8>,
    chunk_size: u32,
    /// Exact plaintext length promised by the header; `None` when unknown
    expected_len: Option<u64>,
    index: u64,
    bytes: u64,
    saw_short_chunk: bool,
    finished: bool,
}

impl<R: Read> ChunkReader<R> {
    pub(crate) fn new(inner: R, keys: &KeyPair, header: &ContainerHeader, header_bytes: &[u8]) -> Self {
        Self {
            inner,
            cipher: ChunkCipher::new(keys.encryption_key()),
            aad: header_bytes.to_vec(),
            chunk_size: header.chunk_size,
            expected_len: (header.original_size != 0).then_some(header.original_size),
            index: 0,
            bytes: 0,
            saw_short_chunk: false,
            finished: false,
        }
    }

    /// Next plaintext chunk, or `None` once the trailer has been verified
    pub(crate) fn next_chunk(&mut self) -> VaultResult<Option<Zeroizing<Vec<u8>>>> {
        if self.finished {
            return Ok(None);
        }

        let mut len_bytes = [0u8; 4];
        match read_up_to(&mut self.inner, &mut len_bytes)? {
            0 => return Err(corrupt("missing completion marker")),
            4 => {}
            _ => return Err(corrupt("truncated chunk length")),
        }

        let len = u32::from_le_bytes(len_bytes);
        if len == 0 {
            self.verify_trailer()?;
            if self.expected_len.is_some_and(|expected| expected != self.bytes) {
                return Err(corrupt("plaintext length mismatch"));
            }
            self.finished = true;
            return Ok(None);
        }
        if len > self.chunk_size {
            return Err(corrupt("chunk length exceeds chunk size"));
        }
        if self.saw_short_chunk {
            return Err(corrupt("short chunk before end of stream"));
        }
        if self.expected_len.is_some_and(|expected| self.bytes + u64::from(len) > expected) {
            return Err(corrupt("plaintext length mismatch"));
        }

        let mut nonce = [0u8; NONCE_LEN];
        if read_up_to(&mut self.inner, &mut nonce)? < NONCE_LEN {
            return Err(corrupt("truncated chunk"));
        }

        let sealed_len = len as usize + TAG_LEN;
        let mut sealed = vec![0u8; sealed_len];
        if read_up_to(&mut self.inner, &mut sealed)? < sealed_len {
            return Err(corrupt("truncated chunk"));
        }

        let plaintext = self
            .cipher
            .open(&nonce, &sealed, &self.aad)
            .map_err(|_| VaultError::DecryptionFailed(format!("chunk {} authentication failed", self.index)))?;

        self.saw_short_chunk = len < self.chunk_size;
        self.index += 1;
        self.bytes += plaintext.len() as u64;
        Ok(Some(Zeroizing::new(plaintext)))
    }

    fn verify_trailer(&mut self) -> VaultResult<()> {
        let mut marker = [0u8; 8];
        let got = read_up_to(&mut self.inner, &mut marker)?;
        if got < marker.len() || &marker != COMPLETION_MARKER {
            return Err(corrupt("invalid completion marker"));
        }

        let mut extra = [0u8; 1];
        if read_up_to(&mut self.inner, &mut extra)? != 0 {
            return Err(corrupt("unexpected trailing data"));
        }
        Ok(())
    }

    /// Decrypt every remaining chunk into `sink`
    pub(crate) fn drain_into<W: Write + ?Sized>(
        &mut self,
        sink: &mut W,
        options: &StreamOptions<'_>,
    ) -> VaultResult<u64> {
        loop {
            options.check_cancelled()?;
            match self.next_chunk()? {
                Some(chunk) => {
                    sink.write_all(&chunk)?;
                    options.report(self.bytes);
                }
                None => return Ok(self.bytes),
            }
        }
    }
}

fn corrupt(reason: &str) -> VaultError {
    VaultError::DecryptionFailed(reason.into())
}

/// Skip or capture the metadata block that follows a v2 header
fn read_metadata_block<R: Read>(reader: &mut R, header: &ContainerHeader, capture: bool) -> VaultResult<Option<Vec<u8>>> {
    let len = header.metadata_length;
    if len == 0 {
        return Ok(None);
    }
    if len > MAX_METADATA_LEN {
        return Err(corrupt("metadata block too large"));
    }

    if capture {
        let mut block = vec![0u8; len as usize];
        if read_up_to(reader, &mut block)? < block.len() {
            return Err(corrupt("truncated metadata block"));
        }
        Ok(Some(block))
    } else {
        let skipped = io::copy(&mut reader.by_ref().take(u64::from(len)), &mut io::sink())?;
        if skipped < u64::from(len) {
            return Err(corrupt("truncated metadata block"));
        }
        Ok(None)
    }
}

/// Decrypt a complete container from any reader into any writer
pub fn read_container_from<R: Read, W: Write + ?Sized>(
    mut reader: R,
    keys: &KeyPair,
    sink: &mut W,
    options: &StreamOptions<'_>,
) -> VaultResult<ContainerHeader> {
    let (header, header_bytes) = ContainerHeader::read_from(&mut reader)?;
    read_metadata_block(&mut reader, &header, false)?;

    let mut chunks = ChunkReader::new(reader, keys, &header, &header_bytes);
    chunks.drain_into(sink, options)?;
    Ok(header)
}

fn open(path: &Path) -> VaultResult<BufReader<File>> {
    let file = File::open(path).map_err(|e| VaultError::io(path, e))?;
    Ok(BufReader::new(file))
}

fn log_integrity_failure(path: &Path, err: &VaultError) {
    if err.is_integrity_failure() {
        tracing::warn!(path = %path.display(), error = %err, "container failed verification");
    }
}

/// Read only the header
pub fn read_header(path: &Path) -> VaultResult<ContainerHeader> {
    let mut reader = open(path)?;
    ContainerHeader::read_from(&mut reader).map(|(header, _)| header)
}

/// Check whether `path` starts with a readable SVF2 header
pub fn is_container(path: &Path) -> VaultResult<bool> {
    match read_header(path) {
        Ok(_) => Ok(true),
        Err(VaultError::InvalidFileFormat(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Decrypt a whole container into memory. Meant for photos and other
/// modest-sized content.
pub fn read_container(path: &Path, keys: &KeyPair) -> VaultResult<Vec<u8>> {
    let reader = open(path)?;
    let mut plaintext = Vec::new();

    let result = read_container_from(reader, keys, &mut plaintext, &StreamOptions::default());
    match result {
        Ok(_) => Ok(plaintext),
        Err(e) => {
            zeroize::Zeroize::zeroize(&mut plaintext);
            log_integrity_failure(path, &e);
            Err(e)
        }
    }
}

/// Stream a container into a fresh temporary file and return its path.
///
/// The caller owns (and must delete) the returned file. On failure or
/// cancellation the partial output is removed before returning.
pub fn read_container_to_temporary_file(
    path: &Path,
    preferred_extension: Option<&str>,
    keys: &KeyPair,
    options: &StreamOptions<'_>,
) -> VaultResult<PathBuf> {
    let reader = open(path)?;

    let suffix = match preferred_extension {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.trim_start_matches('.')),
        _ => String::new(),
    };
    let mut builder = tempfile::Builder::new();
    builder.prefix("svf-").suffix(&suffix);
    let mut temp = match options.temp_dir {
        Some(dir) => builder.tempfile_in(dir).map_err(|e| VaultError::io(dir, e))?,
        None => builder.tempfile()?,
    };

    let result = {
        let mut out = BufWriter::new(temp.as_file_mut());
        read_container_from(reader, keys, &mut out, options).and_then(|header| {
            out.flush()?;
            Ok(header)
        })
    };
    if let Err(e) = result {
        log_integrity_failure(path, &e);
        return Err(e);
    }

    let (_, temp_path) = temp.keep().map_err(|e| VaultError::IoError(e.error))?;
    tracing::debug!(source = %path.display(), output = %temp_path.display(), "container decrypted to temporary file");
    Ok(temp_path)
}

/// Decrypt only the metadata block. `None` for files without an SVF2
/// header, version 1 files and containers written without metadata.
pub fn read_metadata(path: &Path, keys: &KeyPair) -> VaultResult<Option<MediaMetadata>> {
    let mut file = open(path)?;
    let mut magic = [0u8; MAGIC.len()];
    if read_up_to(&mut file, &mut magic)? < magic.len() || &magic != MAGIC {
        return Ok(None);
    }

    let mut reader = (&magic[..]).chain(file);
    let (header, _) = ContainerHeader::read_from(&mut reader)?;

    match read_metadata_block(&mut reader, &header, true)? {
        Some(block) => open_metadata(&block, keys).map(Some).map_err(|e| {
            log_integrity_failure(path, &e);
            e
        }),
        None => Ok(None),
    }
}

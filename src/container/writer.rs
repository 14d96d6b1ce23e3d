//! Streaming container writer

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use super::format::{read_up_to, trailer, ContainerHeader, MediaType, MAX_CHUNK_SIZE, MAX_METADATA_LEN};
use super::progress::StreamOptions;
use crate::crypto::{generate_nonce, ChunkCipher, KeyPair};
use crate::error::{VaultError, VaultResult};
use crate::metadata::{seal_metadata, MediaMetadata};

/// Where plaintext comes from. All variants go through the same chunking loop.
pub enum PlaintextSource<'a> {
    Bytes(&'a [u8]),
    File(&'a Path),
    /// Size unknown; header records 0
    Reader(&'a mut dyn Read),
}

/// What a successful write produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub plaintext_bytes: u64,
    /// Data chunks, not counting the terminal record
    pub chunks: u64,
}

/// Encrypts plaintext chunks into `[len][nonce][ciphertext][tag]` records
pub(crate) struct ChunkWriter<W: Write> {
    inner: W,
    cipher: ChunkCipher,
    aad: Vec<u8>,
    chunk_size: usize,
    chunks: u64,
    bytes: u64,
}

impl<W: Write> ChunkWriter<W> {
    pub(crate) fn new(inner: W, keys: &KeyPair, header_bytes: &[u8], chunk_size: u32) -> Self {
        Self {
            inner,
            cipher: ChunkCipher::new(keys.encryption_key()),
            aad: header_bytes.to_vec(),
            chunk_size: chunk_size as usize,
            chunks: 0,
            bytes: 0,
        }
    }

    pub(crate) fn write_chunk(&mut self, plaintext: &[u8]) -> VaultResult<()> {
        debug_assert!(!plaintext.is_empty() && plaintext.len() <= self.chunk_size);

        let nonce = generate_nonce();
        let sealed = self.cipher.seal(&nonce, plaintext, &self.aad)?;

        self.inner.write_all(&(plaintext.len() as u32).to_le_bytes())?;
        self.inner.write_all(&nonce)?;
        self.inner.write_all(&sealed)?;

        self.chunks += 1;
        self.bytes += plaintext.len() as u64;
        Ok(())
    }

    /// Read `source` to exhaustion, one chunk at a time
    pub(crate) fn pump<R: Read + ?Sized>(&mut self, source: &mut R, options: &StreamOptions<'_>) -> VaultResult<()> {
        let mut buf = Zeroizing::new(vec![0u8; self.chunk_size]);
        loop {
            options.check_cancelled()?;

            let n = read_up_to(source, &mut buf)?;
            if n == 0 {
                break;
            }
            self.write_chunk(&buf[..n])?;
            options.report(self.bytes);

            if n < self.chunk_size {
                break;
            }
        }
        Ok(())
    }

    pub(crate) fn summary(&self) -> WriteSummary {
        WriteSummary {
            plaintext_bytes: self.bytes,
            chunks: self.chunks,
        }
    }
}

fn validate_chunk_size(chunk_size: u32) -> VaultResult<()> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(VaultError::EncryptionFailed(format!(
            "chunk size must be between 1 and {} bytes, got {}",
            MAX_CHUNK_SIZE, chunk_size
        )));
    }
    Ok(())
}

/// Build the header and optional sealed metadata block
fn prepare_header(
    media_type: MediaType,
    original_size: u64,
    metadata: Option<&MediaMetadata>,
    keys: &KeyPair,
    chunk_size: u32,
) -> VaultResult<(Vec<u8>, Vec<u8>)> {
    validate_chunk_size(chunk_size)?;

    let block = match metadata {
        Some(meta) => seal_metadata(meta, keys)?,
        None => Vec::new(),
    };
    if block.len() > MAX_METADATA_LEN as usize {
        return Err(VaultError::EncryptionFailed(format!(
            "metadata block too large: {} bytes",
            block.len()
        )));
    }

    let header = ContainerHeader::new(media_type, original_size, chunk_size, block.len() as u32);
    Ok((header.to_bytes(), block))
}

/// Encode a complete container into any writer.
///
/// No atomicity or sync: [`write_container`] adds those for files.
pub fn write_container_to<W: Write>(
    source: PlaintextSource<'_>,
    media_type: MediaType,
    metadata: Option<&MediaMetadata>,
    keys: &KeyPair,
    sink: &mut W,
    options: &StreamOptions<'_>,
) -> VaultResult<WriteSummary> {
    let (size_hint, mut reader) = open_source(source)?;
    let (header, block) = prepare_header(media_type, size_hint, metadata, keys, options.chunk_size)?;

    sink.write_all(&header)?;
    sink.write_all(&block)?;

    let mut chunks = ChunkWriter::new(&mut *sink, keys, &header, options.chunk_size);
    chunks.pump(&mut reader, options)?;
    let summary = chunks.summary();
    check_source_length(size_hint, &summary)?;

    sink.write_all(&trailer())?;
    sink.flush()?;
    Ok(summary)
}

/// Encrypt `source` into a new container at `destination`.
///
/// Refuses to overwrite. Output is staged in a hidden sibling file and moved
/// into place only once complete, so a failure of any kind, cancellation
/// included, leaves nothing at `destination`.
pub fn write_container(
    source: PlaintextSource<'_>,
    media_type: MediaType,
    metadata: Option<&MediaMetadata>,
    keys: &KeyPair,
    destination: &Path,
    options: &StreamOptions<'_>,
) -> VaultResult<WriteSummary> {
    if destination.symlink_metadata().is_ok() {
        return Err(VaultError::FileAlreadyExists(destination.to_path_buf()));
    }

    let (size_hint, mut reader) = open_source(source)?;
    let (header, block) = prepare_header(media_type, size_hint, metadata, keys, options.chunk_size)?;

    let parent = staging_dir(destination);
    let mut staged = tempfile::Builder::new()
        .prefix(".svf-")
        .suffix(".partial")
        .tempfile_in(&parent)
        .map_err(|e| VaultError::io(&parent, e))?;

    let summary = {
        let file = staged.as_file_mut();
        {
            let mut out = BufWriter::new(&mut *file);
            out.write_all(&header)?;
            out.write_all(&block)?;

            let mut chunks = ChunkWriter::new(&mut out, keys, &header, options.chunk_size);
            chunks.pump(&mut reader, options)?;
            let summary = chunks.summary();

            out.flush()?;
            summary
        }
    };

    check_source_length(size_hint, &summary)?;

    // Data must be durable before the marker claims completeness
    staged.as_file().sync_data()?;
    staged.as_file_mut().write_all(&trailer())?;
    staged.as_file().sync_all()?;

    staged
        .persist_noclobber(destination)
        .map_err(|e| VaultError::io(destination, e.error))?;

    tracing::debug!(
        path = %destination.display(),
        bytes = summary.plaintext_bytes,
        chunks = summary.chunks,
        "container written"
    );
    Ok(summary)
}

/// The header's size hint is authenticated and enforced by readers, so a
/// sized source must deliver exactly that many bytes
fn check_source_length(size_hint: u64, summary: &WriteSummary) -> VaultResult<()> {
    if size_hint != 0 && summary.plaintext_bytes != size_hint {
        return Err(VaultError::EncryptionFailed(format!(
            "source changed during write: expected {} bytes, read {}",
            size_hint, summary.plaintext_bytes
        )));
    }
    Ok(())
}

fn staging_dir(destination: &Path) -> PathBuf {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn open_source(source: PlaintextSource<'_>) -> VaultResult<(u64, Box<dyn Read + '_>)> {
    match source {
        PlaintextSource::Bytes(bytes) => Ok((bytes.len() as u64, Box::new(bytes))),
        PlaintextSource::File(path) => {
            let file = File::open(path).map_err(|e| VaultError::io(path, e))?;
            let len = file.metadata().map_err(|e| VaultError::io(path, e))?.len();
            Ok((len, Box::new(BufReader::new(file))))
        }
        PlaintextSource::Reader(reader) => Ok((0, Box::new(reader))),
    }
}

//! SVF2 on-disk layout
//!
//! ```text
//! [MAGIC 4B]["SVF2"]
//! [VERSION 1B][0x01 | 0x02]
//! [MEDIA TYPE 1B][0x01 photo, 0x02 video]
//! [RESERVED 2B][zero]
//! [ORIGINAL SIZE 8B LE][plaintext size hint, 0 = unknown]
//! [CHUNK SIZE 4B LE]
//! [METADATA LENGTH 4B LE][v2 only]
//! [METADATA BLOCK][nonce 12B][hmac 32B][ciphertext + tag]
//! repeated:
//!   [CHUNK LENGTH 4B LE][NONCE 12B][CIPHERTEXT chunk length][TAG 16B]
//! [0u32][COMPLETION MARKER "SVF2_EOF"]
//! ```
//!
//! The header bytes (magic through metadata length) are the associated
//! data of every chunk.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::crypto::{NONCE_LEN, TAG_LEN};
use crate::error::{VaultError, VaultResult};

/// Magic bytes identifying an SVF2 container
pub const MAGIC: &[u8; 4] = b"SVF2";

/// Original format, no metadata field
pub const VERSION_1: u8 = 0x01;

/// Current format version, adds the metadata block
pub const VERSION_2: u8 = 0x02;

/// Header length for version 1
pub const HEADER_LEN_V1: usize = 4 + 1 + 1 + 2 + 8 + 4;

/// Header length for version 2
pub const HEADER_LEN_V2: usize = HEADER_LEN_V1 + 4;

/// Default plaintext bytes per chunk (1 MiB)
pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;

/// Largest chunk size a reader accepts (16 MiB)
pub const MAX_CHUNK_SIZE: u32 = 16 * 1024 * 1024;

/// Largest metadata block a reader accepts (1 MiB)
pub const MAX_METADATA_LEN: u32 = 1024 * 1024;

/// Plaintext marker following the zero-length terminal record
pub const COMPLETION_MARKER: &[u8; 8] = b"SVF2_EOF";

/// Bytes of a chunk record besides the ciphertext
pub const CHUNK_OVERHEAD: usize = 4 + NONCE_LEN + TAG_LEN;

/// Terminal record plus completion marker
pub const TRAILER_LEN: usize = 4 + COMPLETION_MARKER.len();

/// Kind of media stored in a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
}

impl MediaType {
    pub fn to_byte(self) -> u8 {
        match self {
            MediaType::Photo => 0x01,
            MediaType::Video => 0x02,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(MediaType::Photo),
            0x02 => Some(MediaType::Video),
            _ => None,
        }
    }
}

/// Parsed container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u8,
    pub media_type: MediaType,
    pub original_size: u64,
    pub chunk_size: u32,
    /// Always 0 for version 1
    pub metadata_length: u32,
}

impl ContainerHeader {
    /// Header for a new (version 2) container
    pub fn new(media_type: MediaType, original_size: u64, chunk_size: u32, metadata_length: u32) -> Self {
        Self {
            version: VERSION_2,
            media_type,
            original_size,
            chunk_size,
            metadata_length,
        }
    }

    pub fn encoded_len(&self) -> usize {
        if self.version >= VERSION_2 {
            HEADER_LEN_V2
        } else {
            HEADER_LEN_V1
        }
    }

    /// Serialized header; these bytes are the associated data of every chunk
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(MAGIC);
        out.push(self.version);
        out.push(self.media_type.to_byte());
        out.extend_from_slice(&[0u8; 2]);
        out.extend_from_slice(&self.original_size.to_le_bytes());
        out.extend_from_slice(&self.chunk_size.to_le_bytes());
        if self.version >= VERSION_2 {
            out.extend_from_slice(&self.metadata_length.to_le_bytes());
        }
        out
    }

    /// Read and validate a header, returning it with its exact bytes.
    ///
    /// Magic mismatch and unknown versions are [`VaultError::InvalidFileFormat`];
    /// anything else malformed is [`VaultError::DecryptionFailed`].
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> VaultResult<(Self, Vec<u8>)> {
        let mut raw = vec![0u8; HEADER_LEN_V2];

        let got = read_up_to(reader, &mut raw[..MAGIC.len() + 1])?;
        if got < MAGIC.len() || &raw[..MAGIC.len()] != MAGIC {
            return Err(VaultError::InvalidFileFormat("not an SVF2 container".into()));
        }
        if got < MAGIC.len() + 1 {
            return Err(VaultError::DecryptionFailed("truncated header".into()));
        }

        let version = raw[4];
        let header_len = match version {
            VERSION_1 => HEADER_LEN_V1,
            VERSION_2 => HEADER_LEN_V2,
            other => {
                return Err(VaultError::InvalidFileFormat(format!(
                    "unsupported version: {}",
                    other
                )))
            }
        };
        raw.truncate(header_len);

        if read_up_to(reader, &mut raw[5..])? < header_len - 5 {
            return Err(VaultError::DecryptionFailed("truncated header".into()));
        }

        let media_type = MediaType::from_byte(raw[5])
            .ok_or_else(|| VaultError::DecryptionFailed(format!("unknown media type: {:#04x}", raw[5])))?;

        if raw[6..8] != [0, 0] {
            return Err(VaultError::DecryptionFailed("reserved header bytes are not zero".into()));
        }

        let original_size = u64::from_le_bytes(le_array(&raw[8..16]));
        let chunk_size = u32::from_le_bytes(le_array(&raw[16..20]));
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(VaultError::DecryptionFailed(format!("invalid chunk size: {}", chunk_size)));
        }

        let metadata_length = if version >= VERSION_2 {
            u32::from_le_bytes(le_array(&raw[20..24]))
        } else {
            0
        };

        let header = Self {
            version,
            media_type,
            original_size,
            chunk_size,
            metadata_length,
        };
        Ok((header, raw))
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// Fill `buf` as far as the reader allows; returns bytes read (short only at EOF)
pub(crate) fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Terminal record followed by the completion marker
pub fn trailer() -> [u8; TRAILER_LEN] {
    let mut out = [0u8; TRAILER_LEN];
    out[4..].copy_from_slice(COMPLETION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = ContainerHeader::new(MediaType::Video, 0x0102, DEFAULT_CHUNK_SIZE, 77);
        let bytes = header.to_bytes();

        assert_eq!(bytes.len(), HEADER_LEN_V2);
        assert_eq!(&bytes[0..4], b"SVF2");
        assert_eq!(bytes[4], VERSION_2);
        assert_eq!(bytes[5], 0x02);
        assert_eq!(&bytes[6..8], &[0, 0]);
        assert_eq!(&bytes[8..16], &0x0102u64.to_le_bytes());
        assert_eq!(&bytes[16..20], &DEFAULT_CHUNK_SIZE.to_le_bytes());
        assert_eq!(&bytes[20..24], &77u32.to_le_bytes());

        let (parsed, raw) = ContainerHeader::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(raw, bytes);
    }

    #[test]
    fn test_version_1_has_no_metadata_field() {
        let header = ContainerHeader {
            version: VERSION_1,
            media_type: MediaType::Photo,
            original_size: 10,
            chunk_size: 4096,
            metadata_length: 0,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN_V1);

        let (parsed, _) = ContainerHeader::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_magic_mismatch_is_format_error() {
        let result = ContainerHeader::read_from(&mut Cursor::new(b"JFIF\x02\x01\x00\x00"));
        assert!(matches!(result, Err(VaultError::InvalidFileFormat(_))));

        let result = ContainerHeader::read_from(&mut Cursor::new(b"SV"));
        assert!(matches!(result, Err(VaultError::InvalidFileFormat(_))));
    }

    #[test]
    fn test_unsupported_version_is_format_error() {
        let mut bytes = ContainerHeader::new(MediaType::Photo, 0, 4096, 0).to_bytes();
        bytes[4] = 3;
        let result = ContainerHeader::read_from(&mut Cursor::new(&bytes));
        assert!(matches!(result, Err(VaultError::InvalidFileFormat(_))));
    }

    #[test]
    fn test_malformed_fields_are_integrity_errors() {
        let good = ContainerHeader::new(MediaType::Photo, 0, 4096, 0).to_bytes();

        let mut bad_media = good.clone();
        bad_media[5] = 0x07;
        let mut bad_reserved = good.clone();
        bad_reserved[7] = 1;
        let mut bad_chunk = good.clone();
        bad_chunk[16..20].copy_from_slice(&0u32.to_le_bytes());
        let truncated = good[..12].to_vec();

        for bytes in [bad_media, bad_reserved, bad_chunk, truncated] {
            let result = ContainerHeader::read_from(&mut Cursor::new(&bytes));
            assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
        }
    }

    #[test]
    fn test_trailer() {
        let t = trailer();
        assert_eq!(&t[..4], &[0, 0, 0, 0]);
        assert_eq!(&t[4..], COMPLETION_MARKER);
    }
}

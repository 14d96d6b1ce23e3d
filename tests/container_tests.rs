//! End-to-end container behaviour through the public API

use std::fs;
use std::path::Path;

use chrono::Utc;
use secrecy::SecretString;
use tempfile::tempdir;

use secretvault::container::format::{trailer, COMPLETION_MARKER, HEADER_LEN_V1, HEADER_LEN_V2, VERSION_1};
use secretvault::crypto::{generate_nonce, generate_salt, ChunkCipher};
use secretvault::{
    derive_keys, is_container, read_container, read_header, read_metadata, write_container, ContainerHeader,
    GeoLocation, KdfParams, KeyPair, MediaMetadata, MediaType, PlaintextSource, StreamOptions, VaultError,
};

fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

fn password_keys(password: &str, salt: &[u8]) -> KeyPair {
    derive_keys(&SecretString::from(password.to_string()), salt, &fast_kdf()).unwrap()
}

fn encrypt(path: &Path, data: &[u8], meta: Option<&MediaMetadata>, keys: &KeyPair, chunk_size: u32) {
    write_container(
        PlaintextSource::Bytes(data),
        MediaType::Video,
        meta,
        keys,
        path,
        &StreamOptions::new().with_chunk_size(chunk_size),
    )
    .unwrap();
}

#[test]
fn password_derived_roundtrip_straddling_chunks() {
    let dir = tempdir().unwrap();
    let salt = generate_salt().unwrap();
    let keys = password_keys("correct horse", &salt);
    let path = dir.path().join("movie.svf");
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

    encrypt(&path, &data, None, &keys, 4096);

    let again = password_keys("correct horse", &salt);
    assert_eq!(read_container(&path, &again).unwrap(), data);

    let wrong = password_keys("battery staple", &salt);
    assert!(matches!(read_container(&path, &wrong), Err(VaultError::DecryptionFailed(_))));
}

#[test]
fn on_disk_size_matches_layout() {
    let dir = tempdir().unwrap();
    let keys = KeyPair::generate();
    let path = dir.path().join("a.svf");
    // 3 full chunks + 1 partial
    encrypt(&path, &[7u8; 350], None, &keys, 100);

    let expected = HEADER_LEN_V2 + 4 * (4 + 12 + 16) + 350 + 4 + COMPLETION_MARKER.len();
    assert_eq!(fs::metadata(&path).unwrap().len() as usize, expected);

    let header = read_header(&path).unwrap();
    assert_eq!(header.original_size, 350);
    assert_eq!(header.media_type, MediaType::Video);
    assert_eq!(header.metadata_length, 0);
}

#[test]
fn tampered_file_on_disk_is_rejected() {
    let dir = tempdir().unwrap();
    let keys = KeyPair::generate();
    let path = dir.path().join("a.svf");
    encrypt(&path, &[1u8; 300], None, &keys, 128);
    let original = fs::read(&path).unwrap();

    // original_size field, first chunk ciphertext, last tag byte before the trailer
    for offset in [8, HEADER_LEN_V2 + 20, original.len() - 13] {
        let mut bytes = original.clone();
        bytes[offset] ^= 0x80;
        fs::write(&path, &bytes).unwrap();
        let err = read_container(&path, &keys).unwrap_err();
        assert!(err.is_integrity_failure(), "offset {} gave {:?}", offset, err);
    }
}

#[test]
fn truncated_file_on_disk_is_rejected() {
    let dir = tempdir().unwrap();
    let keys = KeyPair::generate();
    let path = dir.path().join("a.svf");
    encrypt(&path, &[1u8; 300], None, &keys, 128);
    let original = fs::read(&path).unwrap();

    for cut in [original.len() - 1, original.len() - COMPLETION_MARKER.len(), original.len() - 20] {
        fs::write(&path, &original[..cut]).unwrap();
        let err = read_container(&path, &keys).unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailed(_)), "cut {} gave {:?}", cut, err);
    }
}

#[test]
fn metadata_survives_and_stays_sealed() {
    let dir = tempdir().unwrap();
    let keys = KeyPair::generate();
    let path = dir.path().join("trip.svf");
    let meta = MediaMetadata {
        filename: "IMG_2001.MOV".into(),
        creation_date: Utc::now(),
        original_asset_id: Some("asset-77".into()),
        duration: Some(31.5),
        location: Some(GeoLocation {
            latitude: -33.8568,
            longitude: 151.2153,
        }),
        is_favorite: None,
    };
    encrypt(&path, b"frames", Some(&meta), &keys, 1024);

    let bytes = fs::read(&path).unwrap();
    assert!(!bytes.windows(12).any(|w| w == b"IMG_2001.MOV"));
    assert_eq!(read_metadata(&path, &keys).unwrap(), Some(meta));
    assert_eq!(read_container(&path, &keys).unwrap(), b"frames");
    assert!(read_metadata(&path, &KeyPair::generate()).is_err());
}

#[test]
fn version_one_containers_are_readable() {
    let dir = tempdir().unwrap();
    let keys = KeyPair::generate();
    let path = dir.path().join("legacy.svf");
    let data = b"legacy payload that spans chunks";

    let header = ContainerHeader {
        version: VERSION_1,
        media_type: MediaType::Photo,
        original_size: data.len() as u64,
        chunk_size: 16,
        metadata_length: 0,
    };
    let header_bytes = header.to_bytes();
    assert_eq!(header_bytes.len(), HEADER_LEN_V1);

    let cipher = ChunkCipher::new(keys.encryption_key());
    let mut file = header_bytes.clone();
    for chunk in data.chunks(16) {
        let nonce = generate_nonce();
        file.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        file.extend_from_slice(&nonce);
        file.extend_from_slice(&cipher.seal(&nonce, chunk, &header_bytes).unwrap());
    }
    file.extend_from_slice(&trailer());
    fs::write(&path, &file).unwrap();

    assert_eq!(read_container(&path, &keys).unwrap(), data);
    assert_eq!(read_metadata(&path, &keys).unwrap(), None);
    assert_eq!(read_header(&path).unwrap().version, VERSION_1);
}

#[test]
fn foreign_files_are_not_containers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("photo.jpg");
    fs::write(&path, b"\xFF\xD8\xFF\xE0 not a vault file at all").unwrap();

    assert!(!is_container(&path).unwrap());
    let err = read_container(&path, &KeyPair::generate()).unwrap_err();
    assert!(err.is_format_error());
}

//! SecretVault - Media Metadata
//!
//! Small structured record sealed into the container header region.
//! Block layout: `[nonce 12B][HMAC-SHA256 32B][AES-256-GCM ciphertext + tag]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{open_with_integrity, seal_with_integrity, KeyPair};
use crate::error::{VaultError, VaultResult};

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Metadata stored alongside the media bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub filename: String,
    pub creation_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_asset_id: Option<String>,
    /// Seconds, videos only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

impl MediaMetadata {
    pub fn new(filename: impl Into<String>, creation_date: DateTime<Utc>) -> Self {
        Self {
            filename: filename.into(),
            creation_date,
            original_asset_id: None,
            duration: None,
            location: None,
            is_favorite: None,
        }
    }
}

/// Serialize and seal a metadata record
pub fn seal_metadata(metadata: &MediaMetadata, keys: &KeyPair) -> VaultResult<Vec<u8>> {
    let encoded = zeroize::Zeroizing::new(serde_json::to_vec(metadata)?);
    seal_with_integrity(keys, &encoded)
}

/// Verify, decrypt and deserialize a metadata block
pub fn open_metadata(block: &[u8], keys: &KeyPair) -> VaultResult<MediaMetadata> {
    let plaintext = zeroize::Zeroizing::new(open_with_integrity(keys, block)?);
    serde_json::from_slice(&plaintext)
        .map_err(|e| VaultError::DecryptionFailed(format!("metadata decode failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn full() -> MediaMetadata {
        MediaMetadata {
            filename: "IMG_0042.HEIC".into(),
            creation_date: Utc.with_ymd_and_hms(2024, 7, 14, 9, 30, 15).unwrap()
                + chrono::Duration::nanoseconds(123_456_789),
            original_asset_id: Some("7F3A-22B1/L0/001".into()),
            duration: Some(12.345678901234567),
            location: Some(GeoLocation {
                latitude: 48.858370,
                longitude: -2.294481,
            }),
            is_favorite: Some(false),
        }
    }

    #[test]
    fn test_metadata_roundtrip_all_fields() {
        let keys = KeyPair::generate();
        let meta = full();

        let block = seal_metadata(&meta, &keys).unwrap();
        assert_eq!(open_metadata(&block, &keys).unwrap(), meta);
    }

    #[test]
    fn test_absent_optionals_stay_absent() {
        let keys = KeyPair::generate();
        let meta = MediaMetadata::new("clip.mov", Utc::now());

        let block = seal_metadata(&meta, &keys).unwrap();
        let opened = open_metadata(&block, &keys).unwrap();

        assert_eq!(opened, meta);
        assert!(opened.original_asset_id.is_none());
        assert!(opened.duration.is_none());
        assert!(opened.location.is_none());
        assert!(opened.is_favorite.is_none());
    }

    #[test]
    fn test_wrong_keys_fail() {
        let block = seal_metadata(&full(), &KeyPair::generate()).unwrap();
        let result = open_metadata(&block, &KeyPair::generate());
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let keys = KeyPair::generate();
        let a = seal_metadata(&full(), &keys).unwrap();
        let b = seal_metadata(&full(), &keys).unwrap();
        assert_ne!(a, b);
    }
}

//! SecretVault - Key Provider
//!
//! Where container keys come from. The codec itself never sees a password;
//! it is handed a [`KeyPair`] by whichever provider the caller unlocked.

use std::fs;
use std::io::Write;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::crypto::{derive_all, generate_salt, KdfParams, KeyPair, PasswordVerifier, SALT_LEN, VERIFIER_LEN};
use crate::error::{VaultError, VaultResult};

/// Source of the key pair used for container operations
pub trait KeyProvider: Send + Sync {
    fn unlock(&self) -> VaultResult<KeyPair>;
}

/// Persisted password check: salt, verifier and the KDF cost it was made with.
/// Holds nothing that decrypts a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRecord {
    #[serde(with = "b64")]
    salt: Vec<u8>,
    #[serde(with = "b64")]
    verifier: Vec<u8>,
    pub kdf: KdfParams,
    pub created_at: DateTime<Utc>,
}

impl PasswordRecord {
    /// New record for `password` with a fresh salt
    pub fn create(password: &SecretString, params: &KdfParams) -> VaultResult<Self> {
        let salt = generate_salt()?;
        let derived = derive_all(password, &salt, params)?;
        Ok(Self {
            salt: salt.to_vec(),
            verifier: derived.verifier.as_bytes().to_vec(),
            kdf: params.clone(),
            created_at: Utc::now(),
        })
    }

    pub fn load(path: &Path) -> VaultResult<Self> {
        let data = fs::read(path).map_err(|e| VaultError::io(path, e))?;
        let record: Self = serde_json::from_slice(&data)?;
        record.validate()?;
        Ok(record)
    }

    /// Write atomically, replacing any previous record
    pub fn save(&self, path: &Path) -> VaultResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;

        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| VaultError::io(parent, e))?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| VaultError::io(path, e.error))?;
        tracing::debug!(path = %path.display(), "password record saved");
        Ok(())
    }

    /// Derive keys for `password`, rejecting it if the verifier does not match
    pub fn unlock(&self, password: &SecretString) -> VaultResult<KeyPair> {
        let derived = derive_all(password, &self.salt, &self.kdf)?;
        if !derived.verifier.matches(&self.stored_verifier()?) {
            tracing::warn!("password verification failed");
            return Err(VaultError::InvalidPassword);
        }
        Ok(derived.keys)
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    fn stored_verifier(&self) -> VaultResult<PasswordVerifier> {
        let bytes: [u8; VERIFIER_LEN] = self
            .verifier
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::Serialization("verifier has wrong length".into()))?;
        Ok(PasswordVerifier::new(bytes))
    }

    fn validate(&self) -> VaultResult<()> {
        if self.salt.len() != SALT_LEN {
            return Err(VaultError::Serialization("salt has wrong length".into()));
        }
        self.stored_verifier().map(|_| ())
    }
}

mod b64 {
    use super::{Engine, BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Unlocks with a password checked against a stored record
pub struct PasswordKeyProvider {
    record: PasswordRecord,
    password: SecretString,
}

impl PasswordKeyProvider {
    pub fn new(record: PasswordRecord, password: SecretString) -> Self {
        Self { record, password }
    }

    pub fn record(&self) -> &PasswordRecord {
        &self.record
    }
}

impl KeyProvider for PasswordKeyProvider {
    fn unlock(&self) -> VaultResult<KeyPair> {
        self.record.unlock(&self.password)
    }
}

/// Hands out a key pair the caller already holds
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    keys: KeyPair,
}

impl StaticKeyProvider {
    pub fn new(keys: KeyPair) -> Self {
        Self { keys }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn unlock(&self) -> VaultResult<KeyPair> {
        Ok(self.keys.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{read_container, write_container, MediaType, PlaintextSource, StreamOptions};
    use tempfile::tempdir;

    fn fast() -> KdfParams {
        KdfParams {
            memory_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn password(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_unlock_with_correct_password() {
        let record = PasswordRecord::create(&password("hunter2"), &fast()).unwrap();
        let a = record.unlock(&password("hunter2")).unwrap();
        let b = record.unlock(&password("hunter2")).unwrap();
        assert_eq!(a.encryption_key().expose(), b.encryption_key().expose());
        assert_eq!(a.hmac_key().expose(), b.hmac_key().expose());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let record = PasswordRecord::create(&password("hunter2"), &fast()).unwrap();
        let result = record.unlock(&password("hunter3"));
        assert!(matches!(result, Err(VaultError::InvalidPassword)));
    }

    #[test]
    fn test_record_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("vault.json");
        let record = PasswordRecord::create(&password("pw"), &fast()).unwrap();
        record.save(&path).unwrap();

        let loaded = PasswordRecord::load(&path).unwrap();
        assert_eq!(loaded.salt(), record.salt());
        assert_eq!(loaded.kdf, fast());

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains(&BASE64.encode(record.salt())));
        assert!(loaded.unlock(&password("pw")).is_ok());
    }

    #[test]
    fn test_corrupt_record_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.json");
        let record = PasswordRecord::create(&password("pw"), &fast()).unwrap();
        let mut value: serde_json::Value = serde_json::to_value(&record).unwrap();
        value["salt"] = serde_json::Value::String(BASE64.encode([1u8; 4]));
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(PasswordRecord::load(&path), Err(VaultError::Serialization(_))));
    }

    #[test]
    fn test_missing_record() {
        let dir = tempdir().unwrap();
        let result = PasswordRecord::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(VaultError::FileNotFound(_))));
    }

    #[test]
    fn test_providers_feed_the_codec() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.svf");
        let record = PasswordRecord::create(&password("pw"), &fast()).unwrap();
        let provider: Box<dyn KeyProvider> = Box::new(PasswordKeyProvider::new(record, password("pw")));
        let keys = provider.unlock().unwrap();

        write_container(
            PlaintextSource::Bytes(b"pixels"),
            MediaType::Photo,
            None,
            &keys,
            &path,
            &StreamOptions::default(),
        )
        .unwrap();

        let again = StaticKeyProvider::new(keys).unlock().unwrap();
        assert_eq!(read_container(&path, &again).unwrap(), b"pixels");
    }
}

//! AEAD-encrypted, file-backed store of named deployment credential profiles.
//!
//! A master key, an on-disk JSON container of `(nonce, ciphertext)` pairs,
//! and an in-memory lock guarding both. Each entry is a whole
//! [`CredentialProfile`] (serialized to JSON before encryption), and the
//! master key is generated per-store rather than supplied by a vault, since
//! this crate has no vault of its own.

use crate::error::CredentialError;
use crate::logging::redact_secret;
use aes_gcm::aead::{Aead, KeyInit, OsRng as AeadOsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// How a stored profile authenticates to the deployment's REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    Bearer { token: String },
    OAuth { client_id: String, client_secret: String },
}

/// One named deployment: enough to open a client without re-prompting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialProfile {
    pub name: String,
    pub base_url: String,
    pub auth: AuthMethod,
    /// Optional hint so the client can skip product auto-detection.
    pub product_hint: Option<crate::models::Product>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EncryptedStore {
    entries: HashMap<String, (Vec<u8>, Vec<u8>)>,
}

/// A single corrupt record's `(nonce, ciphertext)` pair, keyed by profile name.
#[derive(Debug, Clone)]
struct CorruptEntry {
    name: String,
    cause: String,
}

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Encrypted on-disk credential store. One process may hold several, each
/// rooted at a different path, though in practice there is one per user
/// config directory (see [`default_store_path`]).
pub struct CredentialStore {
    master_key: [u8; KEY_LEN],
    store: RwLock<EncryptedStore>,
    path: PathBuf,
}

impl CredentialStore {
    /// Opens (or creates) a store at `path`, using `master_key` to decrypt
    /// existing entries. A store directory and file are created with
    /// owner-only permissions on Unix.
    pub fn open(path: impl AsRef<Path>, master_key: [u8; KEY_LEN]) -> Result<Self, CredentialError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            set_owner_only_dir(parent)?;
        }

        let store = if path.exists() {
            let data = std::fs::read(&path)?;
            serde_json::from_slice(&data)
                .map_err(|e| CredentialError::Corrupt(format!("store file is not valid JSON: {e}")))?
        } else {
            EncryptedStore::default()
        };

        Ok(Self { master_key, store: RwLock::new(store), path })
    }

    /// Opens a store at `path`, generating a fresh random master key if no
    /// store yet exists there. Returns the key so the caller can persist it
    /// (e.g. in an OS keychain) for the next [`CredentialStore::open`].
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<(Self, [u8; KEY_LEN]), CredentialError> {
        let mut key = [0u8; KEY_LEN];
        AeadOsRng.fill_bytes(&mut key);
        let store = Self::open(path, key)?;
        Ok((store, key))
    }

    pub fn put(&self, profile: &CredentialProfile) -> Result<(), CredentialError> {
        let plaintext = serde_json::to_vec(profile)
            .map_err(|e| CredentialError::Crypto(format!("serializing profile: {e}")))?;
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        AeadOsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|e| CredentialError::Crypto(format!("encrypting profile: {e}")))?;

        let mut store = self.store.write().expect("credential store lock poisoned");
        store.entries.insert(profile.name.clone(), (nonce_bytes.to_vec(), ciphertext));
        self.persist(&store)?;
        tracing::info!(profile = %profile.name, "credential store: profile saved");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<CredentialProfile, CredentialError> {
        let store = self.store.read().expect("credential store lock poisoned");
        let (nonce_bytes, ciphertext) =
            store.entries.get(name).ok_or_else(|| CredentialError::NotFound(name.to_string()))?;
        self.decrypt_entry(nonce_bytes, ciphertext)
    }

    pub fn delete(&self, name: &str) -> Result<(), CredentialError> {
        let mut store = self.store.write().expect("credential store lock poisoned");
        store.entries.remove(name);
        self.persist(&store)?;
        tracing::info!(profile = %name, "credential store: profile deleted");
        Ok(())
    }

    /// Names of every stored profile that decrypts cleanly, in sorted order.
    /// A single corrupt record is skipped rather than failing the whole
    /// listing; see [`CredentialStore::list_with_errors`] to observe which.
    pub fn list(&self) -> Vec<String> {
        let (mut names, _) = self.list_with_errors();
        names.sort();
        names
    }

    fn list_with_errors(&self) -> (Vec<String>, Vec<CorruptEntry>) {
        let store = self.store.read().expect("credential store lock poisoned");
        let mut names = Vec::new();
        let mut corrupt = Vec::new();
        let key_b64 = Self::export_key(&self.master_key);
        for (name, (nonce_bytes, ciphertext)) in store.entries.iter() {
            match self.decrypt_entry(nonce_bytes, ciphertext) {
                Ok(_) => names.push(name.clone()),
                Err(e) => {
                    let cause = redact_secret(&e.to_string(), &key_b64);
                    tracing::warn!(profile = %name, error = %cause, "credential store: skipping corrupt entry");
                    corrupt.push(CorruptEntry { name: name.clone(), cause });
                },
            }
        }
        (names, corrupt)
    }

    /// Base64-encodes the master key, for the caller to hand the user once at
    /// creation time. The key is never written to the store file itself.
    pub fn export_key(key: &[u8; KEY_LEN]) -> String {
        base64::engine::general_purpose::STANDARD.encode(key)
    }

    pub fn import_key(encoded: &str) -> Result<[u8; KEY_LEN], CredentialError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CredentialError::Crypto(format!("invalid key encoding: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| CredentialError::Crypto("key must decode to 32 bytes".to_string()))
    }

    fn cipher(&self) -> Result<Aes256Gcm, CredentialError> {
        Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|e| CredentialError::Crypto(format!("invalid master key: {e}")))
    }

    fn decrypt_entry(
        &self,
        nonce_bytes: &[u8],
        ciphertext: &[u8],
    ) -> Result<CredentialProfile, CredentialError> {
        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CredentialError::Corrupt(format!("decryption failed: {e}")))?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CredentialError::Corrupt(format!("decrypted payload is not valid JSON: {e}")))
    }

    fn persist(&self, store: &EncryptedStore) -> Result<(), CredentialError> {
        let json = serde_json::to_vec(store)
            .map_err(|e| CredentialError::Crypto(format!("serializing store: {e}")))?;
        std::fs::write(&self.path, json)?;
        set_owner_only_file(&self.path)?;
        Ok(())
    }
}

/// `<user-config>/cribl-hc/credentials.json`, the default store location.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cribl-hc").join("credentials.json"))
}

#[cfg(unix)]
fn set_owner_only_file(path: &Path) -> Result<(), CredentialError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_owner_only_file(_path: &Path) -> Result<(), CredentialError> {
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_dir(path: &Path) -> Result<(), CredentialError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_owner_only_dir(_path: &Path) -> Result<(), CredentialError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> CredentialProfile {
        CredentialProfile {
            name: name.to_string(),
            base_url: "https://example.cribl.cloud".to_string(),
            auth: AuthMethod::Bearer { token: "tkn-123".to_string() },
            product_hint: Some(crate::models::Product::Stream),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _key) = CredentialStore::open_or_create(dir.path().join("creds.json")).unwrap();
        store.put(&sample("prod")).unwrap();
        let fetched = store.get("prod").unwrap();
        assert_eq!(fetched.base_url, "https://example.cribl.cloud");
    }

    #[test]
    fn get_missing_profile_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _key) = CredentialStore::open_or_create(dir.path().join("creds.json")).unwrap();
        assert!(matches!(store.get("nope"), Err(CredentialError::NotFound(_))));
    }

    #[test]
    fn delete_removes_profile() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _key) = CredentialStore::open_or_create(dir.path().join("creds.json")).unwrap();
        store.put(&sample("prod")).unwrap();
        store.delete("prod").unwrap();
        assert!(store.get("prod").is_err());
    }

    #[test]
    fn list_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _key) = CredentialStore::open_or_create(dir.path().join("creds.json")).unwrap();
        store.put(&sample("zebra")).unwrap();
        store.put(&sample("alpha")).unwrap();
        assert_eq!(store.list(), vec!["alpha".to_string(), "zebra".to_string()]);
    }

    #[test]
    fn reopening_with_wrong_key_cannot_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        let (store, _key) = CredentialStore::open_or_create(&path).unwrap();
        store.put(&sample("prod")).unwrap();

        let mut wrong_key = [0u8; KEY_LEN];
        AeadOsRng.fill_bytes(&mut wrong_key);
        let reopened = CredentialStore::open(&path, wrong_key).unwrap();
        assert!(matches!(reopened.get("prod"), Err(CredentialError::Corrupt(_))));
    }

    #[test]
    fn export_then_import_key_round_trips() {
        let mut key = [0u8; KEY_LEN];
        AeadOsRng.fill_bytes(&mut key);
        let encoded = CredentialStore::export_key(&key);
        let decoded = CredentialStore::import_key(&encoded).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn one_corrupt_record_does_not_break_listing_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        let (store, key) = CredentialStore::open_or_create(&path).unwrap();
        store.put(&sample("good")).unwrap();
        drop(store);

        // Corrupt a second entry directly, bypassing the API.
        let raw = std::fs::read(&path).unwrap();
        let mut parsed: EncryptedStore = serde_json::from_slice(&raw).unwrap();
        parsed.entries.insert("bad".to_string(), (vec![0u8; NONCE_LEN], vec![1, 2, 3]));
        std::fs::write(&path, serde_json::to_vec(&parsed).unwrap()).unwrap();

        let reopened = CredentialStore::open(&path, key).unwrap();
        let (names, corrupt) = reopened.list_with_errors();
        assert_eq!(names, vec!["good".to_string()]);
        assert_eq!(corrupt.len(), 1);
        assert_eq!(corrupt[0].name, "bad");
    }
}

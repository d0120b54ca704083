use crate::crypto::cache::DecryptCache;
use crate::crypto::identity::{VaultIdentity, VaultKey};
use crate::types::Payload;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("encryption failed")]
    Encrypt,
}

/// Encrypts payloads with the vault key and memoizes decryptions.
///
/// Without a key the codec is a passthrough: the canonical JSON form is
/// stored as is and read back without decryption.
pub struct CipherCodec {
    key: Option<VaultKey>,
    cache: Mutex<DecryptCache>,
}

impl CipherCodec {
    pub fn new(identity: &VaultIdentity) -> Self {
        if !identity.is_encrypted() {
            tracing::warn!(
                namespace = identity.namespace(),
                "no passphrase set, vault payloads are stored unencrypted"
            );
        }
        Self::from_key(identity.key().cloned())
    }

    pub fn from_key(key: Option<VaultKey>) -> Self {
        Self {
            key,
            cache: Mutex::new(DecryptCache::default()),
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.key.is_none()
    }

    fn cipher(key: &VaultKey) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
    }

    fn cache(&self) -> MutexGuard<'_, DecryptCache> {
        // Entries are immutable once inserted, so a poisoned lock holds consistent data.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Payload operations.
impl CipherCodec {
    pub fn encrypt(&self, payload: &Payload) -> Result<String, CodecError> {
        self.encrypt_text(serde_json::to_string(payload)?)
    }

    /// Returns `None` when the ciphertext cannot be decrypted or decoded.
    pub fn decrypt(&self, ciphertext: &str) -> Option<Payload> {
        if let Some(payload) = self.cache().get(ciphertext) {
            return Some(payload.clone());
        }

        let payload = self.decrypt_uncached(ciphertext)?;
        self.cache().insert(ciphertext, payload.clone());
        Some(payload)
    }

    /// Decrypts a unified-generation record, expecting raw tagged text.
    pub fn decrypt_raw(&self, ciphertext: &str) -> Option<String> {
        self.decrypt(ciphertext)?.into_raw()
    }

    fn decrypt_uncached(&self, ciphertext: &str) -> Option<Payload> {
        serde_json::from_str(&self.decrypt_text(ciphertext)?).ok()
    }
}

/// Canonical text operations. Used where the plaintext is JSON of a shape
/// other than [`Payload`], such as legacy schema rows. Not cached.
impl CipherCodec {
    pub(crate) fn encrypt_text(&self, canonical: String) -> Result<String, CodecError> {
        let Some(key) = &self.key else {
            return Ok(canonical);
        };

        let sealed = self.seal(key, canonical.as_bytes())?;
        Ok(STANDARD.encode(sealed))
    }

    /// Returns `None` only when the ciphertext cannot be opened with this key.
    pub(crate) fn decrypt_text(&self, ciphertext: &str) -> Option<String> {
        match &self.key {
            None => Some(ciphertext.to_string()),
            Some(key) => {
                let sealed = STANDARD.decode(ciphertext).ok()?;
                String::from_utf8(Self::open(key, &sealed)?).ok()
            }
        }
    }
}

/// Binary payload operations (attachments). Not cached.
impl CipherCodec {
    pub fn encrypt_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        match &self.key {
            None => Ok(bytes.to_vec()),
            Some(key) => self.seal(key, bytes),
        }
    }

    pub fn decrypt_bytes(&self, sealed: &[u8]) -> Option<Vec<u8>> {
        match &self.key {
            None => Some(sealed.to_vec()),
            Some(key) => Self::open(key, sealed),
        }
    }

    fn seal(&self, key: &VaultKey, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let encrypted = Self::cipher(key)
            .encrypt(&nonce, plaintext)
            .map_err(|_| CodecError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + encrypted.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&encrypted);
        Ok(sealed)
    }

    fn open(key: &VaultKey, sealed: &[u8]) -> Option<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return None;
        }
        let (nonce, encrypted) = sealed.split_at(NONCE_LEN);
        Self::cipher(key)
            .decrypt(Nonce::from_slice(nonce), encrypted)
            .ok()
    }
}

/// Cache management.
impl CipherCodec {
    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }
}

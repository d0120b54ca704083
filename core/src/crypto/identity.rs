use crate::error::ValidationError;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Upper bound on key-stretching rounds.
pub const MAX_STRETCH_ROUNDS: usize = 50;

pub const DEFAULT_NAMESPACE_PREFIX: &str = "T3VO";

/// 256-bit symmetric key, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; 32]);

impl VaultKey {
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

/// Session identity of a vault: where it is stored and how it is encrypted.
///
/// Lives only in memory. A vault derived from an empty passphrase has no key,
/// and every codec built from it stores payloads unencrypted; this mode exists
/// for local testing and must be requested explicitly through
/// [`VaultIdentity::derive`] (use [`VaultIdentity::derive_strict`] to refuse it).
#[derive(Debug, Clone)]
pub struct VaultIdentity {
    namespace: String,
    key: Option<VaultKey>,
}

impl VaultIdentity {
    /// Derives the identity with the default namespace prefix.
    pub fn derive(passphrase: &str) -> Self {
        Self::derive_with_prefix(passphrase, DEFAULT_NAMESPACE_PREFIX)
    }

    /// Like [`VaultIdentity::derive`] but rejects the empty passphrase.
    pub fn derive_strict(passphrase: &str, prefix: &str) -> Result<Self, ValidationError> {
        if passphrase.is_empty() {
            return Err(ValidationError::InvalidPassphrase(
                "passphrase must not be empty".to_string(),
            ));
        }
        Ok(Self::derive_with_prefix(passphrase, prefix))
    }

    pub fn derive_with_prefix(passphrase: &str, prefix: &str) -> Self {
        let namespace = format!("{}-{}", prefix, sha256_hex(passphrase));

        let key = if passphrase.is_empty() {
            None
        } else {
            let stretched = stretch(passphrase);
            let mut bytes = [0u8; 32];
            // A SHA-256 hex digest always decodes into exactly 32 bytes.
            hex::decode_to_slice(&stretched, &mut bytes).ok().map(|_| VaultKey(bytes))
        };

        Self { namespace, key }
    }

    /// Public storage namespace, `<prefix>-<sha256(passphrase)>`.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self) -> Option<&VaultKey> {
        self.key.as_ref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Hashes the hex output of the previous round, `min(50, chars)` times.
fn stretch(passphrase: &str) -> String {
    let rounds = passphrase.chars().count().min(MAX_STRETCH_ROUNDS);
    let mut hash = passphrase.to_string();
    for _ in 0..rounds {
        hash = sha256_hex(&hash);
    }
    hash
}

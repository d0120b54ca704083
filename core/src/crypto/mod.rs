//! Passphrase-derived vault identity and payload encryption.

pub(crate) mod cache;
pub(crate) mod codec;
pub(crate) mod identity;

pub use cache::{DECRYPT_CACHE_CAPACITY, DecryptCache};
pub use codec::{CipherCodec, CodecError};
pub use identity::{DEFAULT_NAMESPACE_PREFIX, MAX_STRETCH_ROUNDS, VaultIdentity, VaultKey};

use std::path::PathBuf;

/// Core configuration for VaultCore initialization.
#[derive(Clone)]
pub struct Config {
    pub base_path: PathBuf,
    /// Storage namespace of the vault, see `VaultIdentity::namespace`.
    pub namespace: String,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.redb", self.namespace))
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.base_path.join("blobs").join(&self.namespace)
    }
}

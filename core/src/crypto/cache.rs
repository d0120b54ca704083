use crate::types::Payload;
use std::collections::{HashMap, VecDeque};

pub const DECRYPT_CACHE_CAPACITY: usize = 1000;

/// Bounded memo of decrypted payloads keyed by ciphertext digest.
///
/// Eviction is FIFO: once full, the entry inserted first is dropped before a
/// new one is added. Lookups do not refresh an entry's position.
#[derive(Debug)]
pub struct DecryptCache {
    capacity: usize,
    order: VecDeque<blake3::Hash>,
    entries: HashMap<blake3::Hash, Payload>,
}

impl Default for DecryptCache {
    fn default() -> Self {
        Self::with_capacity(DECRYPT_CACHE_CAPACITY)
    }
}

impl DecryptCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(DECRYPT_CACHE_CAPACITY)),
            entries: HashMap::new(),
        }
    }

    fn digest(ciphertext: &str) -> blake3::Hash {
        blake3::hash(ciphertext.as_bytes())
    }

    pub fn get(&self, ciphertext: &str) -> Option<&Payload> {
        self.entries.get(&Self::digest(ciphertext))
    }

    pub fn contains(&self, ciphertext: &str) -> bool {
        self.entries.contains_key(&Self::digest(ciphertext))
    }

    pub fn insert(&mut self, ciphertext: &str, payload: Payload) {
        if self.capacity == 0 {
            return;
        }

        let digest = Self::digest(ciphertext);
        if self.entries.contains_key(&digest) {
            return;
        }

        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }

        self.order.push_back(digest);
        self.entries.insert(digest, payload);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use crate::crypto::keys::PublicKey;
use crate::crypto::signature::{verify_hash, Sig};
use crate::types::address::Address;

/// Registry mapping node addresses to their Ed25519 public keys.
///
/// Populated once at startup from the configured peer list and shared by
/// injection rather than process-wide globals. The lock is never held
/// across await points.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: RwLock<HashMap<Address, PublicKey>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        KeyRegistry {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Register the public key for an address, replacing any previous entry
    pub fn write_public_key(&self, address: Address, key: PublicKey) {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert(address, key);
    }

    /// Look up the public key for an address
    pub fn lookup(&self, address: &Address) -> Option<PublicKey> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.get(address).copied()
    }

    /// Verify a block-hash signature attributed to an address.
    /// Unknown addresses fail verification.
    pub fn verify(&self, block_hash: &str, signature: &Sig, address: &Address) -> bool {
        match self.lookup(address) {
            Some(key) => verify_hash(&key, block_hash, signature).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::hash::{hash_blake3, Hash};
use crate::error::CoreError;
use crate::serialize;
use crate::types::transaction::Transaction;

/// Previous-hash literal carried by the genesis block
pub const GENESIS_PREV_HASH: &str = "000000";

/// One block on the chain, in either payload flavor.
///
/// `tx_map` is keyed by transaction digest in a `BTreeMap` so the canonical
/// encoding (and therefore the block hash) does not depend on insertion
/// order. `interval_validations` and `all_valid` are meaningful for the ML
/// flavor; financial blocks and genesis carry an empty map and `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Monotonic block number, 0 for genesis
    pub block_id: u64,
    /// Hex digest of the predecessor at nonce 0; genesis uses "000000"
    pub prev_hash: String,
    pub tx_map: BTreeMap<Hash, Transaction>,
    /// Set exactly once when the block is appended to the chain
    pub merkle_root: Option<Hash>,
    /// Per-interval majority verdicts of the validation sub-protocol
    pub interval_validations: BTreeMap<u32, bool>,
    pub all_valid: bool,
}

impl Block {
    pub fn new(tx_map: BTreeMap<Hash, Transaction>, prev_hash: String, block_id: u64) -> Self {
        Block {
            block_id,
            prev_hash,
            tx_map,
            merkle_root: None,
            interval_validations: BTreeMap::new(),
            all_valid: true,
        }
    }

    pub fn with_validations(
        tx_map: BTreeMap<Hash, Transaction>,
        prev_hash: String,
        block_id: u64,
        interval_validations: BTreeMap<u32, bool>,
        all_valid: bool,
    ) -> Self {
        Block {
            block_id,
            prev_hash,
            tx_map,
            merkle_root: None,
            interval_validations,
            all_valid,
        }
    }

    /// The genesis block: id 0, the literal previous hash, no transactions
    pub fn genesis() -> Self {
        Block::new(BTreeMap::new(), GENESIS_PREV_HASH.to_string(), 0)
    }

    /// Transaction digests in key order
    pub fn digests(&self) -> Vec<Hash> {
        self.tx_map.keys().copied().collect()
    }
}

/// Compute the hex digest of a block at a given nonce.
///
/// Deterministic and stable across runs: Blake3 over the canonical bincode
/// encoding of the block followed by the little-endian nonce. Part of the
/// wire contract; quorum derivation, signatures, and skeleton verification
/// all agree on this function.
pub fn block_hash(block: &Block, nonce: u64) -> Result<String, CoreError> {
    let mut bytes = serialize::to_bytes(block)?;
    bytes.extend_from_slice(&nonce.to_le_bytes());
    Ok(hash_blake3(&bytes).to_hex())
}

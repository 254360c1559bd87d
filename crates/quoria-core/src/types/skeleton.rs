use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::hash::Hash;
use crate::crypto::signature::Sig;
use crate::error::CoreError;
use crate::types::address::Address;
use crate::types::block::{block_hash, Block};

/// A quorum member's signature over a candidate block hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSignature {
    pub address: Address,
    /// Hex digest the signer committed to
    pub hash: String,
    pub signature: Sig,
}

/// The compact commit record broadcast to non-quorum peers.
///
/// Carries everything a peer needs to reassemble the committed block from
/// its own mempool: the ordered transaction digests, the collected quorum
/// signatures, the agreed block hash, and the interval-validation verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSkeleton {
    pub block_id: u64,
    pub keys: Vec<Hash>,
    pub signatures: Vec<BlockSignature>,
    pub hash: String,
    pub interval_validations: BTreeMap<u32, bool>,
    pub all_valid: bool,
}

impl BlockSkeleton {
    /// Build the skeleton for a block about to be committed
    pub fn from_block(block: &Block, signatures: Vec<BlockSignature>) -> Result<Self, CoreError> {
        Ok(BlockSkeleton {
            block_id: block.block_id,
            keys: block.digests(),
            signatures,
            hash: block_hash(block, 0)?,
            interval_validations: block.interval_validations.clone(),
            all_valid: block.all_valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;
    use crate::crypto::signature::sign_hash;
    use crate::types::transaction::{Transaction, TransferTransaction};

    #[test]
    fn test_skeleton_from_block() {
        let tx = Transaction::Transfer(TransferTransaction::new("a", "b", 1, "tx-1"));
        let mut tx_map = BTreeMap::new();
        tx_map.insert(tx.digest(), tx.clone());
        let block = Block::new(tx_map, "00".repeat(32), 3);

        let kp = KeyPair::generate();
        let hash = block_hash(&block, 0).unwrap();
        let signature = BlockSignature {
            address: Address::new("127.0.0.1", 9000),
            hash: hash.clone(),
            signature: sign_hash(&kp.secret, &hash),
        };

        let skeleton = BlockSkeleton::from_block(&block, vec![signature]).unwrap();
        assert_eq!(skeleton.block_id, 3);
        assert_eq!(skeleton.keys, vec![tx.digest()]);
        assert_eq!(skeleton.hash, hash);
        assert_eq!(skeleton.signatures.len(), 1);
    }
}

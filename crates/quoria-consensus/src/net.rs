//! Wire message types.
//!
//! Each protocol message kind maps to one HTTP route with a JSON body;
//! two-way exchanges carry their protocol reply in the HTTP response.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use quoria_core::{Address, BlockSignature, BlockSkeleton, Hash, MerkleProof, Transaction};

/// Generic acknowledgement for one-way messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    pub fn ok() -> Self {
        Ack {
            status: "ok".to_string(),
        }
    }
}

/// QUORUM_READY: a quorum member announces the round is starting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumReadyRequest {
    pub sender: Address,
}

/// Reply to QUORUM_READY: agreement on the tip, or the receiver's view
/// of the chain when it disagrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuorumReadyResponse {
    Ping,
    Reconcile { block_id: u64, block_hash: String },
}

/// RECONCILE_BLOCK confirm: the caller's newer block id, sent when the
/// replying peer turned out to be behind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileNotice {
    pub sender: Address,
    pub block_id: u64,
}

/// RECEIVE_MEMPOOL request leg: the sender's pending digest set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolKeysRequest {
    pub sender: Address,
    pub keys: BTreeSet<Hash>,
}

/// Reply to the digest set: agreement, or the digests the receiver lacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MempoolKeysResponse {
    Ping,
    Request { missing: Vec<Hash> },
}

/// RECEIVE_MEMPOOL reply leg: the transactions a peer asked for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolTransactionsRequest {
    pub sender: Address,
    pub transactions: Vec<Transaction>,
}

/// RECEIVE_SIGNATURE: one quorum member's signature over its candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureNotice {
    pub signature: BlockSignature,
}

/// RECEIVE_SKELETON: the compact commit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonNotice {
    pub skeleton: BlockSkeleton,
}

/// RECEIVE_INTERVAL_VALIDATION: one member's verdict on its assigned
/// training interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalValidationNotice {
    pub sender: Address,
    pub is_valid: bool,
    pub interval_index: u32,
}

/// ADD_TRANSACTION: gossip of a pending transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionGossip {
    pub transaction: Transaction,
}

/// Peer bootstrap handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub sender: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub accepted: bool,
}

/// Wallet subscription to commits touching an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSubscribeRequest {
    pub account: String,
    pub address: Address,
}

/// ALERT_WALLET: Merkle inclusion proof for a committed transaction that
/// touched a subscribed account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAlert {
    pub block_id: u64,
    pub proof: MerkleProof,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quoria_core::{
        hash_blake3, sign_hash, KeyPair, MerkleTree, ModelData, TransferTransaction,
    };

    fn roundtrip<T>(value: &T) -> T
    where
        T: Serialize + for<'de> Deserialize<'de>,
    {
        let json = serde_json::to_string(value).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    fn addr() -> Address {
        Address::new("127.0.0.1", 9000)
    }

    #[test]
    fn test_quorum_ready_roundtrip() {
        let request = roundtrip(&QuorumReadyRequest { sender: addr() });
        assert_eq!(request.sender, addr());

        assert_eq!(roundtrip(&QuorumReadyResponse::Ping), QuorumReadyResponse::Ping);
        let reconcile = QuorumReadyResponse::Reconcile {
            block_id: 4,
            block_hash: "ab".repeat(32),
        };
        assert_eq!(roundtrip(&reconcile), reconcile);
    }

    #[test]
    fn test_reconcile_notice_roundtrip() {
        let notice = roundtrip(&ReconcileNotice {
            sender: addr(),
            block_id: 9,
        });
        assert_eq!(notice.block_id, 9);
    }

    #[test]
    fn test_mempool_messages_roundtrip() {
        let keys: BTreeSet<Hash> = [hash_blake3(b"tx-1"), hash_blake3(b"tx-2")]
            .into_iter()
            .collect();
        let request = roundtrip(&MempoolKeysRequest {
            sender: addr(),
            keys: keys.clone(),
        });
        assert_eq!(request.keys, keys);

        assert_eq!(roundtrip(&MempoolKeysResponse::Ping), MempoolKeysResponse::Ping);
        let missing = MempoolKeysResponse::Request {
            missing: vec![hash_blake3(b"tx-2")],
        };
        assert_eq!(roundtrip(&missing), missing);

        let txs = roundtrip(&MempoolTransactionsRequest {
            sender: addr(),
            transactions: vec![
                Transaction::Transfer(TransferTransaction::new("a", "b", 1, "tx-1")),
                Transaction::Model(ModelData::new("model-1", vec![true, false])),
            ],
        });
        assert_eq!(txs.transactions.len(), 2);
    }

    #[test]
    fn test_signature_notice_roundtrip() {
        let kp = KeyPair::generate();
        let hash = "cd".repeat(32);
        let notice = roundtrip(&SignatureNotice {
            signature: BlockSignature {
                address: addr(),
                hash: hash.clone(),
                signature: sign_hash(&kp.secret, &hash),
            },
        });
        assert_eq!(notice.signature.hash, hash);
    }

    #[test]
    fn test_skeleton_notice_roundtrip() {
        let skeleton = BlockSkeleton {
            block_id: 2,
            keys: vec![hash_blake3(b"tx-1")],
            signatures: Vec::new(),
            hash: "ef".repeat(32),
            interval_validations: [(0, true), (1, false)].into_iter().collect(),
            all_valid: false,
        };
        let notice = roundtrip(&SkeletonNotice {
            skeleton: skeleton.clone(),
        });
        assert_eq!(notice.skeleton, skeleton);
    }

    #[test]
    fn test_interval_validation_roundtrip() {
        let notice = roundtrip(&IntervalValidationNotice {
            sender: addr(),
            is_valid: true,
            interval_index: 3,
        });
        assert!(notice.is_valid);
        assert_eq!(notice.interval_index, 3);
    }

    #[test]
    fn test_transaction_gossip_roundtrip() {
        let gossip = roundtrip(&TransactionGossip {
            transaction: Transaction::Transfer(TransferTransaction::new("a", "b", 5, "tx-1")),
        });
        assert_eq!(gossip.transaction.uid(), "tx-1");
    }

    #[test]
    fn test_connect_roundtrip() {
        let request = roundtrip(&ConnectRequest { sender: addr() });
        assert_eq!(request.sender, addr());
        assert!(roundtrip(&ConnectResponse { accepted: true }).accepted);
    }

    #[test]
    fn test_wallet_messages_roundtrip() {
        let subscribe = roundtrip(&WalletSubscribeRequest {
            account: "alice".to_string(),
            address: addr(),
        });
        assert_eq!(subscribe.account, "alice");

        let leaves = vec![hash_blake3(b"tx-1"), hash_blake3(b"tx-2")];
        let tree = MerkleTree::new(leaves.clone());
        let proof = tree.proof(&leaves[0]).unwrap();
        let alert = roundtrip(&WalletAlert { block_id: 1, proof });
        assert!(alert.proof.verify(&tree.root().unwrap()));
    }

    #[test]
    fn test_ack_roundtrip() {
        assert_eq!(roundtrip(&Ack::ok()).status, "ok");
    }
}

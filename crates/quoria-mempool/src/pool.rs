use std::collections::{BTreeMap, BTreeSet};

use quoria_core::{Hash, Transaction};
use tokio::sync::RwLock;
use tracing::debug;

/// The transaction mempool: pending transactions keyed by UID digest.
///
/// Every round the quorum reconciles pools key-by-key and then commits the
/// whole pool, so there is no ordering or eviction policy; the map is a
/// `BTreeMap` to make snapshots deterministic.
#[derive(Debug, Default)]
pub struct Mempool {
    txs: RwLock<BTreeMap<Hash, Transaction>>,
}

/// Mempool errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum MempoolError {
    #[error("Transaction already exists in mempool")]
    AlreadyExists,
}

impl Mempool {
    pub fn new() -> Self {
        Mempool::default()
    }

    /// Check if a digest is pending
    pub async fn contains(&self, digest: &Hash) -> bool {
        let txs = self.txs.read().await;
        txs.contains_key(digest)
    }

    /// Add a transaction, keyed by its UID digest
    pub async fn insert(&self, tx: Transaction) -> Result<Hash, MempoolError> {
        let digest = tx.digest();
        let mut txs = self.txs.write().await;
        if txs.contains_key(&digest) {
            return Err(MempoolError::AlreadyExists);
        }
        txs.insert(digest, tx);
        debug!("added transaction {digest} to mempool");
        Ok(digest)
    }

    /// Transactions for the given digests; absent digests are omitted
    pub async fn get_many(&self, digests: &[Hash]) -> Vec<Transaction> {
        let txs = self.txs.read().await;
        digests
            .iter()
            .filter_map(|digest| txs.get(digest).cloned())
            .collect()
    }

    /// The current set of pending digests
    pub async fn snapshot_keys(&self) -> BTreeSet<Hash> {
        let txs = self.txs.read().await;
        txs.keys().copied().collect()
    }

    /// A copy of the full pool
    pub async fn snapshot(&self) -> BTreeMap<Hash, Transaction> {
        let txs = self.txs.read().await;
        txs.clone()
    }

    /// Digests from `keys` that are not pending locally
    pub async fn missing_from(&self, keys: &BTreeSet<Hash>) -> Vec<Hash> {
        let txs = self.txs.read().await;
        keys.iter()
            .filter(|digest| !txs.contains_key(digest))
            .copied()
            .collect()
    }

    /// Copies of the transactions for `digests`, or None if any is absent
    pub async fn peek_many(&self, digests: &[Hash]) -> Option<BTreeMap<Hash, Transaction>> {
        let txs = self.txs.read().await;
        let mut out = BTreeMap::new();
        for digest in digests {
            out.insert(*digest, txs.get(digest)?.clone());
        }
        Some(out)
    }

    /// Atomically remove `digests`: either all are present and drained, or
    /// nothing is removed and None is returned
    pub async fn drain_many(&self, digests: &[Hash]) -> Option<BTreeMap<Hash, Transaction>> {
        let mut txs = self.txs.write().await;
        if !digests.iter().all(|digest| txs.contains_key(digest)) {
            return None;
        }
        let mut out = BTreeMap::new();
        for digest in digests {
            if let Some(tx) = txs.remove(digest) {
                out.insert(*digest, tx);
            }
        }
        Some(out)
    }

    /// Empty the pool. Inserts racing past the clear simply start the next
    /// round's pool.
    pub async fn clear(&self) {
        let mut txs = self.txs.write().await;
        txs.clear();
    }

    pub async fn len(&self) -> usize {
        let txs = self.txs.read().await;
        txs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quoria_core::TransferTransaction;

    fn tx(uid: &str) -> Transaction {
        Transaction::Transfer(TransferTransaction::new("a", "b", 1, uid))
    }

    #[tokio::test]
    async fn test_insert_and_contains() {
        let pool = Mempool::new();
        let transaction = tx("tx-1");
        let digest = pool.insert(transaction).await.unwrap();

        assert!(pool.contains(&digest).await);
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_rejection() {
        let pool = Mempool::new();
        pool.insert(tx("tx-1")).await.unwrap();
        let result = pool.insert(tx("tx-1")).await;
        assert!(matches!(result, Err(MempoolError::AlreadyExists)));
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_empties_pool() {
        let pool = Mempool::new();
        pool.insert(tx("tx-1")).await.unwrap();
        pool.insert(tx("tx-2")).await.unwrap();

        pool.clear().await;
        assert!(pool.is_empty().await);

        // Inserts after clear start the next round's pool
        pool.insert(tx("tx-3")).await.unwrap();
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_from() {
        let pool = Mempool::new();
        let have = tx("tx-1");
        let absent = tx("tx-2");
        pool.insert(have.clone()).await.unwrap();

        let keys: BTreeSet<Hash> = [have.digest(), absent.digest()].into_iter().collect();
        let missing = pool.missing_from(&keys).await;
        assert_eq!(missing, vec![absent.digest()]);
    }

    #[tokio::test]
    async fn test_get_many_omits_absent() {
        let pool = Mempool::new();
        let have = tx("tx-1");
        pool.insert(have.clone()).await.unwrap();

        let got = pool
            .get_many(&[have.digest(), tx("tx-2").digest()])
            .await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].uid(), "tx-1");
    }

    #[tokio::test]
    async fn test_drain_many_atomic() {
        let pool = Mempool::new();
        let first = tx("tx-1");
        let second = tx("tx-2");
        pool.insert(first.clone()).await.unwrap();

        // One digest absent: nothing is removed
        let drained = pool.drain_many(&[first.digest(), second.digest()]).await;
        assert!(drained.is_none());
        assert_eq!(pool.len().await, 1);

        pool.insert(second.clone()).await.unwrap();
        let drained = pool
            .drain_many(&[first.digest(), second.digest()])
            .await
            .unwrap();
        assert_eq!(drained.len(), 2);
        assert!(pool.is_empty().await);
    }
}

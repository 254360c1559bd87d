use quoria_core::{Block, Hash, MerkleTree, Transaction};
use tracing::info;

use crate::accounts::Accounts;

/// The committed chain and its derived ledger, kept entirely in memory
/// and guarded by one lock (the block lock) at the node level.
#[derive(Debug, Default)]
pub struct Blockchain {
    blocks: Vec<Block>,
    accounts: Accounts,
}

impl Blockchain {
    /// An empty chain; genesis is appended through the ordinary commit path
    pub fn new<I>(initial_balances: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        Blockchain {
            blocks: Vec::new(),
            accounts: Accounts::from_entries(initial_balances),
        }
    }

    /// The last block on the chain
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Number of committed blocks; also the next block id
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Whether a transaction digest already appears in any committed block
    pub fn contains_digest(&self, digest: &Hash) -> bool {
        self.blocks
            .iter()
            .any(|block| block.tx_map.contains_key(digest))
    }

    /// Append a block: set its Merkle root (exactly once), apply balance
    /// updates, and push it onto the chain. Returns the Merkle tree so the
    /// caller can produce inclusion proofs for wallet alerts.
    pub fn append(&mut self, mut block: Block) -> MerkleTree {
        let tree = MerkleTree::new(block.digests());
        block.merkle_root = tree.root();

        for tx in block.tx_map.values() {
            if let Transaction::Transfer(transfer) = tx {
                self.accounts.apply(transfer);
            }
        }

        info!(
            block_id = block.block_id,
            transactions = block.tx_map.len(),
            "appended block"
        );
        self.blocks.push(block);
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quoria_core::{block_hash, TransferTransaction};
    use std::collections::BTreeMap;

    fn transfer(from: &str, to: &str, amount: i64, uid: &str) -> Transaction {
        Transaction::Transfer(TransferTransaction::new(from, to, amount, uid))
    }

    fn next_block(chain: &Blockchain, txs: Vec<Transaction>) -> Block {
        let tip = chain.tip().expect("chain has genesis");
        let tx_map: BTreeMap<Hash, Transaction> =
            txs.into_iter().map(|tx| (tx.digest(), tx)).collect();
        Block::new(tx_map, block_hash(tip, 0).unwrap(), chain.height())
    }

    #[test]
    fn test_genesis_append() {
        let mut chain = Blockchain::new([]);
        chain.append(Block::genesis());

        assert_eq!(chain.height(), 1);
        let tip = chain.tip().unwrap();
        assert_eq!(tip.block_id, 0);
        // No transactions, so no Merkle root is set
        assert_eq!(tip.merkle_root, None);
    }

    #[test]
    fn test_monotonic_chain_invariant() {
        let mut chain = Blockchain::new([("a".to_string(), 100)]);
        chain.append(Block::genesis());

        for i in 0..3 {
            let block = next_block(
                &chain,
                vec![transfer("a", "b", 1, &format!("tx-{i}"))],
            );
            chain.append(block);
        }

        let blocks = chain.blocks();
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].block_id, pair[0].block_id + 1);
            assert_eq!(pair[1].prev_hash, block_hash(&pair[0], 0).unwrap());
        }
    }

    #[test]
    fn test_append_applies_balances() {
        let mut chain = Blockchain::new([("a".to_string(), 10)]);
        chain.append(Block::genesis());

        let block = next_block(
            &chain,
            vec![transfer("a", "b", 5, "tx-1"), transfer("b", "c", 3, "tx-2")],
        );
        chain.append(block);

        assert_eq!(chain.accounts().balance("a"), 5);
        assert_eq!(chain.accounts().balance("b"), 2);
        assert_eq!(chain.accounts().balance("c"), 3);
    }

    #[test]
    fn test_contains_digest() {
        let mut chain = Blockchain::new([("a".to_string(), 10)]);
        chain.append(Block::genesis());

        let tx = transfer("a", "b", 1, "tx-1");
        let digest = tx.digest();
        let block = next_block(&chain, vec![tx]);
        chain.append(block);

        assert!(chain.contains_digest(&digest));
        assert!(!chain.contains_digest(&transfer("a", "b", 1, "tx-2").digest()));
    }

    #[test]
    fn test_merkle_root_set_on_append() {
        let mut chain = Blockchain::new([("a".to_string(), 10)]);
        chain.append(Block::genesis());

        let block = next_block(&chain, vec![transfer("a", "b", 1, "tx-1")]);
        chain.append(block);

        assert!(chain.tip().unwrap().merkle_root.is_some());
    }

    #[test]
    fn test_unique_transactions_across_blocks() {
        let mut chain = Blockchain::new([("a".to_string(), 10)]);
        chain.append(Block::genesis());

        chain.append(next_block(&chain, vec![transfer("a", "b", 1, "tx-1")]));
        chain.append(next_block(&chain, vec![transfer("a", "b", 1, "tx-2")]));

        let mut seen = std::collections::HashSet::new();
        for block in chain.blocks() {
            for digest in block.tx_map.keys() {
                assert!(seen.insert(*digest), "digest committed twice");
            }
        }
    }
}

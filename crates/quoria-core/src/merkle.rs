use serde::{Deserialize, Serialize};

use crate::crypto::hash::{hash_blake3, Hash};

/// Merkle tree over transaction digests.
///
/// Levels are built bottom-up with Blake3 over the concatenated child
/// hashes; an odd node at any level is paired with itself. The tree keeps
/// every level so inclusion proofs can be generated for wallet alerts.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] are the leaves; the last level holds the root
    levels: Vec<Vec<Hash>>,
}

/// One step of an inclusion proof: the sibling hash and its side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: Hash,
    /// True when the sibling is the right child at this level
    pub right: bool,
}

/// Inclusion proof of a single leaf against a Merkle root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: Hash,
    pub steps: Vec<ProofStep>,
}

fn combine(left: &Hash, right: &Hash) -> Hash {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left.as_bytes());
    data[32..].copy_from_slice(right.as_bytes());
    hash_blake3(&data)
}

impl MerkleTree {
    pub fn new(leaves: Vec<Hash>) -> Self {
        if leaves.is_empty() {
            return MerkleTree { levels: Vec::new() };
        }

        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for chunk in current.chunks(2) {
                let combined = if chunk.len() == 2 {
                    combine(&chunk[0], &chunk[1])
                } else {
                    // Odd number of nodes: pair the last with itself
                    combine(&chunk[0], &chunk[0])
                };
                next.push(combined);
            }
            levels.push(next);
        }

        MerkleTree { levels }
    }

    /// The root hash, or None for an empty tree
    pub fn root(&self) -> Option<Hash> {
        self.levels.last().map(|level| level[0])
    }

    /// Build the inclusion proof for a leaf, or None if absent
    pub fn proof(&self, leaf: &Hash) -> Option<MerkleProof> {
        let leaves = self.levels.first()?;
        let mut index = leaves.iter().position(|h| h == leaf)?;

        let mut steps = Vec::new();
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            if sibling < level.len() {
                steps.push(ProofStep {
                    hash: level[sibling],
                    right: sibling > index,
                });
            } else {
                // Odd node paired with itself
                steps.push(ProofStep {
                    hash: level[index],
                    right: true,
                });
            }
            index /= 2;
        }

        Some(MerkleProof { leaf: *leaf, steps })
    }
}

impl MerkleProof {
    /// Check the proof against a root
    pub fn verify(&self, root: &Hash) -> bool {
        let mut acc = self.leaf;
        for step in &self.steps {
            acc = if step.right {
                combine(&acc, &step.hash)
            } else {
                combine(&step.hash, &acc)
            };
        }
        acc == *root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Hash> {
        (0..n).map(|i| hash_blake3(&[i as u8])).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::new(Vec::new());
        assert_eq!(tree.root(), None);
    }

    #[test]
    fn test_single_leaf_root() {
        let leaf = hash_blake3(b"single");
        let tree = MerkleTree::new(vec![leaf]);
        assert_eq!(tree.root(), Some(leaf));
    }

    #[test]
    fn test_root_deterministic() {
        let a = MerkleTree::new(leaves(4));
        let b = MerkleTree::new(leaves(4));
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_proof_roundtrip_even() {
        let leaves = leaves(4);
        let tree = MerkleTree::new(leaves.clone());
        let root = tree.root().unwrap();

        for leaf in &leaves {
            let proof = tree.proof(leaf).unwrap();
            assert!(proof.verify(&root));
        }
    }

    #[test]
    fn test_proof_roundtrip_odd() {
        let leaves = leaves(5);
        let tree = MerkleTree::new(leaves.clone());
        let root = tree.root().unwrap();

        for leaf in &leaves {
            let proof = tree.proof(leaf).unwrap();
            assert!(proof.verify(&root));
        }
    }

    #[test]
    fn test_proof_rejects_wrong_root() {
        let tree = MerkleTree::new(leaves(4));
        let proof = tree.proof(&hash_blake3(&[0u8])).unwrap();
        assert!(!proof.verify(&hash_blake3(b"other root")));
    }

    #[test]
    fn test_proof_absent_leaf() {
        let tree = MerkleTree::new(leaves(4));
        assert!(tree.proof(&hash_blake3(b"not a leaf")).is_none());
    }
}

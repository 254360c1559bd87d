//! Skeleton verification helpers.
//!
//! A skeleton is accepted when exactly `|quorum| - 1` of its signatures
//! come from current quorum members and verify against the quorum-agreed
//! block hash (the committing member never collects its own signature).

use quoria_core::{Address, BlockSkeleton, KeyRegistry};

use crate::quorum::in_quorum;

/// Count skeleton signatures that belong to the quorum and verify
/// against the skeleton's block hash
pub fn verified_signature_count(
    skeleton: &BlockSkeleton,
    quorum: &[Address],
    registry: &KeyRegistry,
) -> usize {
    skeleton
        .signatures
        .iter()
        .filter(|sig| {
            in_quorum(quorum, &sig.address)
                && registry.verify(&skeleton.hash, &sig.signature, &sig.address)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quoria_core::{sign_hash, BlockSignature, KeyPair};
    use std::collections::BTreeMap;

    fn members(n: u16) -> Vec<(Address, KeyPair)> {
        (0..n)
            .map(|i| (Address::new("127.0.0.1", 9000 + i), KeyPair::generate()))
            .collect()
    }

    fn skeleton_signed_by(
        hash: &str,
        signers: &[(Address, KeyPair)],
    ) -> (BlockSkeleton, KeyRegistry) {
        let registry = KeyRegistry::new();
        for (address, kp) in signers {
            registry.write_public_key(address.clone(), kp.public);
        }
        let signatures = signers
            .iter()
            .map(|(address, kp)| BlockSignature {
                address: address.clone(),
                hash: hash.to_string(),
                signature: sign_hash(&kp.secret, hash),
            })
            .collect();
        let skeleton = BlockSkeleton {
            block_id: 1,
            keys: Vec::new(),
            signatures,
            hash: hash.to_string(),
            interval_validations: BTreeMap::new(),
            all_valid: true,
        };
        (skeleton, registry)
    }

    #[test]
    fn test_counts_quorum_signatures() {
        let members = members(3);
        let quorum: Vec<Address> = members.iter().map(|(a, _)| a.clone()).collect();
        let (skeleton, registry) = skeleton_signed_by(&"ab".repeat(32), &members);

        assert_eq!(verified_signature_count(&skeleton, &quorum, &registry), 3);
    }

    #[test]
    fn test_ignores_outsider_signatures() {
        let members = members(3);
        let quorum: Vec<Address> = members[..2].iter().map(|(a, _)| a.clone()).collect();
        let (skeleton, registry) = skeleton_signed_by(&"ab".repeat(32), &members);

        // The third signer is valid but outside the quorum
        assert_eq!(verified_signature_count(&skeleton, &quorum, &registry), 2);
    }

    #[test]
    fn test_rejects_wrong_hash_signature() {
        let members = members(2);
        let quorum: Vec<Address> = members.iter().map(|(a, _)| a.clone()).collect();
        let (mut skeleton, registry) = skeleton_signed_by(&"ab".repeat(32), &members);

        // Signatures no longer match the carried hash
        skeleton.hash = "cd".repeat(32);
        assert_eq!(verified_signature_count(&skeleton, &quorum, &registry), 0);
    }
}

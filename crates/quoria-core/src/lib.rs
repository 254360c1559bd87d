//! Quoria Core - Core types, cryptography, and serialization
//!
//! This crate provides the foundational types for the Quoria quorum
//! blockchain: addresses, transactions, blocks, skeletons, hashing,
//! Ed25519 keys, the public-key registry, and Merkle proofs.

pub mod crypto;
pub mod error;
pub mod merkle;
pub mod serialize;
pub mod types;

pub use crypto::{
    hash_blake3, sign, sign_hash, verify, verify_hash, Hash, KeyPair, KeyRegistry, PublicKey,
    SecretKey, Sig,
};
pub use error::CoreError;
pub use merkle::{MerkleProof, MerkleTree};
pub use types::*;

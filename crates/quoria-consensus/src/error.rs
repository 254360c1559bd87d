use thiserror::Error;

use quoria_chain::ChainError;
use quoria_core::{Address, CoreError};
use quoria_mempool::MempoolError;

use crate::phase::Phase;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Out-of-order message: requires phase {expected}, node is at {current}")]
    OutOfOrderMessage { expected: Phase, current: Phase },

    #[error("Node is not a member of the current quorum")]
    NotInQuorum,

    #[error("Signer {0} is not a member of the current quorum")]
    SignerNotInQuorum(Address),

    #[error("Block id mismatch: expected {expected}, got {got}")]
    BlockIdMismatch { expected: u64, got: u64 },

    #[error("Skeleton for block {block_id}: {verified} verified signatures, need {required}")]
    InsufficientSignatures {
        block_id: u64,
        verified: usize,
        required: usize,
    },

    #[error("Skeleton for block {block_id} references transactions missing from the mempool")]
    MissingTransactions { block_id: u64 },

    #[error("Reconstructed block hash {got} does not match quorum hash {expected}")]
    HashMismatch { expected: String, got: String },

    #[error("Quorum size {quorum_size} cannot be drawn from {num_nodes} nodes")]
    InvalidQuorum {
        quorum_size: usize,
        num_nodes: usize,
    },

    #[error("No model submission in the block set")]
    MissingModel,

    #[error("Round failed: {0}")]
    RoundFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Mempool error: {0}")]
    Mempool(#[from] MempoolError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<reqwest::Error> for ConsensusError {
    fn from(err: reqwest::Error) -> Self {
        ConsensusError::Transport(err.to_string())
    }
}

use thiserror::Error;

use quoria_core::CoreError;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Insufficient balance for account {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: String,
        available: i64,
        required: i64,
    },

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

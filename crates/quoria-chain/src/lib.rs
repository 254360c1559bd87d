//! Quoria Chain - In-memory blockchain and account ledger
//!
//! This crate holds the committed chain, the financial account ledger,
//! and flavor-specific transaction validation.

pub mod accounts;
pub mod blockchain;
pub mod error;
pub mod validate;

pub use accounts::Accounts;
pub use blockchain::Blockchain;
pub use error::ChainError;
pub use validate::{consistent_block_set, validate_transaction};

//! Quoria Mempool - Pending transactions keyed by digest

mod pool;

pub use pool::{Mempool, MempoolError};

//! Quoria Node - configuration, wiring, and lifecycle
//!
//! Builds a node from configuration (keys, registry, peer set, chain,
//! mempool, coordinator, HTTP server) and runs the peer bootstrap,
//! genesis insertion, and heartbeat.

pub mod cli;
pub mod config;
pub mod node;

pub use config::{generate_sample_config, BalanceEntry, NodeConfig, PeerEntry};
pub use node::{Node, RunningNode};

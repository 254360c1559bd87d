use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use quoria_consensus::ConsensusConfig;
use quoria_core::{Address, Flavor, KeyPair};

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Payload flavor: "Defi" or "ML"
    #[serde(rename = "use")]
    pub flavor: Flavor,

    /// Bind host and port; also this node's protocol identity
    pub host: String,
    pub port: u16,

    /// Maximum peer connections to maintain
    pub max_peers: usize,

    /// Connections to seek at startup
    pub initial_connections: usize,

    /// Size of the fixed membership
    pub num_nodes: usize,

    /// Members drawn per quorum
    pub quorum_size: usize,

    /// Pending transactions required to open a round
    pub minimum_transactions: usize,

    /// Invert this node's interval-validation verdicts
    #[serde(default)]
    pub is_malicious: bool,

    /// Preserve the source's minority-hash vote under-count in the tally
    #[serde(default)]
    pub legacy_minority_undercount: bool,

    /// Bound on phase-gated handler waits
    #[serde(default = "default_gate_timeout_ms")]
    pub gate_timeout_ms: u64,

    /// Mempool poll cadence while waiting to open a round
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Bound on outbound message exchanges
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Heartbeat cadence
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// This node's secret key (hex); generated when absent
    pub secret_key: Option<String>,

    /// The fixed, ordered global peer list (including this node),
    /// identical across all nodes
    pub peers: Vec<PeerEntry>,

    /// Genesis account balances (financial flavor)
    #[serde(default)]
    pub initial_balances: Vec<BalanceEntry>,
}

fn default_gate_timeout_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    pub host: String,
    pub port: u16,
    pub pubkey: String,
}

impl PeerEntry {
    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub account: String,
    pub balance: i64,
}

impl NodeConfig {
    /// Load config from a JSON file
    pub fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a JSON file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// This node's protocol identity
    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }

    pub fn to_consensus_config(&self) -> ConsensusConfig {
        ConsensusConfig {
            flavor: self.flavor,
            quorum_size: self.quorum_size,
            minimum_transactions: self.minimum_transactions,
            is_malicious: self.is_malicious,
            legacy_minority_undercount: self.legacy_minority_undercount,
            gate_timeout: Duration::from_millis(self.gate_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Generate a single-node sample configuration with a fresh keypair
pub fn generate_sample_config() -> NodeConfig {
    let keypair = KeyPair::generate();

    NodeConfig {
        flavor: Flavor::Defi,
        host: "127.0.0.1".to_string(),
        port: 8545,
        max_peers: 8,
        initial_connections: 0,
        num_nodes: 1,
        quorum_size: 1,
        minimum_transactions: 2,
        is_malicious: false,
        legacy_minority_undercount: false,
        gate_timeout_ms: default_gate_timeout_ms(),
        poll_interval_ms: default_poll_interval_ms(),
        request_timeout_ms: default_request_timeout_ms(),
        heartbeat_interval_ms: default_heartbeat_interval_ms(),
        secret_key: Some(keypair.secret.to_hex()),
        peers: vec![PeerEntry {
            host: "127.0.0.1".to_string(),
            port: 8545,
            pubkey: keypair.public.to_hex(),
        }],
        initial_balances: vec![BalanceEntry {
            account: "alice".to_string(),
            balance: 1_000_000,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config() {
        let config = generate_sample_config();
        assert_eq!(config.num_nodes, 1);
        assert_eq!(config.peers.len(), 1);
        assert!(config.secret_key.is_some());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = generate_sample_config();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let recovered: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered.port, config.port);
        assert_eq!(recovered.quorum_size, config.quorum_size);

        // The flavor serializes under the configuration key "use"
        assert!(json.contains("\"use\": \"Defi\""));
    }

    #[test]
    fn test_consensus_config_conversion() {
        let config = generate_sample_config();
        let consensus = config.to_consensus_config();
        assert_eq!(consensus.quorum_size, config.quorum_size);
        assert_eq!(
            consensus.poll_interval,
            Duration::from_millis(config.poll_interval_ms)
        );
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use quoria_chain::Blockchain;
use quoria_consensus::{ConsensusError, Coordinator, PeerSet};
use quoria_core::{Address, KeyPair, KeyRegistry, PublicKey, SecretKey};
use quoria_mempool::Mempool;
use quoria_rpc::RpcServer;

use crate::config::NodeConfig;

/// A Quoria node: the coordinator plus its HTTP surface
pub struct Node {
    config: NodeConfig,
    coordinator: Arc<Coordinator>,
}

impl Node {
    /// Wire a node from configuration: keys, registry, peer set, chain,
    /// mempool, coordinator
    pub fn new(config: NodeConfig) -> Result<Self> {
        if config.peers.len() != config.num_nodes {
            bail!(
                "peer list holds {} entries but num_nodes is {}",
                config.peers.len(),
                config.num_nodes
            );
        }
        if config.quorum_size == 0 || config.quorum_size > config.num_nodes {
            bail!(
                "quorum size {} cannot be drawn from {} nodes",
                config.quorum_size,
                config.num_nodes
            );
        }

        let keypair = match &config.secret_key {
            Some(hex) => {
                let secret = SecretKey::from_hex(hex)?;
                let public = secret.public_key();
                KeyPair { secret, public }
            }
            None => KeyPair::generate(),
        };

        let own = config.address();
        let registry = Arc::new(KeyRegistry::new());
        for entry in &config.peers {
            let key = PublicKey::from_hex(&entry.pubkey)?;
            registry.write_public_key(entry.address(), key);
        }
        // Our key wins over whatever the peer list carries for us
        registry.write_public_key(own.clone(), keypair.public);

        let global: Vec<Address> = config.peers.iter().map(|entry| entry.address()).collect();
        if !global.contains(&own) {
            warn!("own address {own} is not in the global peer list; this node can never join a quorum");
        }

        let peers = Arc::new(PeerSet::new(own, config.max_peers, global));
        let initial_balances = config
            .initial_balances
            .iter()
            .map(|entry| (entry.account.clone(), entry.balance));
        let chain = Arc::new(tokio::sync::RwLock::new(Blockchain::new(initial_balances)));
        let mempool = Arc::new(Mempool::new());

        let coordinator = Coordinator::new(
            config.to_consensus_config(),
            keypair,
            registry,
            peers,
            chain,
            mempool,
        );

        Ok(Node {
            config,
            coordinator,
        })
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Bind the listener and start serving; the protocol is not started
    /// until `connect_peers` and `init_chain` are invoked on the handle
    pub async fn start(self) -> Result<RunningNode> {
        let address = self.config.address();
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        info!("node up and running on {address}");

        let server = RpcServer::new(Arc::clone(&self.coordinator));
        let handle = tokio::spawn(server.run(listener));

        Ok(RunningNode {
            address,
            coordinator: self.coordinator,
            initial_connections: self.config.initial_connections,
            heartbeat_interval: self.config.heartbeat_interval(),
            server: handle,
        })
    }

    /// Start the node and run the full protocol until the server exits
    pub async fn run(self) -> Result<()> {
        let running = self.start().await?;

        // Give the rest of the membership a moment to come up
        tokio::time::sleep(Duration::from_secs(1)).await;
        running.connect_peers().await;
        running.init_chain().await?;
        running.spawn_heartbeat();

        running.wait().await
    }
}

/// Handle to a started node
pub struct RunningNode {
    pub address: Address,
    coordinator: Arc<Coordinator>,
    initial_connections: usize,
    heartbeat_interval: Duration,
    server: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningNode {
    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Seek mutual connections with the configured number of peers
    pub async fn connect_peers(&self) {
        let peers = self.coordinator.peers();
        let transport = self.coordinator.transport();

        for peer in peers.global().to_vec() {
            if peers.local_len() >= self.initial_connections {
                break;
            }
            if peer == *peers.own() || peers.local().contains(&peer) {
                continue;
            }
            match transport.connect(&peer).await {
                Ok(response) if response.accepted => {
                    peers.establish(peer);
                }
                Ok(_) => {}
                Err(err) => warn!("connection to {peer} failed: {err}"),
            }
        }
        info!("connected to {} peers", peers.local_len());
    }

    /// Insert genesis and arm the first round
    pub async fn init_chain(&self) -> Result<(), ConsensusError> {
        self.coordinator().initialize_blockchain().await
    }

    /// Periodically ping local peers; failures are logged and the peer
    /// retained
    pub fn spawn_heartbeat(&self) {
        let coordinator = self.coordinator();
        let interval = self.heartbeat_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                for peer in coordinator.peers().local() {
                    if let Err(err) = coordinator.transport().ping(&peer).await {
                        warn!("heartbeat to {peer} failed: {err}");
                    }
                }
            }
        });
    }

    /// Block until the server task exits
    pub async fn wait(self) -> Result<()> {
        self.server.await??;
        Ok(())
    }
}

use std::sync::RwLock;

use quoria_core::Address;

/// The node's view of the network: the fixed, ordered global peer list the
/// quorum selector draws from (identical across healthy nodes) and the
/// dynamic local gossip neighborhood.
#[derive(Debug)]
pub struct PeerSet {
    own: Address,
    max_peers: usize,
    global: Vec<Address>,
    local: RwLock<Vec<Address>>,
}

impl PeerSet {
    pub fn new(own: Address, max_peers: usize, global: Vec<Address>) -> Self {
        PeerSet {
            own,
            max_peers,
            global,
            local: RwLock::new(Vec::new()),
        }
    }

    pub fn own(&self) -> &Address {
        &self.own
    }

    pub fn global(&self) -> &[Address] {
        &self.global
    }

    /// Snapshot of the local gossip peers
    pub fn local(&self) -> Vec<Address> {
        let local = self.local.read().unwrap_or_else(|e| e.into_inner());
        local.clone()
    }

    pub fn local_len(&self) -> usize {
        let local = self.local.read().unwrap_or_else(|e| e.into_inner());
        local.len()
    }

    fn eligible_locked(&self, local: &[Address], address: &Address) -> bool {
        local.len() < self.max_peers - 1
            && *address != self.own
            && !local.iter().any(|peer| peer == address)
    }

    /// Whether a connection to `address` would currently be accepted
    pub fn eligible(&self, address: &Address) -> bool {
        let local = self.local.read().unwrap_or_else(|e| e.into_inner());
        self.eligible_locked(&local, address)
    }

    /// Record a connection if it is eligible; returns whether it was added
    pub fn establish(&self, address: Address) -> bool {
        let mut local = self.local.write().unwrap_or_else(|e| e.into_inner());
        if self.eligible_locked(&local, &address) {
            local.push(address);
            true
        } else {
            false
        }
    }

    /// Drop a local peer, returning it if it was connected
    pub fn remove(&self, address: &Address) -> Option<Address> {
        let mut local = self.local.write().unwrap_or_else(|e| e.into_inner());
        let index = local.iter().position(|peer| peer == address)?;
        Some(local.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> Address {
        Address::new("127.0.0.1", port)
    }

    fn peer_set(max_peers: usize) -> PeerSet {
        let global: Vec<Address> = (0..4).map(|i| addr(9000 + i)).collect();
        PeerSet::new(addr(9000), max_peers, global)
    }

    #[test]
    fn test_establish_eligible() {
        let peers = peer_set(4);
        assert!(peers.establish(addr(9001)));
        assert_eq!(peers.local(), vec![addr(9001)]);
    }

    #[test]
    fn test_rejects_self() {
        let peers = peer_set(4);
        assert!(!peers.establish(addr(9000)));
    }

    #[test]
    fn test_rejects_duplicate() {
        let peers = peer_set(4);
        assert!(peers.establish(addr(9001)));
        assert!(!peers.establish(addr(9001)));
        assert_eq!(peers.local_len(), 1);
    }

    #[test]
    fn test_respects_max_peers() {
        let peers = peer_set(3);
        assert!(peers.establish(addr(9001)));
        assert!(peers.establish(addr(9002)));
        // max_peers - 1 local connections already held
        assert!(!peers.establish(addr(9003)));
    }

    #[test]
    fn test_remove() {
        let peers = peer_set(4);
        peers.establish(addr(9001));
        assert_eq!(peers.remove(&addr(9001)), Some(addr(9001)));
        assert_eq!(peers.remove(&addr(9001)), None);
    }
}

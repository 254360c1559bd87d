//! The consensus coordinator.
//!
//! Drives one node through a block round: quorum-ready polling, mempool
//! reconciliation, block construction, signature collection, and commit.
//! Inbound handlers are phase-gated; outbound fan-outs run peer by peer
//! and abandon unreachable peers for the round.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use quoria_chain::{consistent_block_set, validate_transaction, Blockchain};
use quoria_core::{
    block_hash, sign_hash, Address, Block, BlockSignature, BlockSkeleton, Flavor, Hash, KeyPair,
    KeyRegistry, MerkleTree, ModelData, Transaction,
};
use quoria_mempool::Mempool;

use crate::error::ConsensusError;
use crate::net::{
    IntervalValidationNotice, MempoolKeysRequest, MempoolKeysResponse, MempoolTransactionsRequest,
    QuorumReadyResponse, ReconcileNotice, SignatureNotice, SkeletonNotice, TransactionGossip,
    WalletAlert,
};
use crate::peers::PeerSet;
use crate::phase::{Phase, PhaseGate};
use crate::quorum::{derive_quorum, in_quorum};
use crate::round::RoundState;
use crate::skeleton::verified_signature_count;
use crate::transport::PeerClient;
use crate::validation::{derive_task, IntervalValidator};

/// Consensus parameters, fixed for the run
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub flavor: Flavor,
    pub quorum_size: usize,
    pub minimum_transactions: usize,
    pub is_malicious: bool,
    /// Preserve the source's vote seeding that under-counts minority-hash
    /// signers in the tally
    pub legacy_minority_undercount: bool,
    /// Bound on phase-gated handler waits
    pub gate_timeout: Duration,
    /// Mempool poll cadence while waiting to open a round
    pub poll_interval: Duration,
    /// Bound on outbound message exchanges
    pub request_timeout: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig {
            flavor: Flavor::Defi,
            quorum_size: 3,
            minimum_transactions: 2,
            is_malicious: false,
            legacy_minority_undercount: false,
            gate_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Tally the hash votes carried by the collected signatures.
///
/// The local candidate starts with one vote (the tallying member's own).
/// Each verified signature increments its hash's count; a hash first seen
/// from a signature starts at one, or at zero under the legacy flag. The
/// winner starts as the local hash and is replaced only on a strictly
/// greater count, so ties favor the first-seen hash.
fn count_hash_votes(
    local_hash: &str,
    sigs: &[BlockSignature],
    registry: &KeyRegistry,
    legacy_undercount: bool,
) -> (String, HashMap<String, usize>) {
    let mut votes: HashMap<String, usize> = HashMap::new();
    votes.insert(local_hash.to_string(), 1);

    for sig in sigs {
        if !registry.verify(&sig.hash, &sig.signature, &sig.address) {
            debug!("signature from {} failed verification", sig.address);
            continue;
        }
        match votes.entry(sig.hash.clone()) {
            Entry::Occupied(mut entry) => *entry.get_mut() += 1,
            Entry::Vacant(entry) => {
                entry.insert(if legacy_undercount { 0 } else { 1 });
            }
        }
    }

    let mut winning = local_hash.to_string();
    for sig in sigs {
        let candidate = votes.get(&sig.hash).copied().unwrap_or(0);
        if candidate > votes.get(&winning).copied().unwrap_or(0) {
            winning = sig.hash.clone();
        }
    }
    (winning, votes)
}

/// Orchestrates the block round for one node
pub struct Coordinator {
    config: ConsensusConfig,
    keypair: KeyPair,
    registry: Arc<KeyRegistry>,
    peers: Arc<PeerSet>,
    chain: Arc<RwLock<Blockchain>>,
    mempool: Arc<Mempool>,
    transport: PeerClient,
    phase: PhaseGate,
    round: Mutex<RoundState>,
    validator: IntervalValidator,
    /// Wallet subscriptions: account key to the subscriber's address
    subscriptions: StdMutex<HashMap<String, Address>>,
}

impl Coordinator {
    pub fn new(
        config: ConsensusConfig,
        keypair: KeyPair,
        registry: Arc<KeyRegistry>,
        peers: Arc<PeerSet>,
        chain: Arc<RwLock<Blockchain>>,
        mempool: Arc<Mempool>,
    ) -> Arc<Self> {
        let transport = PeerClient::new(peers.own().clone(), config.request_timeout);
        let validator = IntervalValidator::new(config.quorum_size);
        Arc::new(Coordinator {
            config,
            keypair,
            registry,
            peers,
            chain,
            mempool,
            transport,
            phase: PhaseGate::new(),
            round: Mutex::new(RoundState::default()),
            validator,
            subscriptions: StdMutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn phase(&self) -> &PhaseGate {
        &self.phase
    }

    pub fn peers(&self) -> &Arc<PeerSet> {
        &self.peers
    }

    pub fn chain(&self) -> &Arc<RwLock<Blockchain>> {
        &self.chain
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn transport(&self) -> &PeerClient {
        &self.transport
    }

    /// The quorum for the current tip
    async fn current_quorum(&self) -> Result<Vec<Address>, ConsensusError> {
        let chain = self.chain.read().await;
        let tip = chain
            .tip()
            .ok_or_else(|| ConsensusError::RoundFailed("chain is empty".to_string()))?;
        derive_quorum(tip, 0, self.peers.global(), self.config.quorum_size)
    }

    /// Whether this node was drawn into the quorum for the current tip
    pub async fn in_current_quorum(&self) -> bool {
        match self.current_quorum().await {
            Ok(quorum) => in_quorum(&quorum, self.peers.own()),
            Err(_) => false,
        }
    }

    /// Insert the genesis block through the ordinary commit path
    pub async fn initialize_blockchain(self: Arc<Self>) -> Result<(), ConsensusError> {
        let mut chain = self.chain.write().await;
        if chain.height() > 0 {
            return Ok(());
        }
        info!("initializing blockchain");
        Arc::clone(&self)
            .commit_block(&mut chain, Block::genesis())
            .await
    }

    /// Final commit step shared by the quorum path and the skeleton path:
    /// reset to IDLE, append (setting the Merkle root), alert subscribed
    /// wallets, and arm the next round if this node sits in the new
    /// quorum. Caller holds the block lock.
    fn commit_block<'a>(
        self: Arc<Self>,
        chain: &'a mut Blockchain,
        block: Block,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConsensusError>> + Send + 'a>> {
        Box::pin(async move {
            self.phase.set(Phase::Idle);
            {
                self.round.lock().await.reset();
            }
            self.validator.reset();

            let tree = chain.append(block);

            if let Some(tip) = chain.tip() {
                self.alert_wallets(tip, &tree).await;
            }

            let tip = chain
                .tip()
                .ok_or_else(|| ConsensusError::RoundFailed("chain is empty".to_string()))?;
            let quorum = derive_quorum(tip, 0, self.peers.global(), self.config.quorum_size)?;
            if in_quorum(&quorum, self.peers.own()) {
                debug!("drawn into the quorum for block {}", tip.block_id + 1);
                let this = Arc::clone(&self);
                tokio::spawn(async move {
                    while this.mempool.len().await < this.config.minimum_transactions {
                        tokio::time::sleep(this.config.poll_interval).await;
                    }
                    Arc::clone(&this).send_quorum_ready().await;
                });
            }
            Ok(())
        })
    }

    /// Register a wallet's interest in commits touching an account
    pub fn subscribe_wallet(&self, account: String, address: Address) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subscriptions.insert(account, address);
    }

    /// Push Merkle proofs to subscribers whose account a committed
    /// transfer touched
    async fn alert_wallets(&self, block: &Block, tree: &MerkleTree) {
        let subscriptions: Vec<(String, Address)> = {
            let subscriptions = self
                .subscriptions
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            subscriptions
                .iter()
                .map(|(account, address)| (account.clone(), address.clone()))
                .collect()
        };
        if subscriptions.is_empty() {
            return;
        }

        for (digest, tx) in &block.tx_map {
            let Transaction::Transfer(transfer) = tx else {
                continue;
            };
            for (account, address) in &subscriptions {
                if transfer.from != *account && transfer.to != *account {
                    continue;
                }
                let Some(proof) = tree.proof(digest) else {
                    continue;
                };
                let alert = WalletAlert {
                    block_id: block.block_id,
                    proof,
                };
                if let Err(err) = self.transport.wallet_alert(address, &alert).await {
                    warn!("wallet alert to {address} failed: {err}");
                }
            }
        }
    }

    // ---- transaction acceptance and gossip ----

    /// ADD_TRANSACTION: gate on IDLE, suppress duplicates and committed
    /// digests, validate for the flavor, then insert and gossip. Returns
    /// whether the transaction was newly accepted (and therefore
    /// propagated).
    pub async fn add_transaction(
        self: Arc<Self>,
        tx: Transaction,
    ) -> Result<bool, ConsensusError> {
        self.phase
            .wait_for(Phase::Idle, self.config.gate_timeout)
            .await?;

        let digest = tx.digest();
        if self.mempool.contains(&digest).await {
            return Ok(false);
        }

        {
            let chain = self.chain.read().await;
            if chain.contains_digest(&digest) {
                debug!("transaction {digest} already committed");
                return Ok(false);
            }
            let pending = self.mempool.snapshot().await;
            if let Err(err) = validate_transaction(&tx, chain.accounts(), &pending) {
                debug!("rejecting transaction {digest}: {err}");
                return Ok(false);
            }
        }

        if self.mempool.insert(tx.clone()).await.is_err() {
            // Lost the race to a concurrent insert; the winner gossips
            return Ok(false);
        }
        self.gossip_transaction(&tx).await;
        Ok(true)
    }

    async fn gossip_transaction(&self, tx: &Transaction) {
        let gossip = TransactionGossip {
            transaction: tx.clone(),
        };
        for peer in self.peers.local() {
            if let Err(err) = self.transport.transaction(&peer, &gossip).await {
                warn!("transaction gossip to {peer} failed: {err}");
            }
        }
    }

    // ---- phase 1: quorum ready ----

    /// Open a round: announce readiness to every other quorum member and
    /// reconcile tip disagreements
    pub async fn send_quorum_ready(self: Arc<Self>) {
        // Reset before opening the READY gate so no acknowledgement can
        // be counted and then wiped
        {
            self.round.lock().await.reset();
        }
        self.phase.set(Phase::Ready);

        let (tip_id, quorum) = {
            let chain = self.chain.read().await;
            let Some(tip) = chain.tip() else {
                warn!("quorum ready without a chain");
                return;
            };
            match derive_quorum(tip, 0, self.peers.global(), self.config.quorum_size) {
                Ok(quorum) => (tip.block_id, quorum),
                Err(err) => {
                    warn!("quorum derivation failed: {err}");
                    return;
                }
            }
        };

        debug!("announcing quorum ready for block {}", tip_id + 1);
        for member in &quorum {
            if member == self.peers.own() {
                continue;
            }
            match self.transport.quorum_ready(member).await {
                Ok(QuorumReadyResponse::Ping) => {}
                Ok(QuorumReadyResponse::Reconcile { block_id, .. }) => {
                    if block_id < tip_id {
                        // Peer is behind: confirm with our newer block id
                        if let Err(err) = self.transport.reconcile(member, tip_id).await {
                            warn!("reconcile confirm to {member} failed: {err}");
                        }
                    } else if block_id > tip_id {
                        // We are behind; the quorum has already moved on
                        debug!("peer {member} is ahead at block {block_id}");
                    }
                }
                Err(err) => warn!("quorum ready exchange with {member} failed: {err}"),
            }
        }

        // A single-member quorum has nobody to wait for
        if quorum.len() == 1 {
            Arc::clone(&self).send_mempool_hashes().await;
        }
    }

    /// QUORUM_READY handler (gated on READY). Non-members reply with
    /// their view of the chain; members acknowledge and advance to
    /// mempool reconciliation once every other member has checked in.
    pub async fn receive_quorum_ready(
        self: Arc<Self>,
    ) -> Result<QuorumReadyResponse, ConsensusError> {
        self.phase
            .wait_for(Phase::Ready, self.config.gate_timeout)
            .await?;

        let (tip_id, tip_hash, quorum) = {
            let chain = self.chain.read().await;
            let tip = chain
                .tip()
                .ok_or_else(|| ConsensusError::RoundFailed("chain is empty".to_string()))?;
            (
                tip.block_id,
                block_hash(tip, 0)?,
                derive_quorum(tip, 0, self.peers.global(), self.config.quorum_size)?,
            )
        };

        if !in_quorum(&quorum, self.peers.own()) {
            debug!("not in the quorum for block {}; requesting reconciliation", tip_id + 1);
            return Ok(QuorumReadyResponse::Reconcile {
                block_id: tip_id,
                block_hash: tip_hash,
            });
        }

        let threshold_reached = {
            let mut round = self.round.lock().await;
            round.ready_votes += 1;
            if round.ready_votes >= quorum.len().saturating_sub(1) {
                round.ready_votes = 0;
                true
            } else {
                false
            }
        };
        if threshold_reached {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.send_mempool_hashes().await });
        }
        Ok(QuorumReadyResponse::Ping)
    }

    /// RECONCILE_BLOCK confirm: the caller holds a newer block. Catching
    /// a lagging chain up is not implemented; the notice is recorded.
    pub fn receive_reconcile(&self, notice: &ReconcileNotice) {
        debug!(
            "peer {} reports newer block {}; catch-up not implemented",
            notice.sender, notice.block_id
        );
    }

    // ---- phase 2: mempool reconciliation ----

    /// Exchange mempool digest sets with every other quorum member,
    /// serving requested transactions from the live pool
    pub async fn send_mempool_hashes(self: Arc<Self>) {
        // A stale ready acknowledgement must not restart reconciliation
        if self.phase.current() != Phase::Ready {
            debug!(
                "mempool reconciliation invoked at {}; ignoring",
                self.phase.current()
            );
            return;
        }
        self.phase.set(Phase::MempoolSync);

        let keys = self.mempool.snapshot_keys().await;
        let quorum = match self.current_quorum().await {
            Ok(quorum) => quorum,
            Err(err) => {
                warn!("quorum derivation failed: {err}");
                return;
            }
        };

        debug!("reconciling {} mempool keys with the quorum", keys.len());
        let request = MempoolKeysRequest {
            sender: self.peers.own().clone(),
            keys,
        };
        for member in &quorum {
            if member == self.peers.own() {
                continue;
            }
            match self.transport.mempool_keys(member, &request).await {
                Ok(MempoolKeysResponse::Ping) => {}
                Ok(MempoolKeysResponse::Request { missing }) => {
                    let transactions = self.mempool.get_many(&missing).await;
                    let reply = MempoolTransactionsRequest {
                        sender: self.peers.own().clone(),
                        transactions,
                    };
                    if let Err(err) = self.transport.mempool_transactions(member, &reply).await {
                        warn!("transaction delivery to {member} failed: {err}");
                    }
                }
                Err(err) => warn!("mempool reconciliation with {member} failed: {err}"),
            }
        }

        if quorum.len() == 1 {
            if let Err(err) = Arc::clone(&self).construct_block().await {
                warn!("round aborted: {err}");
            }
        }
    }

    /// RECEIVE_MEMPOOL keys handler (gated on MEMPOOL_SYNC): reply with
    /// the digests this node lacks, or acknowledge and complete the
    /// exchange
    pub async fn receive_mempool_keys(
        self: Arc<Self>,
        keys: BTreeSet<Hash>,
    ) -> Result<MempoolKeysResponse, ConsensusError> {
        self.phase
            .wait_for(Phase::MempoolSync, self.config.gate_timeout)
            .await?;

        let missing = self.mempool.missing_from(&keys).await;
        if missing.is_empty() {
            Arc::clone(&self).complete_mempool_round().await;
            Ok(MempoolKeysResponse::Ping)
        } else {
            debug!("requesting {} missing transactions", missing.len());
            Ok(MempoolKeysResponse::Request { missing })
        }
    }

    /// RECEIVE_MEMPOOL transactions handler: insert the delivered
    /// transactions (re-validated for the flavor) and complete the
    /// exchange
    pub async fn receive_mempool_transactions(
        self: Arc<Self>,
        transactions: Vec<Transaction>,
    ) -> Result<(), ConsensusError> {
        self.phase
            .wait_for(Phase::MempoolSync, self.config.gate_timeout)
            .await?;

        for tx in transactions {
            let digest = tx.digest();
            let valid = {
                let chain = self.chain.read().await;
                if chain.contains_digest(&digest) {
                    debug!("reconciled transaction {digest} already committed");
                    continue;
                }
                let pending = self.mempool.snapshot().await;
                validate_transaction(&tx, chain.accounts(), &pending)
            };
            match valid {
                Ok(()) => {
                    // Duplicates lose the race silently
                    let _ = self.mempool.insert(tx).await;
                }
                Err(err) => debug!("rejecting reconciled transaction {digest}: {err}"),
            }
        }

        Arc::clone(&self).complete_mempool_round().await;
        Ok(())
    }

    /// One reconciliation exchange finished; build the block once every
    /// other member has been heard from
    async fn complete_mempool_round(self: Arc<Self>) {
        let threshold_reached = {
            let mut round = self.round.lock().await;
            round.mempool_rounds += 1;
            if round.mempool_rounds >= self.config.quorum_size.saturating_sub(1) {
                round.mempool_rounds = 0;
                true
            } else {
                false
            }
        };
        if threshold_reached {
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(err) = this.construct_block().await {
                    warn!("round aborted: {err}");
                }
            });
        }
    }

    // ---- phase 3: block construction and signatures ----

    /// Build the candidate block from the reconciled pool and broadcast
    /// this node's signature over its hash
    pub async fn construct_block(self: Arc<Self>) -> Result<(), ConsensusError> {
        // A stale reconciliation exchange must not rebuild the candidate
        if self.phase.current() != Phase::MempoolSync {
            debug!("construction invoked at {}; ignoring", self.phase.current());
            return Ok(());
        }
        self.phase.set(Phase::Building);

        let snapshot = self.mempool.snapshot().await;
        debug!("constructing block from {} transactions", snapshot.len());

        let (tx_map, interval_validations, all_valid) = match self.config.flavor {
            Flavor::Defi => {
                let chain = self.chain.read().await;
                let consistent = consistent_block_set(snapshot, chain.accounts());
                (consistent, BTreeMap::new(), true)
            }
            Flavor::Ml => {
                let model = snapshot
                    .values()
                    .find_map(|tx| match tx {
                        Transaction::Model(model) => Some(model.clone()),
                        _ => None,
                    })
                    .ok_or(ConsensusError::MissingModel)?;
                let (interval_validations, all_valid) =
                    Arc::clone(&self).validate_model(&model).await?;
                (snapshot, interval_validations, all_valid)
            }
        };

        let (prev_hash, block_id) = {
            let chain = self.chain.read().await;
            let tip = chain
                .tip()
                .ok_or_else(|| ConsensusError::RoundFailed("chain is empty".to_string()))?;
            (block_hash(tip, 0)?, chain.height())
        };

        let block =
            Block::with_validations(tx_map, prev_hash, block_id, interval_validations, all_valid);
        {
            self.round.lock().await.block = Some(block.clone());
        }
        Arc::clone(&self).send_sig_of_block_hash(&block).await
    }

    /// Run the interval-validation sub-protocol for the submitted model:
    /// recompute this node's assigned interval, broadcast the verdict,
    /// record it locally, and wait for the quorum's validity map
    async fn validate_model(
        self: Arc<Self>,
        model: &ModelData,
    ) -> Result<(BTreeMap<u32, bool>, bool), ConsensusError> {
        let (tip_hash, quorum) = {
            let chain = self.chain.read().await;
            let tip = chain
                .tip()
                .ok_or_else(|| ConsensusError::RoundFailed("chain is empty".to_string()))?;
            (
                block_hash(tip, 0)?,
                derive_quorum(tip, 0, self.peers.global(), self.config.quorum_size)?,
            )
        };

        let interval_index = derive_task(model, &tip_hash, &quorum, self.peers.own())
            .ok_or_else(|| ConsensusError::RoundFailed("no interval assignment".to_string()))?;

        let mut is_valid = model
            .intervals_validity
            .get(interval_index as usize)
            .copied()
            .unwrap_or(false);
        if self.config.is_malicious {
            is_valid = !is_valid;
        }
        debug!("re-checked interval {interval_index}: valid = {is_valid}");

        let notice = IntervalValidationNotice {
            sender: self.peers.own().clone(),
            is_valid,
            interval_index,
        };
        for member in &quorum {
            if member == self.peers.own() {
                continue;
            }
            if let Err(err) = self.transport.interval_validation(member, &notice).await {
                warn!("interval validation broadcast to {member} failed: {err}");
            }
        }

        // The broadcast is pure side-effect; only this local path counts
        // our own verdict
        self.receive_interval_validation(is_valid, interval_index);

        self.validator.wait_complete(self.config.gate_timeout).await
    }

    /// RECEIVE_INTERVAL_VALIDATION handler: record one member's verdict
    pub fn receive_interval_validation(&self, is_valid: bool, interval_index: u32) {
        self.validator.record_vote(interval_index, is_valid);
    }

    /// Sign the candidate's hash and broadcast it to the other members
    async fn send_sig_of_block_hash(
        self: Arc<Self>,
        block: &Block,
    ) -> Result<(), ConsensusError> {
        let hash = block_hash(block, 0)?;
        let signature = BlockSignature {
            address: self.peers.own().clone(),
            hash: hash.clone(),
            signature: sign_hash(&self.keypair.secret, &hash),
        };
        debug!("broadcasting signature for block hash {}", &hash[..8]);

        let notice = SignatureNotice { signature };
        let quorum = self.current_quorum().await?;
        for member in &quorum {
            if member == self.peers.own() {
                continue;
            }
            if let Err(err) = self.transport.signature(member, &notice).await {
                warn!("signature broadcast to {member} failed: {err}");
            }
        }

        // Signatures may have raced ahead of the candidate (and a single
        // signer needs none at all): tally as soon as the count is in
        let threshold_reached = {
            let round = self.round.lock().await;
            round.block.is_some() && round.sigs.len() >= quorum.len().saturating_sub(1)
        };
        if threshold_reached {
            Arc::clone(&self).tally_quorum_sigs().await?;
        }
        Ok(())
    }

    /// RECEIVE_SIGNATURE handler (gated on BUILDING): collect quorum
    /// signatures, tally once every other member has signed
    pub async fn receive_signature(
        self: Arc<Self>,
        signature: BlockSignature,
    ) -> Result<(), ConsensusError> {
        self.phase
            .wait_for(Phase::Building, self.config.gate_timeout)
            .await?;

        let quorum = self.current_quorum().await?;
        if !in_quorum(&quorum, &signature.address) {
            debug!("dropping signature from non-member {}", signature.address);
            return Ok(());
        }
        if !in_quorum(&quorum, self.peers.own()) {
            debug!("not in the quorum; dropping signature");
            return Ok(());
        }

        let threshold_reached = {
            let mut round = self.round.lock().await;
            round.sigs.push(signature);
            // Until the candidate exists the tally has nothing to vote
            // on; the construction path re-checks the count
            round.block.is_some() && round.sigs.len() == quorum.len().saturating_sub(1)
        };
        if threshold_reached {
            Arc::clone(&self).tally_quorum_sigs().await?;
        }
        Ok(())
    }

    // ---- phase 4: tally and commit ----

    /// Tally the collected signatures under the block lock. On a
    /// unanimous vote for the local candidate, broadcast the skeleton and
    /// commit; otherwise abandon the round. Scratch state is cleared
    /// either way.
    async fn tally_quorum_sigs(self: Arc<Self>) -> Result<(), ConsensusError> {
        let mut chain = self.chain.write().await;
        // The signature and construction paths can both observe the
        // threshold; only the first invocation (serialized by the block
        // lock) finds the node still building
        if self.phase.current() != Phase::Building {
            debug!("tally invoked at {}; ignoring", self.phase.current());
            return Ok(());
        }
        self.mempool.clear().await;
        self.phase.set(Phase::Committing);

        let quorum = {
            let tip = chain
                .tip()
                .ok_or_else(|| ConsensusError::RoundFailed("chain is empty".to_string()))?;
            derive_quorum(tip, 0, self.peers.global(), self.config.quorum_size)?
        };
        if !in_quorum(&quorum, self.peers.own()) {
            warn!("tally invoked outside the quorum");
            return Ok(());
        }

        let (block, sigs) = {
            let mut round = self.round.lock().await;
            (round.block.take(), std::mem::take(&mut round.sigs))
        };
        let Some(block) = block else {
            warn!("tally without a candidate block");
            return Ok(());
        };

        let local_hash = block_hash(&block, 0)?;
        let (winning, votes) = count_hash_votes(
            &local_hash,
            &sigs,
            &self.registry,
            self.config.legacy_minority_undercount,
        );
        let winning_votes = votes.get(&winning).copied().unwrap_or(0);

        if winning_votes == quorum.len() && winning == local_hash {
            let skeleton = BlockSkeleton::from_block(&block, sigs)?;
            Arc::clone(&self).commit_block(&mut chain, block).await?;
            drop(chain);
            self.gossip_skeleton(&skeleton).await;
        } else {
            warn!(
                "round failed: winning hash {} holds {winning_votes}/{} votes",
                &winning[..8],
                quorum.len()
            );
        }
        Ok(())
    }

    // ---- skeleton propagation ----

    async fn gossip_skeleton(&self, skeleton: &BlockSkeleton) {
        let notice = SkeletonNotice {
            skeleton: skeleton.clone(),
        };
        for peer in self.peers.local() {
            if let Err(err) = self.transport.skeleton(&peer, &notice).await {
                warn!("skeleton gossip to {peer} failed: {err}");
            }
        }
    }

    /// RECEIVE_SKELETON handler (gated on IDLE): verify the quorum
    /// signatures, reassemble the block from the local mempool, and
    /// commit. A skeleton whose transactions are missing locally, or
    /// whose reconstruction hashes differently from the quorum-agreed
    /// hash, is rejected loudly: nothing is drained, appended, or
    /// re-gossiped.
    pub async fn receive_skeleton(
        self: Arc<Self>,
        skeleton: BlockSkeleton,
    ) -> Result<(), ConsensusError> {
        self.phase
            .wait_for(Phase::Idle, self.config.gate_timeout)
            .await?;

        let mut chain = self.chain.write().await;
        let tip = chain
            .tip()
            .ok_or_else(|| ConsensusError::RoundFailed("chain is empty".to_string()))?;

        if tip.block_id + 1 != skeleton.block_id {
            debug!(
                "dropping skeleton for block {} at tip {}",
                skeleton.block_id, tip.block_id
            );
            return Ok(());
        }

        let quorum = derive_quorum(tip, 0, self.peers.global(), self.config.quorum_size)?;
        let verified = verified_signature_count(&skeleton, &quorum, &self.registry);
        let required = quorum.len().saturating_sub(1);
        if verified != required {
            debug!(
                "skeleton for block {}: {verified} verified signatures, need {required}",
                skeleton.block_id
            );
            return Ok(());
        }

        let prev_hash = block_hash(tip, 0)?;
        let Some(tx_map) = self.mempool.peek_many(&skeleton.keys).await else {
            warn!(
                "skeleton for block {} references transactions missing from the mempool",
                skeleton.block_id
            );
            return Err(ConsensusError::MissingTransactions {
                block_id: skeleton.block_id,
            });
        };

        let block = Block::with_validations(
            tx_map,
            prev_hash,
            chain.height(),
            skeleton.interval_validations.clone(),
            skeleton.all_valid,
        );
        let rebuilt = block_hash(&block, 0)?;
        if rebuilt != skeleton.hash {
            warn!(
                "reconstructed hash for block {} does not match the quorum hash",
                skeleton.block_id
            );
            return Err(ConsensusError::HashMismatch {
                expected: skeleton.hash.clone(),
                got: rebuilt,
            });
        }

        self.mempool.drain_many(&skeleton.keys).await;
        Arc::clone(&self).commit_block(&mut chain, block).await?;
        drop(chain);

        self.gossip_skeleton(&skeleton).await;
        Ok(())
    }
}

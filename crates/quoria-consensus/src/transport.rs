use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use quoria_core::Address;

use crate::error::ConsensusError;
use crate::net::{
    Ack, ConnectRequest, ConnectResponse, IntervalValidationNotice, MempoolKeysRequest,
    MempoolKeysResponse, MempoolTransactionsRequest, QuorumReadyRequest, QuorumReadyResponse,
    ReconcileNotice, SignatureNotice, SkeletonNotice, TransactionGossip, WalletAlert,
};

/// HTTP client for outbound protocol messages.
///
/// One method per message kind. Every request carries a bounded timeout;
/// a failed exchange surfaces as `ConsensusError::Transport` and the
/// caller abandons that peer for the round.
#[derive(Debug, Clone)]
pub struct PeerClient {
    client: reqwest::Client,
    own: Address,
    request_timeout: Duration,
}

impl PeerClient {
    pub fn new(own: Address, request_timeout: Duration) -> Self {
        PeerClient {
            client: reqwest::Client::new(),
            own,
            request_timeout,
        }
    }

    fn url(peer: &Address, path: &str) -> String {
        format!("http://{}:{}{}", peer.host, peer.port, path)
    }

    async fn post<Req, Resp>(
        &self,
        peer: &Address,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ConsensusError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(Self::url(peer, path))
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConsensusError::Transport(format!(
                "{peer} replied {} to {path}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Heartbeat ping
    pub async fn ping(&self, peer: &Address) -> Result<(), ConsensusError> {
        let response = self
            .client
            .get(Self::url(peer, "/ping"))
            .timeout(self.request_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ConsensusError::Transport(format!(
                "{peer} replied {} to ping",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn quorum_ready(
        &self,
        peer: &Address,
    ) -> Result<QuorumReadyResponse, ConsensusError> {
        let request = QuorumReadyRequest {
            sender: self.own.clone(),
        };
        self.post(peer, "/consensus/quorum-ready", &request).await
    }

    pub async fn reconcile(&self, peer: &Address, block_id: u64) -> Result<(), ConsensusError> {
        let notice = ReconcileNotice {
            sender: self.own.clone(),
            block_id,
        };
        let _: Ack = self.post(peer, "/consensus/reconcile", &notice).await?;
        Ok(())
    }

    pub async fn mempool_keys(
        &self,
        peer: &Address,
        request: &MempoolKeysRequest,
    ) -> Result<MempoolKeysResponse, ConsensusError> {
        self.post(peer, "/consensus/mempool/keys", request).await
    }

    pub async fn mempool_transactions(
        &self,
        peer: &Address,
        request: &MempoolTransactionsRequest,
    ) -> Result<(), ConsensusError> {
        let _: Ack = self
            .post(peer, "/consensus/mempool/transactions", request)
            .await?;
        Ok(())
    }

    pub async fn signature(
        &self,
        peer: &Address,
        notice: &SignatureNotice,
    ) -> Result<(), ConsensusError> {
        let _: Ack = self.post(peer, "/consensus/signature", notice).await?;
        Ok(())
    }

    pub async fn skeleton(
        &self,
        peer: &Address,
        notice: &SkeletonNotice,
    ) -> Result<(), ConsensusError> {
        let _: Ack = self.post(peer, "/gossip/skeleton", notice).await?;
        Ok(())
    }

    pub async fn interval_validation(
        &self,
        peer: &Address,
        notice: &IntervalValidationNotice,
    ) -> Result<(), ConsensusError> {
        let _: Ack = self
            .post(peer, "/consensus/interval-validation", notice)
            .await?;
        Ok(())
    }

    pub async fn transaction(
        &self,
        peer: &Address,
        gossip: &TransactionGossip,
    ) -> Result<(), ConsensusError> {
        let _: Ack = self.post(peer, "/gossip/transaction", gossip).await?;
        Ok(())
    }

    pub async fn connect(&self, peer: &Address) -> Result<ConnectResponse, ConsensusError> {
        let request = ConnectRequest {
            sender: self.own.clone(),
        };
        self.post(peer, "/peer/connect", &request).await
    }

    pub async fn wallet_alert(
        &self,
        peer: &Address,
        alert: &WalletAlert,
    ) -> Result<(), ConsensusError> {
        let _: Ack = self.post(peer, "/wallet/alert", alert).await?;
        Ok(())
    }
}

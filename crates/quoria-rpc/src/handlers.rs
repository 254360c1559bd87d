use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::debug;

use quoria_consensus::net::{
    Ack, ConnectRequest, ConnectResponse, IntervalValidationNotice, MempoolKeysRequest,
    MempoolKeysResponse, MempoolTransactionsRequest, QuorumReadyRequest, QuorumReadyResponse,
    ReconcileNotice, SignatureNotice, SkeletonNotice, TransactionGossip, WalletSubscribeRequest,
};
use quoria_consensus::Coordinator;
use quoria_core::block_hash;

use crate::error::RpcError;

/// Application state shared with handlers
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub phase: u8,
    pub height: u64,
    pub tip_hash: Option<String>,
    pub mempool_size: usize,
    pub local_peers: usize,
}

/// GET /ping - heartbeat
pub async fn ping() -> Json<Ack> {
    Json(Ack::ok())
}

/// GET /status - node status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let coordinator = &state.coordinator;
    let (height, tip_hash) = {
        let chain = coordinator.chain().read().await;
        let tip_hash = chain.tip().and_then(|tip| block_hash(tip, 0).ok());
        (chain.height(), tip_hash)
    };

    Json(StatusResponse {
        phase: coordinator.phase().current().as_u8(),
        height,
        tip_hash,
        mempool_size: coordinator.mempool().len().await,
        local_peers: coordinator.peers().local_len(),
    })
}

/// POST /tx and POST /gossip/transaction - ADD_TRANSACTION.
/// One-way: acknowledged immediately, processed behind the phase gate.
pub async fn submit_transaction(
    State(state): State<Arc<AppState>>,
    Json(gossip): Json<TransactionGossip>,
) -> Json<Ack> {
    let coordinator = Arc::clone(&state.coordinator);
    tokio::spawn(async move {
        if let Err(err) = coordinator.add_transaction(gossip.transaction).await {
            debug!("transaction dropped: {err}");
        }
    });
    Json(Ack::ok())
}

/// POST /consensus/quorum-ready - QUORUM_READY (two-way)
pub async fn quorum_ready(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuorumReadyRequest>,
) -> Result<Json<QuorumReadyResponse>, RpcError> {
    debug!("quorum ready from {}", request.sender);
    let response = Arc::clone(&state.coordinator).receive_quorum_ready().await?;
    Ok(Json(response))
}

/// POST /consensus/reconcile - RECONCILE_BLOCK confirm
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    Json(notice): Json<ReconcileNotice>,
) -> Json<Ack> {
    state.coordinator.receive_reconcile(&notice);
    Json(Ack::ok())
}

/// POST /consensus/mempool/keys - RECEIVE_MEMPOOL request leg (two-way)
pub async fn mempool_keys(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MempoolKeysRequest>,
) -> Result<Json<MempoolKeysResponse>, RpcError> {
    let response = Arc::clone(&state.coordinator)
        .receive_mempool_keys(request.keys)
        .await?;
    Ok(Json(response))
}

/// POST /consensus/mempool/transactions - RECEIVE_MEMPOOL reply leg
pub async fn mempool_transactions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MempoolTransactionsRequest>,
) -> Json<Ack> {
    let coordinator = Arc::clone(&state.coordinator);
    tokio::spawn(async move {
        if let Err(err) = coordinator
            .receive_mempool_transactions(request.transactions)
            .await
        {
            debug!("mempool delivery dropped: {err}");
        }
    });
    Json(Ack::ok())
}

/// POST /consensus/signature - RECEIVE_SIGNATURE (one-way)
pub async fn signature(
    State(state): State<Arc<AppState>>,
    Json(notice): Json<SignatureNotice>,
) -> Json<Ack> {
    let coordinator = Arc::clone(&state.coordinator);
    tokio::spawn(async move {
        if let Err(err) = coordinator.receive_signature(notice.signature).await {
            debug!("signature dropped: {err}");
        }
    });
    Json(Ack::ok())
}

/// POST /consensus/interval-validation - RECEIVE_INTERVAL_VALIDATION
pub async fn interval_validation(
    State(state): State<Arc<AppState>>,
    Json(notice): Json<IntervalValidationNotice>,
) -> Json<Ack> {
    debug!(
        "interval validation from {}: interval {} valid = {}",
        notice.sender, notice.interval_index, notice.is_valid
    );
    state
        .coordinator
        .receive_interval_validation(notice.is_valid, notice.interval_index);
    Json(Ack::ok())
}

/// POST /gossip/skeleton - RECEIVE_SKELETON (one-way)
pub async fn skeleton(
    State(state): State<Arc<AppState>>,
    Json(notice): Json<SkeletonNotice>,
) -> Json<Ack> {
    let coordinator = Arc::clone(&state.coordinator);
    tokio::spawn(async move {
        if let Err(err) = coordinator.receive_skeleton(notice.skeleton).await {
            debug!("skeleton dropped: {err}");
        }
    });
    Json(Ack::ok())
}

/// POST /peer/connect - bootstrap handshake
pub async fn peer_connect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConnectRequest>,
) -> Json<ConnectResponse> {
    let accepted = state.coordinator.peers().establish(request.sender.clone());
    if accepted {
        debug!("accepted connection from {}", request.sender);
    }
    Json(ConnectResponse { accepted })
}

/// POST /wallet/subscribe - register for commit alerts on an account
pub async fn wallet_subscribe(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WalletSubscribeRequest>,
) -> Json<Ack> {
    state
        .coordinator
        .subscribe_wallet(request.account, request.address);
    Json(Ack::ok())
}

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    get_status, interval_validation, mempool_keys, mempool_transactions, peer_connect, ping,
    quorum_ready, reconcile, signature, skeleton, submit_transaction, wallet_subscribe, AppState,
};

/// Create the HTTP router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ping", get(ping))
        .route("/status", get(get_status))
        .route("/tx", post(submit_transaction))
        .route("/gossip/transaction", post(submit_transaction))
        .route("/gossip/skeleton", post(skeleton))
        .route("/consensus/quorum-ready", post(quorum_ready))
        .route("/consensus/reconcile", post(reconcile))
        .route("/consensus/mempool/keys", post(mempool_keys))
        .route("/consensus/mempool/transactions", post(mempool_transactions))
        .route("/consensus/signature", post(signature))
        .route("/consensus/interval-validation", post(interval_validation))
        .route("/peer/connect", post(peer_connect))
        .route("/wallet/subscribe", post(wallet_subscribe))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

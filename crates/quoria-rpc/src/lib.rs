//! Quoria RPC - The node's HTTP surface
//!
//! Every protocol message kind maps to one route here, alongside the
//! client-facing submit and status endpoints. One-way messages are
//! acknowledged immediately and processed on a spawned task so senders
//! never block on this node's phase gate.

pub mod error;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use quoria_consensus::Coordinator;
use tracing::info;

pub use error::RpcError;
pub use handlers::{AppState, StatusResponse};
pub use routes::create_router;

/// HTTP server wrapping the coordinator
pub struct RpcServer {
    app_state: Arc<AppState>,
}

impl RpcServer {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        RpcServer {
            app_state: Arc::new(AppState { coordinator }),
        }
    }

    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.app_state))
    }

    /// Serve on an already-bound listener
    pub async fn run(self, listener: tokio::net::TcpListener) -> Result<(), std::io::Error> {
        info!("RPC server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await
    }
}

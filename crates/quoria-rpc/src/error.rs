use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use quoria_consensus::ConsensusError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Out of order: {0}")]
    OutOfOrder(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConsensusError> for RpcError {
    fn from(err: ConsensusError) -> Self {
        match err {
            ConsensusError::OutOfOrderMessage { .. } => RpcError::OutOfOrder(err.to_string()),
            ConsensusError::NotInQuorum
            | ConsensusError::SignerNotInQuorum(_)
            | ConsensusError::BlockIdMismatch { .. }
            | ConsensusError::InsufficientSignatures { .. }
            | ConsensusError::MissingTransactions { .. }
            | ConsensusError::HashMismatch { .. } => RpcError::BadRequest(err.to_string()),
            other => RpcError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RpcError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RpcError::OutOfOrder(msg) => (StatusCode::CONFLICT, msg.clone()),
            RpcError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

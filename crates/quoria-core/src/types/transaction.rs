use serde::{Deserialize, Serialize};

use crate::crypto::hash::{hash_blake3, Hash};
use crate::types::model::ModelData;

/// Payload flavor a node is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flavor {
    #[serde(rename = "Defi")]
    Defi,
    #[serde(rename = "ML")]
    Ml,
}

/// A balance transfer between two accounts (financial flavor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTransaction {
    pub from: String,
    pub to: String,
    pub amount: i64,
    /// Stable unique identifier; its hash is the transaction digest
    pub uid: String,
}

impl TransferTransaction {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        amount: i64,
        uid: impl Into<String>,
    ) -> Self {
        TransferTransaction {
            from: from.into(),
            to: to.into(),
            amount,
            uid: uid.into(),
        }
    }
}

/// A pending transaction, in either payload flavor.
///
/// Both flavors expose a stable UID; everything else is opaque to the
/// consensus core, which keys mempools and blocks by the UID digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transaction {
    Transfer(TransferTransaction),
    Model(ModelData),
}

impl Transaction {
    pub fn uid(&self) -> &str {
        match self {
            Transaction::Transfer(tx) => &tx.uid,
            Transaction::Model(model) => &model.uid,
        }
    }

    /// The mempool and block key: Blake3 of the UID bytes
    pub fn digest(&self) -> Hash {
        hash_blake3(self.uid().as_bytes())
    }
}

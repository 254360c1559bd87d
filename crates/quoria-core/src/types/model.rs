use serde::{Deserialize, Serialize};

/// A submitted machine-learning model awaiting verification.
///
/// The model itself is opaque to the consensus core; `intervals_validity`
/// records, per training interval, whether an honest re-computation of that
/// interval reproduces the submitted weights. Its length bounds the
/// interval space of the validation sub-protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    /// Stable unique identifier; its hash is the transaction digest
    pub uid: String,
    /// Opaque serialized model artifact
    pub payload: Vec<u8>,
    /// Ground truth of each training interval's reproducibility
    pub intervals_validity: Vec<bool>,
}

impl ModelData {
    pub fn new(uid: impl Into<String>, intervals_validity: Vec<bool>) -> Self {
        ModelData {
            uid: uid.into(),
            payload: Vec::new(),
            intervals_validity,
        }
    }

    pub fn interval_count(&self) -> usize {
        self.intervals_validity.len()
    }
}

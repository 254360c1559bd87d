use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ConsensusError;

/// The five phases of one block round. Non-quorum nodes stay in `Idle`
/// for the whole round and only pass through `add_block` when applying a
/// skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Ready,
    MempoolSync,
    Building,
    Committing,
}

impl Phase {
    pub fn as_u8(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Ready => 1,
            Phase::MempoolSync => 2,
            Phase::Building => 3,
            Phase::Committing => 4,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "IDLE",
            Phase::Ready => "READY",
            Phase::MempoolSync => "MEMPOOL_SYNC",
            Phase::Building => "BUILDING",
            Phase::Committing => "COMMITTING",
        };
        write!(f, "{name}")
    }
}

/// Phase gate for inbound message handlers.
///
/// Every consensus handler must not progress until the node's phase equals
/// the phase its message belongs to. Transitions broadcast on a watch
/// channel; `wait_for` suspends the handler without holding any data lock
/// and gives up after the bounded timeout, at which point the message is
/// treated as out of order and dropped.
#[derive(Debug)]
pub struct PhaseGate {
    tx: watch::Sender<Phase>,
    // Keeps the channel open when no handler is waiting
    _rx: watch::Receiver<Phase>,
}

impl PhaseGate {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(Phase::Idle);
        PhaseGate { tx, _rx: rx }
    }

    pub fn current(&self) -> Phase {
        *self.tx.borrow()
    }

    pub fn set(&self, phase: Phase) {
        self.tx.send_replace(phase);
    }

    /// Wait until the node reaches `phase`, up to `timeout`
    pub async fn wait_for(&self, phase: Phase, timeout: Duration) -> Result<(), ConsensusError> {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|current| *current == phase)).await;
        match waited {
            Ok(Ok(_)) => Ok(()),
            _ => Err(ConsensusError::OutOfOrderMessage {
                expected: phase,
                current: self.current(),
            }),
        }
    }
}

impl Default for PhaseGate {
    fn default() -> Self {
        PhaseGate::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_integers() {
        assert_eq!(Phase::Idle.as_u8(), 0);
        assert_eq!(Phase::Ready.as_u8(), 1);
        assert_eq!(Phase::MempoolSync.as_u8(), 2);
        assert_eq!(Phase::Building.as_u8(), 3);
        assert_eq!(Phase::Committing.as_u8(), 4);
    }

    #[tokio::test]
    async fn test_wait_for_current_phase() {
        let gate = PhaseGate::new();
        gate.wait_for(Phase::Idle, Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_transition() {
        let gate = std::sync::Arc::new(PhaseGate::new());

        let waiter = std::sync::Arc::clone(&gate);
        let handle = tokio::spawn(async move {
            waiter
                .wait_for(Phase::Building, Duration::from_secs(1))
                .await
        });

        gate.set(Phase::Ready);
        gate.set(Phase::Building);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let gate = PhaseGate::new();
        let result = gate
            .wait_for(Phase::Committing, Duration::from_millis(20))
            .await;
        assert!(matches!(
            result,
            Err(ConsensusError::OutOfOrderMessage { .. })
        ));
    }
}

use quoria_core::{Block, BlockSignature};

/// Per-round scratch state, bundled so the coordinator can replace it
/// atomically at round start and reset it on every commit.
#[derive(Debug, Default)]
pub struct RoundState {
    /// QUORUM_READY acknowledgements counted from the other members
    pub ready_votes: usize,
    /// Completed mempool reconciliation exchanges
    pub mempool_rounds: usize,
    /// Signatures collected from the other quorum members
    pub sigs: Vec<BlockSignature>,
    /// The candidate block built for this round
    pub block: Option<Block>,
}

impl RoundState {
    pub fn reset(&mut self) {
        *self = RoundState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_everything() {
        let mut round = RoundState {
            ready_votes: 2,
            mempool_rounds: 1,
            sigs: Vec::new(),
            block: Some(Block::genesis()),
        };
        round.reset();
        assert_eq!(round.ready_votes, 0);
        assert_eq!(round.mempool_rounds, 0);
        assert!(round.sigs.is_empty());
        assert!(round.block.is_none());
    }
}

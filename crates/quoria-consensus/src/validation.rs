//! ML interval validation.
//!
//! Once per round every quorum member re-checks one training interval of
//! the submitted model, broadcasts its verdict, and collects the others'.
//! The per-interval majority yields the validity map embedded in the
//! block.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;

use quoria_core::{Address, ModelData};

use crate::error::ConsensusError;

/// The interval indices to be re-checked for a model.
///
/// External-collaborator contract: deterministic in the model and the
/// block hash. The schedule here is the identity over the model's
/// interval space.
pub fn task_intervals(model: &ModelData, _block_hash: &str) -> Vec<u32> {
    (0..model.interval_count() as u32).collect()
}

/// Fold the UTF-8 bytes of a hex digest into a 64-bit seed. Each byte is
/// shifted in from the right, so only the trailing eight bytes survive;
/// this matches the wire contract.
fn fold_seed(block_hash: &str) -> u64 {
    let mut seed: u64 = 0;
    for byte in block_hash.as_bytes() {
        seed = (seed << 8) | u64::from(*byte);
    }
    seed
}

/// Derive the interval this node must re-check.
///
/// The quorum is shuffled with a PRNG seeded from the block hash, then
/// intervals are dealt round-robin over the shuffled members; every
/// honest node computes the same assignment.
pub fn derive_task(
    model: &ModelData,
    block_hash: &str,
    quorum: &[Address],
    own: &Address,
) -> Option<u32> {
    let intervals = task_intervals(model, block_hash);
    if intervals.is_empty() {
        return None;
    }

    let mut shuffled = quorum.to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(fold_seed(block_hash));
    shuffled.shuffle(&mut rng);

    let mut assignment = None;
    let mut interval_index = 0;
    for member in &shuffled {
        if member == own {
            assignment = Some(intervals[interval_index]);
        }
        interval_index = (interval_index + 1) % intervals.len();
    }
    assignment
}

#[derive(Debug, Default)]
struct VoteState {
    responses: usize,
    votes: BTreeMap<u32, Vec<bool>>,
}

/// Collects interval verdicts for the current round.
///
/// Only the local handler path mutates vote state; the quorum broadcast
/// is pure side-effect, so each node's own verdict is counted exactly
/// once. Completion is signalled through a watch flag that
/// `construct_block` awaits; the result is only readable after the flag
/// flips.
#[derive(Debug)]
pub struct IntervalValidator {
    quorum_size: usize,
    state: Mutex<VoteState>,
    complete: watch::Sender<Option<(BTreeMap<u32, bool>, bool)>>,
    _rx: watch::Receiver<Option<(BTreeMap<u32, bool>, bool)>>,
}

impl IntervalValidator {
    pub fn new(quorum_size: usize) -> Self {
        let (complete, rx) = watch::channel(None);
        IntervalValidator {
            quorum_size,
            state: Mutex::new(VoteState::default()),
            complete,
            _rx: rx,
        }
    }

    /// Record one member's verdict. When every quorum member has
    /// reported, compute the per-interval majorities, reset the vote
    /// state, and publish the result.
    pub fn record_vote(&self, interval_index: u32, is_valid: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.responses += 1;
        state
            .votes
            .entry(interval_index)
            .or_default()
            .push(is_valid);

        if state.responses == self.quorum_size {
            state.responses = 0;
            let mut validations = BTreeMap::new();
            for (interval, votes) in &state.votes {
                let valid = votes.iter().filter(|vote| **vote).count();
                let invalid = votes.len() - valid;
                validations.insert(*interval, valid > invalid);
            }
            state.votes.clear();

            let all_valid = validations.values().all(|valid| *valid);
            self.complete.send_replace(Some((validations, all_valid)));
        }
    }

    /// Await the round's validity map; consumes the completion flag so
    /// the next round starts clean
    pub async fn wait_complete(
        &self,
        timeout: Duration,
    ) -> Result<(BTreeMap<u32, bool>, bool), ConsensusError> {
        let mut rx = self.complete.subscribe();
        eprintln!("DIAG: subscribed, current={:?}", rx.borrow().is_some());
        let waited =
            tokio::time::timeout(timeout, rx.wait_for(|result| result.is_some())).await;
        let ok = matches!(waited, Ok(Ok(_)));
        eprintln!("DIAG: waited={:?}", ok);
        drop(waited);
        eprintln!("DIAG: dropped waited");
        if !ok {
            return Err(ConsensusError::RoundFailed(
                "interval validation did not complete".to_string(),
            ));
        }

        eprintln!("DIAG: about to send_replace(None)");
        let result = self.complete.send_replace(None);
        eprintln!("DIAG: send_replace done, result_some={}", result.is_some());
        result.ok_or_else(|| {
            ConsensusError::RoundFailed("interval validation result already consumed".to_string())
        })
    }

    /// Defensive reset between rounds
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = VoteState::default();
        self.complete.send_replace(None);
    }
}

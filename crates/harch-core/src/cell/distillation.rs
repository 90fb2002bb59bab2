//! Two-input purification cell.

use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::physics::{Outcome, Pair, PairPhysics};
use crate::pool::{CellMode, PoolCell};

/// Success/failure counters of one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PurificationTally {
    /// Rounds that produced a pair.
    pub successes: u64,
    /// Rounds that consumed both inputs with no yield.
    pub failures: u64,
}

impl PurificationTally {
    /// Total rounds run.
    pub fn rounds(&self) -> u64 {
        self.successes + self.failures
    }

    pub(crate) fn merge(&mut self, other: PurificationTally) {
        self.successes += other.successes;
        self.failures += other.failures;
    }
}

/// Purifies two pairs as soon as they arrive and holds the survivor.
#[derive(Debug)]
pub struct DistillationCell<M: PairPhysics> {
    physics: Rc<M>,
    rng: StdRng,
    pending: Option<Pair<M::State>>,
    last_success_probability: Option<f64>,
    tally: PurificationTally,
    mode: CellMode,
}

impl<M: PairPhysics> DistillationCell<M> {
    /// An empty cell; `seed` drives post-selection sampling.
    pub fn new(physics: Rc<M>, seed: u64) -> Self {
        Self {
            physics,
            rng: StdRng::seed_from_u64(seed),
            pending: None,
            last_success_probability: None,
            tally: PurificationTally::default(),
            mode: CellMode::Idle,
        }
    }

    /// Idle and not holding an uncollected result.
    pub fn is_available(&self) -> bool {
        self.pending.is_none() && self.mode.is_idle()
    }

    /// Whether a purified pair is waiting to be collected.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Load two pairs, apply `duration` of transfer noise to each and purify.
    ///
    /// Hands both pairs back untouched if a previous result is still
    /// waiting. On failure both inputs are consumed and nothing is pending.
    pub fn input(
        &mut self,
        control: Pair<M::State>,
        target: Pair<M::State>,
        duration: u64,
    ) -> Result<Outcome, (Pair<M::State>, Pair<M::State>)> {
        if self.pending.is_some() {
            return Err((control, target));
        }
        let a = self.physics.decohere(&control.state, duration);
        let b = self.physics.decohere(&target.state, duration);
        let result = self.physics.purify(&a, &b, &mut self.rng);
        self.last_success_probability = Some(result.success_probability);

        match (result.outcome, result.state) {
            (Outcome::Success, Some(state)) => {
                self.tally.successes += 1;
                self.pending = Some(Pair {
                    state,
                    rounds: control.rounds.max(target.rounds) + 1,
                });
                Ok(Outcome::Success)
            }
            _ => {
                self.tally.failures += 1;
                self.pending = None;
                Ok(Outcome::Failure)
            }
        }
    }

    /// Collect the purified pair after `readout_duration` of noise.
    pub fn output(&mut self, readout_duration: u64) -> Option<Pair<M::State>> {
        let pair = self.pending.take()?;
        let state = self.physics.decohere(&pair.state, readout_duration);
        Some(Pair {
            state,
            rounds: pair.rounds,
        })
    }

    /// Success probability reported by the most recent round.
    pub fn last_success_probability(&self) -> Option<f64> {
        self.last_success_probability
    }

    /// Counters of this cell.
    pub fn tally(&self) -> PurificationTally {
        self.tally
    }
}

impl<M: PairPhysics> PoolCell for DistillationCell<M> {
    fn mode(&self) -> CellMode {
        self.mode
    }

    fn set_mode(&mut self, mode: CellMode) {
        self.mode = mode;
    }
}

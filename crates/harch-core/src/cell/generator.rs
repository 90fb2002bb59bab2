//! Heralded pair generator.

use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::physics::{Pair, PairPhysics};
use crate::pool::{CellMode, PoolCell};

/// Where a generator's pairs come from.
#[derive(Debug, Clone)]
pub enum PairSource<S> {
    /// Hand out a copy of the same state every time.
    Fixed(S),
    /// Ask the physics model for a fresh pair on every fetch.
    Regenerate,
}

/// Catches a photon and hands out the resulting raw pair.
#[derive(Debug)]
pub struct GeneratorCell<M: PairPhysics> {
    physics: Rc<M>,
    source: Option<PairSource<M::State>>,
    rng: StdRng,
    mode: CellMode,
    emitted: u64,
}

impl<M: PairPhysics> GeneratorCell<M> {
    /// A generator with the given source. `seed` drives regeneration.
    pub fn new(physics: Rc<M>, source: Option<PairSource<M::State>>, seed: u64) -> Self {
        Self {
            physics,
            source,
            rng: StdRng::seed_from_u64(seed),
            mode: CellMode::Idle,
            emitted: 0,
        }
    }

    /// A generator that regenerates a pair on every fetch.
    pub fn regenerating(physics: Rc<M>, seed: u64) -> Self {
        Self::new(physics, Some(PairSource::Regenerate), seed)
    }

    /// Whether the generator is idle. A missing source only surfaces on
    /// [`output`](Self::output).
    pub fn is_available(&self) -> bool {
        self.mode.is_idle()
    }

    /// Whether a pair source is configured.
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Replace the pair source.
    pub fn set_source(&mut self, source: PairSource<M::State>) {
        self.source = Some(source);
    }

    /// Produce a raw pair, or `None` if no source is configured.
    pub fn output(&mut self) -> Option<Pair<M::State>> {
        let state = match self.source.as_ref()? {
            PairSource::Fixed(state) => state.clone(),
            PairSource::Regenerate => self.physics.generate(&mut self.rng),
        };
        self.emitted += 1;
        Some(Pair::raw(state))
    }

    /// Number of pairs handed out so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl<M: PairPhysics> PoolCell for GeneratorCell<M> {
    fn mode(&self) -> CellMode {
        self.mode
    }

    fn set_mode(&mut self, mode: CellMode) {
        self.mode = mode;
    }
}

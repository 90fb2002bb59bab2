//! Input module: the generator bank.

use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::trace;

use crate::cell::GeneratorCell;
use crate::config::CatchTime;
use crate::error::{HarchError, HarchResult};
use crate::physics::{Pair, PairPhysics};
use crate::pool::{CellId, CellPool, Operation};
use crate::time::ClockHandle;

use super::ModuleSnapshot;

/// Generators catching photons from the line.
#[derive(Debug)]
pub struct InputModule<M: PairPhysics> {
    pool: CellPool<GeneratorCell<M>>,
    clock: ClockHandle,
    catch_time: CatchTime,
    rng: StdRng,
}

impl<M: PairPhysics> InputModule<M> {
    /// Wrap `generators`; `seed` drives catch-time sampling.
    pub fn new(
        generators: Vec<GeneratorCell<M>>,
        clock: ClockHandle,
        catch_time: CatchTime,
        seed: u64,
    ) -> Self {
        Self {
            pool: CellPool::new(generators),
            clock,
            catch_time,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `count` regenerating generators sharing one physics model.
    pub fn regenerating(
        physics: &Rc<M>,
        count: usize,
        clock: ClockHandle,
        catch_time: CatchTime,
        seed: u64,
    ) -> Self {
        let generators = (0..count as u64)
            .map(|i| GeneratorCell::regenerating(Rc::clone(physics), seed.wrapping_add(i + 1)))
            .collect();
        Self::new(generators, clock, catch_time, seed)
    }

    /// Whether a pooled generator is idle.
    pub fn is_cell_available(&self) -> bool {
        self.pool.any(GeneratorCell::is_available)
    }

    /// Lock the first idle generator for `duration`.
    pub fn get_available_cell(&mut self, duration: u64) -> Option<CellId> {
        let id = self.pool.find(GeneratorCell::is_available)?;
        self.pool.lock(id, self.clock.now(), duration, Operation::Catch);
        Some(id)
    }

    /// Draw the time the next catch will take.
    pub fn sample_catch_time(&mut self) -> u64 {
        self.catch_time.sample(&mut self.rng)
    }

    /// Sample a catch time and lock a generator for it.
    pub fn catch(&mut self) -> Option<(CellId, u64)> {
        if !self.is_cell_available() {
            return None;
        }
        let duration = self.sample_catch_time();
        self.get_available_cell(duration).map(|id| (id, duration))
    }

    /// Take the pair a generator produced.
    pub fn fetch(&mut self, id: CellId) -> HarchResult<Pair<M::State>> {
        self.pool
            .cell_mut(id)
            .and_then(GeneratorCell::output)
            .ok_or(HarchError::NoPairSource(id))
    }

    /// Borrow a generator.
    pub fn cell(&self, id: CellId) -> Option<&GeneratorCell<M>> {
        self.pool.cell(id)
    }

    /// Pairs produced by all generators.
    pub fn emitted(&self) -> u64 {
        self.pool.cells().map(|(_, g)| g.emitted()).sum()
    }

    /// Return generators whose catch has finished.
    pub fn check_unlock(&mut self) -> Vec<CellId> {
        let released = self.pool.release_expired(self.clock.now());
        if !released.is_empty() {
            trace!(module = "input", released = released.len(), "unlocked cells");
        }
        released
    }

    /// The underlying pool.
    pub fn pool(&self) -> &CellPool<GeneratorCell<M>> {
        &self.pool
    }

    /// Current counts.
    pub fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot {
            label: "input".into(),
            cells: self.pool.len(),
            pooled: self.pool.available_len(),
            locked: self.pool.locked_len(),
            stored_pairs: 0,
            utilisation: self.pool.utilisation(),
        }
    }
}

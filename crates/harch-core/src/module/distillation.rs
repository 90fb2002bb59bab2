//! Distillation module: the bank of purification cells.

use std::rc::Rc;

use tracing::trace;

use crate::cell::{DistillationCell, PurificationTally};
use crate::physics::{Outcome, Pair, PairPhysics};
use crate::pool::{CellId, CellPool, Operation, Utilisation};
use crate::time::ClockHandle;

use super::ModuleSnapshot;

type PairOf<M> = Pair<<M as PairPhysics>::State>;

/// Purification cells.
#[derive(Debug)]
pub struct DistillationModule<M: PairPhysics> {
    pool: CellPool<DistillationCell<M>>,
    clock: ClockHandle,
}

impl<M: PairPhysics> DistillationModule<M> {
    /// Wrap `cells`.
    pub fn new(cells: Vec<DistillationCell<M>>, clock: ClockHandle) -> Self {
        Self {
            pool: CellPool::new(cells),
            clock,
        }
    }

    /// `count` cells sharing one physics model, seeded from `seed`.
    pub fn with_cells(physics: &Rc<M>, count: usize, clock: ClockHandle, seed: u64) -> Self {
        let cells = (0..count as u64)
            .map(|i| DistillationCell::new(Rc::clone(physics), seed.wrapping_add(i)))
            .collect();
        Self::new(cells, clock)
    }

    /// Whether a pooled cell is idle with nothing pending.
    pub fn is_cell_available(&self) -> bool {
        self.pool.any(DistillationCell::is_available)
    }

    /// Lock the first free cell for a purification round of `duration`.
    pub fn get_available_cell(&mut self, duration: u64) -> Option<CellId> {
        let id = self.pool.find(DistillationCell::is_available)?;
        self.pool.lock(id, self.clock.now(), duration, Operation::Distill);
        Some(id)
    }

    /// Feed two pairs into cell `id` after `duration` of transfer noise.
    pub fn distill(
        &mut self,
        id: CellId,
        control: PairOf<M>,
        target: PairOf<M>,
        duration: u64,
    ) -> Result<Outcome, (PairOf<M>, PairOf<M>)> {
        match self.pool.cell_mut(id) {
            Some(cell) => cell.input(control, target, duration),
            None => Err((control, target)),
        }
    }

    /// Whether a pooled cell holds a purified pair.
    ///
    /// A result becomes collectable once the round's lock has run out.
    pub fn is_qubit_pending(&self) -> bool {
        self.pool.any(DistillationCell::is_pending)
    }

    /// Collect the first pending pair after `duration` of readout noise.
    ///
    /// The cell is locked for `duration` while it is read.
    pub fn get_output(&mut self, duration: u64) -> Option<PairOf<M>> {
        let id = self.pool.find(DistillationCell::is_pending)?;
        self.pool.lock(id, self.clock.now(), duration, Operation::Read);
        self.pool.cell_mut(id)?.output(duration)
    }

    /// Borrow a cell.
    pub fn cell(&self, id: CellId) -> Option<&DistillationCell<M>> {
        self.pool.cell(id)
    }

    /// Counters summed over every cell.
    pub fn tally(&self) -> PurificationTally {
        let mut total = PurificationTally::default();
        for (_, cell) in self.pool.cells() {
            total.merge(cell.tally());
        }
        total
    }

    /// Return cells whose lock has run out.
    pub fn check_unlock(&mut self) -> Vec<CellId> {
        let released = self.pool.release_expired(self.clock.now());
        if !released.is_empty() {
            trace!(module = "distillation", released = released.len(), "unlocked cells");
        }
        released
    }

    /// The underlying pool.
    pub fn pool(&self) -> &CellPool<DistillationCell<M>> {
        &self.pool
    }

    /// Busy/idle counters.
    pub fn utilisation(&self) -> Utilisation {
        self.pool.utilisation()
    }

    /// Current counts; pending results count as stored pairs.
    pub fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot {
            label: "distillation".into(),
            cells: self.pool.len(),
            pooled: self.pool.available_len(),
            locked: self.pool.locked_len(),
            stored_pairs: self.pool.cells().filter(|(_, c)| c.is_pending()).count(),
            utilisation: self.pool.utilisation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScalarPhysics;
    use crate::time::Clock;

    #[test]
    fn test_failed_round_returns_cell_on_unlock() {
        let mut clock = Clock::new(1).unwrap();
        let physics = Rc::new(ScalarPhysics::failing());
        let mut d = DistillationModule::with_cells(&physics, 1, clock.handle(), 0);
        let id = d.get_available_cell(2).unwrap();
        let outcome = d.distill(id, Pair::raw(0.9), Pair::raw(0.9), 0).unwrap();
        assert_eq!(outcome, Outcome::Failure);
        assert!(!d.is_qubit_pending());
        assert!(!d.is_cell_available());

        clock.tick();
        assert!(d.check_unlock().is_empty());
        clock.tick();
        assert_eq!(d.check_unlock(), vec![id]);
        assert!(d.is_cell_available());
        assert!(!d.is_qubit_pending());
        assert_eq!(d.tally().failures, 1);
    }

    #[test]
    fn test_pending_collectable_after_round() {
        let mut clock = Clock::new(1).unwrap();
        let physics = Rc::new(ScalarPhysics::ideal());
        let mut d = DistillationModule::with_cells(&physics, 2, clock.handle(), 0);
        let id = d.get_available_cell(1).unwrap();
        assert_eq!(id, CellId(0));
        d.distill(id, Pair::raw(0.9), Pair::raw(0.9), 0).unwrap();
        // Still running the round.
        assert!(!d.is_qubit_pending());
        assert!(d.get_output(1).is_none());
        assert!(d.is_cell_available());

        clock.tick();
        d.check_unlock();
        assert!(d.is_qubit_pending());
        assert_eq!(d.snapshot().stored_pairs, 1);

        let pair = d.get_output(1).unwrap();
        assert_eq!(pair.rounds, 1);
        assert!(!d.is_qubit_pending());
        assert_eq!(d.pool().lock_record(id).unwrap().operation, Operation::Read);
    }

    #[test]
    fn test_zero_cells() {
        let clock = Clock::new(1).unwrap();
        let physics = Rc::new(ScalarPhysics::ideal());
        let mut d = DistillationModule::with_cells(&physics, 0, clock.handle(), 0);
        assert!(!d.is_cell_available());
        assert!(d.get_available_cell(1).is_none());
        assert!(d.get_output(1).is_none());
        assert_eq!(d.tally().rounds(), 0);
    }
}

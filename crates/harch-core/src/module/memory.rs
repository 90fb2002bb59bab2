//! Memory module: raw or distilled pair storage.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cell::MemoryCell;
use crate::config::MemoryConfig;
use crate::physics::{Pair, PairPhysics};
use crate::pool::{CellId, CellPool, Operation, Utilisation};
use crate::time::{ClockHandle, SimTime};

use super::ModuleSnapshot;

/// One slot of one memory cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotAddress {
    /// The cell.
    pub cell: CellId,
    /// Slot index inside the cell.
    pub slot: usize,
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.cell, self.slot)
    }
}

/// Where the two pairs for a distillation round are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoQubitAddress {
    /// One pair from each of two cells, read in parallel.
    Split(CellId, CellId),
    /// Both pairs from the same cell, read one after the other.
    Shared(CellId),
}

impl TwoQubitAddress {
    /// The cells to read from, in read order. A shared cell appears twice.
    pub fn cells(self) -> [CellId; 2] {
        match self {
            TwoQubitAddress::Split(a, b) => [a, b],
            TwoQubitAddress::Shared(a) => [a, a],
        }
    }
}

/// A bank of multimode memory cells.
#[derive(Debug)]
pub struct MemoryModule<M: PairPhysics> {
    label: &'static str,
    pool: CellPool<MemoryCell<M>>,
    clock: ClockHandle,
}

/// Memory holding purified pairs. Same behaviour, separate instance.
pub type DistilledMemoryModule<M> = MemoryModule<M>;

impl<M: PairPhysics> MemoryModule<M> {
    /// Wrap `cells` under `label`, used in logs and snapshots.
    pub fn new(label: &'static str, cells: Vec<MemoryCell<M>>, clock: ClockHandle) -> Self {
        Self {
            label,
            pool: CellPool::new(cells),
            clock,
        }
    }

    /// Build `config.cells` identical cells.
    pub fn from_config(
        label: &'static str,
        config: &MemoryConfig,
        physics: &Rc<M>,
        clock: ClockHandle,
    ) -> Self {
        let cells = (0..config.cells)
            .map(|_| {
                MemoryCell::new(
                    Rc::clone(physics),
                    clock.clone(),
                    config.levels,
                    config.load_ns,
                    config.read_ns,
                )
            })
            .collect();
        Self::new(label, cells, clock)
    }

    /// Log and snapshot label.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Whether a pooled cell has an empty slot.
    pub fn is_cell_available(&self) -> bool {
        self.pool.any(MemoryCell::has_free_slot)
    }

    /// Lock the first pooled cell with an empty slot for `duration`.
    pub fn get_available_cell(&mut self, duration: u64) -> Option<CellId> {
        let id = self.pool.find(MemoryCell::has_free_slot)?;
        self.pool.lock(id, self.clock.now(), duration, Operation::Load);
        Some(id)
    }

    /// Lock the first pooled cell with an empty slot for its own load time.
    pub fn get_empty_available_memory(&mut self) -> Option<CellId> {
        let id = self.pool.find(MemoryCell::has_free_slot)?;
        let duration = self.pool.cell(id)?.load_time();
        self.pool.lock(id, self.clock.now(), duration, Operation::Load);
        Some(id)
    }

    /// Store `pair` in cell `id` after `duration` of transfer noise.
    pub fn store(
        &mut self,
        id: CellId,
        pair: Pair<M::State>,
        duration: u64,
    ) -> Result<SlotAddress, Pair<M::State>> {
        let Some(cell) = self.pool.cell_mut(id) else {
            return Err(pair);
        };
        let slot = cell.input(pair, duration)?;
        Ok(SlotAddress { cell: id, slot })
    }

    /// Whether any pooled cell holds a pair.
    pub fn is_qubit_available(&self) -> bool {
        self.pool.any(MemoryCell::has_pair)
    }

    /// Whether pooled cells hold at least two pairs between them.
    pub fn is_two_qubit_available(&self) -> bool {
        self.pool.pooled().map(|(_, c)| c.occupied()).sum::<usize>() >= 2
    }

    /// Claim the cells holding the next two pairs.
    ///
    /// Prefers the first two pooled cells holding a pair, each locked for
    /// `duration`. If only one cell qualifies it must hold two pairs and is
    /// locked for twice `duration`.
    pub fn find_two_qubit_address(&mut self, duration: u64) -> Option<TwoQubitAddress> {
        let mut holders = self
            .pool
            .pooled()
            .filter(|(_, c)| c.has_pair())
            .map(|(id, c)| (id, c.occupied()));
        let first = holders.next()?;
        let second = holders.next();
        drop(holders);

        let now = self.clock.now();
        match second {
            Some((b, _)) => {
                let a = first.0;
                self.pool.lock(a, now, duration, Operation::Read);
                self.pool.lock(b, now, duration, Operation::Read);
                Some(TwoQubitAddress::Split(a, b))
            }
            None if first.1 >= 2 => {
                self.pool.lock(first.0, now, duration.saturating_mul(2), Operation::Read);
                Some(TwoQubitAddress::Shared(first.0))
            }
            None => None,
        }
    }

    /// `(address, fidelity)` of every pair in pooled cells, in pool then slot order.
    fn pooled_fidelities(&self) -> Vec<(SlotAddress, f64)> {
        self.pool
            .pooled()
            .flat_map(|(cell, c)| {
                c.fidelities()
                    .into_iter()
                    .map(move |(slot, f)| (SlotAddress { cell, slot }, f))
            })
            .collect()
    }

    fn first_same_fidelities(&self, error: f64) -> Option<(SlotAddress, SlotAddress)> {
        let fidelities = self.pooled_fidelities();
        for (i, &(a, fa)) in fidelities.iter().enumerate() {
            for &(b, fb) in &fidelities[i + 1..] {
                if (fa - fb).abs() < error {
                    return Some((a, b));
                }
            }
        }
        None
    }

    /// Whether two stored pairs differ in fidelity by less than `error`.
    pub fn is_same_fidelities(&self, error: f64) -> bool {
        self.first_same_fidelities(error).is_some()
    }

    /// The first two pairs whose fidelities differ by less than `error`.
    ///
    /// Pairs are compared in pool order, then slot order; this is the first
    /// match, not the closest one. The cells involved are locked for
    /// `duration`, or twice that if both pairs share a cell.
    pub fn get_same_fidelities(
        &mut self,
        error: f64,
        duration: u64,
    ) -> Option<(SlotAddress, SlotAddress)> {
        let (a, b) = self.first_same_fidelities(error)?;
        let now = self.clock.now();
        if a.cell == b.cell {
            self.pool.lock(a.cell, now, duration.saturating_mul(2), Operation::Read);
        } else {
            self.pool.lock(a.cell, now, duration, Operation::Read);
            self.pool.lock(b.cell, now, duration, Operation::Read);
        }
        Some((a, b))
    }

    fn first_at_fidelity(&self, target: f64, error: f64) -> Option<SlotAddress> {
        self.pooled_fidelities()
            .into_iter()
            .find(|&(_, value)| target - value < error)
            .map(|(address, _)| address)
    }

    /// Whether a stored pair is within `error` below `target`.
    ///
    /// Only `target - value < error` is checked, so any pair above the
    /// target also qualifies.
    pub fn have_fidelity(&self, target: f64, error: f64) -> bool {
        self.first_at_fidelity(target, error).is_some()
    }

    /// Remove the first pair passing [`have_fidelity`](Self::have_fidelity).
    ///
    /// The cell is locked for its read time; the pair picks up `readout` of
    /// noise on top of its storage time.
    pub fn get_fidelity_qubit(
        &mut self,
        target: f64,
        error: f64,
        readout: u64,
    ) -> Option<(Pair<M::State>, SimTime)> {
        let address = self.first_at_fidelity(target, error)?;
        let read_time = self.pool.cell(address.cell)?.read_time();
        self.pool.lock(address.cell, self.clock.now(), read_time, Operation::Read);
        self.take(address, readout)
    }

    /// Empty a slot, returning the decayed pair and its load time.
    pub fn take(
        &mut self,
        address: SlotAddress,
        readout: u64,
    ) -> Option<(Pair<M::State>, SimTime)> {
        self.pool.cell_mut(address.cell)?.output(address.slot, readout)
    }

    /// Empty the slot of cell `id` that has waited longest.
    pub fn take_oldest(&mut self, id: CellId, readout: u64) -> Option<(Pair<M::State>, SimTime)> {
        let cell = self.pool.cell_mut(id)?;
        let slot = cell.oldest_slot()?;
        cell.output(slot, readout)
    }

    /// Stored fidelity of every pair in pooled cells.
    ///
    /// Cells mid-load or mid-read are skipped until they unlock.
    pub fn fidelities(&self) -> Vec<f64> {
        self.pooled_fidelities().into_iter().map(|(_, f)| f).collect()
    }

    /// Pairs stored across all cells.
    pub fn stored_pairs(&self) -> usize {
        self.pool.cells().map(|(_, c)| c.occupied()).sum()
    }

    /// Borrow a cell.
    pub fn cell(&self, id: CellId) -> Option<&MemoryCell<M>> {
        self.pool.cell(id)
    }

    /// Mutably borrow a cell.
    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut MemoryCell<M>> {
        self.pool.cell_mut(id)
    }

    /// Return cells whose lock has run out.
    pub fn check_unlock(&mut self) -> Vec<CellId> {
        let released = self.pool.release_expired(self.clock.now());
        if !released.is_empty() {
            trace!(module = self.label, released = released.len(), "unlocked cells");
        }
        released
    }

    /// The underlying pool.
    pub fn pool(&self) -> &CellPool<MemoryCell<M>> {
        &self.pool
    }

    /// Busy/idle counters.
    pub fn utilisation(&self) -> Utilisation {
        self.pool.utilisation()
    }

    /// Current counts.
    pub fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot {
            label: self.label.into(),
            cells: self.pool.len(),
            pooled: self.pool.available_len(),
            locked: self.pool.locked_len(),
            stored_pairs: self.stored_pairs(),
            utilisation: self.pool.utilisation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScalarPhysics;
    use crate::time::Clock;

    fn module(clock: &Clock, cells: usize, levels: usize) -> MemoryModule<ScalarPhysics> {
        let config = MemoryConfig {
            cells,
            levels,
            load_ns: 300,
            read_ns: 300,
        };
        let physics = Rc::new(ScalarPhysics::ideal());
        MemoryModule::from_config("memory", &config, &physics, clock.handle())
    }

    fn put(m: &mut MemoryModule<ScalarPhysics>, cell: u32, fidelity: f64) {
        m.cell_mut(CellId(cell))
            .unwrap()
            .input(Pair::raw(fidelity), 0)
            .unwrap();
    }

    #[test]
    fn test_two_single_slot_cells_split_addressing() {
        let clock = Clock::new(1).unwrap();
        let mut m = module(&clock, 2, 1);
        assert!(!m.is_two_qubit_available());

        put(&mut m, 0, 0.9);
        assert!(!m.is_two_qubit_available());
        put(&mut m, 1, 0.9);
        assert!(m.is_two_qubit_available());

        let address = m.find_two_qubit_address(100).unwrap();
        assert_eq!(address, TwoQubitAddress::Split(CellId(0), CellId(1)));
        for id in [CellId(0), CellId(1)] {
            assert_eq!(m.pool().lock_record(id).unwrap().duration, 100);
        }
        assert!(m.pool().is_partitioned());
    }

    #[test]
    fn test_shared_cell_doubles_lock() {
        let clock = Clock::new(1).unwrap();
        let mut m = module(&clock, 2, 2);
        put(&mut m, 1, 0.9);
        put(&mut m, 1, 0.8);
        assert!(m.is_two_qubit_available());

        let address = m.find_two_qubit_address(100).unwrap();
        assert_eq!(address, TwoQubitAddress::Shared(CellId(1)));
        assert_eq!(m.pool().lock_record(CellId(1)).unwrap().duration, 200);
        assert!(m.pool().is_pooled(CellId(0)));

        let [a, b] = address.cells();
        assert!(m.take_oldest(a, 0).is_some());
        assert!(m.take_oldest(b, 0).is_some());
        assert_eq!(m.stored_pairs(), 0);
    }

    #[test]
    fn test_locked_cells_are_not_counted() {
        let clock = Clock::new(1).unwrap();
        let mut m = module(&clock, 2, 2);
        put(&mut m, 0, 0.9);
        put(&mut m, 0, 0.9);
        m.find_two_qubit_address(10).unwrap();
        assert!(!m.is_two_qubit_available());
        assert!(!m.is_qubit_available());
        assert!(!m.have_fidelity(0.5, 0.1));
        assert!(m.fidelities().is_empty());
        assert_eq!(m.stored_pairs(), 2);
    }

    #[test]
    fn test_have_fidelity_is_asymmetric() {
        let clock = Clock::new(1).unwrap();
        let mut m = module(&clock, 1, 1);
        put(&mut m, 0, 0.92);
        assert!(m.have_fidelity(0.93, 0.02));

        let mut m = module(&clock, 1, 1);
        put(&mut m, 0, 0.90);
        assert!(!m.have_fidelity(0.93, 0.02));

        // Far above the target still passes.
        let mut m = module(&clock, 1, 1);
        put(&mut m, 0, 0.99);
        assert!(m.have_fidelity(0.5, 0.001));
    }

    #[test]
    fn test_get_fidelity_qubit_locks_for_read_time() {
        let clock = Clock::new(1).unwrap();
        let mut m = module(&clock, 2, 2);
        put(&mut m, 0, 0.5);
        put(&mut m, 1, 0.7);
        put(&mut m, 1, 0.96);

        let (pair, loaded_at) = m.get_fidelity_qubit(0.95, 0.01, 0).unwrap();
        assert_eq!(pair.state, 0.96);
        assert_eq!(loaded_at, SimTime::ZERO);
        let record = m.pool().lock_record(CellId(1)).unwrap();
        assert_eq!((record.duration, record.operation), (300, Operation::Read));
        assert!(m.get_fidelity_qubit(0.95, 0.01, 0).is_none());
    }

    #[test]
    fn test_same_fidelities_first_match_in_order() {
        let clock = Clock::new(1).unwrap();
        let mut m = module(&clock, 3, 2);
        put(&mut m, 0, 0.80);
        put(&mut m, 0, 0.90);
        put(&mut m, 1, 0.70);
        put(&mut m, 2, 0.901);
        put(&mut m, 2, 0.9005);

        assert!(m.is_same_fidelities(0.005));
        let (a, b) = m.get_same_fidelities(0.005, 100).unwrap();
        // 0.90 pairs with 0.901 before the closer 0.901/0.9005 pair is seen.
        assert_eq!(a, SlotAddress { cell: CellId(0), slot: 1 });
        assert_eq!(b, SlotAddress { cell: CellId(2), slot: 0 });
        assert!(m.pool().is_locked(CellId(0)));
        assert!(m.pool().is_locked(CellId(2)));
        assert!(m.pool().is_pooled(CellId(1)));
    }

    #[test]
    fn test_same_fidelities_needs_two_distinct_slots() {
        let clock = Clock::new(1).unwrap();
        let mut m = module(&clock, 1, 2);
        put(&mut m, 0, 0.9);
        assert!(!m.is_same_fidelities(0.5));
        put(&mut m, 0, 0.9);
        let (a, b) = m.get_same_fidelities(0.001, 50).unwrap();
        assert_eq!((a.slot, b.slot), (0, 1));
        assert_eq!(m.pool().lock_record(CellId(0)).unwrap().duration, 100);
    }

    #[test]
    fn test_empty_memory_uses_load_time() {
        let mut clock = Clock::new(100).unwrap();
        let mut m = module(&clock, 1, 1);
        assert!(m.is_cell_available());
        let id = m.get_empty_available_memory().unwrap();
        let address = m.store(id, Pair::raw(0.9), 0).unwrap();
        assert_eq!(address.to_string(), "cell0[0]");
        assert!(!m.is_cell_available());

        for _ in 0..3 {
            clock.tick();
        }
        assert_eq!(m.check_unlock(), vec![id]);
        // Full cell: pooled but not available for storing.
        assert!(!m.is_cell_available());
        assert!(m.get_available_cell(10).is_none());
        let snapshot = m.snapshot();
        assert_eq!((snapshot.pooled, snapshot.stored_pairs), (1, 1));
    }
}

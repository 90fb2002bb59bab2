//! Cell arena with an availability pool and lock records.
//!
//! Every module stores its cells in a [`CellPool`]. Cells live in a fixed
//! arena addressed by [`CellId`]; the pool tracks which of them are free and
//! which are locked for an operation. A cell id is always in exactly one of
//! the two collections.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::time::SimTime;

/// Stable handle of a cell inside its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell{}", self.0)
    }
}

impl CellId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The operation a locked cell is busy with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A generator waiting for a photon.
    Catch,
    /// A memory cell swapping a pair in.
    Load,
    /// A memory or distillation cell handing a pair out.
    Read,
    /// A distillation cell running the protocol.
    Distill,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Catch => write!(f, "catch"),
            Operation::Load => write!(f, "load"),
            Operation::Read => write!(f, "read"),
            Operation::Distill => write!(f, "distill"),
        }
    }
}

/// Per-cell state machine: idle in the pool, or busy with one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellMode {
    /// In the available pool.
    #[default]
    Idle,
    /// Locked for an operation.
    Busy(Operation),
}

impl CellMode {
    /// Whether the cell is idle.
    pub fn is_idle(self) -> bool {
        matches!(self, CellMode::Idle)
    }
}

/// Behaviour every pooled cell shares.
pub trait PoolCell {
    /// Current mode.
    fn mode(&self) -> CellMode;

    /// Set by the pool when the cell is locked or released.
    fn set_mode(&mut self, mode: CellMode);
}

/// A cell's lock: when it started and how long it lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Time the cell left the pool.
    pub start: SimTime,
    /// Lock length in nanoseconds.
    pub duration: u64,
    /// What the cell is doing.
    pub operation: Operation,
}

impl LockRecord {
    /// Whether the lock has run its full length at `now`.
    #[inline]
    pub fn is_expired(&self, now: SimTime) -> bool {
        now.since(self.start) >= self.duration
    }

    /// First instant at which the cell may return to the pool.
    #[inline]
    pub fn release_at(&self) -> SimTime {
        self.start.plus(self.duration)
    }
}

/// Busy/idle cell-tick counters, sampled once per unlock pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utilisation {
    /// Sum over passes of cells that were locked.
    pub busy_cell_ticks: u64,
    /// Sum over passes of cells that were pooled.
    pub idle_cell_ticks: u64,
}

impl Utilisation {
    /// Fraction of sampled cell-ticks spent busy.
    pub fn busy_fraction(&self) -> f64 {
        let total = self.busy_cell_ticks + self.idle_cell_ticks;
        if total == 0 {
            0.0
        } else {
            self.busy_cell_ticks as f64 / total as f64
        }
    }
}

/// Arena of cells plus their pool/lock bookkeeping.
#[derive(Debug)]
pub struct CellPool<C> {
    cells: Vec<C>,
    available: Vec<CellId>,
    locked: FxHashMap<CellId, LockRecord>,
    utilisation: Utilisation,
}

impl<C: PoolCell> CellPool<C> {
    /// Build a pool with every cell available, in the given order.
    pub fn new(cells: Vec<C>) -> Self {
        let available = (0..cells.len() as u32).map(CellId).collect();
        Self {
            cells,
            available,
            locked: FxHashMap::default(),
            utilisation: Utilisation::default(),
        }
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the module has no cells at all.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of cells currently in the pool.
    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    /// Number of locked cells.
    pub fn locked_len(&self) -> usize {
        self.locked.len()
    }

    /// Borrow a cell by handle, whether pooled or locked.
    pub fn cell(&self, id: CellId) -> Option<&C> {
        self.cells.get(id.index())
    }

    /// Mutably borrow a cell by handle, whether pooled or locked.
    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut C> {
        self.cells.get_mut(id.index())
    }

    /// Every cell, in arena order.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &C)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, c)| (CellId(i as u32), c))
    }

    /// Pooled cells, in pool order.
    pub fn pooled(&self) -> impl Iterator<Item = (CellId, &C)> {
        self.available
            .iter()
            .map(|&id| (id, &self.cells[id.index()]))
    }

    /// First pooled cell satisfying `pred`.
    pub fn find(&self, mut pred: impl FnMut(&C) -> bool) -> Option<CellId> {
        self.pooled().find(|(_, c)| pred(c)).map(|(id, _)| id)
    }

    /// Whether any pooled cell satisfies `pred`.
    pub fn any(&self, pred: impl FnMut(&C) -> bool) -> bool {
        self.find(pred).is_some()
    }

    /// Whether `id` is in the pool.
    pub fn is_pooled(&self, id: CellId) -> bool {
        self.available.contains(&id)
    }

    /// Whether `id` is locked.
    pub fn is_locked(&self, id: CellId) -> bool {
        self.locked.contains_key(&id)
    }

    /// Lock record for `id`, if locked.
    pub fn lock_record(&self, id: CellId) -> Option<&LockRecord> {
        self.locked.get(&id)
    }

    /// Move `id` from the pool into the lock records.
    ///
    /// Returns `false` if the cell is not currently pooled.
    pub fn lock(&mut self, id: CellId, now: SimTime, duration: u64, operation: Operation) -> bool {
        let Some(pos) = self.available.iter().position(|&c| c == id) else {
            return false;
        };
        self.available.remove(pos);
        self.locked.insert(
            id,
            LockRecord {
                start: now,
                duration,
                operation,
            },
        );
        self.cells[id.index()].set_mode(CellMode::Busy(operation));
        true
    }

    /// Return every cell whose lock has expired at `now` to the pool.
    ///
    /// Expired cells are appended in handle order. Returns the released ids.
    pub fn release_expired(&mut self, now: SimTime) -> Vec<CellId> {
        self.utilisation.busy_cell_ticks += self.locked.len() as u64;
        self.utilisation.idle_cell_ticks += self.available.len() as u64;

        let mut expired: Vec<CellId> = self
            .locked
            .iter()
            .filter(|(_, record)| record.is_expired(now))
            .map(|(&id, _)| id)
            .collect();
        expired.sort_unstable();

        for &id in &expired {
            self.locked.remove(&id);
            self.cells[id.index()].set_mode(CellMode::Idle);
            self.available.push(id);
        }
        expired
    }

    /// Busy/idle counters accumulated so far.
    pub fn utilisation(&self) -> Utilisation {
        self.utilisation
    }

    /// Check that every cell is in exactly one of {pool, lock records}.
    pub fn is_partitioned(&self) -> bool {
        let mut seen = vec![0u8; self.cells.len()];
        for id in self.available.iter().chain(self.locked.keys()) {
            match seen.get_mut(id.index()) {
                Some(count) => *count += 1,
                None => return false,
            }
        }
        seen.iter().all(|&count| count == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Default)]
    struct Slot {
        mode: CellMode,
    }

    impl PoolCell for Slot {
        fn mode(&self) -> CellMode {
            self.mode
        }

        fn set_mode(&mut self, mode: CellMode) {
            self.mode = mode;
        }
    }

    fn pool(n: usize) -> CellPool<Slot> {
        CellPool::new((0..n).map(|_| Slot::default()).collect())
    }

    #[test]
    fn test_new_pool_is_fully_available() {
        let p = pool(3);
        assert_eq!(p.available_len(), 3);
        assert_eq!(p.locked_len(), 0);
        assert!(p.is_partitioned());
    }

    #[test]
    fn test_lock_moves_cell_and_sets_mode() {
        let mut p = pool(2);
        assert!(p.lock(CellId(1), SimTime::ZERO, 5, Operation::Load));
        assert!(p.is_locked(CellId(1)));
        assert!(!p.is_pooled(CellId(1)));
        assert_eq!(p.cell(CellId(1)).unwrap().mode(), CellMode::Busy(Operation::Load));
        // Locking twice fails: the cell is no longer pooled.
        assert!(!p.lock(CellId(1), SimTime::ZERO, 5, Operation::Load));
        assert!(p.is_partitioned());
    }

    #[test]
    fn test_release_boundary() {
        let mut p = pool(1);
        p.lock(CellId(0), SimTime::from_nanos(10), 5, Operation::Read);
        assert!(p.release_expired(SimTime::from_nanos(14)).is_empty());
        assert_eq!(p.release_expired(SimTime::from_nanos(15)), vec![CellId(0)]);
        assert!(p.cell(CellId(0)).unwrap().mode().is_idle());
    }

    #[test]
    fn test_release_appends_in_handle_order() {
        let mut p = pool(3);
        p.lock(CellId(2), SimTime::ZERO, 1, Operation::Read);
        p.lock(CellId(0), SimTime::ZERO, 1, Operation::Read);
        p.release_expired(SimTime::from_nanos(1));
        let order: Vec<_> = p.pooled().map(|(id, _)| id).collect();
        assert_eq!(order, vec![CellId(1), CellId(0), CellId(2)]);
    }

    #[test]
    fn test_find_is_first_fit_over_pool_order() {
        let mut p = pool(3);
        p.lock(CellId(0), SimTime::ZERO, 0, Operation::Read);
        p.release_expired(SimTime::ZERO);
        // Pool order is now 1, 2, 0.
        assert_eq!(p.find(|_| true), Some(CellId(1)));
    }

    #[test]
    fn test_utilisation_counts() {
        let mut p = pool(2);
        p.lock(CellId(0), SimTime::ZERO, 10, Operation::Distill);
        p.release_expired(SimTime::from_nanos(1));
        p.release_expired(SimTime::from_nanos(2));
        let u = p.utilisation();
        assert_eq!(u.busy_cell_ticks, 2);
        assert_eq!(u.idle_cell_ticks, 2);
        assert!((u.busy_fraction() - 0.5).abs() < 1e-12);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Lock { cell: u32, duration: u64 },
        Tick,
    }

    fn arb_step(n: u32) -> impl Strategy<Value = Step> {
        prop_oneof![
            (0..n, 0_u64..6).prop_map(|(cell, duration)| Step::Lock { cell, duration }),
            Just(Step::Tick),
        ]
    }

    proptest! {
        #[test]
        fn prop_pool_stays_partitioned(steps in prop::collection::vec(arb_step(4), 0..60)) {
            let mut p = pool(4);
            let mut now = SimTime::ZERO;
            for step in steps {
                match step {
                    Step::Lock { cell, duration } => {
                        let was_pooled = p.is_pooled(CellId(cell));
                        let locked = p.lock(CellId(cell), now, duration, Operation::Read);
                        prop_assert_eq!(locked, was_pooled);
                    }
                    Step::Tick => {
                        now = now.plus(1);
                        p.release_expired(now);
                    }
                }
                prop_assert!(p.is_partitioned());
            }
        }

        #[test]
        fn prop_locked_cell_absent_until_expiry(start in 0_u64..50, duration in 0_u64..20) {
            let mut p = pool(1);
            let locked_at = SimTime::from_nanos(start);
            let release = locked_at.plus(duration);
            p.lock(CellId(0), locked_at, duration, Operation::Load);
            let mut now = locked_at;
            loop {
                now = now.plus(1);
                p.release_expired(now);
                if now < release {
                    prop_assert!(!p.is_pooled(CellId(0)));
                } else {
                    prop_assert!(p.is_pooled(CellId(0)));
                    break;
                }
            }
        }
    }
}

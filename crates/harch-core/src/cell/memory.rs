//! Multimode memory cell: one transmon coupled to a cavity with `levels` slots.

use std::rc::Rc;

use crate::physics::{Pair, PairPhysics};
use crate::pool::{CellMode, PoolCell};
use crate::time::{ClockHandle, SimTime};

/// A pair parked in a memory slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPair<S> {
    /// The pair as it was when it entered the slot.
    pub pair: Pair<S>,
    /// When it entered the slot.
    pub loaded_at: SimTime,
}

/// Fixed-capacity store of pairs addressed by slot index.
///
/// Stored states are not decayed while they sit in memory. The decay for the
/// whole storage interval is applied in one step when the slot is read.
#[derive(Debug)]
pub struct MemoryCell<M: PairPhysics> {
    physics: Rc<M>,
    clock: ClockHandle,
    slots: Vec<Option<StoredPair<M::State>>>,
    load_time: u64,
    read_time: u64,
    mode: CellMode,
}

impl<M: PairPhysics> MemoryCell<M> {
    /// An empty cell with `levels` slots.
    pub fn new(
        physics: Rc<M>,
        clock: ClockHandle,
        levels: usize,
        load_time: u64,
        read_time: u64,
    ) -> Self {
        Self {
            physics,
            clock,
            slots: vec![None; levels],
            load_time,
            read_time,
            mode: CellMode::Idle,
        }
    }

    /// Slot capacity.
    pub fn levels(&self) -> usize {
        self.slots.len()
    }

    /// Time a swap-in keeps the cell busy.
    pub fn load_time(&self) -> u64 {
        self.load_time
    }

    /// Time a swap-out keeps the cell busy.
    pub fn read_time(&self) -> u64 {
        self.read_time
    }

    /// Whether the cell is idle.
    pub fn is_available(&self) -> bool {
        self.mode.is_idle()
    }

    /// Number of empty slots.
    pub fn free_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// Number of stored pairs.
    pub fn occupied(&self) -> usize {
        self.slots.len() - self.free_slots()
    }

    /// Whether at least one slot is empty.
    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Whether at least one pair is stored.
    pub fn has_pair(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    /// Borrow a slot.
    pub fn slot(&self, index: usize) -> Option<&StoredPair<M::State>> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Store `pair` in the lowest empty slot after `duration` of transfer noise.
    ///
    /// Returns the slot index, or hands the pair back if every slot is full.
    pub fn input(&mut self, pair: Pair<M::State>, duration: u64) -> Result<usize, Pair<M::State>> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return Err(pair);
        };
        let state = self.physics.decohere(&pair.state, duration);
        self.slots[index] = Some(StoredPair {
            pair: Pair {
                state,
                rounds: pair.rounds,
            },
            loaded_at: self.clock.now(),
        });
        Ok(index)
    }

    /// Empty slot `index` and return its pair with the original load time.
    ///
    /// The pair is decayed for `readout_duration` plus its time in storage.
    pub fn output(
        &mut self,
        index: usize,
        readout_duration: u64,
    ) -> Option<(Pair<M::State>, SimTime)> {
        let stored = self.slots.get_mut(index)?.take()?;
        let elapsed = readout_duration.saturating_add(self.clock.now().since(stored.loaded_at));
        let state = self.physics.decohere(&stored.pair.state, elapsed);
        Some((
            Pair {
                state,
                rounds: stored.pair.rounds,
            },
            stored.loaded_at,
        ))
    }

    /// `(slot, fidelity)` of every stored pair, in slot order.
    pub fn fidelities(&self) -> Vec<(usize, f64)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, self.physics.fidelity(&s.pair.state))))
            .collect()
    }

    /// Slot holding the pair that has waited longest; ties go to the lower index.
    pub fn oldest_slot(&self) -> Option<usize> {
        let now = self.clock.now();
        let mut oldest: Option<(usize, u64)> = None;
        for (i, stored) in self.slots.iter().enumerate() {
            let Some(stored) = stored else { continue };
            let age = now.since(stored.loaded_at);
            if oldest.is_none_or(|(_, best)| age > best) {
                oldest = Some((i, age));
            }
        }
        oldest.map(|(i, _)| i)
    }
}

impl<M: PairPhysics> PoolCell for MemoryCell<M> {
    fn mode(&self) -> CellMode {
        self.mode
    }

    fn set_mode(&mut self, mode: CellMode) {
        self.mode = mode;
    }
}

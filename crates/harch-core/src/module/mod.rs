//! Resource modules: pools of same-kind cells with lock bookkeeping.
//!
//! Modules never talk to each other. They answer availability queries, claim
//! cells for an operation and return them once the lock has run out. The
//! controller moves pairs between them.

mod distillation;
mod input;
mod memory;

use serde::{Deserialize, Serialize};

use crate::pool::Utilisation;

pub use distillation::DistillationModule;
pub use input::InputModule;
pub use memory::{DistilledMemoryModule, MemoryModule, SlotAddress, TwoQubitAddress};

/// Point-in-time counts for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    /// Which module.
    pub label: String,
    /// Total cells.
    pub cells: usize,
    /// Cells in the available pool.
    pub pooled: usize,
    /// Cells held by a lock record.
    pub locked: usize,
    /// Pairs held: stored slots, or pending results for distillation.
    pub stored_pairs: usize,
    /// Busy/idle counters.
    pub utilisation: Utilisation,
}

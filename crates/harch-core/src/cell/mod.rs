//! Standard cells: the smallest lockable resources of the chip.

mod distillation;
mod generator;
mod memory;

pub use distillation::{DistillationCell, PurificationTally};
pub use generator::{GeneratorCell, PairSource};
pub use memory::{MemoryCell, StoredPair};

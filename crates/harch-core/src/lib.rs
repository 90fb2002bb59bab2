//! Harch Core - cycle-accurate entanglement distillation controller.
//!
//! This crate models the microarchitecture of a quantum-repeater chip that
//! turns noisy remote Bell pairs into high-fidelity ones:
//!
//! - [`Clock`]: the single writable time source, read through [`ClockHandle`]s
//! - [`cell`]: generator, memory and distillation cells
//! - [`CellPool`]: per-module arena with availability pool and lock records
//! - [`module`]: the input, memory, distillation and distilled-memory modules
//! - [`Controller`]: the fixed-priority scheduler moving pairs between modules
//! - [`FidelityTracker`]: rolling average and running maximum over distilled memory
//!
//! The pair states themselves are opaque. All physics goes through the
//! [`PairPhysics`] trait, implemented by the adapter crates.
//!
//! # Example
//!
//! ```ignore
//! use harch_core::{Controller, PhysicsSet, SimConfig};
//! use harch_adapter_werner::{WernerParams, WernerPhysics};
//!
//! let physics = WernerPhysics::new(WernerParams::default())?;
//! let config = SimConfig::default();
//! let mut controller = Controller::from_config(&config, PhysicsSet::uniform(physics))?;
//! let report = controller.run()?;
//! println!("emitted {} pairs", report.emitted.len());
//! ```

pub mod cell;
pub mod config;
pub mod controller;
pub mod error;
pub mod fidelity;
pub mod module;
pub mod physics;
pub mod pool;
pub mod report;
pub mod time;

#[cfg(test)]
mod mock;

pub use config::{CatchTime, SimConfig};
pub use controller::{Controller, Modules, Priority};
pub use error::{HarchError, HarchResult};
pub use fidelity::{FidelitySample, FidelityTracker};
pub use module::{
    DistillationModule, DistilledMemoryModule, InputModule, MemoryModule, ModuleSnapshot,
    SlotAddress, TwoQubitAddress,
};
pub use physics::{Outcome, Pair, PairPhysics, PhysicsSet, Purification};
pub use pool::{CellId, CellMode, CellPool, LockRecord, Operation, PoolCell, Utilisation};
pub use report::{EmittedPair, RunReport, TickReport};
pub use time::{Clock, ClockHandle, SimTime};

//! Density-matrix physics for the Harch distillation controller.
//!
//! Pairs are 4×4 density operators. Stored and transferred pairs relax
//! under amplitude and phase damping derived from T1/T2, purification runs
//! the DEJMPS (QPA) circuit on the 16×16 joint state with a sampled parity
//! measurement, and fidelity is the overlap with a Bell reference.
//!
//! ```rust
//! use harch_adapter_dm::{DmParams, DmPhysics};
//! use harch_core::PairPhysics;
//!
//! let physics = DmPhysics::new(DmParams::default()).unwrap();
//! let pair = physics.source_pair();
//! assert!((physics.fidelity(&pair) - 1.0).abs() < 1e-10);
//! ```

pub mod density;
pub mod error;
pub mod noise;
pub mod physics;
pub mod protocol;

pub use density::{BellState, DensityMatrix};
pub use error::{DmError, DmResult};
pub use noise::Coherence;
pub use physics::{DmParams, DmPhysics};

//! Simulation configuration.
//!
//! All durations are nanoseconds. Defaults follow the reference chip: 100 ns
//! transfers, 300 ns cavity swaps, a 150–300 ns photon catch window and a
//! 1 ns clock.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{HarchError, HarchResult};

/// How long a generator is busy catching one photon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatchTime {
    /// Every catch takes the same time.
    Fixed {
        /// Catch duration.
        ns: u64,
    },
    /// Catch time drawn uniformly from `[min_ns, max_ns]` per catch.
    Uniform {
        /// Shortest catch.
        min_ns: u64,
        /// Longest catch.
        max_ns: u64,
    },
}

impl Default for CatchTime {
    fn default() -> Self {
        CatchTime::Uniform {
            min_ns: 150,
            max_ns: 300,
        }
    }
}

impl CatchTime {
    /// Draw one catch duration.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match *self {
            CatchTime::Fixed { ns } => ns,
            CatchTime::Uniform { min_ns, max_ns } => rng.gen_range(min_ns..=max_ns),
        }
    }

    fn validate(&self) -> HarchResult<()> {
        if let CatchTime::Uniform { min_ns, max_ns } = *self {
            if min_ns > max_ns {
                return Err(HarchError::invalid(
                    "input.catch_time",
                    format!("min_ns ({min_ns}) exceeds max_ns ({max_ns})"),
                ));
            }
        }
        Ok(())
    }
}

/// Generator bank feeding the chip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Number of generator cells.
    pub generators: usize,
    /// Photon catch time.
    pub catch_time: CatchTime,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            generators: 1,
            catch_time: CatchTime::default(),
        }
    }
}

/// A bank of multimode memory cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Number of cells.
    pub cells: usize,
    /// Slots per cell (cavity levels).
    pub levels: usize,
    /// How long a swap-in locks a cell.
    pub load_ns: u64,
    /// How long a swap-out locks a cell.
    pub read_ns: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cells: 4,
            levels: 2,
            load_ns: 300,
            read_ns: 300,
        }
    }
}

impl MemoryConfig {
    fn validate(&self, field: &'static str) -> HarchResult<()> {
        if self.levels == 0 {
            return Err(HarchError::invalid(field, "levels must be at least 1"));
        }
        Ok(())
    }
}

/// The purification stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistillationConfig {
    /// Number of distillation cells.
    pub cells: usize,
    /// How long one purification round locks a cell.
    pub distill_ns: u64,
}

impl Default for DistillationConfig {
    fn default() -> Self {
        Self {
            cells: 2,
            distill_ns: 100,
        }
    }
}

/// Noise durations applied when pairs move between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferTiming {
    /// Generator to raw memory.
    pub input_to_memory_ns: u64,
    /// Raw memory to a distillation cell.
    pub memory_to_distill_ns: u64,
    /// Distillation cell to distilled memory.
    pub distill_to_memory_ns: u64,
    /// Distilled memory into a distillation cell.
    pub swap_in_ns: u64,
    /// Any memory slot out onto the bus.
    pub swap_out_ns: u64,
    /// Collecting a result from a distillation cell, and the final read-out.
    pub readout_ns: u64,
}

impl Default for TransferTiming {
    fn default() -> Self {
        Self {
            input_to_memory_ns: 100,
            memory_to_distill_ns: 100,
            distill_to_memory_ns: 100,
            swap_in_ns: 100,
            swap_out_ns: 100,
            readout_ns: 100,
        }
    }
}

/// Knobs of the priority scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulePolicy {
    /// Fidelity a pair needs before it is emitted.
    pub target_fidelity: f64,
    /// Tolerance below the target still accepted for output.
    pub fidelity_error: f64,
    /// Maximum fidelity gap between two pairs distilled together.
    pub same_fidelity_error: f64,
    /// How many times priorities 1–4 are attempted per tick.
    pub repeats_per_tick: usize,
    /// Maximum pairs emitted per output attempt.
    pub output_retries: usize,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            target_fidelity: 0.95,
            fidelity_error: 0.005,
            same_fidelity_error: 0.005,
            repeats_per_tick: 1,
            output_retries: 3,
        }
    }
}

/// Fidelity statistics over distilled memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingConfig {
    /// Per-tick means averaged into the rolling average.
    pub window: usize,
    /// Samples kept before the oldest are dropped.
    pub history_limit: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            window: 5,
            history_limit: 100_000,
        }
    }
}

/// Everything needed to build and run a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Ticks to simulate in [`run`](crate::Controller::run).
    pub cycles: u64,
    /// Nanoseconds per tick.
    pub clock_step_ns: u64,
    /// Seed for every random stream in the run.
    pub seed: u64,
    /// Generator bank.
    pub input: InputConfig,
    /// Raw pair memory.
    pub memory: MemoryConfig,
    /// Purification stage.
    pub distillation: DistillationConfig,
    /// Memory for purified pairs.
    pub distilled_memory: MemoryConfig,
    /// Transfer noise durations.
    pub timing: TransferTiming,
    /// Scheduler policy.
    pub policy: SchedulePolicy,
    /// Fidelity statistics.
    pub tracking: TrackingConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cycles: 1000,
            clock_step_ns: 1,
            seed: 42,
            input: InputConfig::default(),
            memory: MemoryConfig::default(),
            distillation: DistillationConfig::default(),
            distilled_memory: MemoryConfig {
                cells: 2,
                ..MemoryConfig::default()
            },
            timing: TransferTiming::default(),
            policy: SchedulePolicy::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl SimConfig {
    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> HarchResult<()> {
        if self.clock_step_ns == 0 {
            return Err(HarchError::invalid(
                "clock_step_ns",
                "clock step must be at least 1 ns",
            ));
        }
        self.input.catch_time.validate()?;
        self.memory.validate("memory.levels")?;
        self.distilled_memory.validate("distilled_memory.levels")?;

        let policy = &self.policy;
        if !(0.0..=1.0).contains(&policy.target_fidelity) {
            return Err(HarchError::invalid(
                "policy.target_fidelity",
                format!("{} is not a fidelity", policy.target_fidelity),
            ));
        }
        for (field, value) in [
            ("policy.fidelity_error", policy.fidelity_error),
            ("policy.same_fidelity_error", policy.same_fidelity_error),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(HarchError::invalid(field, format!("{value} must be >= 0")));
            }
        }
        if policy.repeats_per_tick == 0 {
            return Err(HarchError::invalid(
                "policy.repeats_per_tick",
                "priorities must be attempted at least once per tick",
            ));
        }
        if self.tracking.window == 0 {
            return Err(HarchError::invalid("tracking.window", "window must be at least 1"));
        }
        if self.tracking.history_limit < self.tracking.window {
            return Err(HarchError::invalid(
                "tracking.history_limit",
                "history must hold at least one full window",
            ));
        }
        Ok(())
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(source: &str) -> HarchResult<Self> {
        let config: SimConfig = serde_yaml_ng::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialise to YAML.
    pub fn to_yaml_string(&self) -> HarchResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

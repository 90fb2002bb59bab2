//! The entanglement distillation controller.
//!
//! The controller owns the clock and the four modules and is the only place
//! pairs move between them. Each tick it walks a fixed priority list, from
//! emitting finished pairs down to catching new ones, so the pipeline drains
//! toward high fidelity before taking in fresh raw pairs:
//!
//! 1. [`Priority::Output`]: emit pairs at the target fidelity.
//! 2. [`Priority::DistilledToDistillation`]: re-purify two matching distilled pairs.
//! 3. [`Priority::DistillationToDistilled`]: store a purified pair.
//! 4. [`Priority::MemoryToDistillation`]: purify two raw pairs.
//! 5. [`Priority::InputToMemory`]: catch a raw pair and store it.
//!
//! Every action is guarded by the availability predicate of the resources it
//! uses. An action that fails after its predicate held is a bug and surfaces
//! as [`HarchError::Scheduling`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::SimConfig;
use crate::error::{HarchError, HarchResult};
use crate::fidelity::{FidelitySample, FidelityTracker};
use crate::module::{
    DistillationModule, DistilledMemoryModule, InputModule, MemoryModule, ModuleSnapshot,
};
use crate::physics::{PairPhysics, PhysicsSet};
use crate::report::{EmittedPair, RunReport, TickReport};
use crate::time::{Clock, SimTime};

/// The scheduler's priority steps, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Emit a target-fidelity pair from distilled memory.
    Output,
    /// Move two matching distilled pairs into a distillation cell.
    DistilledToDistillation,
    /// Move a purified pair into distilled memory.
    DistillationToDistilled,
    /// Move two raw pairs into a distillation cell.
    MemoryToDistillation,
    /// Catch a raw pair and store it in memory.
    InputToMemory,
}

impl Priority {
    /// All steps in scheduling order.
    pub const ALL: [Priority; 5] = [
        Priority::Output,
        Priority::DistilledToDistillation,
        Priority::DistillationToDistilled,
        Priority::MemoryToDistillation,
        Priority::InputToMemory,
    ];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Output => "output",
            Priority::DistilledToDistillation => "distilled->distillation",
            Priority::DistillationToDistilled => "distillation->distilled",
            Priority::MemoryToDistillation => "memory->distillation",
            Priority::InputToMemory => "input->memory",
        };
        f.write_str(name)
    }
}

/// The four modules a controller drives.
#[derive(Debug)]
pub struct Modules<M: PairPhysics> {
    /// Generator bank.
    pub input: InputModule<M>,
    /// Raw pair memory.
    pub memory: MemoryModule<M>,
    /// Purification cells.
    pub distillation: DistillationModule<M>,
    /// Purified pair memory.
    pub distilled_memory: DistilledMemoryModule<M>,
}

impl<M: PairPhysics> Modules<M> {
    /// Snapshots in unlock order: memory, distilled memory, distillation, input.
    pub fn snapshots(&self) -> Vec<ModuleSnapshot> {
        vec![
            self.memory.snapshot(),
            self.distilled_memory.snapshot(),
            self.distillation.snapshot(),
            self.input.snapshot(),
        ]
    }
}

/// Independent seed for random stream `stream` of a run.
fn stream_seed(seed: u64, stream: u64) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(stream.wrapping_mul(0xBF58_476D_1CE4_E5B9))
}

/// Cycle-accurate priority scheduler.
#[derive(Debug)]
pub struct Controller<M: PairPhysics> {
    clock: Clock,
    modules: Modules<M>,
    physics: PhysicsSet<M>,
    config: SimConfig,
    tracker: FidelityTracker,
    emitted: Vec<EmittedPair<M::State>>,
    ticks: u64,
}

impl<M: PairPhysics> Controller<M> {
    /// Build the modules described by `config`.
    pub fn from_config(config: &SimConfig, physics: PhysicsSet<M>) -> HarchResult<Self> {
        config.validate()?;
        let clock = Clock::new(config.clock_step_ns)?;
        let modules = Modules {
            input: InputModule::regenerating(
                &physics.input,
                config.input.generators,
                clock.handle(),
                config.input.catch_time,
                stream_seed(config.seed, 1),
            ),
            memory: MemoryModule::from_config(
                "memory",
                &config.memory,
                &physics.memory,
                clock.handle(),
            ),
            distillation: DistillationModule::with_cells(
                &physics.distillation,
                config.distillation.cells,
                clock.handle(),
                stream_seed(config.seed, 2),
            ),
            distilled_memory: MemoryModule::from_config(
                "distilled_memory",
                &config.distilled_memory,
                &physics.distilled_memory,
                clock.handle(),
            ),
        };
        Self::with_modules(clock, modules, physics, config)
    }

    /// Drive modules built by the caller. They must read `clock`'s handle.
    pub fn with_modules(
        clock: Clock,
        modules: Modules<M>,
        physics: PhysicsSet<M>,
        config: &SimConfig,
    ) -> HarchResult<Self> {
        config.validate()?;
        Ok(Self {
            clock,
            modules,
            physics,
            config: config.clone(),
            tracker: FidelityTracker::new(config.tracking.window, config.tracking.history_limit),
            emitted: Vec::new(),
            ticks: 0,
        })
    }

    /// Current time.
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The modules.
    pub fn modules(&self) -> &Modules<M> {
        &self.modules
    }

    /// Mutable access to the modules, for seeding state in tests and tools.
    pub fn modules_mut(&mut self) -> &mut Modules<M> {
        &mut self.modules
    }

    /// The configuration in use.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Fidelity statistics so far.
    pub fn tracker(&self) -> &FidelityTracker {
        &self.tracker
    }

    /// Pairs emitted so far.
    pub fn emitted(&self) -> &[EmittedPair<M::State>] {
        &self.emitted
    }

    /// Run one tick: the priority list, the clock, unlocks and statistics.
    pub fn step(&mut self) -> HarchResult<TickReport<M::State>> {
        let mut fired = Vec::new();
        let first_emitted = self.emitted.len();

        for _ in 0..self.config.policy.repeats_per_tick {
            if self.output()? {
                fired.push(Priority::Output);
            }
            if self.distilled_to_distillation()? {
                fired.push(Priority::DistilledToDistillation);
            }
            if self.distillation_to_distilled()? {
                fired.push(Priority::DistillationToDistilled);
            }
            if self.memory_to_distillation()? {
                fired.push(Priority::MemoryToDistillation);
            }
        }
        if self.input_to_memory()? {
            fired.push(Priority::InputToMemory);
        }

        let time = self.clock.tick();
        self.ticks += 1;
        self.modules.memory.check_unlock();
        self.modules.distilled_memory.check_unlock();
        self.modules.distillation.check_unlock();
        self.modules.input.check_unlock();

        let sample = self.record_fidelity(time);
        let stored = self.modules.distilled_memory.stored_pairs();
        trace!(%time, fired = fired.len(), stored, "tick");

        Ok(TickReport {
            time,
            fired,
            emitted: self.emitted[first_emitted..].to_vec(),
            sample,
        })
    }

    /// Run the configured number of cycles.
    pub fn run(&mut self) -> HarchResult<RunReport<M::State>> {
        self.run_with(|_| {})
    }

    /// Run the configured number of cycles, calling `on_tick` after each.
    pub fn run_with(
        &mut self,
        mut on_tick: impl FnMut(&TickReport<M::State>),
    ) -> HarchResult<RunReport<M::State>> {
        info!(
            cycles = self.config.cycles,
            step_ns = self.clock.step(),
            seed = self.config.seed,
            "Starting distillation run"
        );
        for _ in 0..self.config.cycles {
            let tick = self.step()?;
            on_tick(&tick);
        }
        let report = self.report();
        info!(
            emitted = report.emitted.len(),
            generated = report.generated,
            purifications = report.purification.rounds(),
            max_fidelity = report.max_fidelity().unwrap_or(0.0),
            "Distillation run completed"
        );
        Ok(report)
    }

    /// Results accumulated so far.
    pub fn report(&self) -> RunReport<M::State> {
        RunReport {
            cycles: self.ticks,
            final_time: self.clock.now(),
            generated: self.modules.input.emitted(),
            emitted: self.emitted.clone(),
            samples: self.tracker.samples().copied().collect(),
            purification: self.modules.distillation.tally(),
            modules: self.modules.snapshots(),
        }
    }

    fn record_fidelity(&mut self, time: SimTime) -> Option<FidelitySample> {
        let fidelities = self.modules.distilled_memory.fidelities();
        self.tracker.record(time, &fidelities)
    }

    /// Emit up to `output_retries` pairs at the target fidelity.
    fn output(&mut self) -> HarchResult<bool> {
        let policy = &self.config.policy;
        let (target, error) = (policy.target_fidelity, policy.fidelity_error);
        let readout = self.config.timing.readout_ns;
        let now = self.clock.now();
        let mut any = false;

        for _ in 0..policy.output_retries {
            if !self.modules.distilled_memory.have_fidelity(target, error) {
                break;
            }
            let (pair, stored_at) = self
                .modules
                .distilled_memory
                .get_fidelity_qubit(target, error, readout)
                .ok_or_else(|| {
                    HarchError::scheduling(Priority::Output, "no pair at target fidelity")
                })?;
            let fidelity = self.physics.distilled_memory.fidelity(&pair.state);
            debug!(%now, fidelity, rounds = pair.rounds, "emitted pair");
            self.emitted.push(EmittedPair {
                time: now,
                stored_at,
                fidelity,
                rounds: pair.rounds,
                state: pair.state,
            });
            any = true;
        }
        Ok(any)
    }

    fn distilled_to_distillation(&mut self) -> HarchResult<bool> {
        const P: Priority = Priority::DistilledToDistillation;
        let error = self.config.policy.same_fidelity_error;
        let Modules {
            distillation,
            distilled_memory,
            ..
        } = &mut self.modules;
        if !(distillation.is_cell_available() && distilled_memory.is_same_fidelities(error)) {
            return Ok(false);
        }

        let timing = &self.config.timing;
        let (a, b) = distilled_memory
            .get_same_fidelities(error, self.config.distilled_memory.read_ns)
            .ok_or_else(|| HarchError::scheduling(P, "matching pairs vanished"))?;
        let first = distilled_memory
            .take(a, timing.swap_out_ns)
            .ok_or_else(|| HarchError::scheduling(P, format!("slot {a} is empty")))?;
        let second = distilled_memory
            .take(b, timing.swap_out_ns)
            .ok_or_else(|| HarchError::scheduling(P, format!("slot {b} is empty")))?;
        let cell = distillation
            .get_available_cell(self.config.distillation.distill_ns)
            .ok_or_else(|| HarchError::scheduling(P, "no distillation cell"))?;
        let outcome = distillation
            .distill(cell, first.0, second.0, timing.swap_in_ns)
            .map_err(|_| HarchError::scheduling(P, format!("{cell} refused input")))?;
        debug!(from = %a, with = %b, %cell, %outcome, "re-distilled pairs");
        Ok(true)
    }

    fn distillation_to_distilled(&mut self) -> HarchResult<bool> {
        const P: Priority = Priority::DistillationToDistilled;
        let Modules {
            distillation,
            distilled_memory,
            ..
        } = &mut self.modules;
        if !(distillation.is_qubit_pending() && distilled_memory.is_cell_available()) {
            return Ok(false);
        }

        let timing = &self.config.timing;
        let target = distilled_memory
            .get_empty_available_memory()
            .ok_or_else(|| HarchError::scheduling(P, "no free distilled memory"))?;
        let pair = distillation
            .get_output(timing.readout_ns)
            .ok_or_else(|| HarchError::scheduling(P, "no pending pair"))?;
        let rounds = pair.rounds;
        let slot = distilled_memory
            .store(target, pair, timing.distill_to_memory_ns)
            .map_err(|_| HarchError::scheduling(P, format!("{target} is full")))?;
        debug!(%slot, rounds, "stored purified pair");
        Ok(true)
    }

    fn memory_to_distillation(&mut self) -> HarchResult<bool> {
        const P: Priority = Priority::MemoryToDistillation;
        let Modules {
            memory,
            distillation,
            ..
        } = &mut self.modules;
        if !(memory.is_two_qubit_available() && distillation.is_cell_available()) {
            return Ok(false);
        }

        let timing = &self.config.timing;
        let address = memory
            .find_two_qubit_address(self.config.memory.read_ns)
            .ok_or_else(|| HarchError::scheduling(P, "no two-pair address"))?;
        let [a, b] = address.cells();
        let first = memory
            .take_oldest(a, timing.swap_out_ns)
            .ok_or_else(|| HarchError::scheduling(P, format!("{a} is empty")))?;
        let second = memory
            .take_oldest(b, timing.swap_out_ns)
            .ok_or_else(|| HarchError::scheduling(P, format!("{b} is empty")))?;
        let cell = distillation
            .get_available_cell(self.config.distillation.distill_ns)
            .ok_or_else(|| HarchError::scheduling(P, "no distillation cell"))?;
        let outcome = distillation
            .distill(cell, first.0, second.0, timing.memory_to_distill_ns)
            .map_err(|_| HarchError::scheduling(P, format!("{cell} refused input")))?;
        debug!(?address, %cell, %outcome, "distilled raw pairs");
        Ok(true)
    }

    fn input_to_memory(&mut self) -> HarchResult<bool> {
        const P: Priority = Priority::InputToMemory;
        let Modules { input, memory, .. } = &mut self.modules;
        if !(input.is_cell_available() && memory.is_cell_available()) {
            return Ok(false);
        }

        let (generator, catch_ns) = input
            .catch()
            .ok_or_else(|| HarchError::scheduling(P, "no idle generator"))?;
        let pair = input.fetch(generator)?;
        let target = memory
            .get_empty_available_memory()
            .ok_or_else(|| HarchError::scheduling(P, "no free memory"))?;
        let slot = memory
            .store(target, pair, self.config.timing.input_to_memory_ns)
            .map_err(|_| HarchError::scheduling(P, format!("{target} is full")))?;
        debug!(%generator, catch_ns, %slot, "stored raw pair");
        Ok(true)
    }
}

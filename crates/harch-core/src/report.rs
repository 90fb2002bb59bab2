//! Per-tick and per-run results.

use serde::Serialize;

use crate::cell::PurificationTally;
use crate::controller::Priority;
use crate::error::HarchResult;
use crate::fidelity::FidelitySample;
use crate::module::ModuleSnapshot;
use crate::time::SimTime;

/// A pair handed to the external consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct EmittedPair<S> {
    /// When it left distilled memory.
    pub time: SimTime,
    /// When it entered distilled memory.
    pub stored_at: SimTime,
    /// Fidelity after readout.
    pub fidelity: f64,
    /// Purification rounds it survived.
    pub rounds: u32,
    /// The state itself.
    #[serde(skip)]
    pub state: S,
}

/// What one controller tick did.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct TickReport<S> {
    /// Clock value after the tick.
    pub time: SimTime,
    /// Priorities that moved a pair, in the order they fired.
    pub fired: Vec<Priority>,
    /// Pairs emitted this tick.
    pub emitted: Vec<EmittedPair<S>>,
    /// Fidelity statistics, if distilled memory held any pair.
    pub sample: Option<FidelitySample>,
}

impl<S> TickReport<S> {
    /// Whether `priority` fired at least once.
    pub fn fired(&self, priority: Priority) -> bool {
        self.fired.contains(&priority)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct RunReport<S> {
    /// Ticks simulated.
    pub cycles: u64,
    /// Clock value at the end.
    pub final_time: SimTime,
    /// Raw pairs caught by the input module.
    pub generated: u64,
    /// Emitted pairs, in emission order.
    pub emitted: Vec<EmittedPair<S>>,
    /// Retained fidelity samples.
    pub samples: Vec<FidelitySample>,
    /// Purification counters over all distillation cells.
    pub purification: PurificationTally,
    /// Final state of every module.
    pub modules: Vec<ModuleSnapshot>,
}

impl<S> RunReport<S> {
    /// Mean fidelity of the emitted pairs.
    pub fn mean_emitted_fidelity(&self) -> Option<f64> {
        if self.emitted.is_empty() {
            return None;
        }
        Some(self.emitted.iter().map(|p| p.fidelity).sum::<f64>() / self.emitted.len() as f64)
    }

    /// Highest running maximum reached.
    pub fn max_fidelity(&self) -> Option<f64> {
        self.samples.last().map(|s| s.maximum)
    }

    /// Pretty-printed JSON for plotting tools.
    pub fn to_json_pretty(&self) -> HarchResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

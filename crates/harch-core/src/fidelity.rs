//! Rolling fidelity statistics over distilled memory.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::time::SimTime;

/// One tick's statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FidelitySample {
    /// When the sample was taken.
    pub time: SimTime,
    /// Mean fidelity of the pairs in distilled memory this tick.
    pub mean: f64,
    /// Mean of the last `window` per-tick means.
    pub average: f64,
    /// Best single pair this tick.
    pub best: f64,
    /// Best single pair seen so far. Never decreases.
    pub maximum: f64,
}

/// Bounded history of per-tick fidelity statistics.
#[derive(Debug, Clone)]
pub struct FidelityTracker {
    window: usize,
    limit: usize,
    means: VecDeque<f64>,
    samples: VecDeque<FidelitySample>,
    maximum: Option<f64>,
}

impl FidelityTracker {
    /// Average over `window` ticks, keep at most `limit` samples.
    pub fn new(window: usize, limit: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            limit: limit.max(window),
            means: VecDeque::with_capacity(window),
            samples: VecDeque::new(),
            maximum: None,
        }
    }

    /// Record the fidelities present at `time`. Nothing is recorded for an
    /// empty memory.
    pub fn record(&mut self, time: SimTime, fidelities: &[f64]) -> Option<FidelitySample> {
        if fidelities.is_empty() {
            return None;
        }
        let mean = fidelities.iter().sum::<f64>() / fidelities.len() as f64;
        let best = fidelities.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if self.means.len() == self.window {
            self.means.pop_front();
        }
        self.means.push_back(mean);
        let average = self.means.iter().sum::<f64>() / self.means.len() as f64;

        let maximum = self.maximum.map_or(best, |m| m.max(best));
        self.maximum = Some(maximum);

        let sample = FidelitySample {
            time,
            mean,
            average,
            best,
            maximum,
        };
        if self.samples.len() == self.limit {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        Some(sample)
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&FidelitySample> {
        self.samples.back()
    }

    /// Best single-pair fidelity seen so far.
    pub fn maximum(&self) -> Option<f64> {
        self.maximum
    }

    /// Retained samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &FidelitySample> {
        self.samples.iter()
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been retained.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

//! Logical simulation time.
//!
//! Time is an integer count of nanoseconds. It advances only when the
//! controller ticks its [`Clock`]; every other component observes it through
//! a read-only [`ClockHandle`] bound at construction time.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{HarchError, HarchResult};

/// An instant on the simulation timeline, in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(u64);

impl SimTime {
    /// The start of every simulation.
    pub const ZERO: SimTime = SimTime(0);

    /// Create an instant from a raw nanosecond count.
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    /// Raw nanosecond count.
    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// The instant `delta` nanoseconds later, saturating at `u64::MAX`.
    #[inline]
    pub fn plus(self, delta: u64) -> SimTime {
        SimTime(self.0.saturating_add(delta))
    }

    /// Nanoseconds elapsed since `earlier`; zero if `earlier` is in the future.
    #[inline]
    pub fn since(self, earlier: SimTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}ns", self.0)
    }
}

/// The writable global clock. Only the controller owns one.
#[derive(Debug)]
pub struct Clock {
    now: Rc<Cell<SimTime>>,
    step: u64,
}

impl Clock {
    /// Create a clock at [`SimTime::ZERO`] that advances `step_ns` per tick.
    pub fn new(step_ns: u64) -> HarchResult<Self> {
        if step_ns == 0 {
            return Err(HarchError::InvalidConfig {
                field: "clock_step_ns",
                reason: "clock step must be at least 1 ns".into(),
            });
        }
        Ok(Self {
            now: Rc::new(Cell::new(SimTime::ZERO)),
            step: step_ns,
        })
    }

    /// Advance by one step and return the new time.
    pub fn tick(&mut self) -> SimTime {
        let next = self.now.get().plus(self.step);
        self.now.set(next);
        next
    }

    /// Current time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now.get()
    }

    /// Nanoseconds per tick.
    #[inline]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// A read-only view of this clock.
    pub fn handle(&self) -> ClockHandle {
        ClockHandle(Rc::clone(&self.now))
    }
}

/// Read-only view of the controller's clock.
#[derive(Debug, Clone)]
pub struct ClockHandle(Rc<Cell<SimTime>>);

impl ClockHandle {
    /// Current time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.0.get()
    }
}

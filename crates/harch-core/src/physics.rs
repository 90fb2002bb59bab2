//! The collaborator interface between the scheduler and the pair physics.
//!
//! The core never inspects a pair state. Everything it needs (decay over a
//! duration, fidelity against the reference Bell state, the purification
//! protocol and the pair source) goes through [`PairPhysics`]. Adapters
//! provide the concrete models.

use std::fmt;
use std::rc::Rc;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Physics model for remote entangled pairs.
pub trait PairPhysics {
    /// The opaque pair representation.
    type State: Clone + fmt::Debug;

    /// Return `state` after idling or moving for `duration_ns`.
    ///
    /// A zero duration must return the state unchanged.
    fn decohere(&self, state: &Self::State, duration_ns: u64) -> Self::State;

    /// Fidelity of `state` against the model's fixed reference target.
    fn fidelity(&self, state: &Self::State) -> f64;

    /// Run one round of the purification protocol on two pairs.
    fn purify(
        &self,
        control: &Self::State,
        target: &Self::State,
        rng: &mut dyn RngCore,
    ) -> Purification<Self::State>;

    /// Produce a freshly heralded pair.
    fn generate(&self, rng: &mut dyn RngCore) -> Self::State;
}

/// Post-selection result of a purification round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Parity check matched; one purified pair survives.
    Success,
    /// Parity check failed; both inputs are lost.
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
        }
    }
}

/// What a purification round produced.
#[derive(Debug, Clone)]
pub struct Purification<S> {
    /// Sampled post-selection outcome.
    pub outcome: Outcome,
    /// The surviving pair, present only on success.
    pub state: Option<S>,
    /// Probability of success the protocol computed for these inputs.
    pub success_probability: f64,
}

impl<S> Purification<S> {
    /// A successful round yielding `state`.
    pub fn success(state: S, success_probability: f64) -> Self {
        Self {
            outcome: Outcome::Success,
            state: Some(state),
            success_probability,
        }
    }

    /// A rejected round.
    pub fn failure(success_probability: f64) -> Self {
        Self {
            outcome: Outcome::Failure,
            state: None,
            success_probability,
        }
    }
}

/// A pair state together with its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair<S> {
    /// The physical state.
    pub state: S,
    /// Purification rounds this pair has survived (0 for raw pairs).
    pub rounds: u32,
}

impl<S> Pair<S> {
    /// A raw, never-purified pair.
    pub fn raw(state: S) -> Self {
        Self { state, rounds: 0 }
    }
}

/// One physics model per module.
///
/// Memories, transfer lines and distillation cells usually decay at
/// different rates, so each module may carry its own parameters.
#[derive(Debug)]
pub struct PhysicsSet<M> {
    /// Used by generator cells.
    pub input: Rc<M>,
    /// Used by raw memory cells.
    pub memory: Rc<M>,
    /// Used by distillation cells.
    pub distillation: Rc<M>,
    /// Used by distilled memory cells.
    pub distilled_memory: Rc<M>,
}

impl<M> PhysicsSet<M> {
    /// Share one model across every module.
    pub fn uniform(model: M) -> Self {
        let model = Rc::new(model);
        Self {
            input: Rc::clone(&model),
            memory: Rc::clone(&model),
            distillation: Rc::clone(&model),
            distilled_memory: model,
        }
    }
}

impl<M> Clone for PhysicsSet<M> {
    fn clone(&self) -> Self {
        Self {
            input: Rc::clone(&self.input),
            memory: Rc::clone(&self.memory),
            distillation: Rc::clone(&self.distillation),
            distilled_memory: Rc::clone(&self.distilled_memory),
        }
    }
}

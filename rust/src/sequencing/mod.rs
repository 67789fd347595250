//! Ordering the acquisition of a target constellation set.
//!
//! - `horizon`: exact search for a fixed maximum number of turns
//! - `oracle`: horizon escalation until the minimal refund stops changing
//! - `label`: solver-free best-first search over the same state space
//! - `stragglers`: placing leftover stars into an existing plan

mod horizon;
mod label;
mod oracle;
mod stragglers;

use thiserror::Error;

use crate::graph::{ConstellationSet, DevotionGraph, ResourceVector, StarId};
use crate::milp::SolverError;

pub use horizon::HorizonSearch;
pub use label::{LabelAction, LabelOutcome, LabelSearch};
pub use oracle::SequencingOracle;
pub use stragglers::insert_stragglers;

/// Errors raised while sequencing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencingError {
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("Label search gave up after {0} states")]
    StateLimit(usize),
    #[error("No step can take the leftover stars of {0}")]
    StragglerPlacement(String),
}

/// One entry of a plan: clusters added or removed, and the state after it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlanStep {
    pub added: ConstellationSet,
    pub removed: ConstellationSet,
    /// Active constellations after this step.
    pub active: ConstellationSet,
    /// Affinity granted by `active`.
    pub affinity: ResourceVector,
    /// Points invested after this step, stragglers included.
    pub points: u32,
    /// Leftover stars first taken at this step.
    pub stragglers: Vec<StarId>,
}

impl PlanStep {
    /// Step reaching `active` through the given additions and removals.
    pub fn new(
        graph: &DevotionGraph,
        added: ConstellationSet,
        removed: ConstellationSet,
        active: ConstellationSet,
    ) -> Self {
        Self {
            affinity: graph.affinity_of(&active),
            points: graph.points_of(&active),
            added,
            removed,
            active,
            stragglers: Vec::new(),
        }
    }
}

/// Ordered acquisition plan for one target set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequencePlan {
    pub steps: Vec<PlanStep>,
    /// Points invested in constellations that were later removed.
    pub refunds: u32,
    /// Turns with at least one action.
    pub turns: u32,
    /// Turn limit the plan was found under.
    pub horizon: u32,
}

impl SequencePlan {
    /// Active set after the last step (empty for an empty plan).
    pub fn final_set(&self) -> ConstellationSet {
        self.steps
            .last()
            .map(|s| s.active.clone())
            .unwrap_or_default()
    }
}

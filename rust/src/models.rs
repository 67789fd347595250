//! Python-facing input and output types.

use pyo3::prelude::*;

use crate::graph::{DevotionGraph, GraphError, ResourceVector, StarDef, StarId};
use crate::planner::PlannerResult;
use crate::reward::Reward;
use crate::sequencing::{LabelAction, LabelOutcome, PlanStep, SequencePlan};
use crate::summary::RewardLine;

// Note: names cross the boundary as strings; ids stay inside the crate.

/// A typed star reward.
#[pyclass]
#[derive(Clone, Debug)]
pub struct RewardSpec {
    pub reward: Reward,
}

#[pymethods]
impl RewardSpec {
    #[staticmethod]
    fn flat(kind: &str, amount: f64) -> Self {
        Reward::flat(kind, amount).into()
    }

    #[staticmethod]
    fn range(kind: &str, min: f64, max: f64) -> Self {
        Reward::range(kind, min, max).into()
    }

    #[staticmethod]
    fn over_time(kind: &str, rate: f64, duration: f64) -> Self {
        Reward::over_time(kind, rate, duration).into()
    }

    #[staticmethod]
    fn dual_modifier(kind: &str, damage: f64, duration: f64) -> Self {
        Reward::dual_modifier(kind, damage, duration).into()
    }

    #[staticmethod]
    fn chance(probability: f64, inner: RewardSpec) -> Self {
        Reward::chance(probability, inner.reward).into()
    }

    #[staticmethod]
    fn pets(inner: RewardSpec) -> Self {
        Reward::pets(inner.reward).into()
    }

    /// Kind the objective weights are keyed by.
    #[getter]
    fn kind(&self) -> String {
        self.reward.kind_id()
    }

    #[getter]
    fn value(&self) -> f64 {
        self.reward.value()
    }

    fn __repr__(&self) -> String {
        format!("RewardSpec({})", self.reward.describe())
    }
}

impl From<Reward> for RewardSpec {
    fn from(reward: Reward) -> Self {
        Self { reward }
    }
}

/// One star of a constellation.
#[pyclass]
#[derive(Clone, Debug)]
pub struct StarSpec {
    #[pyo3(get, set)]
    pub rewards: Vec<RewardSpec>,
    #[pyo3(get, set)]
    pub celestial_power: Option<String>,
    /// Equipment classes, any of which unlocks the rewards. Empty = no requirement
    #[pyo3(get, set)]
    pub weapons: Vec<String>,
    /// Indices of stars in the same constellation that must be taken first
    #[pyo3(get, set)]
    pub predecessors: Vec<u32>,
}

#[pymethods]
impl StarSpec {
    #[new]
    #[pyo3(signature = (rewards=None, predecessors=None, celestial_power=None, weapons=None))]
    fn new(
        rewards: Option<Vec<RewardSpec>>,
        predecessors: Option<Vec<u32>>,
        celestial_power: Option<String>,
        weapons: Option<Vec<String>>,
    ) -> Self {
        Self {
            rewards: rewards.unwrap_or_default(),
            celestial_power,
            weapons: weapons.unwrap_or_default(),
            predecessors: predecessors.unwrap_or_default(),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "StarSpec(rewards={}, predecessors={:?}, celestial_power={:?})",
            self.rewards.len(),
            self.predecessors,
            self.celestial_power
        )
    }
}

/// A constellation: stars plus affinity requirement and bonus.
#[pyclass]
#[derive(Clone, Debug)]
pub struct ConstellationSpec {
    #[pyo3(get, set)]
    pub name: String,
    /// (affinity, amount) pairs needed to enter
    #[pyo3(get, set)]
    pub requirement: Vec<(String, u32)>,
    /// (affinity, amount) pairs granted once complete
    #[pyo3(get, set)]
    pub bonus: Vec<(String, u32)>,
    #[pyo3(get, set)]
    pub stars: Vec<StarSpec>,
}

#[pymethods]
impl ConstellationSpec {
    #[new]
    #[pyo3(signature = (name, stars, requirement=None, bonus=None))]
    fn new(
        name: String,
        stars: Vec<StarSpec>,
        requirement: Option<Vec<(String, u32)>>,
        bonus: Option<Vec<(String, u32)>>,
    ) -> Self {
        Self {
            name,
            requirement: requirement.unwrap_or_default(),
            bonus: bonus.unwrap_or_default(),
            stars,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "ConstellationSpec(name={:?}, stars={}, requirement={:?}, bonus={:?})",
            self.name,
            self.stars.len(),
            self.requirement,
            self.bonus
        )
    }
}

/// Build and validate the graph.
pub fn build_graph(specs: &[ConstellationSpec]) -> Result<DevotionGraph, GraphError> {
    let mut builder = DevotionGraph::builder();
    for spec in specs {
        let stars = spec
            .stars
            .iter()
            .map(|s| StarDef {
                rewards: s.rewards.iter().map(|r| r.reward.clone()).collect(),
                celestial_power: s.celestial_power.clone(),
                weapon_requirement: s.weapons.clone(),
                predecessors: s.predecessors.clone(),
            })
            .collect();
        builder.add_constellation(
            &spec.name,
            ResourceVector::from_named(&spec.requirement)?,
            ResourceVector::from_named(&spec.bonus)?,
            stars,
        )?;
    }
    Ok(builder.build())
}

fn star_name(graph: &DevotionGraph, id: StarId) -> (String, u32) {
    (graph.name(id.constellation).to_string(), id.index)
}

/// One step of a plan.
#[pyclass(name = "PlanStep")]
#[derive(Clone, Debug, Default)]
pub struct PyPlanStep {
    #[pyo3(get)]
    pub added: Vec<String>,
    #[pyo3(get)]
    pub removed: Vec<String>,
    #[pyo3(get)]
    pub active: Vec<String>,
    #[pyo3(get)]
    pub affinity: Vec<(String, u32)>,
    #[pyo3(get)]
    pub points: u32,
    /// Stars of incomplete constellations first taken at this step
    #[pyo3(get)]
    pub stragglers: Vec<(String, u32)>,
}

impl PyPlanStep {
    pub fn from_step(graph: &DevotionGraph, step: &PlanStep) -> Self {
        Self {
            added: graph.set_names(&step.added),
            removed: graph.set_names(&step.removed),
            active: graph.set_names(&step.active),
            affinity: step.affinity.to_named(),
            points: step.points,
            stragglers: step.stragglers.iter().map(|&s| star_name(graph, s)).collect(),
        }
    }
}

#[pymethods]
impl PyPlanStep {
    fn __repr__(&self) -> String {
        format!(
            "PlanStep(added={:?}, removed={:?}, points={}, stragglers={})",
            self.added,
            self.removed,
            self.points,
            self.stragglers.len()
        )
    }
}

/// A sequencing plan on its own.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct SequenceResult {
    #[pyo3(get)]
    pub steps: Vec<PyPlanStep>,
    #[pyo3(get)]
    pub refunds: u32,
    #[pyo3(get)]
    pub turns: u32,
    #[pyo3(get)]
    pub horizon: u32,
}

impl SequenceResult {
    pub fn from_plan(graph: &DevotionGraph, plan: &SequencePlan) -> Self {
        Self {
            steps: plan.steps.iter().map(|s| PyPlanStep::from_step(graph, s)).collect(),
            refunds: plan.refunds,
            turns: plan.turns,
            horizon: plan.horizon,
        }
    }
}

#[pymethods]
impl SequenceResult {
    fn __repr__(&self) -> String {
        format!(
            "SequenceResult(steps={}, refunds={}, turns={}, horizon={})",
            self.steps.len(),
            self.refunds,
            self.turns,
            self.horizon
        )
    }
}

/// Outcome of the label-setting search.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct LabelResult {
    #[pyo3(get)]
    pub refunded: u32,
    /// ("add" | "remove", constellation) in order
    #[pyo3(get)]
    pub actions: Vec<(String, String)>,
    #[pyo3(get)]
    pub active: Vec<String>,
    #[pyo3(get)]
    pub states_explored: usize,
}

impl LabelResult {
    pub fn from_outcome(graph: &DevotionGraph, outcome: &LabelOutcome) -> Self {
        let actions = outcome
            .actions
            .iter()
            .map(|action| match *action {
                LabelAction::Add(c) => ("add".to_string(), graph.name(c).to_string()),
                LabelAction::Remove(c) => ("remove".to_string(), graph.name(c).to_string()),
            })
            .collect();
        Self {
            refunded: outcome.refunded,
            actions,
            active: graph.set_names(&outcome.active),
            states_explored: outcome.states_explored,
        }
    }
}

#[pymethods]
impl LabelResult {
    fn __repr__(&self) -> String {
        format!(
            "LabelResult(refunded={}, actions={}, states_explored={})",
            self.refunded,
            self.actions.len(),
            self.states_explored
        )
    }
}

/// One line of the reward summary.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct RewardTotal {
    #[pyo3(get)]
    pub kind: String,
    #[pyo3(get)]
    pub description: String,
    #[pyo3(get)]
    pub value: f64,
    #[pyo3(get)]
    pub contribution: f64,
}

impl From<&RewardLine> for RewardTotal {
    fn from(line: &RewardLine) -> Self {
        Self {
            kind: line.kind.clone(),
            description: line.reward.describe(),
            value: line.value,
            contribution: line.contribution,
        }
    }
}

#[pymethods]
impl RewardTotal {
    fn __repr__(&self) -> String {
        format!(
            "RewardTotal({:?}, value={}, contribution={:.2})",
            self.kind, self.value, self.contribution
        )
    }
}

/// Result of a full planning run.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct DevotionPlan {
    /// Selected stars, sorted
    #[pyo3(get)]
    pub stars: Vec<(String, u32)>,
    #[pyo3(get)]
    pub complete: Vec<String>,
    #[pyo3(get)]
    pub steps: Vec<PyPlanStep>,
    #[pyo3(get)]
    pub refunds: u32,
    #[pyo3(get)]
    pub objective: f64,
    /// Complete sets rejected as unreachable
    #[pyo3(get)]
    pub cuts: usize,
    #[pyo3(get)]
    pub rewards: Vec<RewardTotal>,
}

impl DevotionPlan {
    pub fn from_result(graph: &DevotionGraph, result: &PlannerResult) -> Self {
        Self {
            stars: result
                .selection
                .stars
                .iter()
                .map(|&s| star_name(graph, s))
                .collect(),
            complete: graph.set_names(&result.selection.complete),
            steps: result
                .plan
                .steps
                .iter()
                .map(|s| PyPlanStep::from_step(graph, s))
                .collect(),
            refunds: result.plan.refunds,
            objective: result.selection.objective,
            cuts: result.cuts,
            rewards: result.summary.iter().map(RewardTotal::from).collect(),
        }
    }
}

#[pymethods]
impl DevotionPlan {
    fn __repr__(&self) -> String {
        format!(
            "DevotionPlan(stars={}, complete={}, steps={}, objective={:.2})",
            self.stars.len(),
            self.complete.len(),
            self.steps.len(),
            self.objective
        )
    }
}

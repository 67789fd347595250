//! Rust core of the devotion planner.
//!
//! Chooses which devotion stars to take under a fixed point budget and
//! orders the constellations so the allocation can actually be reached.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::prelude::*;
use std::collections::HashMap;

mod config;
pub mod graph;
pub mod interner;
pub mod logging;
pub mod milp;
mod models;
pub mod objective;
pub mod planner;
pub mod reward;
pub mod selection;
pub mod sequencing;
pub mod summary;

pub use config::{PlannerConfig, SequencingConfig, DEFAULT_HORIZON_SCHEDULE};
pub use graph::{Affinity, ConstellationSet, DevotionGraph, GraphError, ResourceVector, StarId};
pub use models::{
    build_graph, ConstellationSpec, DevotionPlan, LabelResult, PyPlanStep, RewardSpec,
    RewardTotal, SequenceResult, StarSpec,
};
pub use planner::{resolve_target, DevotionPlanner, PlannerError, PlannerResult};
pub use reward::Reward;
pub use sequencing::{LabelSearch, SequencePlan, SequencingError, SequencingOracle};

fn value_error(err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(err.to_string())
}

/// Choose stars for the configured objective and order their acquisition.
///
/// # Arguments
/// * `constellations` - The validated devotion graph
/// * `config` - Budget, objective weights, forced and ignored stars, refinement
///
/// # Returns
/// * DevotionPlan with chosen stars, ordered steps and a reward summary
///
/// # Raises
/// * ValueError if the graph or config is invalid, or no feasible allocation exists
#[pyfunction]
fn solve(constellations: Vec<ConstellationSpec>, config: PlannerConfig) -> PyResult<DevotionPlan> {
    let graph = build_graph(&constellations).map_err(value_error)?;
    let result = DevotionPlanner::new(&graph, &config)
        .solve()
        .map_err(value_error)?;
    Ok(DevotionPlan::from_result(&graph, &result))
}

/// Order the acquisition of exactly `target`, minimising refunds then turns.
///
/// # Returns
/// * SequenceResult, or None if no horizon in the schedule yields a stable plan
///
/// # Raises
/// * ValueError on an invalid graph, unknown constellation, or stalled solve
#[pyfunction]
#[pyo3(signature = (constellations, target, points, config=None))]
fn sequence(
    constellations: Vec<ConstellationSpec>,
    target: Vec<String>,
    points: u32,
    config: Option<SequencingConfig>,
) -> PyResult<Option<SequenceResult>> {
    let graph = build_graph(&constellations).map_err(value_error)?;
    let target = resolve_target(&graph, &target).map_err(value_error)?;
    let config = config.unwrap_or_default();

    let mut oracle = SequencingOracle::new(&graph, points, &config);
    let plan = oracle.plan(&target).map_err(value_error)?;
    Ok(plan.map(|p| SequenceResult::from_plan(&graph, &p)))
}

/// Solver-free best-first search for a cheap way to cover `target`.
///
/// # Returns
/// * LabelResult, or None if the target cannot be covered within `points`
///
/// # Raises
/// * ValueError on an invalid graph, unknown constellation, or state limit
#[pyfunction]
#[pyo3(signature = (constellations, target, points, exempt_self_sufficient_entry=true, state_limit=None))]
fn label_search(
    constellations: Vec<ConstellationSpec>,
    target: Vec<String>,
    points: u32,
    exempt_self_sufficient_entry: bool,
    state_limit: Option<usize>,
) -> PyResult<Option<LabelResult>> {
    let graph = build_graph(&constellations).map_err(value_error)?;
    let target = resolve_target(&graph, &target).map_err(value_error)?;

    let outcome = LabelSearch::new(&graph, target, points)
        .with_exemption(exempt_self_sufficient_entry)
        .with_state_limit(state_limit)
        .run()
        .map_err(value_error)?;
    Ok(outcome.map(|o| LabelResult::from_outcome(&graph, &o)))
}

/// Objective coefficient of every star worth more than zero.
///
/// # Returns
/// * Dict mapping (constellation, star index) to coefficient
#[pyfunction]
fn star_objective(
    constellations: Vec<ConstellationSpec>,
    config: PlannerConfig,
) -> PyResult<HashMap<(String, u32), f64>> {
    let graph = build_graph(&constellations).map_err(value_error)?;
    let coefficients = DevotionPlanner::new(&graph, &config)
        .coefficients()
        .map_err(value_error)?;
    Ok(coefficients
        .into_iter()
        .map(|(id, coef)| ((graph.name(id.constellation).to_string(), id.index), coef))
        .collect())
}

/// The devotion.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Inputs
    m.add_class::<RewardSpec>()?;
    m.add_class::<StarSpec>()?;
    m.add_class::<ConstellationSpec>()?;

    // Config types
    m.add_class::<PlannerConfig>()?;
    m.add_class::<SequencingConfig>()?;

    // Outputs
    m.add_class::<PyPlanStep>()?;
    m.add_class::<SequenceResult>()?;
    m.add_class::<LabelResult>()?;
    m.add_class::<RewardTotal>()?;
    m.add_class::<DevotionPlan>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(solve, m)?)?;
    m.add_function(wrap_pyfunction!(sequence, m)?)?;
    m.add_function(wrap_pyfunction!(label_search, m)?)?;
    m.add_function(wrap_pyfunction!(star_objective, m)?)?;

    Ok(())
}

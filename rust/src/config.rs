//! Configuration types for the planner.

use pyo3::prelude::*;
use std::collections::HashMap;

use crate::reward::PETS_PREFIX;

/// Horizons (maximum step counts) tried by the sequencing oracle, in order.
pub const DEFAULT_HORIZON_SCHEDULE: [u32; 7] = [4, 8, 12, 20, 30, 60, 200];

/// Default cap on branch-and-bound nodes per solve.
pub const DEFAULT_NODE_LIMIT: u64 = 5_000_000;

/// Refinement strategies accepted by `PlannerConfig::refinement`.
pub const REFINEMENT_STRATEGIES: [&str; 2] = ["lazy", "iterative"];

/// Configuration for the sequencing oracle and label-setting search.
#[pyclass]
#[derive(Clone, Debug)]
pub struct SequencingConfig {
    /// Horizons tried until two consecutive ones agree on the minimal refund
    #[pyo3(get, set)]
    pub horizon_schedule: Vec<u32>,
    /// Self-sufficient constellations may be entered without prior affinity
    #[pyo3(get, set)]
    pub exempt_self_sufficient_entry: bool,
    /// Node limit for each horizon search (None = unlimited)
    #[pyo3(get, set)]
    pub node_limit: Option<u64>,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for SequencingConfig {
    fn default() -> Self {
        Self {
            horizon_schedule: DEFAULT_HORIZON_SCHEDULE.to_vec(),
            exempt_self_sufficient_entry: true,
            node_limit: Some(DEFAULT_NODE_LIMIT),
            verbosity: 0,
        }
    }
}

#[pymethods]
impl SequencingConfig {
    #[new]
    #[pyo3(signature = (
        horizon_schedule=None,
        exempt_self_sufficient_entry=None,
        node_limit=DEFAULT_NODE_LIMIT,
        verbosity=None
    ))]
    fn new(
        horizon_schedule: Option<Vec<u32>>,
        exempt_self_sufficient_entry: Option<bool>,
        node_limit: Option<u64>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            horizon_schedule: horizon_schedule.unwrap_or(defaults.horizon_schedule),
            exempt_self_sufficient_entry: exempt_self_sufficient_entry
                .unwrap_or(defaults.exempt_self_sufficient_entry),
            node_limit,
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SequencingConfig(horizon_schedule={:?}, exempt_self_sufficient_entry={})",
            self.horizon_schedule, self.exempt_self_sufficient_entry
        )
    }
}

/// Configuration for a full planning run.
#[pyclass]
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    /// Devotion points available (selected stars must equal this exactly)
    #[pyo3(get, set)]
    pub points: u32,
    /// Reward kind -> weight. Pet-scoped kinds carry the "Pets." prefix
    #[pyo3(get, set)]
    pub objective: HashMap<String, f64>,
    /// Stars that must be selected: (constellation, index)
    #[pyo3(get, set)]
    pub forced_stars: Vec<(String, u32)>,
    /// Celestial powers whose stars must be selected
    #[pyo3(get, set)]
    pub celestial_powers: Vec<String>,
    /// Equipment classes in use; gates stars with a weapon requirement
    #[pyo3(get, set)]
    pub weapons: Vec<String>,
    /// Stars whose rewards are left out of the objective: (constellation, index)
    #[pyo3(get, set)]
    pub ignore_stars: Vec<(String, u32)>,
    /// Refinement strategy: "lazy" or "iterative"
    #[pyo3(get, set)]
    pub refinement: String,
    /// Node limit for each selection solve (None = unlimited)
    #[pyo3(get, set)]
    pub node_limit: Option<u64>,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug
    #[pyo3(get, set)]
    pub verbosity: u8,
    #[pyo3(get, set)]
    pub sequencing: SequencingConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            points: 55,
            objective: HashMap::new(),
            forced_stars: Vec::new(),
            celestial_powers: Vec::new(),
            weapons: Vec::new(),
            ignore_stars: Vec::new(),
            refinement: "lazy".to_string(),
            node_limit: Some(DEFAULT_NODE_LIMIT),
            verbosity: 0,
            sequencing: SequencingConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Builder-style variant of `add_weight` for Rust callers.
    pub fn with_weight(mut self, kind: &str, weight: f64, pets: bool) -> Self {
        self.add_weight(kind, weight, pets);
        self
    }
}

#[pymethods]
impl PlannerConfig {
    #[new]
    #[pyo3(signature = (
        points=None,
        objective=None,
        forced_stars=None,
        celestial_powers=None,
        weapons=None,
        ignore_stars=None,
        refinement=None,
        node_limit=DEFAULT_NODE_LIMIT,
        verbosity=None,
        sequencing=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        points: Option<u32>,
        objective: Option<HashMap<String, f64>>,
        forced_stars: Option<Vec<(String, u32)>>,
        celestial_powers: Option<Vec<String>>,
        weapons: Option<Vec<String>>,
        ignore_stars: Option<Vec<(String, u32)>>,
        refinement: Option<String>,
        node_limit: Option<u64>,
        verbosity: Option<u8>,
        sequencing: Option<SequencingConfig>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            points: points.unwrap_or(defaults.points),
            objective: objective.unwrap_or(defaults.objective),
            forced_stars: forced_stars.unwrap_or(defaults.forced_stars),
            celestial_powers: celestial_powers.unwrap_or(defaults.celestial_powers),
            weapons: weapons.unwrap_or(defaults.weapons),
            ignore_stars: ignore_stars.unwrap_or(defaults.ignore_stars),
            refinement: refinement.unwrap_or(defaults.refinement),
            node_limit,
            verbosity: verbosity.unwrap_or(defaults.verbosity),
            sequencing: sequencing.unwrap_or(defaults.sequencing),
        }
    }

    /// Add `weight` to a reward kind; repeated kinds accumulate.
    #[pyo3(signature = (kind, weight, pets=false))]
    pub fn add_weight(&mut self, kind: &str, weight: f64, pets: bool) {
        let key = if pets {
            format!("{}{}", PETS_PREFIX, kind)
        } else {
            kind.to_string()
        };
        *self.objective.entry(key).or_insert(0.0) += weight;
    }

    fn __repr__(&self) -> String {
        format!(
            "PlannerConfig(points={}, objective_kinds={}, refinement={:?})",
            self.points,
            self.objective.len(),
            self.refinement
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.points, 55);
        assert_eq!(config.refinement, "lazy");
        assert_eq!(
            config.sequencing.horizon_schedule,
            vec![4, 8, 12, 20, 30, 60, 200]
        );
        assert!(config.sequencing.exempt_self_sufficient_entry);
        assert!(REFINEMENT_STRATEGIES.contains(&config.refinement.as_str()));
    }

    #[test]
    fn test_add_weight_accumulates_and_scopes_pets() {
        let config = PlannerConfig::default()
            .with_weight("Health", 1.0, false)
            .with_weight("Health", 0.5, false)
            .with_weight("Health", 2.0, true);

        assert_eq!(config.objective.get("Health"), Some(&1.5));
        assert_eq!(config.objective.get("Pets.Health"), Some(&2.0));
    }
}

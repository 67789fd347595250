//! Full planning pipeline: objective, selection, refinement against the
//! sequencing oracle, straggler insertion, reward summary.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::config::{PlannerConfig, REFINEMENT_STRATEGIES};
use crate::graph::{ConstellationSet, DevotionGraph, GraphError, StarId};
use crate::milp::{Constraint, Solution, SolverError};
use crate::objective::{Objective, PartialCreditTable};
use crate::selection::{Selection, SelectionModel};
use crate::sequencing::{insert_stragglers, SequencePlan, SequencingError, SequencingOracle};
use crate::summary::{summarize, RewardLine};
use crate::{log_changes, log_checks};

/// Errors that can occur while planning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("No feasible allocation")]
    NoFeasibleAllocation,
    #[error("Unknown constellation: {0}")]
    UnknownConstellation(String),
    #[error("Unknown star: {0} #{1}")]
    UnknownStar(String, u32),
    #[error("Unknown celestial power: {0}")]
    UnknownCelestialPower(String),
    #[error("Unknown refinement strategy: {0}")]
    UnknownRefinement(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("{0}")]
    Sequencing(SequencingError),
}

impl From<SequencingError> for PlannerError {
    fn from(err: SequencingError) -> Self {
        match err {
            SequencingError::Solver(e) => PlannerError::Solver(e),
            other => PlannerError::Sequencing(other),
        }
    }
}

/// Outcome of a planning run.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannerResult {
    pub selection: Selection,
    /// Ordered plan, stragglers included.
    pub plan: SequencePlan,
    /// Complete sets rejected as unreachable before the accepted one.
    pub cuts: usize,
    pub summary: Vec<RewardLine>,
}

/// Resolve constellation names into a set.
pub fn resolve_target(
    graph: &DevotionGraph,
    names: &[String],
) -> Result<ConstellationSet, PlannerError> {
    names
        .iter()
        .map(|n| {
            graph
                .find_constellation(n)
                .ok_or_else(|| PlannerError::UnknownConstellation(n.clone()))
        })
        .collect()
}

/// Plans one configuration against one graph.
pub struct DevotionPlanner<'g> {
    graph: &'g DevotionGraph,
    config: PlannerConfig,
    objective: Objective,
}

impl<'g> DevotionPlanner<'g> {
    pub fn new(graph: &'g DevotionGraph, config: &PlannerConfig) -> Self {
        Self {
            graph,
            config: config.clone(),
            objective: Objective::new(&config.objective, PartialCreditTable::standard()),
        }
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    fn validate(&self) -> Result<(), PlannerError> {
        if !REFINEMENT_STRATEGIES.contains(&self.config.refinement.as_str()) {
            return Err(PlannerError::UnknownRefinement(self.config.refinement.clone()));
        }
        if self.config.sequencing.horizon_schedule.is_empty() {
            return Err(PlannerError::InvalidConfig(
                "horizon_schedule must not be empty".to_string(),
            ));
        }
        if self.config.sequencing.horizon_schedule.contains(&0) {
            return Err(PlannerError::InvalidConfig(
                "horizon_schedule entries must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn lookup_star(&self, constellation: &str, index: u32) -> Result<StarId, PlannerError> {
        if self.graph.find_constellation(constellation).is_none() {
            return Err(PlannerError::UnknownConstellation(constellation.to_string()));
        }
        self.graph
            .find_star(constellation, index)
            .ok_or_else(|| PlannerError::UnknownStar(constellation.to_string(), index))
    }

    /// Configured forced stars plus the stars of requested celestial powers.
    pub fn forced_stars(&self) -> Result<Vec<StarId>, PlannerError> {
        let mut forced: Vec<StarId> = self
            .config
            .forced_stars
            .iter()
            .map(|(c, i)| self.lookup_star(c, *i))
            .collect::<Result<_, _>>()?;
        for power in &self.config.celestial_powers {
            let star = self
                .graph
                .find_celestial_power(power)
                .ok_or_else(|| PlannerError::UnknownCelestialPower(power.clone()))?;
            forced.push(star);
        }
        forced.sort();
        forced.dedup();
        Ok(forced)
    }

    /// Per-star objective coefficients under the configured weapons and
    /// ignore list.
    pub fn coefficients(&self) -> Result<FxHashMap<StarId, f64>, PlannerError> {
        let ignore: FxHashSet<StarId> = self
            .config
            .ignore_stars
            .iter()
            .map(|(c, i)| self.lookup_star(c, *i))
            .collect::<Result<_, _>>()?;
        let weapons: FxHashSet<String> = self.config.weapons.iter().cloned().collect();
        Ok(self.objective.star_coefficients(self.graph, &weapons, &ignore))
    }

    /// Run the whole pipeline.
    pub fn solve(&self) -> Result<PlannerResult, PlannerError> {
        self.validate()?;
        let forced = self.forced_stars()?;
        let coefficients = self.coefficients()?;
        let points = self.config.points;
        let verbosity = self.config.verbosity;

        log_checks!(
            verbosity,
            "[planner] {} stars with positive value, {} forced, {} points",
            coefficients.len(),
            forced.len(),
            points
        );

        let mut model = SelectionModel::new(self.graph, points, &coefficients, &forced);
        model.set_node_limit(self.config.node_limit);
        model.set_verbosity(verbosity);
        let mut oracle = SequencingOracle::new(self.graph, points, &self.config.sequencing);

        let (selection, cuts) = match self.config.refinement.as_str() {
            "lazy" => self.refine_lazy(&mut model, &mut oracle)?,
            "iterative" => self.refine_iterative(&mut model, &mut oracle)?,
            other => return Err(PlannerError::UnknownRefinement(other.to_string())),
        };

        let cached = oracle.cached(&selection.complete).cloned();
        let mut plan = match cached {
            Some(plan) => plan,
            None => oracle
                .plan(&selection.complete)?
                .ok_or(PlannerError::NoFeasibleAllocation)?,
        };

        let stragglers: Vec<StarId> = selection
            .stars
            .iter()
            .copied()
            .filter(|s| !selection.complete.contains(&s.constellation))
            .collect();
        insert_stragglers(self.graph, &mut plan, &stragglers, points, verbosity)?;

        log_changes!(
            verbosity,
            "[planner] accepted {:?} (objective {:.2}, {} cuts, {} steps, {} stragglers)",
            self.graph.set_names(&selection.complete),
            selection.objective,
            cuts,
            plan.steps.len(),
            stragglers.len()
        );

        let summary = summarize(self.graph, &selection.stars, &self.objective);
        Ok(PlannerResult {
            selection,
            plan,
            cuts,
            summary,
        })
    }

    /// Check every improving candidate inside the selection search and cut
    /// the unreachable ones there.
    fn refine_lazy(
        &self,
        model: &mut SelectionModel<'g>,
        oracle: &mut SequencingOracle<'g>,
    ) -> Result<(Selection, usize), PlannerError> {
        let vars = model.vars().clone();
        let verbosity = self.config.verbosity;
        let mut cuts = 0usize;

        let mut callback = |candidate: &Solution| -> Result<Vec<Constraint>, SolverError> {
            let target = vars.complete_set(candidate);
            if oracle.plan(&target)?.is_some() {
                return Ok(Vec::new());
            }
            cuts += 1;
            log_changes!(
                verbosity,
                "[planner] cut {:?}: no plan",
                self.graph.set_names(&target)
            );
            Ok(vec![vars.no_good(&target)])
        };
        let selection = model.solve_with(&mut callback)?;

        selection
            .map(|s| (s, cuts))
            .ok_or(PlannerError::NoFeasibleAllocation)
    }

    /// Re-solve after each cut until the optimum is reachable.
    fn refine_iterative(
        &self,
        model: &mut SelectionModel<'g>,
        oracle: &mut SequencingOracle<'g>,
    ) -> Result<(Selection, usize), PlannerError> {
        loop {
            let selection = model.solve()?.ok_or(PlannerError::NoFeasibleAllocation)?;
            if oracle.plan(&selection.complete)?.is_some() {
                return Ok((selection, model.num_exclusions()));
            }
            log_changes!(
                self.config.verbosity,
                "[planner] cut {:?}: no plan",
                self.graph.set_names(&selection.complete)
            );
            model.exclude(&selection.complete);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SequencingConfig;
    use crate::graph::fixtures::*;
    use crate::graph::{Affinity, ResourceVector, StarDef};
    use crate::reward::Reward;

    fn config(points: u32, refinement: &str) -> PlannerConfig {
        PlannerConfig {
            points,
            refinement: refinement.to_string(),
            sequencing: SequencingConfig {
                horizon_schedule: vec![3, 4, 6],
                ..SequencingConfig::default()
            },
            ..PlannerConfig::default()
        }
        .with_weight("Health", 1.0, false)
    }

    /// "Bait" is worth the most but entering it needs "Prop" active first,
    /// and the budget cannot hold both.
    fn bait_graph() -> DevotionGraph {
        let mut builder = DevotionGraph::builder();
        builder
            .add_constellation(
                "Prop",
                ResourceVector::ZERO,
                vector(&[(Affinity::Eldritch, 1)]),
                chain(3, 0.0),
            )
            .unwrap();
        builder
            .add_constellation(
                "Bait",
                vector(&[(Affinity::Eldritch, 1)]),
                vector(&[(Affinity::Eldritch, 1)]),
                chain(1, 20.0),
            )
            .unwrap();
        builder
            .add_constellation(
                "Chain",
                vector(&[(Affinity::Eldritch, 1)]),
                ResourceVector::ZERO,
                chain(2, 1.0),
            )
            .unwrap();
        builder
            .add_constellation("Plain", ResourceVector::ZERO, ResourceVector::ZERO, chain(2, 2.0))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_two_step_pipeline() {
        let graph = two_step_graph();
        let result = DevotionPlanner::new(&graph, &config(5, "lazy")).solve().unwrap();

        assert_eq!(result.selection.stars.len(), 5);
        assert_eq!(result.selection.complete, set(&graph, &["A", "B"]));
        assert_eq!(result.cuts, 0);
        assert_eq!(result.plan.steps[0].added, set(&graph, &["A"]));
        assert_eq!(result.plan.final_set(), set(&graph, &["A", "B"]));
        assert_eq!(result.summary[0].kind, "Health");
        assert_eq!(result.summary[0].value, 23.0);
    }

    #[test]
    fn test_stragglers_land_in_plan() {
        let graph = two_step_graph();
        let result = DevotionPlanner::new(&graph, &config(4, "lazy")).solve().unwrap();

        let b0 = graph.find_star("B", 0).unwrap();
        assert_eq!(result.selection.complete, set(&graph, &["A"]));
        assert_eq!(result.plan.steps.len(), 1);
        assert_eq!(result.plan.steps[0].stragglers, vec![b0]);
        assert_eq!(result.plan.steps[0].points, 4);
    }

    #[test]
    fn test_unreachable_candidates_are_cut() {
        // Entry to "Bait" needs affinity beforehand: exemption off.
        let graph = bait_graph();
        for refinement in ["lazy", "iterative"] {
            let mut cfg = config(3, refinement);
            cfg.sequencing.exempt_self_sufficient_entry = false;
            let result = DevotionPlanner::new(&graph, &cfg).solve().unwrap();

            let bait = graph.find_constellation("Bait").unwrap();
            assert!(!result.selection.complete.contains(&bait), "{}", refinement);
            assert!(result.cuts >= 1, "{}", refinement);
            for step in &result.plan.steps {
                assert!(step.points <= 3);
            }
        }
    }

    #[test]
    fn test_mutual_support_on_sixteen_constellations() {
        // Anvil and Bell hold each other up, but one of them needs a helper
        // to get in, and 8 points only fit a helper entered one at a time.
        let graph = mutual_support_graph();
        let cfg = PlannerConfig {
            points: 8,
            ..PlannerConfig::default()
        }
        .with_weight("Health", 1.0, false);
        let result = DevotionPlanner::new(&graph, &cfg).solve().unwrap();

        assert!((result.selection.objective - 60.0).abs() < 1e-6);
        let pair = set(&graph, &["Anvil", "Bell"]);
        assert!(result.selection.complete.is_superset(&pair));
        assert!(result.plan.final_set().is_superset(&pair));
        assert!(result.plan.steps.iter().all(|s| s.points <= 8));
    }

    #[test]
    fn test_exemption_lets_self_sufficient_in() {
        let graph = bait_graph();
        let result = DevotionPlanner::new(&graph, &config(3, "iterative")).solve().unwrap();
        let bait = graph.find_constellation("Bait").unwrap();
        assert!(result.selection.complete.contains(&bait));
        assert_eq!(result.cuts, 0);
    }

    #[test]
    fn test_infeasible_requirement_reports_no_allocation() {
        let mut builder = DevotionGraph::builder();
        builder
            .add_constellation(
                "Tiny",
                ResourceVector::ZERO,
                vector(&[(Affinity::Primordial, 1)]),
                chain(1, 0.0),
            )
            .unwrap();
        builder
            .add_constellation(
                "Huge",
                vector(&[(Affinity::Primordial, 4)]),
                ResourceVector::ZERO,
                vec![StarDef::default().with_power("Meteor Shower")],
            )
            .unwrap();
        let graph = builder.build();

        let mut cfg = config(2, "lazy");
        cfg.celestial_powers = vec!["Meteor Shower".to_string()];
        assert_eq!(
            DevotionPlanner::new(&graph, &cfg).solve(),
            Err(PlannerError::NoFeasibleAllocation)
        );
    }

    #[test]
    fn test_configuration_errors() {
        let graph = two_step_graph();

        let mut cfg = config(5, "greedy");
        assert_eq!(
            DevotionPlanner::new(&graph, &cfg).solve(),
            Err(PlannerError::UnknownRefinement("greedy".to_string()))
        );

        cfg.refinement = "lazy".to_string();
        cfg.forced_stars = vec![("A".to_string(), 7)];
        assert_eq!(
            DevotionPlanner::new(&graph, &cfg).solve(),
            Err(PlannerError::UnknownStar("A".to_string(), 7))
        );

        cfg.forced_stars = vec![("Nowhere".to_string(), 0)];
        assert_eq!(
            DevotionPlanner::new(&graph, &cfg).solve(),
            Err(PlannerError::UnknownConstellation("Nowhere".to_string()))
        );

        cfg.forced_stars.clear();
        cfg.celestial_powers = vec!["Nope".to_string()];
        assert_eq!(
            DevotionPlanner::new(&graph, &cfg).solve(),
            Err(PlannerError::UnknownCelestialPower("Nope".to_string()))
        );

        cfg.celestial_powers.clear();
        cfg.sequencing.horizon_schedule.clear();
        assert!(matches!(
            DevotionPlanner::new(&graph, &cfg).solve(),
            Err(PlannerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_ignored_and_weapon_gated_stars() {
        let mut builder = DevotionGraph::builder();
        builder
            .add_constellation(
                "Blade",
                ResourceVector::ZERO,
                ResourceVector::ZERO,
                vec![StarDef::default()
                    .with_reward(Reward::flat("Health", 50.0))
                    .with_weapons(&["sword"])],
            )
            .unwrap();
        builder
            .add_constellation("Shield", ResourceVector::ZERO, ResourceVector::ZERO, chain(1, 5.0))
            .unwrap();
        let graph = builder.build();

        let result = DevotionPlanner::new(&graph, &config(1, "lazy")).solve().unwrap();
        assert_eq!(result.selection.complete, set(&graph, &["Shield"]));

        let mut cfg = config(1, "lazy");
        cfg.weapons = vec!["sword".to_string()];
        let result = DevotionPlanner::new(&graph, &cfg).solve().unwrap();
        assert_eq!(result.selection.complete, set(&graph, &["Blade"]));

        cfg.ignore_stars = vec![("Blade".to_string(), 0)];
        let planner = DevotionPlanner::new(&graph, &cfg);
        assert_eq!(planner.coefficients().unwrap().len(), 1);
        let result = planner.solve().unwrap();
        assert_eq!(result.selection.complete, set(&graph, &["Shield"]));
    }

    #[test]
    fn test_resolve_target() {
        let graph = two_step_graph();
        let names = vec!["a".to_string(), "B".to_string()];
        assert_eq!(resolve_target(&graph, &names).unwrap(), set(&graph, &["A", "B"]));
        assert_eq!(
            resolve_target(&graph, &["Z".to_string()]),
            Err(PlannerError::UnknownConstellation("Z".to_string()))
        );
    }
}

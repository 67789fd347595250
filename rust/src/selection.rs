//! Star selection: which stars to take under the point budget.
//!
//! Variables: `X[s]` per star (selected), `Y[c]` per constellation
//! (complete). Affinity available to the selection is the bonus sum of the
//! complete constellations, inlined into the gating rows.

use rustc_hash::FxHashMap;

use crate::graph::{Affinity, ConstellationSet, DevotionGraph, StarId};
use crate::interner::ConstellationId;
use crate::log_debug;
use crate::milp::{
    ConstrId, Constraint, IncumbentCallback, LinExpr, Model, Sense, Solution, SolverError, Status,
    Var,
};

/// Branch priority of completion variables; stars use 0.
const COMPLETE_PRIORITY: i32 = 1;

/// Variable handles of a selection model, detached from the model so a
/// solve callback can read candidates and build cuts.
#[derive(Clone, Debug)]
pub struct SelectionVars {
    stars: Vec<Vec<Var>>,
    complete: Vec<Var>,
}

impl SelectionVars {
    #[inline]
    pub fn star(&self, id: StarId) -> Var {
        self.stars[id.constellation.index()][id.index as usize]
    }

    #[inline]
    pub fn complete(&self, id: ConstellationId) -> Var {
        self.complete[id.index()]
    }

    /// Complete constellations of a candidate assignment.
    pub fn complete_set(&self, solution: &Solution) -> ConstellationSet {
        self.complete
            .iter()
            .enumerate()
            .filter(|&(_, &y)| solution.is_set(y))
            .map(|(i, _)| ConstellationId(i as u32))
            .collect()
    }

    /// Selected stars of a candidate assignment, sorted.
    pub fn chosen_stars(&self, solution: &Solution) -> Vec<StarId> {
        self.stars
            .iter()
            .enumerate()
            .flat_map(|(c, vars)| {
                vars.iter()
                    .enumerate()
                    .filter(|&(_, &x)| solution.is_set(x))
                    .map(move |(i, _)| StarId::new(ConstellationId(c as u32), i as u32))
            })
            .collect()
    }

    /// No-good cut excluding exactly `target` as the complete set:
    /// `sum(Y[c] in target) - sum(Y[c] not in target) <= |target| - 1`.
    pub fn no_good(&self, target: &ConstellationSet) -> Constraint {
        let expr: LinExpr = self
            .complete
            .iter()
            .enumerate()
            .map(|(i, &y)| {
                let coef = if target.contains(&ConstellationId(i as u32)) {
                    1
                } else {
                    -1
                };
                (y, coef)
            })
            .collect();
        expr.le(target.len() as i64 - 1)
    }
}

/// Result of a selection solve.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    /// Selected stars, sorted.
    pub stars: Vec<StarId>,
    /// Constellations with every star selected.
    pub complete: ConstellationSet,
    pub objective: f64,
}

/// The selection problem over one graph and budget.
pub struct SelectionModel<'g> {
    graph: &'g DevotionGraph,
    model: Model,
    vars: SelectionVars,
    cuts: Vec<ConstrId>,
}

impl<'g> SelectionModel<'g> {
    /// Build the model. Stars missing from `coefficients` are worth 0;
    /// `forced` stars are fixed to selected.
    pub fn new(
        graph: &'g DevotionGraph,
        points: u32,
        coefficients: &FxHashMap<StarId, f64>,
        forced: &[StarId],
    ) -> Self {
        let mut model = Model::new("selection");

        let stars: Vec<Vec<Var>> = graph
            .constellations()
            .iter()
            .map(|c| {
                (0..c.size())
                    .map(|i| model.add_binary(format!("X[{},{}]", c.name, i)))
                    .collect()
            })
            .collect();
        let complete: Vec<Var> = graph
            .constellations()
            .iter()
            .map(|c| {
                let y = model.add_binary(format!("Y[{}]", c.name));
                model.set_branch_priority(y, COMPLETE_PRIORITY);
                y
            })
            .collect();
        let vars = SelectionVars { stars, complete };

        for c in graph.constellations() {
            let y = vars.complete(c.id);
            let xs = &vars.stars[c.id.index()];

            // Complete iff every star is selected.
            for &x in xs {
                model.add_constraint(LinExpr::new().with_term(y, 1).with_term(x, -1).le(0));
            }
            model.add_constraint(
                LinExpr::sum(xs.iter().copied())
                    .with_term(y, -1)
                    .le(xs.len() as i64 - 1),
            );

            for star in &c.stars {
                let x = vars.star(star.id);
                for &p in &star.predecessors {
                    let before = vars.star(StarId::new(c.id, p));
                    model.add_constraint(LinExpr::new().with_term(x, 1).with_term(before, -1).le(0));
                }

                // Affinity gating: requirement <= bonus of complete constellations.
                for (affinity, amount) in c.requirement.iter() {
                    let mut expr = LinExpr::new().with_term(x, amount as i64);
                    expr.extend(bonus_terms(graph, &vars.complete, affinity));
                    model.add_constraint(expr.le(0));
                }
            }
        }

        let all_stars = vars.stars.iter().flatten().copied();
        model.add_constraint(LinExpr::sum(all_stars).equals(points as i64));

        for &star in forced {
            model.fix(vars.star(star), 1);
        }

        let mut objective: Vec<(Var, f64)> = coefficients
            .iter()
            .map(|(&star, &coef)| (vars.star(star), coef))
            .collect();
        objective.sort_by_key(|&(v, _)| v);
        model.set_objective(objective, Sense::Maximize);

        Self {
            graph,
            model,
            vars,
            cuts: Vec::new(),
        }
    }

    pub fn set_node_limit(&mut self, limit: Option<u64>) {
        self.model.set_node_limit(limit);
    }

    pub fn set_verbosity(&mut self, verbosity: u8) {
        self.model.set_verbosity(verbosity);
    }

    pub fn vars(&self) -> &SelectionVars {
        &self.vars
    }

    /// Forbid `target` from being the complete set again.
    pub fn exclude(&mut self, target: &ConstellationSet) {
        let cut = self.vars.no_good(target);
        self.cuts.push(self.model.add_constraint(cut));
    }

    /// Number of cuts added through `exclude`.
    pub fn num_exclusions(&self) -> usize {
        self.cuts.len()
    }

    /// Solve to optimality. `None` if no allocation satisfies the constraints.
    pub fn solve(&mut self) -> Result<Option<Selection>, SolverError> {
        let status = self.model.optimize()?;
        Ok(self.extract(status))
    }

    /// Solve, consulting `callback` for every improving candidate.
    pub fn solve_with(
        &mut self,
        callback: &mut dyn IncumbentCallback,
    ) -> Result<Option<Selection>, SolverError> {
        let status = self.model.optimize_with(callback)?;
        Ok(self.extract(status))
    }

    fn extract(&self, status: Status) -> Option<Selection> {
        log_debug!(
            self.model.verbosity,
            "[selection] {:?} after {} nodes",
            status,
            self.model.node_count()
        );
        let solution = self.model.solution()?;
        Some(Selection {
            stars: self.vars.chosen_stars(solution),
            complete: self.vars.complete_set(solution),
            objective: solution.objective(),
        })
    }

    pub fn graph(&self) -> &'g DevotionGraph {
        self.graph
    }
}

/// `-bonus[c][affinity] * Y[c]` for every constellation granting `affinity`.
fn bonus_terms<'a>(
    graph: &'a DevotionGraph,
    complete: &'a [Var],
    affinity: Affinity,
) -> impl Iterator<Item = (Var, i64)> + 'a {
    graph
        .constellations()
        .iter()
        .filter(move |c| c.bonus.get(affinity) > 0)
        .map(move |c| (complete[c.id.index()], -(c.bonus.get(affinity) as i64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::*;
    use crate::graph::{ResourceVector, StarDef};
    use crate::reward::Reward;

    fn unit_coefficients(graph: &DevotionGraph) -> FxHashMap<StarId, f64> {
        graph
            .stars()
            .map(|s| {
                let value: f64 = s.rewards.iter().map(Reward::value).sum();
                (s.id, value)
            })
            .filter(|&(_, v)| v > 0.0)
            .collect()
    }

    fn check_invariants(graph: &DevotionGraph, selection: &Selection, points: u32) {
        assert_eq!(selection.stars.len() as u32, points);
        for &id in &selection.stars {
            for &p in &graph.star(id).predecessors {
                assert!(selection.stars.contains(&StarId::new(id.constellation, p)));
            }
        }
        for c in graph.constellations() {
            let all = c.stars.iter().all(|s| selection.stars.contains(&s.id));
            assert_eq!(all, selection.complete.contains(&c.id), "{}", c.name);
        }
    }

    #[test]
    fn test_two_step_selects_both() {
        let graph = two_step_graph();
        let mut model = SelectionModel::new(&graph, 5, &unit_coefficients(&graph), &[]);
        let selection = model.solve().unwrap().unwrap();

        check_invariants(&graph, &selection, 5);
        assert_eq!(selection.complete, set(&graph, &["A", "B"]));
        assert!((selection.objective - 23.0).abs() < 1e-9);
    }

    #[test]
    fn test_budget_is_exact_and_gates_follow_completion() {
        let graph = two_step_graph();

        // 4 points: A must be complete before any B star opens.
        let mut model = SelectionModel::new(&graph, 4, &unit_coefficients(&graph), &[]);
        let selection = model.solve().unwrap().unwrap();
        check_invariants(&graph, &selection, 4);
        assert_eq!(selection.complete, set(&graph, &["A"]));
        assert!(selection.stars.contains(&graph.find_star("B", 0).unwrap()));
        assert!((selection.objective - 13.0).abs() < 1e-9);

        // More points than stars.
        let mut model = SelectionModel::new(&graph, 6, &unit_coefficients(&graph), &[]);
        assert!(model.solve().unwrap().is_none());
    }

    #[test]
    fn test_unreachable_requirement_is_infeasible() {
        let mut builder = DevotionGraph::builder();
        builder
            .add_constellation(
                "Small",
                ResourceVector::ZERO,
                vector(&[(Affinity::Order, 1)]),
                chain(1, 1.0),
            )
            .unwrap();
        builder
            .add_constellation(
                "Greedy",
                vector(&[(Affinity::Order, 5)]),
                ResourceVector::ZERO,
                chain(2, 10.0),
            )
            .unwrap();
        let graph = builder.build();
        let greedy = graph.find_star("Greedy", 0).unwrap();

        let mut model = SelectionModel::new(&graph, 3, &unit_coefficients(&graph), &[greedy]);
        assert!(model.solve().unwrap().is_none());
    }

    #[test]
    fn test_forced_star_pulls_predecessors() {
        let mut builder = DevotionGraph::builder();
        builder
            .add_constellation("Left", ResourceVector::ZERO, ResourceVector::ZERO, chain(3, 0.0))
            .unwrap();
        builder
            .add_constellation("Right", ResourceVector::ZERO, ResourceVector::ZERO, chain(3, 5.0))
            .unwrap();
        let graph = builder.build();
        let forced = graph.find_star("Left", 1).unwrap();

        let mut model = SelectionModel::new(&graph, 3, &unit_coefficients(&graph), &[forced]);
        let selection = model.solve().unwrap().unwrap();

        check_invariants(&graph, &selection, 3);
        assert!(selection.stars.contains(&graph.find_star("Left", 0).unwrap()));
        assert!(selection.stars.contains(&forced));
        assert!(selection.complete.is_empty());
        assert!((selection.objective - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_exclusion_forces_next_best_set() {
        let mut builder = DevotionGraph::builder();
        builder
            .add_constellation("Rich", ResourceVector::ZERO, ResourceVector::ZERO, chain(2, 5.0))
            .unwrap();
        builder
            .add_constellation("Poor", ResourceVector::ZERO, ResourceVector::ZERO, chain(2, 1.0))
            .unwrap();
        builder
            .add_constellation(
                "Branchy",
                ResourceVector::ZERO,
                ResourceVector::ZERO,
                vec![
                    StarDef::default().with_reward(Reward::flat("Health", 2.0)),
                    StarDef::default().with_reward(Reward::flat("Health", 2.0)),
                    StarDef::default(),
                ],
            )
            .unwrap();
        let graph = builder.build();
        let coefficients = unit_coefficients(&graph);

        let mut model = SelectionModel::new(&graph, 4, &coefficients, &[]);
        let first = model.solve().unwrap().unwrap();
        assert_eq!(first.complete, set(&graph, &["Rich"]));
        assert!((first.objective - 14.0).abs() < 1e-9);

        model.exclude(&first.complete);
        let second = model.solve().unwrap().unwrap();
        check_invariants(&graph, &second, 4);
        assert_ne!(second.complete, first.complete);
        assert_eq!(second.complete, set(&graph, &["Poor", "Rich"]));
        assert_eq!(model.num_exclusions(), 1);
    }

    #[test]
    fn test_lazy_callback_cuts_candidates() {
        let graph = two_step_graph();
        let mut model = SelectionModel::new(&graph, 3, &unit_coefficients(&graph), &[]);
        let vars = model.vars().clone();
        let banned = set(&graph, &["A"]);

        let mut seen = Vec::new();
        let mut callback = |candidate: &Solution| -> Result<Vec<Constraint>, SolverError> {
            let target = vars.complete_set(candidate);
            seen.push(target.clone());
            if target == banned {
                Ok(vec![vars.no_good(&target)])
            } else {
                Ok(Vec::new())
            }
        };
        // A is the only 3-point allocation, so cutting it leaves nothing.
        assert!(model.solve_with(&mut callback).unwrap().is_none());
        assert!(seen.contains(&banned));
    }
}

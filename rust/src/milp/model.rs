//! Model container: variables, constraints, objective, solve entry points.

use crate::log_debug;

use super::expr::{Constraint, Var};
use super::search::BranchAndBound;
use super::SolverError;

/// Optimisation direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// Outcome of a completed solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Optimal,
    Infeasible,
}

/// Handle to a model constraint, used for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstrId(usize);

/// A full integer assignment and its objective value.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub(crate) values: Vec<i64>,
    pub(crate) objective: f64,
}

impl Solution {
    #[inline]
    pub fn value(&self, var: Var) -> i64 {
        self.values[var.index()]
    }

    /// Binary variable at 1.
    #[inline]
    pub fn is_set(&self, var: Var) -> bool {
        self.value(var) > 0
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

/// Hook invoked for every improving integer-feasible assignment.
///
/// Returning constraints that the candidate violates rejects it; the
/// constraints stay in the model for the rest of this solve and for any
/// later one.
pub trait IncumbentCallback {
    fn on_incumbent(&mut self, candidate: &Solution) -> Result<Vec<Constraint>, SolverError>;
}

impl<F> IncumbentCallback for F
where
    F: FnMut(&Solution) -> Result<Vec<Constraint>, SolverError>,
{
    fn on_incumbent(&mut self, candidate: &Solution) -> Result<Vec<Constraint>, SolverError> {
        self(candidate)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct VarInfo {
    pub name: String,
    pub lb: i64,
    pub ub: i64,
    pub priority: i32,
    pub hint: Option<i64>,
}

/// Integer program over bounded variables.
#[derive(Clone, Debug)]
pub struct Model {
    pub(crate) name: String,
    pub(crate) vars: Vec<VarInfo>,
    pub(crate) constraints: Vec<Option<Constraint>>,
    pub(crate) objective: Vec<(Var, f64)>,
    pub(crate) sense: Sense,
    pub(crate) node_limit: Option<u64>,
    pub(crate) verbosity: u8,
    status: Option<Status>,
    solution: Option<Solution>,
    node_count: u64,
}

impl Model {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vars: Vec::new(),
            constraints: Vec::new(),
            objective: Vec::new(),
            sense: Sense::Maximize,
            node_limit: None,
            verbosity: 0,
            status: None,
            solution: None,
            node_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_node_limit(&mut self, limit: Option<u64>) {
        self.node_limit = limit;
    }

    pub fn set_verbosity(&mut self, verbosity: u8) {
        self.verbosity = verbosity;
    }

    pub fn add_binary(&mut self, name: impl Into<String>) -> Var {
        self.add_integer(name, 0, 1)
    }

    pub fn add_integer(&mut self, name: impl Into<String>, lb: i64, ub: i64) -> Var {
        let var = Var::new(self.vars.len());
        self.vars.push(VarInfo {
            name: name.into(),
            lb,
            ub,
            priority: 0,
            hint: None,
        });
        var
    }

    /// Fix a variable to a single value (e.g. a forced selection).
    pub fn fix(&mut self, var: Var, value: i64) {
        let info = &mut self.vars[var.index()];
        info.lb = value;
        info.ub = value;
    }

    pub fn set_bounds(&mut self, var: Var, lb: i64, ub: i64) {
        let info = &mut self.vars[var.index()];
        info.lb = lb;
        info.ub = ub;
    }

    /// Higher priorities are branched on first.
    pub fn set_branch_priority(&mut self, var: Var, priority: i32) {
        self.vars[var.index()].priority = priority;
    }

    /// Value to try first when branching on `var`.
    pub fn set_hint(&mut self, var: Var, value: i64) {
        self.vars[var.index()].hint = Some(value);
    }

    pub fn var_name(&self, var: Var) -> &str {
        &self.vars[var.index()].name
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstrId {
        self.constraints.push(Some(constraint));
        ConstrId(self.constraints.len() - 1)
    }

    /// Remove a constraint. Returns false if it was already removed.
    pub fn remove_constraint(&mut self, id: ConstrId) -> bool {
        self.constraints
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some()
    }

    pub fn set_objective(&mut self, terms: impl IntoIterator<Item = (Var, f64)>, sense: Sense) {
        self.objective = terms.into_iter().collect();
        self.sense = sense;
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.iter().flatten().count()
    }

    pub(crate) fn active_constraints(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.constraints.iter().flatten()
    }

    /// Solve to optimality.
    pub fn optimize(&mut self) -> Result<Status, SolverError> {
        let mut accept_all =
            |_: &Solution| -> Result<Vec<Constraint>, SolverError> { Ok(Vec::new()) };
        self.optimize_with(&mut accept_all)
    }

    /// Solve to optimality, consulting `callback` for every improving
    /// integer-feasible assignment.
    pub fn optimize_with(
        &mut self,
        callback: &mut dyn IncumbentCallback,
    ) -> Result<Status, SolverError> {
        self.status = None;
        self.solution = None;

        let mut search = BranchAndBound::new(self);
        let result = search.run(callback);
        let outcome = search.finish();

        // Lazy constraints stay even if the solve failed.
        self.constraints
            .extend(outcome.lazy.into_iter().map(Some));
        self.node_count = outcome.nodes;
        result?;

        let status = if outcome.best.is_some() {
            Status::Optimal
        } else {
            Status::Infeasible
        };
        log_debug!(
            self.verbosity,
            "[{}] {:?} after {} nodes ({} vars, {} constraints)",
            self.name,
            status,
            self.node_count,
            self.num_vars(),
            self.num_constraints()
        );
        self.solution = outcome.best;
        self.status = Some(status);
        Ok(status)
    }

    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn solution(&self) -> Option<&Solution> {
        self.solution.as_ref()
    }

    pub fn value(&self, var: Var) -> Option<i64> {
        self.solution.as_ref().map(|s| s.value(var))
    }

    pub fn objective_value(&self) -> Option<f64> {
        self.solution.as_ref().map(|s| s.objective)
    }

    /// Nodes explored by the last solve.
    pub fn node_count(&self) -> u64 {
        self.node_count
    }
}

//! Small integer-programming engine used by the selection and sequencing models.
//!
//! Supports binary and bounded integer variables, linear constraints that can
//! be added or removed between solves, a linear objective with real
//! coefficients, and an incumbent callback that may inject lazy constraints
//! mid-search.

mod expr;
mod model;
mod search;

use thiserror::Error;

pub use expr::{Cmp, Constraint, LinExpr, Var};
pub use model::{ConstrId, IncumbentCallback, Model, Sense, Solution, Status};

/// Errors that abort a solve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("Model {model} stalled: node limit {limit} reached")]
    NodeLimit { model: String, limit: u64 },
}

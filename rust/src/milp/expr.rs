//! Variables, integer linear expressions and constraints.

use std::collections::BTreeMap;

/// Handle to a model variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    pub(crate) fn new(index: usize) -> Self {
        Var(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Integer linear expression `sum(coef * var) + constant`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinExpr {
    terms: Vec<(Var, i64)>,
    constant: i64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of the given variables with coefficient 1.
    pub fn sum(vars: impl IntoIterator<Item = Var>) -> Self {
        vars.into_iter().map(|v| (v, 1)).collect()
    }

    pub fn with_term(mut self, var: Var, coef: i64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn with_constant(mut self, constant: i64) -> Self {
        self.constant += constant;
        self
    }

    pub fn add_term(&mut self, var: Var, coef: i64) {
        if coef != 0 {
            self.terms.push((var, coef));
        }
    }

    pub fn terms(&self) -> &[(Var, i64)] {
        &self.terms
    }

    pub fn constant(&self) -> i64 {
        self.constant
    }

    /// Evaluate against a full assignment.
    pub fn evaluate(&self, values: &[i64]) -> i64 {
        self.terms
            .iter()
            .map(|&(v, a)| a * values[v.index()])
            .sum::<i64>()
            + self.constant
    }

    /// Terms with duplicate variables merged and zero coefficients dropped.
    pub fn merged_terms(&self) -> Vec<(Var, i64)> {
        let mut merged: BTreeMap<Var, i64> = BTreeMap::new();
        for &(v, a) in &self.terms {
            *merged.entry(v).or_insert(0) += a;
        }
        merged.into_iter().filter(|&(_, a)| a != 0).collect()
    }

    pub fn le(self, rhs: i64) -> Constraint {
        Constraint::new(self, Cmp::Le, rhs)
    }

    pub fn ge(self, rhs: i64) -> Constraint {
        Constraint::new(self, Cmp::Ge, rhs)
    }

    pub fn equals(self, rhs: i64) -> Constraint {
        Constraint::new(self, Cmp::Eq, rhs)
    }
}

impl FromIterator<(Var, i64)> for LinExpr {
    fn from_iter<I: IntoIterator<Item = (Var, i64)>>(iter: I) -> Self {
        let mut expr = LinExpr::new();
        expr.extend(iter);
        expr
    }
}

impl Extend<(Var, i64)> for LinExpr {
    fn extend<I: IntoIterator<Item = (Var, i64)>>(&mut self, iter: I) {
        for (v, a) in iter {
            self.add_term(v, a);
        }
    }
}

/// Constraint sense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Le,
    Ge,
    Eq,
}

/// `expr <cmp> rhs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub expr: LinExpr,
    pub cmp: Cmp,
    pub rhs: i64,
}

impl Constraint {
    pub fn new(expr: LinExpr, cmp: Cmp, rhs: i64) -> Self {
        Self { expr, cmp, rhs }
    }

    pub fn is_satisfied_by(&self, values: &[i64]) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.cmp {
            Cmp::Le => lhs <= self.rhs,
            Cmp::Ge => lhs >= self.rhs,
            Cmp::Eq => lhs == self.rhs,
        }
    }

    /// Equivalent rows of the form `sum(coef * var) <= rhs`.
    pub(crate) fn to_rows(&self) -> Vec<(Vec<(usize, i64)>, i64)> {
        let terms: Vec<(usize, i64)> = self
            .expr
            .merged_terms()
            .into_iter()
            .map(|(v, a)| (v.index(), a))
            .collect();
        let rhs = self.rhs - self.expr.constant();
        let negated = || terms.iter().map(|&(v, a)| (v, -a)).collect::<Vec<_>>();
        match self.cmp {
            Cmp::Le => vec![(terms.clone(), rhs)],
            Cmp::Ge => vec![(negated(), -rhs)],
            Cmp::Eq => vec![(terms.clone(), rhs), (negated(), -rhs)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_evaluate() {
        let (x, y) = (Var::new(0), Var::new(1));
        let expr = LinExpr::new()
            .with_term(x, 2)
            .with_term(y, 1)
            .with_term(x, -2)
            .with_constant(3);

        assert_eq!(expr.merged_terms(), vec![(y, 1)]);
        assert_eq!(expr.evaluate(&[5, 4]), 7);
    }

    #[test]
    fn test_rows_for_each_sense() {
        let x = Var::new(0);
        let expr = LinExpr::sum([x]).with_constant(1);

        assert_eq!(expr.clone().le(3).to_rows(), vec![(vec![(0, 1)], 2)]);
        assert_eq!(expr.clone().ge(3).to_rows(), vec![(vec![(0, -1)], -2)]);
        assert_eq!(expr.equals(3).to_rows().len(), 2);
    }

    #[test]
    fn test_satisfaction() {
        let (x, y) = (Var::new(0), Var::new(1));
        let c = LinExpr::sum([x, y]).equals(1);
        assert!(c.is_satisfied_by(&[1, 0]));
        assert!(!c.is_satisfied_by(&[1, 1]));
    }
}

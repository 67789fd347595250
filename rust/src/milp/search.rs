//! Depth-first branch and bound with bound propagation.
//!
//! Every constraint is compiled into rows `sum(a * x) <= rhs`. Domains are
//! integer intervals; tightenings are recorded on a trail and undone on
//! backtrack. The search uses an explicit stack, so model size does not
//! bound recursion depth.

use crate::log_debug;

use super::expr::Constraint;
use super::model::{IncumbentCallback, Model, Sense, Solution};
use super::SolverError;

const GAIN_EPS: f64 = 1e-7;

struct Row {
    terms: Vec<(usize, i64)>,
    rhs: i64,
}

/// Interval domains with an undo trail.
struct Domains {
    lb: Vec<i64>,
    ub: Vec<i64>,
    trail: Vec<(usize, i64, i64)>,
}

impl Domains {
    #[inline]
    fn is_fixed(&self, var: usize) -> bool {
        self.lb[var] == self.ub[var]
    }

    fn set(&mut self, var: usize, lb: i64, ub: i64) {
        self.trail.push((var, self.lb[var], self.ub[var]));
        self.lb[var] = lb;
        self.ub[var] = ub;
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some((var, lb, ub)) = self.trail.pop() {
                self.lb[var] = lb;
                self.ub[var] = ub;
            }
        }
    }
}

struct Frame {
    var: usize,
    mark: usize,
    alternative: Option<(i64, i64)>,
}

pub(crate) struct SearchOutcome {
    pub best: Option<Solution>,
    pub lazy: Vec<Constraint>,
    pub nodes: u64,
}

pub(crate) struct BranchAndBound {
    name: String,
    verbosity: u8,
    node_limit: Option<u64>,
    domains: Domains,
    rows: Vec<Row>,
    watches: Vec<Vec<usize>>,
    queue: Vec<usize>,
    queued: Vec<bool>,
    pending: Vec<usize>,
    /// Objective coefficients oriented so the search always maximises.
    gain: Vec<f64>,
    sign: f64,
    /// "At most k" all-ones rows over binaries, used to tighten the bound.
    cardinality: Vec<usize>,
    order: Vec<usize>,
    hints: Vec<Option<i64>>,
    infeasible_root: bool,
    best: Option<Solution>,
    best_gain: f64,
    lazy: Vec<Constraint>,
    nodes: u64,
}

impl BranchAndBound {
    pub(crate) fn new(model: &Model) -> Self {
        let n = model.vars.len();
        let lb: Vec<i64> = model.vars.iter().map(|v| v.lb).collect();
        let ub: Vec<i64> = model.vars.iter().map(|v| v.ub).collect();
        let infeasible_root = lb.iter().zip(&ub).any(|(l, u)| l > u);

        let sign = match model.sense {
            Sense::Maximize => 1.0,
            Sense::Minimize => -1.0,
        };
        let mut gain = vec![0.0; n];
        for &(var, coef) in &model.objective {
            gain[var.index()] += sign * coef;
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            model.vars[b]
                .priority
                .cmp(&model.vars[a].priority)
                .then(gain[b].abs().total_cmp(&gain[a].abs()))
                .then(a.cmp(&b))
        });

        let mut search = Self {
            name: model.name.clone(),
            verbosity: model.verbosity,
            node_limit: model.node_limit,
            domains: Domains {
                lb,
                ub,
                trail: Vec::new(),
            },
            rows: Vec::new(),
            watches: vec![Vec::new(); n],
            queue: Vec::new(),
            queued: Vec::new(),
            pending: Vec::new(),
            gain,
            sign,
            cardinality: Vec::new(),
            order,
            hints: model.vars.iter().map(|v| v.hint).collect(),
            infeasible_root,
            best: None,
            best_gain: f64::NEG_INFINITY,
            lazy: Vec::new(),
            nodes: 0,
        };

        for constraint in model.active_constraints() {
            search.add_rows(constraint);
        }
        search.cardinality = (0..search.rows.len())
            .filter(|&r| search.is_cardinality_row(r))
            .collect();
        search
    }

    pub(crate) fn finish(self) -> SearchOutcome {
        SearchOutcome {
            best: self.best,
            lazy: self.lazy,
            nodes: self.nodes,
        }
    }

    fn add_rows(&mut self, constraint: &Constraint) -> Vec<usize> {
        let mut added = Vec::new();
        for (terms, rhs) in constraint.to_rows() {
            let r = self.rows.len();
            for &(v, _) in &terms {
                self.watches[v].push(r);
            }
            self.rows.push(Row { terms, rhs });
            self.queued.push(false);
            added.push(r);
        }
        added
    }

    fn is_cardinality_row(&self, r: usize) -> bool {
        let row = &self.rows[r];
        row.rhs >= 0
            && row.terms.len() as i64 > row.rhs
            && row.terms.iter().all(|&(v, a)| {
                a == 1 && self.domains.lb[v] >= 0 && self.domains.ub[v] <= 1
            })
    }

    fn enqueue(&mut self, r: usize) {
        if !self.queued[r] {
            self.queued[r] = true;
            self.queue.push(r);
        }
    }

    fn enqueue_watchers(&mut self, var: usize) {
        for i in 0..self.watches[var].len() {
            let r = self.watches[var][i];
            self.enqueue(r);
        }
    }

    fn clear_queue(&mut self) {
        for r in self.queue.drain(..) {
            self.queued[r] = false;
        }
    }

    /// Propagate queued rows to a fixpoint. Returns false on conflict.
    fn propagate(&mut self) -> bool {
        while let Some(r) = self.queue.pop() {
            self.queued[r] = false;
            if !self.propagate_row(r) {
                self.clear_queue();
                return false;
            }
        }
        true
    }

    fn propagate_row(&mut self, r: usize) -> bool {
        let Self {
            rows,
            domains,
            watches,
            queue,
            queued,
            ..
        } = self;
        let row = &rows[r];

        let mut min_activity: i64 = 0;
        for &(v, a) in &row.terms {
            min_activity += if a > 0 {
                a * domains.lb[v]
            } else {
                a * domains.ub[v]
            };
        }
        if min_activity > row.rhs {
            return false;
        }

        let slack = row.rhs - min_activity;
        for &(v, a) in &row.terms {
            let (lb, ub) = (domains.lb[v], domains.ub[v]);
            let (new_lb, new_ub) = if a > 0 {
                (lb, ub.min(lb + slack / a))
            } else {
                (lb.max(ub - slack / -a), ub)
            };
            if (new_lb, new_ub) != (lb, ub) {
                domains.set(v, new_lb, new_ub);
                for &w in &watches[v] {
                    if w != r && !queued[w] {
                        queued[w] = true;
                        queue.push(w);
                    }
                }
            }
        }
        true
    }

    /// Upper bound on the oriented objective under the current domains.
    fn bound(&self) -> f64 {
        let dom = &self.domains;
        let base: f64 = self
            .gain
            .iter()
            .enumerate()
            .map(|(v, &g)| {
                if g > 0.0 {
                    g * dom.ub[v] as f64
                } else {
                    g * dom.lb[v] as f64
                }
            })
            .sum();

        let mut bound = base;
        for &r in &self.cardinality {
            let row = &self.rows[r];
            let mut fixed_ones = 0i64;
            let mut free: Vec<f64> = Vec::new();
            for &(v, _) in &row.terms {
                if dom.lb[v] == 1 {
                    fixed_ones += 1;
                } else if dom.ub[v] == 1 && self.gain[v] > 0.0 {
                    free.push(self.gain[v]);
                }
            }
            let room = (row.rhs - fixed_ones).max(0) as usize;
            if free.len() > room {
                free.sort_by(|a, b| b.total_cmp(a));
                let dropped: f64 = free[room..].iter().sum();
                bound = bound.min(base - dropped);
            }
        }
        bound
    }

    fn should_prune(&self) -> bool {
        self.best.is_some() && self.bound() <= self.best_gain + GAIN_EPS
    }

    fn pick_branch(&self) -> Option<usize> {
        self.order
            .iter()
            .copied()
            .find(|&v| !self.domains.is_fixed(v))
    }

    /// The two halves of `var`'s domain, preferred half first.
    fn split(&self, var: usize) -> ((i64, i64), (i64, i64)) {
        let (lb, ub) = (self.domains.lb[var], self.domains.ub[var]);
        let preferred = match self.hints[var] {
            Some(h) => h.clamp(lb, ub),
            None if self.gain[var] > 0.0 => ub,
            None => lb,
        };
        if preferred == lb {
            ((lb, lb), (lb + 1, ub))
        } else if preferred == ub {
            ((ub, ub), (lb, ub - 1))
        } else {
            ((lb, preferred), (preferred + 1, ub))
        }
    }

    fn restrict(&mut self, var: usize, (lb, ub): (i64, i64)) -> bool {
        self.domains.set(var, lb, ub);
        self.enqueue_watchers(var);
        for r in std::mem::take(&mut self.pending) {
            self.enqueue(r);
        }
        self.propagate()
    }

    fn count_node(&mut self) -> Result<(), SolverError> {
        self.nodes += 1;
        match self.node_limit {
            Some(limit) if self.nodes > limit => Err(SolverError::NodeLimit {
                model: self.name.clone(),
                limit,
            }),
            _ => Ok(()),
        }
    }

    fn visit_leaf(&mut self, callback: &mut dyn IncumbentCallback) -> Result<(), SolverError> {
        let values = self.domains.lb.clone();
        let satisfied = self.rows.iter().all(|row| {
            row.terms.iter().map(|&(v, a)| a * values[v]).sum::<i64>() <= row.rhs
        });
        if !satisfied {
            return Ok(());
        }

        let gain: f64 = self
            .gain
            .iter()
            .zip(&values)
            .map(|(g, &x)| g * x as f64)
            .sum();
        if self.best.is_some() && gain <= self.best_gain + GAIN_EPS {
            return Ok(());
        }

        let candidate = Solution {
            values,
            objective: self.sign * gain,
        };
        let cuts = callback.on_incumbent(&candidate)?;
        let rejected = cuts.iter().any(|c| !c.is_satisfied_by(&candidate.values));
        for cut in cuts {
            let added = self.add_rows(&cut);
            self.pending.extend(added);
            self.lazy.push(cut);
        }

        if rejected {
            log_debug!(
                self.verbosity,
                "[{}] incumbent {:.3} rejected by lazy constraint",
                self.name,
                candidate.objective
            );
            return Ok(());
        }

        log_debug!(
            self.verbosity,
            "[{}] new incumbent {:.3} at node {}",
            self.name,
            candidate.objective,
            self.nodes
        );
        self.best_gain = gain;
        self.best = Some(candidate);
        Ok(())
    }

    pub(crate) fn run(&mut self, callback: &mut dyn IncumbentCallback) -> Result<(), SolverError> {
        if self.infeasible_root {
            return Ok(());
        }
        for r in 0..self.rows.len() {
            self.enqueue(r);
        }
        if !self.propagate() {
            return Ok(());
        }

        let mut stack: Vec<Frame> = Vec::new();
        let mut descend = true;
        loop {
            if descend {
                self.count_node()?;
                if self.should_prune() {
                    descend = false;
                    continue;
                }
                match self.pick_branch() {
                    None => {
                        self.visit_leaf(callback)?;
                        descend = false;
                    }
                    Some(var) => {
                        let (first, second) = self.split(var);
                        stack.push(Frame {
                            var,
                            mark: self.domains.trail.len(),
                            alternative: Some(second),
                        });
                        descend = self.restrict(var, first);
                    }
                }
            } else {
                let Some(frame) = stack.last_mut() else {
                    return Ok(());
                };
                let (var, mark) = (frame.var, frame.mark);
                let alternative = frame.alternative.take();
                self.domains.undo_to(mark);
                match alternative {
                    Some(range) => descend = self.restrict(var, range),
                    None => {
                        stack.pop();
                    }
                }
            }
        }
    }
}

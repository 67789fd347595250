//! Horizon escalation over `HorizonSearch`, with a per-target cache.

use rustc_hash::FxHashMap;

use crate::config::SequencingConfig;
use crate::graph::{ConstellationSet, DevotionGraph};
use crate::milp::SolverError;
use crate::{log_changes, log_checks};

use super::horizon::HorizonSearch;
use super::SequencePlan;

/// Answers "can this complete set be reached, and how cheaply?".
pub struct SequencingOracle<'g> {
    graph: &'g DevotionGraph,
    points: u32,
    config: SequencingConfig,
    plans: FxHashMap<ConstellationSet, Option<SequencePlan>>,
    reachable: FxHashMap<ConstellationSet, bool>,
}

impl<'g> SequencingOracle<'g> {
    pub fn new(graph: &'g DevotionGraph, points: u32, config: &SequencingConfig) -> Self {
        Self {
            graph,
            points,
            config: config.clone(),
            plans: FxHashMap::default(),
            reachable: FxHashMap::default(),
        }
    }

    fn horizon_search(&self, target: &ConstellationSet, horizon: u32) -> HorizonSearch<'g> {
        let mut search = HorizonSearch::new(
            self.graph,
            target,
            self.points,
            horizon,
            self.config.exempt_self_sufficient_entry,
        );
        search.set_node_limit(self.config.node_limit);
        search.set_verbosity(self.config.verbosity);
        search
    }

    /// Minimal-refund, then minimal-turn plan for `target`.
    ///
    /// Horizons are tried in schedule order until two consecutive ones give
    /// the same minimal refund; the shorter of the two supplies the plan.
    /// `None` if the schedule runs out first.
    pub fn plan(&mut self, target: &ConstellationSet) -> Result<Option<SequencePlan>, SolverError> {
        if let Some(cached) = self.plans.get(target) {
            return Ok(cached.clone());
        }
        if target.is_empty() {
            let plan = SequencePlan::default();
            self.plans.insert(target.clone(), Some(plan.clone()));
            return Ok(Some(plan));
        }

        let names = self.graph.set_names(target);
        let mut accepted: Option<SequencePlan> = None;
        let mut previous: Option<SequencePlan> = None;

        for &horizon in &self.config.horizon_schedule {
            let plan = self.horizon_search(target, horizon).solve()?;
            log_checks!(
                self.config.verbosity,
                "[sequencing] {:?} horizon {}: refunds {:?}",
                names,
                horizon,
                plan.as_ref().map(|p| p.refunds)
            );

            let stable = matches!(
                (&previous, &plan),
                (Some(before), Some(now)) if before.refunds == now.refunds
            );
            if stable {
                accepted = previous;
                break;
            }
            previous = plan;
        }

        match &accepted {
            Some(plan) => {
                log_changes!(
                    self.config.verbosity,
                    "[sequencing] {:?} reachable: {} refunded over {} turns (horizon {})",
                    names,
                    plan.refunds,
                    plan.turns,
                    plan.horizon
                );
                self.reachable.insert(target.clone(), true);
            }
            None => {
                log_changes!(
                    self.config.verbosity,
                    "[sequencing] {:?} has no stable plan within {:?}",
                    names,
                    self.config.horizon_schedule
                );
            }
        }
        self.plans.insert(target.clone(), accepted.clone());
        Ok(accepted)
    }

    /// True if some horizon in the schedule admits any plan at all. A plan
    /// within a horizon also fits every longer one, so only the longest is
    /// searched.
    pub fn is_reachable(&mut self, target: &ConstellationSet) -> Result<bool, SolverError> {
        if let Some(Some(_)) = self.plans.get(target) {
            return Ok(true);
        }
        if let Some(&known) = self.reachable.get(target) {
            return Ok(known);
        }

        let reachable = match self.config.horizon_schedule.iter().copied().max() {
            _ if target.is_empty() => true,
            Some(horizon) => {
                let feasible = self.horizon_search(target, horizon).is_feasible()?;
                log_checks!(
                    self.config.verbosity,
                    "[sequencing] {:?} feasible within {} turns: {}",
                    self.graph.set_names(target),
                    horizon,
                    feasible
                );
                feasible
            }
            None => false,
        };
        self.reachable.insert(target.clone(), reachable);
        Ok(reachable)
    }

    /// Previously computed plan, if `plan` succeeded for `target`.
    pub fn cached(&self, target: &ConstellationSet) -> Option<&SequencePlan> {
        self.plans.get(target).and_then(Option::as_ref)
    }

    /// Number of targets `plan` has been asked about.
    pub fn targets_planned(&self) -> usize {
        self.plans.len()
    }
}

//! Best-first label-setting search over (active set, affinity, budget).
//!
//! Labels are ordered by (target constellations still missing, points
//! refunded so far). The first popped label whose active set covers the
//! target ends the search. A visited map keyed by (active set, affinity)
//! keeps only the lowest refund seen for each state.

use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::graph::{ConstellationSet, DevotionGraph, ResourceVector};
use crate::interner::ConstellationId;
use crate::{log_checks, log_debug};

use super::SequencingError;

/// One move of a label-search history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelAction {
    Add(ConstellationId),
    Remove(ConstellationId),
}

/// Result of a successful search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelOutcome {
    pub refunded: u32,
    pub actions: Vec<LabelAction>,
    /// Active set when the search stopped; a superset of the target.
    pub active: ConstellationSet,
    pub states_explored: usize,
}

struct Label {
    active: ConstellationSet,
    affinity: ResourceVector,
    remaining: u32,
    refunded: u32,
    parent: Option<(usize, LabelAction)>,
}

/// Label-setting search for one target and budget.
pub struct LabelSearch<'g> {
    graph: &'g DevotionGraph,
    target: ConstellationSet,
    points: u32,
    exempt_self_sufficient_entry: bool,
    state_limit: Option<usize>,
    verbosity: u8,
}

impl<'g> LabelSearch<'g> {
    pub fn new(graph: &'g DevotionGraph, target: ConstellationSet, points: u32) -> Self {
        Self {
            graph,
            target,
            points,
            exempt_self_sufficient_entry: true,
            state_limit: None,
            verbosity: 0,
        }
    }

    pub fn with_exemption(mut self, exempt_self_sufficient_entry: bool) -> Self {
        self.exempt_self_sufficient_entry = exempt_self_sufficient_entry;
        self
    }

    pub fn with_state_limit(mut self, limit: Option<usize>) -> Self {
        self.state_limit = limit;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    fn missing(&self, active: &ConstellationSet) -> usize {
        self.target.difference(active).count()
    }

    fn can_enter(&self, c: ConstellationId, affinity: &ResourceVector) -> bool {
        let constellation = self.graph.constellation(c);
        (self.exempt_self_sufficient_entry && constellation.is_self_sufficient())
            || affinity.covers(&constellation.requirement)
    }

    /// Every non-self-sufficient survivor still meets its requirement.
    fn survivors_hold(&self, active: &ConstellationSet, affinity: &ResourceVector) -> bool {
        active.iter().all(|&c| {
            let constellation = self.graph.constellation(c);
            constellation.is_self_sufficient() || affinity.covers(&constellation.requirement)
        })
    }

    /// Run the search. `Ok(None)` if the target cannot be covered.
    pub fn run(&self) -> Result<Option<LabelOutcome>, SequencingError> {
        let mut arena: Vec<Label> = vec![Label {
            active: ConstellationSet::new(),
            affinity: ResourceVector::ZERO,
            remaining: self.points,
            refunded: 0,
            parent: None,
        }];
        let mut best: FxHashMap<(ConstellationSet, ResourceVector), u32> = FxHashMap::default();
        best.insert((ConstellationSet::new(), ResourceVector::ZERO), 0);

        let mut heap = BinaryHeap::new();
        heap.push(Reverse((self.missing(&arena[0].active), 0u32, 0usize)));

        let mut popped = 0usize;
        while let Some(Reverse((missing, refunded, index))) = heap.pop() {
            let label = &arena[index];
            let key = (label.active.clone(), label.affinity);
            if best.get(&key).is_some_and(|&r| r < refunded) {
                continue;
            }

            popped += 1;
            if let Some(limit) = self.state_limit {
                if popped > limit {
                    return Err(SequencingError::StateLimit(limit));
                }
            }

            if missing == 0 {
                let outcome = LabelOutcome {
                    refunded,
                    actions: history(&arena, index),
                    active: label.active.clone(),
                    states_explored: popped,
                };
                log_checks!(
                    self.verbosity,
                    "[label] reached {:?} refunding {} after {} states",
                    self.graph.set_names(&self.target),
                    refunded,
                    popped
                );
                return Ok(Some(outcome));
            }

            let mut children: Vec<Label> = Vec::new();
            for c in self.graph.constellations() {
                let id = c.id;
                if label.active.contains(&id) {
                    let mut active = label.active.clone();
                    active.remove(&id);
                    let affinity = label.affinity - c.bonus;
                    if self.survivors_hold(&active, &affinity) {
                        children.push(Label {
                            active,
                            affinity,
                            remaining: label.remaining + c.size(),
                            refunded: label.refunded + c.size(),
                            parent: Some((index, LabelAction::Remove(id))),
                        });
                    }
                } else if c.size() <= label.remaining && self.can_enter(id, &label.affinity) {
                    let mut active = label.active.clone();
                    active.insert(id);
                    children.push(Label {
                        active,
                        affinity: label.affinity + c.bonus,
                        remaining: label.remaining - c.size(),
                        refunded: label.refunded,
                        parent: Some((index, LabelAction::Add(id))),
                    });
                }
            }

            for child in children {
                let key = (child.active.clone(), child.affinity);
                if best.get(&key).is_some_and(|&r| r <= child.refunded) {
                    continue;
                }
                best.insert(key, child.refunded);
                let priority = (self.missing(&child.active), child.refunded, arena.len());
                arena.push(child);
                heap.push(Reverse(priority));
            }
        }

        log_debug!(
            self.verbosity,
            "[label] {:?} unreachable after {} states",
            self.graph.set_names(&self.target),
            popped
        );
        Ok(None)
    }
}

/// Actions from the root to `index`, in order.
fn history(arena: &[Label], mut index: usize) -> Vec<LabelAction> {
    let mut actions = Vec::new();
    while let Some((parent, action)) = arena[index].parent {
        actions.push(action);
        index = parent;
    }
    actions.reverse();
    actions
}

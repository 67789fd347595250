//! Exact sequencing for a fixed horizon.
//!
//! A plan is a path of turns from the empty set to the target. A turn
//! starts from active set `P` and ends at `N`, adding `N \ P` (never empty)
//! and removing `P \ N`. An added constellation must meet its requirement
//! against the affinity of `P` unless it is self-sufficient and exempt.
//! The points of `P` plus the points added may not exceed the budget, and
//! every non-self-sufficient member of `N` must meet its requirement
//! against the affinity of `N`.
//!
//! Turns are built one decision at a time, additions in index order and
//! then removals in index order. Nodes are expanded best first on
//! (refunds so far + points held outside the target, turns). Everything
//! held outside the target has to be refunded before the end, so the first
//! time the target set opens a turn its refund is minimal and, for that
//! refund, so is its number of turns.

use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::graph::{ConstellationSet, DevotionGraph, ResourceVector};
use crate::interner::ConstellationId;
use crate::log_debug;
use crate::milp::SolverError;

use super::{PlanStep, SequencePlan};

/// Fixed-width bit set over constellation indices.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Bits(Vec<u64>);

impl Bits {
    fn empty(len: usize) -> Self {
        Self(vec![0; len.div_ceil(64)])
    }

    #[inline]
    fn contains(&self, i: usize) -> bool {
        (self.0[i / 64] >> (i % 64)) & 1 == 1
    }

    fn with(&self, i: usize) -> Self {
        let mut bits = self.clone();
        bits.0[i / 64] |= 1u64 << (i % 64);
        bits
    }

    fn without(&self, i: usize) -> Self {
        let mut bits = self.clone();
        bits.0[i / 64] &= !(1u64 << (i % 64));
        bits
    }

    fn to_set(&self) -> ConstellationSet {
        self.0
            .iter()
            .enumerate()
            .flat_map(|(w, &word)| {
                (0..64usize)
                    .filter(move |&b| (word >> b) & 1 == 1)
                    .map(move |b| ConstellationId((w * 64 + b) as u32))
            })
            .collect()
    }
}

/// What the search needs to know about one constellation.
struct Facts {
    size: u32,
    requirement: ResourceVector,
    bonus: ResourceVector,
    self_sufficient: bool,
    /// May be entered without holding its requirement first.
    exempt: bool,
    in_target: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Between turns.
    Start,
    Adding,
    Removing,
}

struct Node {
    phase: Phase,
    active: Bits,
    /// Affinity granted by `active`.
    affinity: ResourceVector,
    /// Mid-turn: the node that opened the turn. Turn start: the start of
    /// the previous turn.
    origin: Option<usize>,
    /// Lowest index the next decision of this turn may touch.
    next: usize,
    /// Points of `active`.
    held: u32,
    /// Points at the start of the turn plus everything added in it.
    invested: u32,
    /// Points of `active` outside the target.
    outside: u32,
    /// Target constellations in `active`.
    present: usize,
    refunds: u32,
    /// Completed turns.
    turns: u32,
}

impl Node {
    /// (refund bound, turns including the one in progress, targets missing)
    fn priority(&self, target_len: usize) -> (u32, u32, usize) {
        let turns = self.turns + u32::from(self.phase != Phase::Start);
        (self.refunds + self.outside, turns, target_len - self.present)
    }
}

/// Minimal-refund, then minimal-turn sequencing of one target within a
/// fixed number of turns.
pub struct HorizonSearch<'g> {
    graph: &'g DevotionGraph,
    facts: Vec<Facts>,
    target_len: usize,
    points: u32,
    horizon: u32,
    node_limit: Option<u64>,
    verbosity: u8,
}

impl<'g> HorizonSearch<'g> {
    /// Search for reaching exactly `target` within `horizon` turns.
    ///
    /// With `exempt_self_sufficient_entry`, a self-sufficient constellation
    /// may be added without holding its requirement beforehand.
    pub fn new(
        graph: &'g DevotionGraph,
        target: &ConstellationSet,
        points: u32,
        horizon: u32,
        exempt_self_sufficient_entry: bool,
    ) -> Self {
        let facts = graph
            .constellations()
            .iter()
            .map(|c| {
                let self_sufficient = c.is_self_sufficient();
                Facts {
                    size: c.size(),
                    requirement: c.requirement,
                    bonus: c.bonus,
                    self_sufficient,
                    exempt: exempt_self_sufficient_entry && self_sufficient,
                    in_target: target.contains(&c.id),
                }
            })
            .collect();

        Self {
            graph,
            facts,
            target_len: target.len(),
            points,
            horizon,
            node_limit: None,
            verbosity: 0,
        }
    }

    pub fn set_node_limit(&mut self, limit: Option<u64>) {
        self.node_limit = limit;
    }

    pub fn set_verbosity(&mut self, verbosity: u8) {
        self.verbosity = verbosity;
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    fn name(&self) -> String {
        format!("horizon-{}", self.horizon)
    }

    /// Whether any plan exists within the horizon.
    pub fn is_feasible(&self) -> Result<bool, SolverError> {
        Ok(self.solve()?.is_some())
    }

    /// The plan with the fewest refunded points and, among those, the
    /// fewest turns. `None` if the target cannot be reached in time.
    pub fn solve(&self) -> Result<Option<SequencePlan>, SolverError> {
        let root = Node {
            phase: Phase::Start,
            active: Bits::empty(self.facts.len()),
            affinity: ResourceVector::ZERO,
            origin: None,
            next: 0,
            held: 0,
            invested: 0,
            outside: 0,
            present: 0,
            refunds: 0,
            turns: 0,
        };
        let mut heap = BinaryHeap::new();
        heap.push((Reverse(root.priority(self.target_len)), 0usize));
        let mut arena = vec![root];
        // Turn starts already expanded, with the fewest turns seen. Pops come
        // in refund order, so a later pop with no fewer turns is dominated.
        let mut fewest_turns: FxHashMap<Bits, u32> = FxHashMap::default();
        let mut nodes = 0u64;

        while let Some((_, index)) = heap.pop() {
            let node = &arena[index];
            if node.phase == Phase::Start {
                if fewest_turns
                    .get(&node.active)
                    .is_some_and(|&t| t <= node.turns)
                {
                    continue;
                }
                fewest_turns.insert(node.active.clone(), node.turns);
            }

            nodes += 1;
            if let Some(limit) = self.node_limit {
                if nodes > limit {
                    return Err(SolverError::NodeLimit {
                        model: self.name(),
                        limit,
                    });
                }
            }

            let children = match (node.phase, node.origin) {
                (Phase::Start, _) => {
                    if node.present == self.target_len && node.outside == 0 {
                        log_debug!(
                            self.verbosity,
                            "[{}] target reached: {} refunded, {} turns, {} nodes",
                            self.name(),
                            node.refunds,
                            node.turns,
                            nodes
                        );
                        return Ok(Some(self.extract(&arena, index)));
                    }
                    if node.turns < self.horizon {
                        self.additions(node, index, node, 0)
                    } else {
                        Vec::new()
                    }
                }
                (Phase::Adding, Some(opened)) => {
                    let start = &arena[opened];
                    let mut children = self.additions(node, opened, start, node.next);
                    children.extend(self.removals(node, opened, start, 0));
                    children.extend(self.turn_end(node, opened));
                    children
                }
                (Phase::Removing, Some(opened)) => {
                    let start = &arena[opened];
                    let mut children = self.removals(node, opened, start, node.next);
                    children.extend(self.turn_end(node, opened));
                    children
                }
                (_, None) => Vec::new(),
            };

            for child in children {
                if child.phase == Phase::Start
                    && fewest_turns
                        .get(&child.active)
                        .is_some_and(|&t| t <= child.turns)
                {
                    continue;
                }
                heap.push((Reverse(child.priority(self.target_len)), arena.len()));
                arena.push(child);
            }
        }

        log_debug!(
            self.verbosity,
            "[{}] target unreachable after {} nodes",
            self.name(),
            nodes
        );
        Ok(None)
    }

    /// One more addition to the turn opened by `start`.
    fn additions(&self, from: &Node, opened: usize, start: &Node, first: usize) -> Vec<Node> {
        let mut children = Vec::new();
        for (i, c) in self.facts.iter().enumerate().skip(first) {
            if from.active.contains(i) || from.invested + c.size > self.points {
                continue;
            }
            if !(c.exempt || start.affinity.covers(&c.requirement)) {
                continue;
            }
            children.push(Node {
                phase: Phase::Adding,
                active: from.active.with(i),
                affinity: from.affinity + c.bonus,
                origin: Some(opened),
                next: i + 1,
                held: from.held + c.size,
                invested: from.invested + c.size,
                outside: from.outside + if c.in_target { 0 } else { c.size },
                present: from.present + usize::from(c.in_target),
                refunds: from.refunds,
                turns: from.turns,
            });
        }
        children
    }

    /// One more removal of a constellation held when the turn opened.
    fn removals(&self, from: &Node, opened: usize, start: &Node, first: usize) -> Vec<Node> {
        let mut children = Vec::new();
        for (i, c) in self.facts.iter().enumerate().skip(first) {
            if !(start.active.contains(i) && from.active.contains(i)) {
                continue;
            }
            children.push(Node {
                phase: Phase::Removing,
                active: from.active.without(i),
                affinity: from.affinity - c.bonus,
                origin: Some(opened),
                next: i + 1,
                held: from.held - c.size,
                invested: from.invested,
                outside: from.outside - if c.in_target { 0 } else { c.size },
                present: from.present - usize::from(c.in_target),
                refunds: from.refunds + c.size,
                turns: from.turns,
            });
        }
        children
    }

    /// Close the turn if every non-self-sufficient survivor still holds.
    fn turn_end(&self, from: &Node, opened: usize) -> Option<Node> {
        let holds = self.facts.iter().enumerate().all(|(i, c)| {
            !from.active.contains(i) || c.self_sufficient || from.affinity.covers(&c.requirement)
        });
        holds.then(|| Node {
            phase: Phase::Start,
            active: from.active.clone(),
            affinity: from.affinity,
            origin: Some(opened),
            next: 0,
            held: from.held,
            invested: from.held,
            outside: from.outside,
            present: from.present,
            refunds: from.refunds,
            turns: from.turns + 1,
        })
    }

    /// Rebuild the plan ending at turn start `goal`. Each turn yields its
    /// additions as one step, then its removals (if any) as another.
    fn extract(&self, arena: &[Node], goal: usize) -> SequencePlan {
        let mut chain = vec![goal];
        let mut at = goal;
        while let Some(previous) = arena[at].origin {
            chain.push(previous);
            at = previous;
        }
        chain.reverse();

        let mut plan = SequencePlan {
            horizon: self.horizon,
            ..SequencePlan::default()
        };
        for pair in chain.windows(2) {
            let before = arena[pair[0]].active.to_set();
            let after = arena[pair[1]].active.to_set();
            let added: ConstellationSet = after.difference(&before).copied().collect();
            let removed: ConstellationSet = before.difference(&after).copied().collect();
            plan.turns += 1;

            let mut active = before;
            active.extend(added.iter().copied());
            plan.steps.push(PlanStep::new(
                self.graph,
                added,
                ConstellationSet::new(),
                active,
            ));
            if !removed.is_empty() {
                plan.refunds += self.graph.points_of(&removed);
                plan.steps.push(PlanStep::new(
                    self.graph,
                    ConstellationSet::new(),
                    removed,
                    after,
                ));
            }
        }
        plan
    }
}

//! Placing selected stars of incomplete constellations into a plan.

use std::collections::BTreeMap;

use crate::graph::{DevotionGraph, StarId};
use crate::interner::ConstellationId;
use crate::log_debug;

use super::{PlanStep, SequencePlan, SequencingError};

/// Insert each incomplete constellation's stars at the earliest step from
/// which every later step still meets its requirement and stays within
/// `points`; those steps' point totals grow by the inserted count.
///
/// An empty plan gets a single step without cluster actions.
pub fn insert_stragglers(
    graph: &DevotionGraph,
    plan: &mut SequencePlan,
    stragglers: &[StarId],
    points: u32,
    verbosity: u8,
) -> Result<(), SequencingError> {
    let mut grouped: BTreeMap<ConstellationId, Vec<StarId>> = BTreeMap::new();
    for &star in stragglers {
        grouped.entry(star.constellation).or_default().push(star);
    }
    if grouped.is_empty() {
        return Ok(());
    }
    if plan.steps.is_empty() {
        plan.steps.push(PlanStep::default());
    }

    for (c, mut stars) in grouped {
        stars.sort();
        let count = stars.len() as u32;
        let requirement = &graph.constellation(c).requirement;

        let mut first_legal = 0;
        for (k, step) in plan.steps.iter().enumerate().rev() {
            let legal = step.affinity.covers(requirement) && step.points + count <= points;
            if !legal {
                first_legal = k + 1;
                break;
            }
        }
        if first_legal == plan.steps.len() {
            return Err(SequencingError::StragglerPlacement(graph.name(c).to_string()));
        }

        log_debug!(
            verbosity,
            "[stragglers] {} star(s) of {} at step {}",
            count,
            graph.name(c),
            first_legal
        );
        plan.steps[first_legal].stragglers.extend(stars);
        for step in &mut plan.steps[first_legal..] {
            step.points += count;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::*;
    use crate::graph::{Affinity, ResourceVector};

    fn step(points: u32, affinity: ResourceVector) -> PlanStep {
        PlanStep {
            points,
            affinity,
            ..PlanStep::default()
        }
    }

    fn plan(steps: Vec<PlanStep>) -> SequencePlan {
        SequencePlan {
            steps,
            ..SequencePlan::default()
        }
    }

    #[test]
    fn test_earliest_step_within_budget() {
        // H has no requirement; the first step is already full.
        let graph = helper_graph();
        let h0 = graph.find_star("H", 0).unwrap();
        let mut p = plan(vec![
            step(5, ResourceVector::ZERO),
            step(3, ResourceVector::ZERO),
            step(3, ResourceVector::ZERO),
        ]);

        insert_stragglers(&graph, &mut p, &[h0], 5, 0).unwrap();
        let points: Vec<u32> = p.steps.iter().map(|s| s.points).collect();
        assert_eq!(points, vec![5, 4, 4]);
        assert_eq!(p.steps[1].stragglers, vec![h0]);
    }

    #[test]
    fn test_waits_for_affinity() {
        // B needs 2 chaos, granted from the second step on.
        let graph = two_step_graph();
        let b0 = graph.find_star("B", 0).unwrap();
        let chaos = vector(&[(Affinity::Chaos, 2)]);
        let mut p = plan(vec![step(0, ResourceVector::ZERO), step(3, chaos), step(3, chaos)]);

        insert_stragglers(&graph, &mut p, &[b0], 5, 0).unwrap();
        assert!(p.steps[0].stragglers.is_empty());
        assert_eq!(p.steps[1].stragglers, vec![b0]);
        assert_eq!(p.steps[0].points, 0);
        assert_eq!(p.steps[2].points, 4);
    }

    #[test]
    fn test_points_never_decrease_or_exceed_budget() {
        let graph = helper_graph();
        let stars = [graph.find_star("U", 0).unwrap(), graph.find_star("H", 0).unwrap()];
        let mut p = plan(vec![
            step(2, ResourceVector::ZERO),
            step(4, ResourceVector::ZERO),
            step(3, ResourceVector::ZERO),
        ]);
        let before: Vec<u32> = p.steps.iter().map(|s| s.points).collect();

        insert_stragglers(&graph, &mut p, &stars, 6, 0).unwrap();
        for (s, old) in p.steps.iter().zip(before) {
            assert!(s.points >= old);
            assert!(s.points <= 6);
        }
        assert_eq!(p.steps.last().unwrap().points, 5);
    }

    #[test]
    fn test_no_room_is_an_error() {
        let graph = helper_graph();
        let stars = [graph.find_star("H", 0).unwrap(), graph.find_star("H", 1).unwrap()];
        let mut p = plan(vec![step(2, ResourceVector::ZERO), step(4, ResourceVector::ZERO)]);

        assert_eq!(
            insert_stragglers(&graph, &mut p, &stars, 5, 0),
            Err(SequencingError::StragglerPlacement("H".to_string()))
        );
    }

    #[test]
    fn test_empty_plan_gets_a_step() {
        let graph = helper_graph();
        let h0 = graph.find_star("H", 0).unwrap();
        let mut p = SequencePlan::default();

        insert_stragglers(&graph, &mut p, &[h0], 5, 0).unwrap();
        assert_eq!(p.steps.len(), 1);
        assert!(p.steps[0].added.is_empty());
        assert_eq!(p.steps[0].points, 1);
        assert_eq!(p.steps[0].stragglers, vec![h0]);
    }
}

//! Totals of the rewards granted by a set of chosen stars.

use std::collections::BTreeMap;

use crate::graph::{DevotionGraph, StarId};
use crate::objective::Objective;
use crate::reward::Reward;

/// One line of the reward summary.
#[derive(Clone, Debug, PartialEq)]
pub struct RewardLine {
    pub kind: String,
    pub reward: Reward,
    /// Scalar value of `reward`.
    pub value: f64,
    /// Value times the objective weight of the kind.
    pub contribution: f64,
}

/// Aggregate the rewards of `stars`.
///
/// Plain amounts (also pet-scoped ones) are summed per kind; ranges, timed
/// and chance rewards are listed one by one. Lines are ordered by weighted
/// contribution, highest first, then by kind.
pub fn summarize(graph: &DevotionGraph, stars: &[StarId], objective: &Objective) -> Vec<RewardLine> {
    let mut aggregated: BTreeMap<String, Reward> = BTreeMap::new();
    let mut individual: Vec<Reward> = Vec::new();

    for &id in stars {
        for reward in &graph.star(id).rewards {
            if !reward.is_aggregatable() {
                individual.push(reward.clone());
                continue;
            }
            aggregated
                .entry(reward.kind_id())
                .and_modify(|total| add_amount(total, reward.value()))
                .or_insert_with(|| reward.clone());
        }
    }

    let mut lines: Vec<RewardLine> = aggregated
        .into_values()
        .chain(individual)
        .map(|reward| RewardLine {
            kind: reward.kind_id(),
            value: reward.value(),
            contribution: objective.reward_objective(&reward),
            reward,
        })
        .collect();
    lines.sort_by(|a, b| {
        b.contribution
            .total_cmp(&a.contribution)
            .then_with(|| a.kind.cmp(&b.kind))
    });
    lines
}

fn add_amount(total: &mut Reward, extra: f64) {
    match total {
        Reward::Flat { amount, .. } => *amount += extra,
        Reward::Pets { inner } => add_amount(inner, extra),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ResourceVector, StarDef};
    use crate::objective::PartialCreditTable;
    use std::collections::HashMap;

    #[test]
    fn test_aggregates_flat_and_lists_the_rest() {
        let mut builder = DevotionGraph::builder();
        let id = builder
            .add_constellation(
                "Toad",
                ResourceVector::ZERO,
                ResourceVector::ZERO,
                vec![
                    StarDef::default()
                        .with_reward(Reward::flat("Health", 40.0))
                        .with_reward(Reward::pets(Reward::flat("Health", 5.0))),
                    StarDef::default()
                        .after(0)
                        .with_reward(Reward::flat("Health", 60.0))
                        .with_reward(Reward::range("Fire Damage", 3.0, 6.0)),
                    StarDef::default()
                        .after(1)
                        .with_reward(Reward::range("Fire Damage", 2.0, 4.0)),
                ],
            )
            .unwrap();
        let graph = builder.build();
        let stars: Vec<StarId> = (0..3).map(|i| StarId::new(id, i)).collect();

        let weights: HashMap<String, f64> = [("Health".to_string(), 0.1), ("Fire Damage".to_string(), 1.0)]
            .into_iter()
            .collect();
        let objective = Objective::new(&weights, PartialCreditTable::standard());

        let lines = summarize(&graph, &stars, &objective);
        assert_eq!(lines.len(), 4);

        let health = lines.iter().find(|l| l.kind == "Health").unwrap();
        assert_eq!(health.value, 100.0);
        assert!((health.contribution - 10.0).abs() < 1e-9);

        let pets = lines.iter().find(|l| l.kind == "Pets.Health").unwrap();
        assert_eq!(pets.value, 5.0);
        assert_eq!(pets.contribution, 0.0);

        assert_eq!(lines.iter().filter(|l| l.kind == "Fire Damage").count(), 2);

        // Highest contribution first.
        assert_eq!(lines[0].kind, "Health");
        assert_eq!(lines[1].kind, "Fire Damage");
        assert_eq!(lines[1].value, 3.0);
        assert_eq!(lines.last().unwrap().kind, "Pets.Health");
    }
}

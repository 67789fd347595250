//! Objective evaluation: weighted reward kinds to per-star coefficients.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::HashMap;

use crate::graph::{DevotionGraph, Star, StarId};
use crate::reward::{Reward, PETS_PREFIX};

/// Aggregate kinds that also count, with a fractional credit, toward
/// more specific kinds.
#[derive(Clone, Debug, Default)]
pub struct PartialCreditTable {
    entries: FxHashMap<String, Vec<(String, f64)>>,
}

impl PartialCreditTable {
    /// The static table used by the planner.
    pub fn standard() -> Self {
        let elements = ["Fire", "Cold", "Lightning"];
        let mut table = Self::default();
        for prefix in ["", PETS_PREFIX] {
            table.insert(
                &format!("{}% Elemental Damage", prefix),
                elements
                    .iter()
                    .map(|e| (format!("{}% {} Damage", prefix, e), 1.0))
                    .collect(),
            );
            table.insert(
                &format!("{}% Elemental Resistance", prefix),
                elements
                    .iter()
                    .map(|e| (format!("{}% {} Resistance", prefix, e), 1.0))
                    .collect(),
            );
        }
        table
    }

    pub fn insert(&mut self, aggregate: &str, credits: Vec<(String, f64)>) {
        self.entries.insert(aggregate.to_string(), credits);
    }

    pub fn credits(&self, kind: &str) -> &[(String, f64)] {
        self.entries.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Weighted reward kinds plus partial credit.
#[derive(Clone, Debug)]
pub struct Objective {
    weights: FxHashMap<String, f64>,
    credits: PartialCreditTable,
}

impl Objective {
    pub fn new(weights: &HashMap<String, f64>, credits: PartialCreditTable) -> Self {
        Self {
            weights: weights.iter().map(|(k, &w)| (k.clone(), w)).collect(),
            credits,
        }
    }

    /// Direct weight of a kind (0 if not requested).
    #[inline]
    pub fn weight(&self, kind: &str) -> f64 {
        self.weights.get(kind).copied().unwrap_or(0.0)
    }

    /// Weight applied to a reward: direct weight, plus the inner kind's
    /// weight for chance rewards, plus partial credit.
    pub fn reward_weight(&self, reward: &Reward) -> f64 {
        let kind = reward.kind_id();
        let mut weight = self.weight(&kind);
        if let Reward::Chance { inner, .. } = reward {
            weight += self.weight(&inner.kind_id());
        }
        for (specific, credit) in self.credits.credits(&kind) {
            weight += credit * self.weight(specific);
        }
        weight
    }

    /// Contribution of one reward to the objective.
    pub fn reward_objective(&self, reward: &Reward) -> f64 {
        self.reward_weight(reward) * reward.value()
    }

    /// Coefficient of a star, or 0 if its weapon requirement is not met.
    pub fn star_objective(&self, star: &Star, weapons: &FxHashSet<String>) -> f64 {
        if let Some(required) = &star.weapon_requirement {
            if required.is_disjoint(weapons) {
                return 0.0;
            }
        }
        star.rewards.iter().map(|r| self.reward_objective(r)).sum()
    }

    /// Strictly positive star coefficients, skipping ignored stars.
    pub fn star_coefficients(
        &self,
        graph: &DevotionGraph,
        weapons: &FxHashSet<String>,
        ignore: &FxHashSet<StarId>,
    ) -> FxHashMap<StarId, f64> {
        graph
            .stars()
            .filter(|s| !ignore.contains(&s.id))
            .filter_map(|s| {
                let coeff = self.star_objective(s, weapons);
                (coeff > 0.0).then_some((s.id, coeff))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ResourceVector, StarDef};

    fn weights(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|&(k, w)| (k.to_string(), w)).collect()
    }

    #[test]
    fn test_direct_weight() {
        let objective = Objective::new(&weights(&[("Health", 0.5)]), PartialCreditTable::default());
        assert_eq!(objective.reward_objective(&Reward::flat("Health", 40.0)), 20.0);
        assert_eq!(objective.reward_objective(&Reward::flat("Armor", 40.0)), 0.0);
    }

    #[test]
    fn test_partial_credit_adds_to_direct_weight() {
        let objective = Objective::new(
            &weights(&[("% Fire Damage", 2.0), ("% Cold Damage", 1.0), ("% Elemental Damage", 0.5)]),
            PartialCreditTable::standard(),
        );
        // 0.5 direct + 2.0 fire + 1.0 cold
        let weight = objective.reward_weight(&Reward::flat("% Elemental Damage", 10.0));
        assert!((weight - 3.5).abs() < 1e-9);
        // Specific kinds don't pick up credit from the aggregate.
        assert_eq!(objective.reward_weight(&Reward::flat("% Fire Damage", 10.0)), 2.0);
    }

    #[test]
    fn test_chance_and_pets() {
        let objective = Objective::new(
            &weights(&[("Health", 1.0), ("Pets.Health", 3.0)]),
            PartialCreditTable::standard(),
        );
        let chance = Reward::chance(0.5, Reward::flat("Health", 10.0));
        assert!((objective.reward_objective(&chance) - 5.0).abs() < 1e-9);

        let pets = Reward::pets(Reward::flat("Health", 10.0));
        assert!((objective.reward_objective(&pets) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_weapon_filter_and_ignore() {
        let mut builder = DevotionGraph::builder();
        let id = builder
            .add_constellation(
                "Quill",
                ResourceVector::ZERO,
                ResourceVector::ZERO,
                vec![
                    StarDef::default().with_reward(Reward::flat("Health", 10.0)),
                    StarDef::default()
                        .after(0)
                        .with_reward(Reward::flat("Health", 10.0))
                        .with_weapons(&["sword"]),
                    StarDef::default().after(1).with_reward(Reward::flat("Armor", 10.0)),
                ],
            )
            .unwrap();
        let graph = builder.build();
        let objective = Objective::new(&weights(&[("Health", 1.0)]), PartialCreditTable::default());

        let no_sword = objective.star_coefficients(&graph, &FxHashSet::default(), &FxHashSet::default());
        assert_eq!(no_sword.len(), 1);
        assert_eq!(no_sword.get(&StarId::new(id, 0)), Some(&10.0));

        let swords: FxHashSet<String> = FxHashSet::from_iter(["sword".to_string()]);
        let ignore = FxHashSet::from_iter([StarId::new(id, 0)]);
        let coeffs = objective.star_coefficients(&graph, &swords, &ignore);
        assert_eq!(coeffs.len(), 1);
        assert_eq!(coeffs.get(&StarId::new(id, 1)), Some(&10.0));
    }
}

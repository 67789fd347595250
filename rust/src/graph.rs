//! Immutable devotion graph: constellations, stars, affinities.

use rustc_hash::FxHashSet;
use std::collections::{BTreeSet, VecDeque};
use std::ops::{Add, AddAssign, Sub};
use thiserror::Error;

use crate::interner::{normalize_name, ConstellationId, NameInterner};
use crate::reward::Reward;

/// Number of affinity (resource) dimensions.
pub const AFFINITY_COUNT: usize = 5;

/// Ordered set of constellations. Ordered so plans print deterministically.
pub type ConstellationSet = BTreeSet<ConstellationId>;

/// Errors raised while building a graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate constellation: {0}")]
    DuplicateConstellation(String),
    #[error("Unknown affinity: {0}")]
    UnknownAffinity(String),
    #[error("Constellation {0} has no stars")]
    EmptyConstellation(String),
    #[error("Star {star} of {constellation} has predecessor {predecessor} out of range")]
    PredecessorOutOfRange {
        constellation: String,
        star: u32,
        predecessor: u32,
    },
    #[error("Circular star predecessors in constellation {0}")]
    CircularPredecessors(String),
}

/// One affinity dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Affinity {
    Ascendant,
    Chaos,
    Eldritch,
    Order,
    Primordial,
}

impl Affinity {
    pub const ALL: [Affinity; AFFINITY_COUNT] = [
        Affinity::Ascendant,
        Affinity::Chaos,
        Affinity::Eldritch,
        Affinity::Order,
        Affinity::Primordial,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Affinity::Ascendant => "ascendant",
            Affinity::Chaos => "chaos",
            Affinity::Eldritch => "eldritch",
            Affinity::Order => "order",
            Affinity::Primordial => "primordial",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|a| a.name() == lowered)
    }
}

/// Fixed-dimension affinity vector. Comparisons are component-wise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResourceVector(pub [u32; AFFINITY_COUNT]);

impl ResourceVector {
    pub const ZERO: ResourceVector = ResourceVector([0; AFFINITY_COUNT]);

    /// Build from (affinity name, amount) pairs; repeated names add up.
    pub fn from_named(pairs: &[(String, u32)]) -> Result<Self, GraphError> {
        let mut v = Self::ZERO;
        for (name, amount) in pairs {
            let affinity =
                Affinity::from_name(name).ok_or_else(|| GraphError::UnknownAffinity(name.clone()))?;
            v.0[affinity.index()] += amount;
        }
        Ok(v)
    }

    #[inline]
    pub fn get(&self, affinity: Affinity) -> u32 {
        self.0[affinity.index()]
    }

    /// True if every component of `self` is at least the matching component of `required`.
    #[inline]
    pub fn covers(&self, required: &ResourceVector) -> bool {
        self.0.iter().zip(required.0.iter()).all(|(have, need)| have >= need)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&x| x == 0)
    }

    /// Non-zero components.
    pub fn iter(&self) -> impl Iterator<Item = (Affinity, u32)> + '_ {
        Affinity::ALL
            .into_iter()
            .map(|a| (a, self.get(a)))
            .filter(|&(_, amount)| amount > 0)
    }

    /// Named components, all dimensions included.
    pub fn to_named(&self) -> Vec<(String, u32)> {
        Affinity::ALL
            .into_iter()
            .map(|a| (a.name().to_string(), self.get(a)))
            .collect()
    }
}

impl Add for ResourceVector {
    type Output = ResourceVector;

    fn add(mut self, rhs: ResourceVector) -> ResourceVector {
        self += rhs;
        self
    }
}

impl AddAssign for ResourceVector {
    fn add_assign(&mut self, rhs: ResourceVector) {
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a += b;
        }
    }
}

/// Saturating component-wise subtraction.
impl Sub for ResourceVector {
    type Output = ResourceVector;

    fn sub(mut self, rhs: ResourceVector) -> ResourceVector {
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a = a.saturating_sub(*b);
        }
        self
    }
}

/// A star is addressed by its constellation and its index inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StarId {
    pub constellation: ConstellationId,
    pub index: u32,
}

impl StarId {
    pub fn new(constellation: ConstellationId, index: u32) -> Self {
        Self {
            constellation,
            index,
        }
    }
}

/// Star description used to build a constellation.
#[derive(Clone, Debug, Default)]
pub struct StarDef {
    pub rewards: Vec<Reward>,
    pub celestial_power: Option<String>,
    pub weapon_requirement: Vec<String>,
    pub predecessors: Vec<u32>,
}

impl StarDef {
    pub fn with_reward(mut self, reward: Reward) -> Self {
        self.rewards.push(reward);
        self
    }

    pub fn after(mut self, predecessor: u32) -> Self {
        self.predecessors.push(predecessor);
        self
    }

    pub fn with_power(mut self, name: &str) -> Self {
        self.celestial_power = Some(name.to_string());
        self
    }

    pub fn with_weapons(mut self, weapons: &[&str]) -> Self {
        self.weapon_requirement = weapons.iter().map(|w| w.to_string()).collect();
        self
    }
}

/// A selectable star.
#[derive(Clone, Debug)]
pub struct Star {
    pub id: StarId,
    pub rewards: Vec<Reward>,
    pub celestial_power: Option<String>,
    /// Equipment classes any of which unlocks this star's rewards.
    pub weapon_requirement: Option<FxHashSet<String>>,
    /// Indices (same constellation) that must be selected first.
    pub predecessors: Vec<u32>,
}

/// A group of stars with a shared affinity requirement and bonus.
#[derive(Clone, Debug)]
pub struct Constellation {
    pub id: ConstellationId,
    pub name: String,
    pub stars: Vec<Star>,
    pub requirement: ResourceVector,
    pub bonus: ResourceVector,
}

impl Constellation {
    /// Number of stars, i.e. devotion points needed to complete it.
    #[inline]
    pub fn size(&self) -> u32 {
        self.stars.len() as u32
    }

    /// A constellation whose own bonus meets its own requirement.
    pub fn is_self_sufficient(&self) -> bool {
        self.bonus.covers(&self.requirement)
    }
}

/// The validated, read-only devotion graph.
#[derive(Clone, Debug, Default)]
pub struct DevotionGraph {
    names: NameInterner,
    constellations: Vec<Constellation>,
}

impl DevotionGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    pub fn constellations(&self) -> &[Constellation] {
        &self.constellations
    }

    #[inline]
    pub fn constellation(&self, id: ConstellationId) -> &Constellation {
        &self.constellations[id.index()]
    }

    #[inline]
    pub fn star(&self, id: StarId) -> &Star {
        &self.constellation(id.constellation).stars[id.index as usize]
    }

    pub fn stars(&self) -> impl Iterator<Item = &Star> + '_ {
        self.constellations.iter().flat_map(|c| c.stars.iter())
    }

    pub fn star_count(&self) -> usize {
        self.constellations.iter().map(|c| c.stars.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.constellations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constellations.is_empty()
    }

    pub fn name(&self, id: ConstellationId) -> &str {
        self.names.resolve(id)
    }

    /// Forgiving name lookup (case, commas and apostrophes ignored).
    pub fn find_constellation(&self, name: &str) -> Option<ConstellationId> {
        self.names.find(name)
    }

    pub fn find_star(&self, constellation: &str, index: u32) -> Option<StarId> {
        let id = self.find_constellation(constellation)?;
        (index < self.constellation(id).size()).then(|| StarId::new(id, index))
    }

    pub fn find_celestial_power(&self, power: &str) -> Option<StarId> {
        let wanted = normalize_name(power);
        self.stars()
            .find(|s| {
                s.celestial_power
                    .as_deref()
                    .is_some_and(|p| normalize_name(p) == wanted)
            })
            .map(|s| s.id)
    }

    /// Sum of bonuses of the given constellations.
    pub fn affinity_of<'a>(
        &self,
        constellations: impl IntoIterator<Item = &'a ConstellationId>,
    ) -> ResourceVector {
        let mut total = ResourceVector::ZERO;
        for &c in constellations {
            total += self.constellation(c).bonus;
        }
        total
    }

    /// Total stars of the given constellations.
    pub fn points_of<'a>(&self, constellations: impl IntoIterator<Item = &'a ConstellationId>) -> u32 {
        constellations
            .into_iter()
            .map(|&c| self.constellation(c).size())
            .sum()
    }

    pub fn set_names(&self, set: &ConstellationSet) -> Vec<String> {
        set.iter().map(|&c| self.name(c).to_string()).collect()
    }
}

/// Incremental, validating graph construction.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    names: NameInterner,
    constellations: Vec<Constellation>,
}

impl GraphBuilder {
    /// Add a constellation. Stars are indexed in the order given.
    pub fn add_constellation(
        &mut self,
        name: &str,
        requirement: ResourceVector,
        bonus: ResourceVector,
        stars: Vec<StarDef>,
    ) -> Result<ConstellationId, GraphError> {
        if stars.is_empty() {
            return Err(GraphError::EmptyConstellation(name.to_string()));
        }
        check_predecessors(name, &stars)?;

        let id = self
            .names
            .insert(name)
            .ok_or_else(|| GraphError::DuplicateConstellation(name.to_string()))?;

        let stars = stars
            .into_iter()
            .enumerate()
            .map(|(i, def)| Star {
                id: StarId::new(id, i as u32),
                rewards: def.rewards,
                celestial_power: def.celestial_power,
                weapon_requirement: (!def.weapon_requirement.is_empty())
                    .then(|| def.weapon_requirement.into_iter().collect()),
                predecessors: def.predecessors,
            })
            .collect();

        self.constellations.push(Constellation {
            id,
            name: name.to_string(),
            stars,
            requirement,
            bonus,
        });
        Ok(id)
    }

    pub fn build(self) -> DevotionGraph {
        DevotionGraph {
            names: self.names,
            constellations: self.constellations,
        }
    }
}

/// Range-check predecessors and reject cycles (Kahn's algorithm).
fn check_predecessors(name: &str, stars: &[StarDef]) -> Result<(), GraphError> {
    let n = stars.len();
    let mut in_degree = vec![0usize; n];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, star) in stars.iter().enumerate() {
        for &p in &star.predecessors {
            if p as usize >= n {
                return Err(GraphError::PredecessorOutOfRange {
                    constellation: name.to_string(),
                    star: i as u32,
                    predecessor: p,
                });
            }
            successors[p as usize].push(i);
            in_degree[i] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut seen = 0;
    while let Some(i) = queue.pop_front() {
        seen += 1;
        for &s in &successors[i] {
            in_degree[s] -= 1;
            if in_degree[s] == 0 {
                queue.push_back(s);
            }
        }
    }

    if seen != n {
        return Err(GraphError::CircularPredecessors(name.to_string()));
    }
    Ok(())
}

/// Small graphs shared by the unit tests of several modules.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn vector(pairs: &[(Affinity, u32)]) -> ResourceVector {
        let mut v = ResourceVector::ZERO;
        for &(a, amount) in pairs {
            v.0[a.index()] += amount;
        }
        v
    }

    /// `size` stars in a chain, each carrying `reward_each` of "Health".
    pub fn chain(size: u32, reward_each: f64) -> Vec<StarDef> {
        (0..size)
            .map(|i| {
                let star = StarDef::default().with_reward(Reward::flat("Health", reward_each));
                if i == 0 {
                    star
                } else {
                    star.after(i - 1)
                }
            })
            .collect()
    }

    /// A (3 stars, grants 2 chaos) and B (2 stars, needs 2 chaos).
    pub fn two_step_graph() -> DevotionGraph {
        let mut builder = DevotionGraph::builder();
        builder
            .add_constellation(
                "A",
                ResourceVector::ZERO,
                vector(&[(Affinity::Chaos, 2)]),
                chain(3, 1.0),
            )
            .unwrap();
        builder
            .add_constellation(
                "B",
                vector(&[(Affinity::Chaos, 2)]),
                ResourceVector::ZERO,
                chain(2, 10.0),
            )
            .unwrap();
        builder.build()
    }

    /// Helper H must be bought to enter T and then dropped to afford U.
    ///
    /// H: 2 stars, grants 1 chaos. T: 3 stars, needs 1 chaos, grants 1 chaos.
    /// U: 2 stars, grants 1 order.
    pub fn helper_graph() -> DevotionGraph {
        let mut builder = DevotionGraph::builder();
        builder
            .add_constellation(
                "H",
                ResourceVector::ZERO,
                vector(&[(Affinity::Chaos, 1)]),
                chain(2, 0.0),
            )
            .unwrap();
        builder
            .add_constellation(
                "T",
                vector(&[(Affinity::Chaos, 1)]),
                vector(&[(Affinity::Chaos, 1)]),
                chain(3, 5.0),
            )
            .unwrap();
        builder
            .add_constellation(
                "U",
                ResourceVector::ZERO,
                vector(&[(Affinity::Order, 1)]),
                chain(2, 1.0),
            )
            .unwrap();
        builder.build()
    }

    /// Sixteen constellations. Anvil and Bell each grant what the other
    /// needs, so whichever goes first needs a helper.
    ///
    /// Anvil: 3 stars, needs 2 order, grants 2 chaos (10 Health per star).
    /// Bell: 3 stars, needs 2 chaos, grants 2 order (10 Health per star).
    /// Cheapest helper is Lantern (2 stars, 2 order); the cheapest chaos
    /// source without a requirement is Cinder (3 stars, 2 chaos).
    pub fn mutual_support_graph() -> DevotionGraph {
        use Affinity::{Ascendant, Chaos, Eldritch, Order, Primordial};

        let layout: [(&str, &[(Affinity, u32)], &[(Affinity, u32)], u32, f64); 16] = [
            ("Xa", &[], &[(Ascendant, 1)], 1, 0.0),
            ("Xc", &[], &[(Chaos, 1)], 1, 0.0),
            ("Xe", &[], &[(Eldritch, 1)], 1, 0.0),
            ("Xo", &[], &[(Order, 1)], 1, 0.0),
            ("Xp", &[], &[(Primordial, 1)], 1, 0.0),
            ("Anvil", &[(Order, 2)], &[(Chaos, 2)], 3, 10.0),
            ("Bell", &[(Chaos, 2)], &[(Order, 2)], 3, 10.0),
            ("Lantern", &[], &[(Order, 2)], 2, 0.0),
            ("Mast", &[], &[(Order, 3)], 4, 0.0),
            ("Cinder", &[], &[(Chaos, 2)], 3, 0.0),
            ("Forge", &[(Order, 1)], &[(Chaos, 3)], 4, 0.0),
            ("Quay", &[(Chaos, 1)], &[(Order, 2)], 2, 0.0),
            ("Drum", &[], &[(Primordial, 2)], 4, 0.0),
            ("Eel", &[(Primordial, 1)], &[(Eldritch, 1)], 3, 0.0),
            ("Gull", &[], &[(Ascendant, 1)], 2, 0.0),
            ("Harp", &[(Ascendant, 1)], &[(Eldritch, 2)], 3, 0.0),
        ];

        let mut builder = DevotionGraph::builder();
        for (name, requirement, bonus, size, reward) in layout {
            builder
                .add_constellation(name, vector(requirement), vector(bonus), chain(size, reward))
                .unwrap();
        }
        builder.build()
    }

    pub fn set(graph: &DevotionGraph, names: &[&str]) -> ConstellationSet {
        names
            .iter()
            .map(|n| graph.find_constellation(n).unwrap())
            .collect()
    }
}

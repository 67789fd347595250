//! Typed star rewards and their scalar value formulas.

/// Prefix that scopes a reward kind to pets.
pub const PETS_PREFIX: &str = "Pets.";

/// Prefix of the kind id of a probability-weighted reward.
pub const CHANCE_PREFIX: &str = "Chance of ";

/// A single bonus granted by a star.
#[derive(Clone, Debug, PartialEq)]
pub enum Reward {
    /// Plain amount (flat stats and percentage modifiers).
    Flat { kind: String, amount: f64 },
    /// Min/max damage-like range.
    Range { kind: String, min: f64, max: f64 },
    /// Rate applied for a duration (damage over time, timed reductions).
    OverTime {
        kind: String,
        rate: f64,
        duration: f64,
    },
    /// Modifier with separate damage and duration parts.
    DualModifier {
        kind: String,
        damage: f64,
        duration: f64,
    },
    /// Inner reward that only applies with some probability.
    Chance { probability: f64, inner: Box<Reward> },
    /// Inner reward that applies to pets instead of the player.
    Pets { inner: Box<Reward> },
}

impl Reward {
    pub fn flat(kind: &str, amount: f64) -> Self {
        Reward::Flat {
            kind: kind.to_string(),
            amount,
        }
    }

    pub fn range(kind: &str, min: f64, max: f64) -> Self {
        Reward::Range {
            kind: kind.to_string(),
            min,
            max,
        }
    }

    pub fn over_time(kind: &str, rate: f64, duration: f64) -> Self {
        Reward::OverTime {
            kind: kind.to_string(),
            rate,
            duration,
        }
    }

    pub fn dual_modifier(kind: &str, damage: f64, duration: f64) -> Self {
        Reward::DualModifier {
            kind: kind.to_string(),
            damage,
            duration,
        }
    }

    pub fn chance(probability: f64, inner: Reward) -> Self {
        Reward::Chance {
            probability,
            inner: Box::new(inner),
        }
    }

    pub fn pets(inner: Reward) -> Self {
        Reward::Pets {
            inner: Box::new(inner),
        }
    }

    /// Identifier the objective weights are keyed by.
    pub fn kind_id(&self) -> String {
        match self {
            Reward::Flat { kind, .. }
            | Reward::Range { kind, .. }
            | Reward::OverTime { kind, .. }
            | Reward::DualModifier { kind, .. } => kind.clone(),
            Reward::Chance { inner, .. } => format!("{}{}", CHANCE_PREFIX, inner.kind_id()),
            Reward::Pets { inner } => format!("{}{}", PETS_PREFIX, inner.kind_id()),
        }
    }

    /// Scalar value used by the objective.
    ///
    /// Ranges count their minimum; timed rewards multiply rate by duration;
    /// chance rewards scale the inner value by the probability.
    pub fn value(&self) -> f64 {
        match self {
            Reward::Flat { amount, .. } => *amount,
            Reward::Range { min, .. } => *min,
            Reward::OverTime { rate, duration, .. } => rate * duration,
            Reward::DualModifier {
                damage, duration, ..
            } => damage + duration,
            Reward::Chance { probability, inner } => probability * inner.value(),
            Reward::Pets { inner } => inner.value(),
        }
    }

    /// Rewards that can be summed with others of the same kind in a report.
    pub fn is_aggregatable(&self) -> bool {
        match self {
            Reward::Flat { .. } => true,
            Reward::Pets { inner } => matches!(**inner, Reward::Flat { .. }),
            _ => false,
        }
    }

    /// Human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Reward::Flat { kind, amount } => format!("{} {}", fmt_val(*amount), kind),
            Reward::Range { kind, min, max } => {
                format!("{}-{} {}", fmt_val(*min), fmt_val(*max), kind)
            }
            Reward::OverTime {
                kind,
                rate,
                duration,
            } => format!("{} {} over {}s", fmt_val(*rate), kind, fmt_val(*duration)),
            Reward::DualModifier {
                kind,
                damage,
                duration,
            } => format!(
                "{}% {} with {}% duration",
                fmt_val(*damage),
                kind,
                fmt_val(*duration)
            ),
            Reward::Chance { probability, inner } => {
                format!("{}% chance of {}", fmt_val(probability * 100.0), inner.describe())
            }
            Reward::Pets { inner } => format!("{} to pets", inner.describe()),
        }
    }
}

/// Format with the fewest of 0, 1 or 2 decimal places that is exact.
pub fn fmt_val(val: f64) -> String {
    for places in 0..=2 {
        let scale = 10f64.powi(places);
        if ((val * scale).round() / scale - val).abs() < 1e-6 {
            return format!("{:.*}", places as usize, val);
        }
    }
    format!("{}", val)
}

//! Per-actor stat block

mod stat_value;

pub use stat_value::StatValue;

use serde::{Deserialize, Serialize};

/// Stats the engine reads when resolving casts, ticks and cast speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Strength,
    Agility,
    Intellect,
    SpellPower,
    AttackPower,
    SpellHitRating,
    MeleeHitRating,
    SpellCritRating,
    MeleeCritRating,
    HasteRating,
    MasteryRating,
    ExpertiseRating,
}

impl Stat {
    pub const COUNT: usize = 12;

    pub fn all() -> &'static [Stat] {
        &[
            Stat::Strength,
            Stat::Agility,
            Stat::Intellect,
            Stat::SpellPower,
            Stat::AttackPower,
            Stat::SpellHitRating,
            Stat::MeleeHitRating,
            Stat::SpellCritRating,
            Stat::MeleeCritRating,
            Stat::HasteRating,
            Stat::MasteryRating,
            Stat::ExpertiseRating,
        ]
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Current stats of one actor.
///
/// Also carries the cast-speed and attack-speed multipliers, which are not
/// rating-based (e.g. a 20% haste buff multiplies one of them by 1.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatBlock {
    values: [StatValue; Stat::COUNT],
    cast_speed: StatValue,
    attack_speed: StatValue,
}

impl Default for StatBlock {
    fn default() -> Self {
        StatBlock {
            values: [StatValue::default(); Stat::COUNT],
            cast_speed: StatValue::with_base(1.0),
            attack_speed: StatValue::with_base(1.0),
        }
    }
}

impl StatBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style base value
    pub fn with(mut self, stat: Stat, base: f64) -> Self {
        self.values[stat.index()].base = base;
        self
    }

    pub fn get(&self, stat: Stat) -> f64 {
        self.values[stat.index()].compute()
    }

    pub fn value(&self, stat: Stat) -> &StatValue {
        &self.values[stat.index()]
    }

    pub fn value_mut(&mut self, stat: Stat) -> &mut StatValue {
        &mut self.values[stat.index()]
    }

    pub fn add_flat(&mut self, stat: Stat, amount: f64) {
        self.values[stat.index()].add_flat(amount);
    }

    /// Add an increased% (0.1 = 10%) to a stat
    pub fn add_increased(&mut self, stat: Stat, amount: f64) {
        self.values[stat.index()].add_increased(amount);
    }

    fn rating_haste(&self, haste_rating_per_percent: f64) -> f64 {
        1.0 + self.get(Stat::HasteRating) / haste_rating_per_percent / 100.0
    }

    /// Product of rating haste and multiplicative cast speed effects
    pub fn cast_speed(&self, haste_rating_per_percent: f64) -> f64 {
        self.rating_haste(haste_rating_per_percent) * self.cast_speed.compute()
    }

    pub fn multiply_cast_speed(&mut self, factor: f64) {
        self.cast_speed.multiply(factor);
    }

    /// Swing speed factor: rating haste times attack speed effects
    pub fn attack_speed(&self, haste_rating_per_percent: f64) -> f64 {
        self.rating_haste(haste_rating_per_percent) * self.attack_speed.compute()
    }

    pub fn multiply_attack_speed(&mut self, factor: f64) {
        self.attack_speed.multiply(factor);
    }
}

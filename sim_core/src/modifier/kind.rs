//! Modifier kinds and configuration

use crate::types::{ClassMask, SpellSchool};
use serde::{Deserialize, Serialize};

/// What a modifier adjusts and how it combines.
///
/// Flat kinds add; percent kinds multiply by `1 + value`. Time-valued flat
/// kinds are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    DamageFlat,
    DamagePercent,
    CostFlat,
    CostPercent,
    CastTimeFlat,
    CastTimePercent,
    CooldownFlat,
    CooldownPercent,
    GcdFlat,
    /// Additive crit chance (0.05 = +5%)
    CritChance,
    /// Additive hit chance
    HitChance,
    /// Multiplies the crit damage bonus
    CritMultiplierPercent,
}

/// The quantity a group of kinds contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Damage,
    Cost,
    CastTime,
    Cooldown,
    Gcd,
    CritChance,
    HitChance,
    CritMultiplier,
}

impl ModifierKind {
    pub fn is_percent(self) -> bool {
        matches!(
            self,
            ModifierKind::DamagePercent
                | ModifierKind::CostPercent
                | ModifierKind::CastTimePercent
                | ModifierKind::CooldownPercent
                | ModifierKind::CritMultiplierPercent
        )
    }

    pub fn quantity(self) -> Quantity {
        match self {
            ModifierKind::DamageFlat | ModifierKind::DamagePercent => Quantity::Damage,
            ModifierKind::CostFlat | ModifierKind::CostPercent => Quantity::Cost,
            ModifierKind::CastTimeFlat | ModifierKind::CastTimePercent => Quantity::CastTime,
            ModifierKind::CooldownFlat | ModifierKind::CooldownPercent => Quantity::Cooldown,
            ModifierKind::GcdFlat => Quantity::Gcd,
            ModifierKind::CritChance => Quantity::CritChance,
            ModifierKind::HitChance => Quantity::HitChance,
            ModifierKind::CritMultiplierPercent => Quantity::CritMultiplier,
        }
    }
}

impl Quantity {
    /// (flat kind, percent kind) feeding this quantity
    pub fn kinds(self) -> (Option<ModifierKind>, Option<ModifierKind>) {
        match self {
            Quantity::Damage => (Some(ModifierKind::DamageFlat), Some(ModifierKind::DamagePercent)),
            Quantity::Cost => (Some(ModifierKind::CostFlat), Some(ModifierKind::CostPercent)),
            Quantity::CastTime => (
                Some(ModifierKind::CastTimeFlat),
                Some(ModifierKind::CastTimePercent),
            ),
            Quantity::Cooldown => (
                Some(ModifierKind::CooldownFlat),
                Some(ModifierKind::CooldownPercent),
            ),
            Quantity::Gcd => (Some(ModifierKind::GcdFlat), None),
            Quantity::CritChance => (Some(ModifierKind::CritChance), None),
            Quantity::HitChance => (Some(ModifierKind::HitChance), None),
            Quantity::CritMultiplier => (None, Some(ModifierKind::CritMultiplierPercent)),
        }
    }
}

/// Registration data for a modifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierConfig {
    pub kind: ModifierKind,
    pub value: f64,
    /// Abilities whose class mask intersects this one are affected
    pub class_mask: ClassMask,
    /// Optional school restriction, matched by intersection as well
    #[serde(default)]
    pub school: Option<SpellSchool>,
}

impl ModifierConfig {
    pub fn new(kind: ModifierKind, value: f64, class_mask: ClassMask) -> Self {
        ModifierConfig {
            kind,
            value,
            class_mask,
            school: None,
        }
    }

    pub fn with_school(mut self, school: SpellSchool) -> Self {
        self.school = Some(school);
        self
    }
}

/// What a modifier lookup is made for: an ability's mask and school
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierQuery {
    pub mask: ClassMask,
    pub school: SpellSchool,
}

impl ModifierQuery {
    pub fn new(mask: ClassMask, school: SpellSchool) -> Self {
        ModifierQuery { mask, school }
    }

    /// Query by mask only; school-restricted modifiers never match
    pub fn mask(mask: ClassMask) -> Self {
        ModifierQuery {
            mask,
            school: SpellSchool::empty(),
        }
    }

    pub(crate) fn matches(&self, config: &ModifierConfig) -> bool {
        if !config.class_mask.matches(self.mask) {
            return false;
        }
        match config.school {
            Some(school) => school.intersects(self.school),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_kinds() {
        assert!(ModifierKind::DamagePercent.is_percent());
        assert!(!ModifierKind::DamageFlat.is_percent());
        assert!(!ModifierKind::CritChance.is_percent());
    }

    #[test]
    fn test_kinds_round_trip_quantity() {
        for quantity in [
            Quantity::Damage,
            Quantity::Cost,
            Quantity::CastTime,
            Quantity::Cooldown,
            Quantity::Gcd,
            Quantity::CritChance,
            Quantity::HitChance,
            Quantity::CritMultiplier,
        ] {
            let (flat, pct) = quantity.kinds();
            for kind in flat.into_iter().chain(pct) {
                assert_eq!(kind.quantity(), quantity);
            }
        }
    }

    #[test]
    fn test_query_school_restriction() {
        let frost_only = ModifierConfig::new(ModifierKind::DamageFlat, 0.1, ClassMask::ALL)
            .with_school(SpellSchool::FROST);

        let frost_strike = ModifierQuery::new(ClassMask::tag(2), SpellSchool::FROST);
        let plague = ModifierQuery::new(ClassMask::tag(3), SpellSchool::SHADOW);
        assert!(frost_strike.matches(&frost_only));
        assert!(!plague.matches(&frost_only));
        assert!(!ModifierQuery::mask(ClassMask::tag(2)).matches(&frost_only));
    }
}

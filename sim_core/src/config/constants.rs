//! Tunable combat constants

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Constants of the combat formulas.
///
/// Chances are fractions (0.17 = 17%). Ratings convert to chance through the
/// `*_rating_per_percent` factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConstants {
    /// Spell miss chance against the encounter target before hit bonuses
    #[serde(default = "default_base_spell_miss")]
    pub base_spell_miss: f64,
    /// Melee miss chance for special attacks
    #[serde(default = "default_base_melee_miss")]
    pub base_melee_miss: f64,
    /// Extra miss chance for auto attacks (dual-wield penalty folded in by content)
    #[serde(default)]
    pub auto_attack_miss_bonus: f64,
    #[serde(default = "default_base_dodge")]
    pub base_dodge: f64,
    /// Chance that an auto attack glances
    #[serde(default = "default_glance_chance")]
    pub glance_chance: f64,
    /// Damage multiplier of a glancing blow
    #[serde(default = "default_glance_multiplier")]
    pub glance_multiplier: f64,

    #[serde(default = "default_crit_rating_per_percent")]
    pub crit_rating_per_percent: f64,
    #[serde(default = "default_hit_rating_per_percent")]
    pub hit_rating_per_percent: f64,
    #[serde(default = "default_haste_rating_per_percent")]
    pub haste_rating_per_percent: f64,
    #[serde(default = "default_expertise_rating_per_percent")]
    pub expertise_rating_per_percent: f64,

    #[serde(default = "default_spell_crit_multiplier")]
    pub spell_crit_multiplier: f64,
    #[serde(default = "default_melee_crit_multiplier")]
    pub melee_crit_multiplier: f64,
    /// Attack power that adds one point of weapon damage per second of swing
    #[serde(default = "default_attack_power_per_dps")]
    pub attack_power_per_dps: f64,

    #[serde(rename = "gcd_secs", default = "default_gcd", with = "super::secs")]
    pub gcd: Duration,
    #[serde(rename = "min_gcd_secs", default = "default_min_gcd", with = "super::secs")]
    pub min_gcd: Duration,
    /// Period of the explicit resource regeneration action
    #[serde(rename = "regen_interval_secs", default = "default_regen_interval", with = "super::secs")]
    pub regen_interval: Duration,
}

impl Default for CombatConstants {
    fn default() -> Self {
        CombatConstants {
            base_spell_miss: default_base_spell_miss(),
            base_melee_miss: default_base_melee_miss(),
            auto_attack_miss_bonus: 0.0,
            base_dodge: default_base_dodge(),
            glance_chance: default_glance_chance(),
            glance_multiplier: default_glance_multiplier(),
            crit_rating_per_percent: default_crit_rating_per_percent(),
            hit_rating_per_percent: default_hit_rating_per_percent(),
            haste_rating_per_percent: default_haste_rating_per_percent(),
            expertise_rating_per_percent: default_expertise_rating_per_percent(),
            spell_crit_multiplier: default_spell_crit_multiplier(),
            melee_crit_multiplier: default_melee_crit_multiplier(),
            attack_power_per_dps: default_attack_power_per_dps(),
            gcd: default_gcd(),
            min_gcd: default_min_gcd(),
            regen_interval: default_regen_interval(),
        }
    }
}

impl CombatConstants {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chances = [
            ("base_spell_miss", self.base_spell_miss),
            ("base_melee_miss", self.base_melee_miss),
            ("base_dodge", self.base_dodge),
            ("glance_chance", self.glance_chance),
        ];
        for (name, value) in chances {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let factors = [
            ("crit_rating_per_percent", self.crit_rating_per_percent),
            ("hit_rating_per_percent", self.hit_rating_per_percent),
            ("haste_rating_per_percent", self.haste_rating_per_percent),
            ("expertise_rating_per_percent", self.expertise_rating_per_percent),
            ("attack_power_per_dps", self.attack_power_per_dps),
        ];
        for (name, value) in factors {
            if value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        if self.min_gcd > self.gcd {
            return Err(ConfigError::ValidationError(
                "min_gcd_secs cannot exceed gcd_secs".to_string(),
            ));
        }
        if self.regen_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "regen_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_attack_power_per_dps() -> f64 {
    14.0
}

fn default_base_spell_miss() -> f64 {
    0.17
}
fn default_base_melee_miss() -> f64 {
    0.08
}
fn default_base_dodge() -> f64 {
    0.065
}
fn default_glance_chance() -> f64 {
    0.24
}
fn default_glance_multiplier() -> f64 {
    0.75
}
fn default_crit_rating_per_percent() -> f64 {
    179.28
}
fn default_hit_rating_per_percent() -> f64 {
    102.45
}
fn default_haste_rating_per_percent() -> f64 {
    128.06
}
fn default_expertise_rating_per_percent() -> f64 {
    120.11
}
fn default_spell_crit_multiplier() -> f64 {
    1.5
}
fn default_melee_crit_multiplier() -> f64 {
    2.0
}
fn default_gcd() -> Duration {
    Duration::from_millis(1500)
}
fn default_min_gcd() -> Duration {
    Duration::from_secs(1)
}
fn default_regen_interval() -> Duration {
    Duration::from_secs(2)
}

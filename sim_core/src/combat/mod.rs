//! Combat - outcome resolution and damage/heal application
//!
//! Chances are always computed from the caster's stats and modifiers at the
//! moment of the roll, never cached from cast start.

mod damage;
mod outcome;
mod swing;

pub use damage::Landing;
pub use outcome::{resolve, AttackChances, Outcome, OutcomeMode};
pub use swing::AutoAttackConfig;
pub(crate) use swing::SwingTimer;

use crate::error::SimResult;
use crate::modifier::{ModifierKind, ModifierQuery, Quantity};
use crate::sim::Simulation;
use crate::stats::Stat;
use crate::types::ActorId;

impl Simulation {
    /// Current attack table of `caster` for an ability or tick
    pub fn attack_chances(
        &self,
        caster: ActorId,
        mode: OutcomeMode,
        query: &ModifierQuery,
    ) -> SimResult<AttackChances> {
        let actor = self.actor(caster)?;
        let constants = &self.config.constants;
        let stats = &actor.stats;
        let hit_bonus = actor.modifiers.effective_value_for(query, ModifierKind::HitChance);
        let crit_bonus = actor.modifiers.effective_value_for(query, ModifierKind::CritChance);

        let chances = if mode.is_melee() {
            let hit = stats.get(Stat::MeleeHitRating) / constants.hit_rating_per_percent / 100.0;
            let expertise =
                stats.get(Stat::ExpertiseRating) / constants.expertise_rating_per_percent / 100.0;
            let auto_penalty = if mode == OutcomeMode::MeleeAuto {
                constants.auto_attack_miss_bonus
            } else {
                0.0
            };
            AttackChances {
                miss: constants.base_melee_miss + auto_penalty - hit - hit_bonus,
                dodge: constants.base_dodge - expertise,
                glance: if mode == OutcomeMode::MeleeAuto {
                    constants.glance_chance
                } else {
                    0.0
                },
                crit: stats.get(Stat::MeleeCritRating) / constants.crit_rating_per_percent / 100.0
                    + crit_bonus,
            }
        } else {
            let hit = stats.get(Stat::SpellHitRating) / constants.hit_rating_per_percent / 100.0;
            AttackChances {
                miss: constants.base_spell_miss - hit - hit_bonus,
                dodge: 0.0,
                glance: 0.0,
                crit: stats.get(Stat::SpellCritRating) / constants.crit_rating_per_percent / 100.0
                    + crit_bonus,
            }
        };

        Ok(AttackChances {
            miss: chances.miss.clamp(0.0, 1.0),
            dodge: chances.dodge.clamp(0.0, 1.0),
            glance: chances.glance.clamp(0.0, 1.0),
            crit: chances.crit.clamp(0.0, 1.0),
        })
    }

    /// Damage multiplier of a critical strike. Crit-multiplier modifiers
    /// scale the bonus part, so +50% on a 2.0 multiplier gives 2.5.
    pub fn crit_multiplier(&self, caster: ActorId, mode: OutcomeMode, query: &ModifierQuery) -> SimResult<f64> {
        let actor = self.actor(caster)?;
        let constants = &self.config.constants;
        let base = if mode.is_melee() {
            constants.melee_crit_multiplier
        } else {
            constants.spell_crit_multiplier
        };
        let bonus = actor.modifiers.apply(query, Quantity::CritMultiplier, base - 1.0);
        Ok(1.0 + bonus)
    }

    /// Roll an outcome for `caster` with chances read right now
    pub fn roll_outcome(&mut self, caster: ActorId, mode: OutcomeMode, query: &ModifierQuery) -> SimResult<Outcome> {
        if matches!(mode, OutcomeMode::AlwaysHit | OutcomeMode::Tick) {
            return Ok(Outcome::Hit);
        }
        let chances = self.attack_chances(caster, mode, query)?;
        Ok(resolve(mode, &chances, &mut self.rng))
    }
}

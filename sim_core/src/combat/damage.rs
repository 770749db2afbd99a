//! Damage and healing application

use super::Outcome;
use crate::aura::AuraEvent;
use crate::error::SimResult;
use crate::modifier::{ModifierQuery, Quantity};
use crate::sim::{SimEvent, Simulation};
use crate::types::{AbilityId, ActorId, ProcMask, ResourceKind};
use tracing::trace;

/// A final amount of damage or healing about to be applied
#[derive(Debug, Clone, PartialEq)]
pub struct Landing {
    pub caster: ActorId,
    pub target: ActorId,
    /// Metrics key: the ability or periodic effect label
    pub source: String,
    pub ability: Option<AbilityId>,
    pub proc_mask: ProcMask,
    pub outcome: Outcome,
    pub amount: f64,
    pub periodic: bool,
    pub healing: bool,
}

impl Simulation {
    /// Direct damage from an ability: caster damage modifiers, then glance
    /// or crit scaling. Misses and dodges deal nothing. Returns the amount dealt.
    pub fn deal_damage(
        &mut self,
        caster: ActorId,
        target: ActorId,
        ability: AbilityId,
        base: f64,
        outcome: Outcome,
    ) -> SimResult<f64> {
        self.direct(caster, target, ability, base, outcome, false)
    }

    /// Direct healing from an ability, scaled like damage
    pub fn heal(
        &mut self,
        caster: ActorId,
        target: ActorId,
        ability: AbilityId,
        base: f64,
        outcome: Outcome,
    ) -> SimResult<f64> {
        self.direct(caster, target, ability, base, outcome, true)
    }

    fn direct(
        &mut self,
        caster: ActorId,
        target: ActorId,
        ability: AbilityId,
        base: f64,
        outcome: Outcome,
        healing: bool,
    ) -> SimResult<f64> {
        if !outcome.landed() {
            return Ok(0.0);
        }
        let config = self.ability_config(ability)?;
        let query = ModifierQuery::new(config.class_mask, config.school);
        let mut amount = self
            .actor(caster)?
            .modifiers
            .apply(&query, Quantity::Damage, base)
            .max(0.0);
        match outcome {
            Outcome::Glance => amount *= self.config.constants.glance_multiplier,
            Outcome::Crit => amount *= self.crit_multiplier(caster, config.outcome, &query)?,
            _ => {}
        }

        self.land(Landing {
            caster,
            target,
            source: config.label.clone(),
            ability: Some(ability),
            proc_mask: config.proc_mask,
            outcome,
            amount,
            periodic: false,
            healing,
        })
    }

    /// Apply a final amount: move the target's health, record metrics,
    /// emit the hit and let the caster's auras observe it
    pub fn land(&mut self, landing: Landing) -> SimResult<f64> {
        let Landing {
            caster,
            target,
            amount,
            outcome,
            healing,
            periodic,
            ..
        } = landing;

        if let Ok(health) = self.actor_mut(target)?.resources.pool_mut(ResourceKind::Health) {
            if healing {
                health.gain(amount);
            } else {
                let dealt = amount.min(health.current());
                health.spend(dealt)?;
            }
        }

        if let Some(metrics) = self.metrics.actor_mut(caster) {
            if healing {
                metrics.healing_done += amount;
            } else {
                metrics.damage_done += amount;
            }
            let source = metrics.ability_mut(&landing.source);
            if healing {
                source.healing += amount;
            } else {
                source.damage += amount;
            }
            if periodic && outcome.is_crit() {
                source.crit_ticks += 1;
            }
        }

        trace!(time = ?self.now(), %caster, %target, source = %landing.source, amount, ?outcome, "hit");
        self.emit(SimEvent::Hit {
            caster,
            target,
            source: landing.source,
            outcome,
            amount,
            periodic,
            healing,
        })?;
        self.notify_actor_auras(
            caster,
            AuraEvent::HitDealt {
                target,
                ability: landing.ability,
                outcome,
                amount,
                proc_mask: landing.proc_mask,
            },
        )?;
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AbilityConfig;
    use crate::config::SimConfig;
    use crate::modifier::{ModifierConfig, ModifierKind};
    use crate::resource::ResourcePool;
    use crate::sim::ActorConfig;
    use crate::types::ClassMask;

    const BOLT: ClassMask = ClassMask::tag(1);

    fn setup() -> (Simulation, ActorId, ActorId, AbilityId) {
        let mut sim = Simulation::new(SimConfig::default()).unwrap();
        let mage = sim.add_actor(ActorConfig::new("mage"));
        let dummy = sim.add_actor(
            ActorConfig::new("dummy").with_pool(ResourcePool::new(ResourceKind::Health, 1000.0)),
        );
        let bolt = sim
            .register_ability(AbilityConfig::new("frostbolt").with_mask(BOLT))
            .unwrap();
        (sim, mage, dummy, bolt)
    }

    #[test]
    fn test_flat_then_percent_then_crit() {
        let (mut sim, mage, dummy, bolt) = setup();
        let registry = sim.modifiers_mut(mage).unwrap();
        for config in [
            ModifierConfig::new(ModifierKind::DamageFlat, 50.0, BOLT),
            ModifierConfig::new(ModifierKind::DamageFlat, 30.0, BOLT),
            ModifierConfig::new(ModifierKind::DamagePercent, 0.2, BOLT),
        ] {
            let id = registry.register(config);
            registry.activate(id).unwrap();
        }

        let hit = sim.deal_damage(mage, dummy, bolt, 100.0, Outcome::Hit).unwrap();
        assert!((hit - 216.0).abs() < 1e-9);
        let crit = sim.deal_damage(mage, dummy, bolt, 100.0, Outcome::Crit).unwrap();
        assert!((crit - 216.0 * 1.5).abs() < 1e-9);
        assert!((sim.metrics().actors[0].damage_done - 216.0 * 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_miss_deals_nothing() {
        let (mut sim, mage, dummy, bolt) = setup();
        assert_eq!(sim.deal_damage(mage, dummy, bolt, 100.0, Outcome::Miss).unwrap(), 0.0);
        assert_eq!(sim.current_resource(dummy, ResourceKind::Health), Some(1000.0));
    }

    #[test]
    fn test_target_health_clamped() {
        let (mut sim, mage, dummy, bolt) = setup();
        sim.deal_damage(mage, dummy, bolt, 1500.0, Outcome::Hit).unwrap();
        assert_eq!(sim.current_resource(dummy, ResourceKind::Health), Some(0.0));
        sim.heal(mage, dummy, bolt, 200.0, Outcome::Hit).unwrap();
        assert_eq!(sim.current_resource(dummy, ResourceKind::Health), Some(200.0));
    }
}

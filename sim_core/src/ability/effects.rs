//! Building blocks for ability effect functions

use super::{CastContext, EffectFn};
use crate::error::SimResult;
use crate::sim::Simulation;
use crate::stats::Stat;
use crate::types::{AuraId, DotId, ResourceKind};
use std::sync::Arc;

/// `base + coefficient × power` damage to the cast target on a landed outcome
pub fn direct_damage(base: f64, coefficient: f64, power: Stat) -> EffectFn {
    Arc::new(move |sim: &mut Simulation, cast: &CastContext| -> SimResult<()> {
        let power = sim.actor(cast.caster)?.stats().get(power);
        sim.deal_damage(cast.caster, cast.target, cast.ability, base + coefficient * power, cast.outcome)?;
        Ok(())
    })
}

pub fn direct_heal(base: f64, coefficient: f64, power: Stat) -> EffectFn {
    Arc::new(move |sim: &mut Simulation, cast: &CastContext| -> SimResult<()> {
        let power = sim.actor(cast.caster)?.stats().get(power);
        sim.heal(cast.caster, cast.target, cast.ability, base + coefficient * power, cast.outcome)?;
        Ok(())
    })
}

/// Activate (or refresh) an aura when the cast lands
pub fn apply_aura(aura: AuraId) -> EffectFn {
    Arc::new(move |sim: &mut Simulation, cast: &CastContext| -> SimResult<()> {
        if cast.outcome.landed() {
            sim.activate_aura(aura)?;
        }
        Ok(())
    })
}

/// Apply a periodic effect when the cast lands
pub fn apply_dot(dot: DotId) -> EffectFn {
    Arc::new(move |sim: &mut Simulation, cast: &CastContext| -> SimResult<()> {
        if cast.outcome.landed() {
            sim.apply_dot(dot)?;
        }
        Ok(())
    })
}

/// Restore a resource to the caster, whatever the outcome
pub fn gain_resource(kind: ResourceKind, amount: f64) -> EffectFn {
    Arc::new(move |sim: &mut Simulation, cast: &CastContext| -> SimResult<()> {
        sim.gain_resource(cast.caster, kind, amount)?;
        Ok(())
    })
}

/// Run several effects in order
pub fn chain(effects: Vec<EffectFn>) -> EffectFn {
    Arc::new(move |sim: &mut Simulation, cast: &CastContext| -> SimResult<()> {
        for effect in &effects {
            effect(sim, cast)?;
        }
        Ok(())
    })
}

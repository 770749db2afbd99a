//! Scheduling and resolution of periodic ticks

use super::{DotConfig, DotInstance, SnapshotPolicy, TickContext, TickEffect, TickSnapshot};
use crate::aura::{Activation, AuraEvent};
use crate::clock::{ActionHandle, ActionPriority};
use crate::combat::{resolve, AttackChances, Landing, OutcomeMode};
use crate::error::{SimError, SimResult};
use crate::modifier::{ModifierKind, ModifierQuery};
use crate::resource::ResourceError;
use crate::sim::{Action, SimEvent, Simulation};
use crate::types::{ActorId, AuraDuration, AuraId, DotId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

impl Simulation {
    /// Attach a periodic effect cast by `caster` to `aura`. It ticks
    /// whenever the aura is gained; attaching to an active aura starts it
    /// right away.
    pub fn attach_dot(&mut self, aura: AuraId, caster: ActorId, config: DotConfig) -> SimResult<DotId> {
        if config.tick_interval.is_zero() {
            return Err(SimError::InvalidDefinition(format!(
                "periodic effect '{}' needs a positive tick interval",
                config.label
            )));
        }
        if config.tick_count == Some(0) {
            return Err(SimError::InvalidDefinition(format!(
                "periodic effect '{}' needs at least one tick",
                config.label
            )));
        }
        self.actor(caster)?;
        let active = self.aura(aura)?.active;

        let id = DotId::from_index(self.dots.len());
        debug!(dot = %id, %aura, %caster, label = %config.label, "periodic effect attached");
        self.dots.push(DotInstance {
            interval: config.tick_interval,
            config: Arc::new(config),
            aura,
            caster,
            handle: None,
            ticks: 0,
            snapshot: TickSnapshot::default(),
        });
        self.aura_mut(aura)?.dots.push(id);

        if active {
            self.start_dot(id)?;
        }
        Ok(id)
    }

    pub(crate) fn dot(&self, dot: DotId) -> SimResult<&DotInstance> {
        self.dots.get(dot.index()).ok_or(SimError::UnknownDot(dot))
    }

    fn dot_mut(&mut self, dot: DotId) -> SimResult<&mut DotInstance> {
        self.dots.get_mut(dot.index()).ok_or(SimError::UnknownDot(dot))
    }

    /// Apply (or re-apply) a periodic effect.
    ///
    /// An inactive owning aura is gained for `interval × count` (or its own
    /// duration for open-ended effects). On an active aura the duration is
    /// refreshed and the effect rolls over: new snapshot, tick counter back
    /// to zero, next tick one interval from now.
    pub fn apply_dot(&mut self, dot: DotId) -> SimResult<Activation> {
        let aura = self.dot(dot)?.aura;
        let duration = self.dot_duration(dot)?;
        let owner = self.aura(aura)?;
        if !owner.active {
            return self.activate_aura_for(aura, duration);
        }

        let restarts_on_refresh = owner.config.refresh_is_gain;
        let activation = self.refresh_aura(aura, duration)?;
        if !restarts_on_refresh {
            self.start_dot(dot)?;
        }
        Ok(activation)
    }

    /// Interval between ticks for an application happening now
    fn hasted_interval(&self, dot: DotId) -> SimResult<Duration> {
        let inst = self.dot(dot)?;
        if !inst.config.hasted {
            return Ok(inst.config.tick_interval);
        }
        let speed = self.cast_speed(inst.caster)?;
        let secs = inst.config.tick_interval.as_secs_f64() / speed;
        Ok(Duration::from_secs_f64(secs).max(Duration::from_nanos(1)))
    }

    fn dot_duration(&self, dot: DotId) -> SimResult<AuraDuration> {
        let inst = self.dot(dot)?;
        match inst.config.tick_count {
            Some(count) => Ok(AuraDuration::Finite(self.hasted_interval(dot)? * count)),
            None => Ok(self.aura(inst.aura)?.config.duration),
        }
    }

    /// (Re)start ticking from now: snapshot, reset the counter and schedule
    /// the first tick one interval out
    pub(crate) fn start_dot(&mut self, dot: DotId) -> SimResult<()> {
        let interval = self.hasted_interval(dot)?;
        let snapshot = self.take_snapshot(dot)?;
        if let Some(old) = self.dot_mut(dot)?.handle.take() {
            self.queue.cancel(old);
        }
        let first = self.now() + interval;
        let handle = self
            .queue
            .schedule_recurring(Action::Tick(dot), first, interval, ActionPriority::PERIODIC)?;

        let inst = self.dot_mut(dot)?;
        inst.handle = Some(handle);
        inst.ticks = 0;
        inst.interval = interval;
        inst.snapshot = snapshot;
        trace!(%dot, ?interval, ?first, "periodic effect started");
        Ok(())
    }

    /// Cancel pending ticks. The tick counter is kept for queries.
    pub(crate) fn stop_dot(&mut self, dot: DotId) -> SimResult<()> {
        if let Some(handle) = self.dot_mut(dot)?.handle.take() {
            self.queue.cancel(handle);
            trace!(%dot, "periodic effect stopped");
        }
        Ok(())
    }

    pub(crate) fn reset_dots(&mut self) {
        for inst in &mut self.dots {
            inst.reset();
        }
    }

    pub(crate) fn tick_dot(&mut self, dot: DotId, handle: ActionHandle) -> SimResult<()> {
        let inst = self.dot_mut(dot)?;
        if inst.handle != Some(handle) {
            // Left over from an application that was rolled over
            return Ok(());
        }
        inst.ticks += 1;
        let tick = inst.ticks;
        let finished = inst.config.tick_count.is_some_and(|count| tick >= count);
        let finished_handle = if finished { inst.handle.take() } else { None };
        let config = Arc::clone(&inst.config);
        let (aura, caster, stored) = (inst.aura, inst.caster, inst.snapshot);
        if let Some(handle) = finished_handle {
            self.queue.cancel(handle);
        }

        let target = self.aura(aura)?.target;
        let snapshot = match config.snapshot {
            SnapshotPolicy::Snapshot => stored,
            SnapshotPolicy::Dynamic => self.take_snapshot(dot)?,
        };
        trace!(time = ?self.now(), %dot, %caster, %target, tick, "periodic tick");
        if let Some(metrics) = self.metrics.actor_mut(caster) {
            metrics.ability_mut(&config.label).ticks += 1;
        }

        match &config.effect {
            TickEffect::Damage { base, coefficient, .. } | TickEffect::Healing { base, coefficient, .. } => {
                let mode = OutcomeMode::for_tick(config.can_crit);
                let chances = AttackChances {
                    crit: snapshot.crit_chance,
                    ..AttackChances::default()
                };
                let outcome = resolve(mode, &chances, &mut self.rng);
                let mut amount = snapshot.amount(*base, *coefficient);
                if outcome.is_crit() {
                    amount *= snapshot.crit_multiplier;
                }
                self.land(Landing {
                    caster,
                    target,
                    source: config.label.clone(),
                    ability: None,
                    proc_mask: config.proc_mask,
                    outcome,
                    amount,
                    periodic: true,
                    healing: matches!(config.effect, TickEffect::Healing { .. }),
                })?;
            }
            TickEffect::Resource {
                kind,
                amount,
                percent_of_max,
            } => {
                let amount = if *percent_of_max {
                    let pool = self
                        .actor(target)?
                        .resources
                        .pool(*kind)
                        .ok_or(ResourceError::UnknownPool(*kind))?;
                    pool.max() * amount
                } else {
                    *amount
                };
                self.gain_resource(target, *kind, amount)?;
            }
            TickEffect::Custom(f) => {
                let context = TickContext {
                    dot,
                    aura,
                    caster,
                    target,
                    tick,
                    snapshot,
                };
                f(self, &context)?;
            }
        }

        self.emit(SimEvent::PeriodicTick {
            dot,
            caster,
            target,
            tick,
        })?;
        self.notify_actor_auras(caster, AuraEvent::PeriodicTick { dot, target, tick })
    }

    /// Read the caster's current power, damage modifiers and crit
    fn take_snapshot(&self, dot: DotId) -> SimResult<TickSnapshot> {
        let inst = self.dot(dot)?;
        let config = &inst.config;
        let caster = inst.caster;
        let actor = self.actor(caster)?;
        let query = ModifierQuery::new(config.class_mask, config.school);

        let power = match config.effect {
            TickEffect::Damage { power, .. } | TickEffect::Healing { power, .. } => actor.stats.get(power),
            _ => 0.0,
        };
        let (crit_chance, crit_multiplier) = if config.can_crit {
            let mode = OutcomeMode::TickCrit;
            (
                self.attack_chances(caster, mode, &query)?.crit,
                self.crit_multiplier(caster, mode, &query)?,
            )
        } else {
            (0.0, 1.0)
        };

        Ok(TickSnapshot {
            power,
            flat: actor.modifiers.effective_value_for(&query, ModifierKind::DamageFlat),
            multiplier: actor.modifiers.effective_value_for(&query, ModifierKind::DamagePercent),
            crit_chance,
            crit_multiplier,
        })
    }

    // === Queries ===

    /// Ticks fired since the effect was last applied
    pub fn dot_ticks(&self, dot: DotId) -> u32 {
        self.dots.get(dot.index()).map_or(0, |d| d.ticks)
    }

    pub fn is_dot_ticking(&self, dot: DotId) -> bool {
        self.dots
            .get(dot.index())
            .and_then(|d| d.handle)
            .is_some_and(|h| self.queue.is_pending(h))
    }

    /// Interval of the current application, after haste
    pub fn dot_interval(&self, dot: DotId) -> Option<Duration> {
        self.dots.get(dot.index()).map(|d| d.interval)
    }

    pub fn dot_snapshot(&self, dot: DotId) -> Option<TickSnapshot> {
        self.dots.get(dot.index()).map(|d| d.snapshot)
    }

    pub fn dot_aura(&self, dot: DotId) -> Option<AuraId> {
        self.dots.get(dot.index()).map(|d| d.aura)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aura::AuraConfig;
    use crate::config::SimConfig;
    use crate::resource::ResourcePool;
    use crate::sim::ActorConfig;
    use crate::stats::{Stat, StatBlock};
    use crate::types::ResourceKind;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn setup(config: SimConfig) -> (Simulation, ActorId, ActorId) {
        let mut sim = Simulation::new(config).unwrap();
        let warlock = sim.add_actor(
            ActorConfig::new("warlock").with_stats(StatBlock::new().with(Stat::SpellPower, 100.0)),
        );
        let dummy = sim.add_actor(
            ActorConfig::new("dummy").with_pool(ResourcePool::new(ResourceKind::Health, 100_000.0)),
        );
        (sim, warlock, dummy)
    }

    fn corruption(label: &str) -> DotConfig {
        DotConfig::new(
            label,
            secs(3.0),
            Some(5),
            TickEffect::Damage {
                base: 100.0,
                coefficient: 0.0,
                power: Stat::SpellPower,
            },
        )
    }

    fn attach(sim: &mut Simulation, caster: ActorId, target: ActorId, dot: DotConfig) -> DotId {
        let aura = sim
            .register_aura(target, AuraConfig::new(dot.label.clone(), AuraDuration::secs(15.0)))
            .unwrap();
        sim.attach_dot(aura, caster, dot).unwrap()
    }

    #[test]
    fn test_cancelled_dot_fires_no_further_ticks() {
        let (mut sim, warlock, dummy) = setup(SimConfig::with_duration(60.0));
        let dot = attach(&mut sim, warlock, dummy, corruption("corruption"));
        sim.reset(0).unwrap();
        sim.apply_dot(dot).unwrap();

        sim.advance_to(secs(7.0)).unwrap();
        assert_eq!(sim.dot_ticks(dot), 2);
        let aura = sim.dot_aura(dot).unwrap();
        sim.expire_aura(aura).unwrap();
        assert!(!sim.is_dot_ticking(dot));

        sim.advance_to(secs(30.0)).unwrap();
        assert_eq!(sim.dot_ticks(dot), 2);
        assert!((sim.metrics().actors[0].damage_done - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_final_tick_lands_before_expiry() {
        let config = SimConfig {
            record_events: true,
            ..SimConfig::with_duration(60.0)
        };
        let (mut sim, warlock, dummy) = setup(config);
        let dot = attach(&mut sim, warlock, dummy, corruption("corruption"));
        sim.reset(0).unwrap();
        sim.apply_dot(dot).unwrap();
        sim.advance_to(secs(30.0)).unwrap();

        assert_eq!(sim.dot_ticks(dot), 5);
        let ticks: Vec<Duration> = sim
            .event_log()
            .iter()
            .filter(|e| matches!(e.event, SimEvent::PeriodicTick { .. }))
            .map(|e| e.time)
            .collect();
        assert_eq!(ticks, [3.0, 6.0, 9.0, 12.0, 15.0].map(secs));

        let expired = sim
            .event_log()
            .iter()
            .position(|e| matches!(e.event, SimEvent::AuraExpired { .. }))
            .unwrap();
        let last_tick = sim
            .event_log()
            .iter()
            .rposition(|e| matches!(e.event, SimEvent::PeriodicTick { .. }))
            .unwrap();
        assert!(last_tick < expired);
        assert_eq!(sim.metrics().actors[0].abilities["corruption"].ticks, 5);
    }

    #[test]
    fn test_snapshot_ignores_later_stat_changes() {
        let (mut sim, warlock, dummy) = setup(SimConfig::with_duration(60.0));
        let scaling = |label: &str, policy| {
            DotConfig::new(
                label,
                secs(3.0),
                Some(5),
                TickEffect::Damage {
                    base: 0.0,
                    coefficient: 1.0,
                    power: Stat::SpellPower,
                },
            )
            .with_snapshot(policy)
        };
        let fixed = attach(&mut sim, warlock, dummy, scaling("fixed", SnapshotPolicy::Snapshot));
        let live = attach(&mut sim, warlock, dummy, scaling("live", SnapshotPolicy::Dynamic));
        sim.reset(0).unwrap();
        sim.apply_dot(fixed).unwrap();
        sim.apply_dot(live).unwrap();

        sim.advance_to(secs(1.0)).unwrap();
        sim.add_stat_dynamic(warlock, Stat::SpellPower, 100.0).unwrap();
        sim.advance_to(secs(4.0)).unwrap();

        let abilities = &sim.metrics().actors[0].abilities;
        assert!((abilities["fixed"].damage - 100.0).abs() < 1e-9);
        assert!((abilities["live"].damage - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_reapply_rolls_over() {
        let (mut sim, warlock, dummy) = setup(SimConfig::with_duration(60.0));
        let dot = attach(&mut sim, warlock, dummy, corruption("corruption"));
        sim.reset(0).unwrap();
        sim.apply_dot(dot).unwrap();
        sim.advance_to(secs(4.0)).unwrap();
        assert_eq!(sim.dot_ticks(dot), 1);

        assert_eq!(sim.apply_dot(dot).unwrap(), Activation::Refreshed);
        assert_eq!(sim.dot_ticks(dot), 0);
        let aura = sim.dot_aura(dot).unwrap();
        assert_eq!(sim.remaining_duration(aura), secs(15.0));

        // Ticks at 7, 10, 13, 16, 19; the aura now expires at 19
        sim.advance_to(secs(18.0)).unwrap();
        assert_eq!(sim.dot_ticks(dot), 4);
        sim.advance_to(secs(40.0)).unwrap();
        assert_eq!(sim.dot_ticks(dot), 5);
        assert!(!sim.is_aura_active(aura));
        assert_eq!(sim.metrics().actors[0].abilities["corruption"].ticks, 6);
    }

    #[test]
    fn test_hasted_interval_shortens_duration() {
        let (mut sim, warlock, dummy) = setup(SimConfig::with_duration(60.0));
        let dot = attach(&mut sim, warlock, dummy, corruption("corruption").hasted());
        sim.reset(0).unwrap();
        sim.multiply_cast_speed(warlock, 1.5).unwrap();
        sim.apply_dot(dot).unwrap();
        assert_eq!(sim.dot_interval(dot), Some(secs(2.0)));

        sim.advance_to(secs(10.5)).unwrap();
        assert_eq!(sim.dot_ticks(dot), 5);
        assert!(!sim.is_aura_active(sim.dot_aura(dot).unwrap()));
    }

    #[test]
    fn test_resource_ticks_while_aura_active() {
        let mut sim = Simulation::new(SimConfig::with_duration(60.0)).unwrap();
        let mage = sim.add_actor(
            ActorConfig::new("mage")
                .with_pool(ResourcePool::new(ResourceKind::Mana, 1000.0).with_initial(500.0)),
        );
        let armor = sim
            .register_aura(mage, AuraConfig::new("mage_armor", AuraDuration::NeverExpires))
            .unwrap();
        let dot = sim
            .attach_dot(
                armor,
                mage,
                DotConfig::new(
                    "mage_armor",
                    secs(5.0),
                    None,
                    TickEffect::Resource {
                        kind: ResourceKind::Mana,
                        amount: 0.03,
                        percent_of_max: true,
                    },
                ),
            )
            .unwrap();
        sim.reset(0).unwrap();
        sim.activate_aura(armor).unwrap();
        sim.advance_to(secs(16.0)).unwrap();

        assert_eq!(sim.dot_ticks(dot), 3);
        assert!((sim.current_resource(mage, ResourceKind::Mana).unwrap() - 590.0).abs() < 1e-9);
    }

    #[test]
    fn test_attach_validates_definition() {
        let (mut sim, warlock, dummy) = setup(SimConfig::with_duration(60.0));
        let aura = sim
            .register_aura(dummy, AuraConfig::new("broken", AuraDuration::secs(5.0)))
            .unwrap();
        let zero_interval = DotConfig::new("broken", Duration::ZERO, Some(3), corruption("x").effect);
        assert!(matches!(
            sim.attach_dot(aura, warlock, zero_interval),
            Err(SimError::InvalidDefinition(_))
        ));
        let no_ticks = DotConfig::new("broken", secs(1.0), Some(0), corruption("x").effect);
        assert!(matches!(
            sim.attach_dot(aura, warlock, no_ticks),
            Err(SimError::InvalidDefinition(_))
        ));
    }
}

//! Melee auto attacks - a self-rescheduling swing timer per actor

use super::{Landing, Outcome, OutcomeMode};
use crate::clock::{ActionHandle, ActionPriority};
use crate::error::{SimError, SimResult};
use crate::modifier::{ModifierQuery, Quantity};
use crate::sim::{Action, Simulation};
use crate::stats::Stat;
use crate::types::{ActorId, ClassMask, ProcMask, SpellSchool};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Main-hand weapon of an actor that swings on its own timer
#[derive(Debug, Clone, PartialEq)]
pub struct AutoAttackConfig {
    /// Metrics key of the swings
    pub label: String,
    pub target: ActorId,
    /// Unhasted weapon speed
    pub speed: Duration,
    /// Average weapon damage per swing before attack power
    pub damage: f64,
    pub class_mask: ClassMask,
    pub school: SpellSchool,
}

impl AutoAttackConfig {
    pub fn new(target: ActorId, speed_secs: f64, damage: f64) -> Self {
        AutoAttackConfig {
            label: "melee".to_string(),
            target,
            speed: Duration::from_secs_f64(speed_secs.max(0.0)),
            damage,
            class_mask: ClassMask::NONE,
            school: SpellSchool::PHYSICAL,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_mask(mut self, mask: ClassMask) -> Self {
        self.class_mask = mask;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SwingTimer {
    pub config: Arc<AutoAttackConfig>,
    pub next: Option<(Duration, ActionHandle)>,
}

impl SwingTimer {
    pub fn reset(&mut self) {
        self.next = None;
    }
}

impl Simulation {
    /// Give `actor` a weapon that swings from the start of every iteration
    pub fn enable_auto_attacks(&mut self, actor: ActorId, config: AutoAttackConfig) -> SimResult<()> {
        self.actor(config.target)?;
        if config.speed.is_zero() {
            return Err(SimError::InvalidDefinition(format!(
                "auto attack '{}' needs a positive weapon speed",
                config.label
            )));
        }
        self.actor_mut(actor)?.auto_attack = Some(SwingTimer {
            config: Arc::new(config),
            next: None,
        });
        Ok(())
    }

    /// Swing speed factor of an actor (1.0 = unhasted)
    pub fn attack_speed(&self, actor: ActorId) -> SimResult<f64> {
        let haste = self.config.constants.haste_rating_per_percent;
        Ok(self.actor(actor)?.stats.attack_speed(haste))
    }

    /// Multiply an actor's attack speed (e.g. 1.2, reverted with 1/1.2).
    ///
    /// The swing in progress keeps its elapsed share: the time left until it
    /// lands is scaled by `old / new` speed.
    pub fn multiply_attack_speed(&mut self, actor: ActorId, factor: f64) -> SimResult<()> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(SimError::InvalidDefinition(format!(
                "attack speed factor must be positive, got {factor}"
            )));
        }
        let old = self.attack_speed(actor)?;
        self.actor_mut(actor)?.stats.multiply_attack_speed(factor);
        let new = self.attack_speed(actor)?;

        let now = self.now();
        let pending = self
            .actor(actor)?
            .auto_attack
            .as_ref()
            .and_then(|timer| timer.next);
        if let Some((due, handle)) = pending {
            if self.queue.is_pending(handle) && due > now {
                let left = (due - now).as_secs_f64() * old / new;
                self.queue.cancel(handle);
                self.schedule_swing(actor, now + Duration::from_secs_f64(left))?;
            }
        }
        Ok(())
    }

    /// Time the next swing of `actor` lands, if it has a weapon
    pub fn next_swing_at(&self, actor: ActorId) -> Option<Duration> {
        self.actors
            .get(actor.index())?
            .auto_attack
            .as_ref()?
            .next
            .map(|(due, _)| due)
    }

    pub(crate) fn start_auto_attacks(&mut self) -> SimResult<()> {
        let armed: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|a| a.auto_attack.is_some())
            .map(|a| a.id)
            .collect();
        let now = self.now();
        for actor in armed {
            self.schedule_swing(actor, now)?;
        }
        Ok(())
    }

    fn schedule_swing(&mut self, actor: ActorId, at: Duration) -> SimResult<()> {
        let handle = self
            .queue
            .schedule_with_priority(Action::Swing(actor), at, ActionPriority::DEFAULT)?;
        if let Some(timer) = self.actor_mut(actor)?.auto_attack.as_mut() {
            timer.next = Some((at, handle));
        }
        Ok(())
    }

    /// Resolve one swing on the auto attack table and start the next one
    pub(crate) fn swing(&mut self, actor: ActorId) -> SimResult<()> {
        let Some(timer) = self.actor_mut(actor)?.auto_attack.as_mut() else {
            return Ok(());
        };
        timer.next = None;
        let config = Arc::clone(&timer.config);

        let query = ModifierQuery::new(config.class_mask, config.school);
        let outcome = self.roll_outcome(actor, OutcomeMode::MeleeAuto, &query)?;
        if let Some(metrics) = self.metrics.actor_mut(actor) {
            let swings = metrics.ability_mut(&config.label);
            swings.casts += 1;
            swings.record_outcome(outcome);
        }

        if outcome.landed() {
            let constants = &self.config.constants;
            let per_dps = constants.attack_power_per_dps;
            let glance = constants.glance_multiplier;
            let source = self.actor(actor)?;
            let base = config.damage
                + source.stats.get(Stat::AttackPower) / per_dps * config.speed.as_secs_f64();
            let mut amount = source.modifiers.apply(&query, Quantity::Damage, base).max(0.0);
            match outcome {
                Outcome::Glance => amount *= glance,
                Outcome::Crit => amount *= self.crit_multiplier(actor, OutcomeMode::MeleeAuto, &query)?,
                _ => {}
            }
            self.land(Landing {
                caster: actor,
                target: config.target,
                source: config.label.clone(),
                ability: None,
                proc_mask: ProcMask::MELEE_AUTO,
                outcome,
                amount,
                periodic: false,
                healing: false,
            })?;
        }
        trace!(time = ?self.now(), %actor, ?outcome, "swing");

        let interval = config.speed.as_secs_f64() / self.attack_speed(actor)?;
        let next = self.now() + Duration::from_secs_f64(interval);
        self.schedule_swing(actor, next)
    }
}

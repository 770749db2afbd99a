//! The cast state machine

use super::{AbilityConfig, CastContext};
use crate::aura::AuraEvent;
use crate::clock::ActionPriority;
use crate::error::SimResult;
use crate::modifier::{ModifierQuery, Quantity};
use crate::sim::{Action, PendingCast, SimEvent, Simulation};
use crate::types::{AbilityId, ActorId, ResourceKind};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Answer to a cast request. The outcome of an accepted cast is observed
/// through events once it resolves.
#[derive(Debug, Clone, PartialEq)]
pub enum CastResult {
    Accepted { cast: u64, completes_at: Duration },
    Rejected(RejectReason),
}

impl CastResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CastResult::Accepted { .. })
    }
}

/// Why a cast request was turned down. Nothing was mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RejectReason {
    /// Already casting something
    Busy,
    OnGlobalCooldown { ready_at: Duration },
    OnCooldown { ready_at: Duration },
    ConditionFailed,
    InsufficientResource {
        kind: ResourceKind,
        needed: f64,
        available: f64,
    },
}

impl RejectReason {
    /// Earliest time the same request could succeed, if known
    pub fn ready_at(&self) -> Option<Duration> {
        match *self {
            RejectReason::OnGlobalCooldown { ready_at } | RejectReason::OnCooldown { ready_at } => {
                Some(ready_at)
            }
            _ => None,
        }
    }
}

fn query(config: &AbilityConfig) -> ModifierQuery {
    ModifierQuery::new(config.class_mask, config.school)
}

impl Simulation {
    /// Cost of `ability` for `caster` after cost modifiers, never negative
    pub fn effective_cost(&self, caster: ActorId, ability: AbilityId) -> SimResult<Option<(ResourceKind, f64)>> {
        let config = self.ability_config(ability)?;
        let Some(cost) = config.cost else {
            return Ok(None);
        };
        let amount = self
            .actor(caster)?
            .modifiers
            .apply(&query(&config), Quantity::Cost, cost.amount)
            .max(0.0);
        Ok(Some((cost.kind, amount)))
    }

    /// Cast time of `ability` for `caster` right now, after modifiers and haste
    pub fn effective_cast_time(&self, caster: ActorId, ability: AbilityId) -> SimResult<Duration> {
        let config = self.ability_config(ability)?;
        if config.is_instant() {
            return Ok(Duration::ZERO);
        }
        let mut secs = self
            .actor(caster)?
            .modifiers
            .apply(&query(&config), Quantity::CastTime, config.cast_time.as_secs_f64())
            .max(0.0);
        if config.hasted_cast {
            secs /= self.cast_speed(caster)?;
        }
        Ok(Duration::from_secs_f64(secs))
    }

    /// Global cooldown `ability` would start, hasted and floored at the minimum
    pub fn effective_gcd(&self, caster: ActorId, ability: AbilityId) -> SimResult<Duration> {
        let config = self.ability_config(ability)?;
        if !config.triggers_gcd {
            return Ok(Duration::ZERO);
        }
        let constants = &self.config.constants;
        let base = config.gcd.unwrap_or(constants.gcd).as_secs_f64();
        let secs = self
            .actor(caster)?
            .modifiers
            .apply(&query(&config), Quantity::Gcd, base)
            / self.cast_speed(caster)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)).max(constants.min_gcd))
    }

    /// Run the Requested-state checks without mutating anything
    pub fn check_cast(
        &self,
        caster: ActorId,
        ability: AbilityId,
        target: ActorId,
    ) -> SimResult<Option<RejectReason>> {
        let config = self.ability_config(ability)?;
        let actor = self.actor(caster)?;
        self.actor(target)?;
        let now = self.now();

        if actor.is_casting() {
            return Ok(Some(RejectReason::Busy));
        }
        if config.triggers_gcd && actor.gcd_ready_at > now {
            return Ok(Some(RejectReason::OnGlobalCooldown {
                ready_at: actor.gcd_ready_at,
            }));
        }
        let cooldown = actor.cooldown_ready_at(ability);
        if cooldown > now {
            return Ok(Some(RejectReason::OnCooldown { ready_at: cooldown }));
        }
        if !config.conditions.iter().all(|check| check(self, caster, target)) {
            return Ok(Some(RejectReason::ConditionFailed));
        }
        if let Some((kind, needed)) = self.effective_cost(caster, ability)? {
            let available = actor.resources.current(kind).unwrap_or(0.0);
            if needed > available {
                return Ok(Some(RejectReason::InsufficientResource {
                    kind,
                    needed,
                    available,
                }));
            }
        }
        Ok(None)
    }

    /// Request a cast.
    ///
    /// On acceptance the cost is spent, the GCD starts and the cast either
    /// resolves now (instant) or completes at the returned time.
    pub fn try_cast(&mut self, caster: ActorId, ability: AbilityId, target: ActorId) -> SimResult<CastResult> {
        if let Some(reason) = self.check_cast(caster, ability, target)? {
            debug!(time = ?self.now(), %caster, %ability, ?reason, "cast rejected");
            return Ok(CastResult::Rejected(reason));
        }
        let config = self.ability_config(ability)?;

        let mut cost_paid = 0.0;
        if let Some((kind, amount)) = self.effective_cost(caster, ability)? {
            if !self.spend_resource(caster, kind, amount)? {
                let available = self.current_resource(caster, kind).unwrap_or(0.0);
                return Ok(CastResult::Rejected(RejectReason::InsufficientResource {
                    kind,
                    needed: amount,
                    available,
                }));
            }
            cost_paid = amount;
        }

        let now = self.now();
        let gcd = self.effective_gcd(caster, ability)?;
        let cast_time = self.effective_cast_time(caster, ability)?;
        let completes_at = now + cast_time;
        let cast = self.next_cast_id;
        self.next_cast_id += 1;

        if config.triggers_gcd {
            self.actor_mut(caster)?.gcd_ready_at = now + gcd;
        }
        if let Some(metrics) = self.metrics.actor_mut(caster) {
            metrics.ability_mut(&config.label).casts += 1;
        }
        if !cast_time.is_zero() {
            let handle = self.queue.schedule_with_priority(
                Action::CompleteCast { actor: caster, cast },
                completes_at,
                ActionPriority::CAST,
            )?;
            self.actor_mut(caster)?.casting = Some(PendingCast {
                id: cast,
                ability,
                target,
                handle,
                started_at: now,
                completes_at,
                cost_paid,
            });
        }
        debug!(time = ?now, %caster, %ability, %target, cast, ?cast_time, "cast started");
        self.emit(SimEvent::CastStarted {
            caster,
            ability,
            target,
            cast,
            completes_at,
        })?;
        if cast_time.is_zero() {
            self.resolve_cast(caster, ability, target, cast)?;
        }

        self.schedule_ready(caster)?;
        Ok(CastResult::Accepted { cast, completes_at })
    }

    pub(crate) fn complete_pending_cast(&mut self, caster: ActorId, cast: u64) -> SimResult<()> {
        let taken = self.actor_mut(caster)?.casting.take();
        let pending = match taken {
            Some(pending) if pending.id == cast => pending,
            other => {
                // Completion of a cast that was interrupted and replaced
                self.actor_mut(caster)?.casting = other;
                return Ok(());
            }
        };
        self.resolve_cast(caster, pending.ability, pending.target, cast)?;
        self.schedule_ready(caster)
    }

    /// Roll the outcome with the caster's current chances, start the
    /// cooldown, run the effects and announce the completion
    fn resolve_cast(&mut self, caster: ActorId, ability: AbilityId, target: ActorId, cast: u64) -> SimResult<()> {
        let config = self.ability_config(ability)?;
        let query = query(&config);
        let outcome = self.roll_outcome(caster, config.outcome, &query)?;
        if let Some(metrics) = self.metrics.actor_mut(caster) {
            metrics.ability_mut(&config.label).record_outcome(outcome);
        }

        if let Some(cooldown) = config.cooldown {
            let now = self.now();
            let actor = self.actor_mut(caster)?;
            let secs = actor
                .modifiers
                .apply(&query, Quantity::Cooldown, cooldown.as_secs_f64())
                .max(0.0);
            actor.cooldowns.insert(ability, now + Duration::from_secs_f64(secs));
        }

        let context = CastContext {
            cast,
            caster,
            target,
            ability,
            outcome,
        };
        for effect in &config.effects {
            effect(self, &context)?;
        }

        debug!(time = ?self.now(), %caster, %ability, %target, cast, ?outcome, "cast completed");
        self.emit(SimEvent::CastCompleted {
            caster,
            ability,
            target,
            cast,
            outcome,
        })?;
        self.notify_actor_auras(
            caster,
            AuraEvent::CastCompleted {
                ability,
                target,
                outcome,
                proc_mask: config.proc_mask,
            },
        )
    }

    /// Interrupt the cast in progress. The completion never fires; with a
    /// refund fraction, that share of the paid cost is returned. Returns
    /// false if the actor was not casting.
    pub fn interrupt(&mut self, caster: ActorId, refund: Option<f64>) -> SimResult<bool> {
        let Some(pending) = self.actor_mut(caster)?.casting.take() else {
            return Ok(false);
        };
        self.queue.cancel(pending.handle);
        let config = self.ability_config(pending.ability)?;

        let refunded = match (refund, config.cost) {
            (Some(fraction), Some(cost)) if fraction > 0.0 => {
                self.gain_resource(caster, cost.kind, pending.cost_paid * fraction.min(1.0))?
            }
            _ => 0.0,
        };
        if let Some(metrics) = self.metrics.actor_mut(caster) {
            metrics.ability_mut(&config.label).interrupts += 1;
        }

        debug!(time = ?self.now(), %caster, ability = %pending.ability, cast = pending.id, refunded, "cast interrupted");
        self.emit(SimEvent::CastInterrupted {
            caster,
            ability: pending.ability,
            cast: pending.id,
            refunded,
        })?;
        self.schedule_ready(caster)?;
        Ok(true)
    }

    /// Clear an ability's cooldown, e.g. from a proc
    pub fn reset_cooldown(&mut self, caster: ActorId, ability: AbilityId) -> SimResult<()> {
        self.actor_mut(caster)?.cooldowns.remove(&ability);
        Ok(())
    }

    /// Remaining cooldown of `ability` on `caster`
    pub fn cooldown_remaining(&self, caster: ActorId, ability: AbilityId) -> Duration {
        self.actors
            .get(caster.index())
            .map_or(Duration::ZERO, |a| a.cooldown_ready_at(ability).saturating_sub(self.now()))
    }
}

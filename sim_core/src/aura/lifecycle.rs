//! Activation, refresh, stacking and expiry of aura instances

use super::{Activation, AuraConfig, AuraEvent, AuraInstance, AuraObserver};
use crate::clock::ActionPriority;
use crate::error::{SimError, SimResult};
use crate::sim::{Action, SimEvent, Simulation};
use crate::types::{ActorId, AuraDuration, AuraId, ModifierId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

impl Simulation {
    /// Bind an aura definition to `target`. The aura starts inactive; its
    /// modifiers are registered (inactive) in the target's registry.
    pub fn register_aura(&mut self, target: ActorId, config: AuraConfig) -> SimResult<AuraId> {
        if config.max_stacks == 0 {
            return Err(SimError::InvalidDefinition(format!(
                "aura '{}' needs max_stacks >= 1",
                config.label
            )));
        }
        let id = AuraId::from_index(self.auras.len());
        let actor = self.actor_mut(target)?;
        let modifiers = config
            .modifiers
            .iter()
            .map(|m| (actor.modifiers.register(m.config.clone()), m.clone()))
            .collect();
        actor.auras.push(id);

        debug!(aura = %id, %target, label = %config.label, "aura registered");
        let config = Arc::new(config);
        self.auras.push(AuraInstance {
            observers: config.observers.clone(),
            permanent: config.permanent,
            config,
            target,
            active: false,
            stacks: 0,
            gained_at: Duration::ZERO,
            expires_at: None,
            expiry: None,
            modifiers,
            dots: Vec::new(),
            uptime: Duration::ZERO,
        });
        Ok(id)
    }

    pub(crate) fn aura(&self, aura: AuraId) -> SimResult<&AuraInstance> {
        self.auras.get(aura.index()).ok_or(SimError::UnknownAura(aura))
    }

    pub(crate) fn aura_mut(&mut self, aura: AuraId) -> SimResult<&mut AuraInstance> {
        self.auras.get_mut(aura.index()).ok_or(SimError::UnknownAura(aura))
    }

    pub fn aura_label(&self, aura: AuraId) -> Option<&str> {
        self.auras.get(aura.index()).map(|a| a.config.label.as_str())
    }

    pub fn aura_target(&self, aura: AuraId) -> Option<ActorId> {
        self.auras.get(aura.index()).map(|a| a.target)
    }

    /// Attach another observer after registration, e.g. one that needs the
    /// ids of auras registered later
    pub fn add_aura_observer(&mut self, aura: AuraId, observer: AuraObserver) -> SimResult<()> {
        self.aura_mut(aura)?.observers.push(observer);
        Ok(())
    }

    /// Reactivate this aura with no expiry at every reset
    pub fn make_permanent(&mut self, aura: AuraId) -> SimResult<()> {
        self.aura_mut(aura)?.permanent = true;
        Ok(())
    }

    /// Activate with the aura's configured duration
    pub fn activate_aura(&mut self, aura: AuraId) -> SimResult<Activation> {
        let duration = self.aura(aura)?.config.duration;
        self.activate_aura_for(aura, duration)
    }

    /// Activate for `duration`.
    ///
    /// An active aura is refreshed instead. Another active member of the
    /// same exclusivity category is expired first, unless its priority is
    /// strictly higher, in which case nothing changes.
    pub fn activate_aura_for(&mut self, aura: AuraId, duration: AuraDuration) -> SimResult<Activation> {
        let inst = self.aura(aura)?;
        if inst.active {
            return self.refresh_active(aura, duration);
        }

        let target = inst.target;
        if let Some(exclusive) = inst.exclusivity().cloned() {
            // Expiry observers may activate other members, so the slot is
            // re-checked until it is free
            let mut evictions = 0;
            loop {
                if self.aura(aura)?.active {
                    return Ok(Activation::Gained);
                }
                let holder = self
                    .actor(target)?
                    .exclusive
                    .get(&exclusive.category)
                    .copied()
                    .filter(|&holder| holder != aura);
                let Some(holder) = holder else {
                    break;
                };
                let holder_priority = self
                    .aura(holder)?
                    .exclusivity()
                    .map_or(i32::MIN, |e| e.priority);
                if holder_priority > exclusive.priority {
                    debug!(%aura, %holder, category = %exclusive.category, "activation blocked");
                    return Ok(Activation::Blocked);
                }
                if evictions > self.auras.len() {
                    return Err(SimError::InvalidDefinition(format!(
                        "exclusivity category '{}' never settles: expiry observers keep re-activating members",
                        exclusive.category
                    )));
                }
                evictions += 1;
                if !self.expire_aura(holder)? {
                    self.actor_mut(target)?.exclusive.remove(&exclusive.category);
                }
            }
        }

        self.gain(aura, duration, 1)?;
        Ok(Activation::Gained)
    }

    /// Restart the duration of an active aura; activates an inactive one
    pub fn refresh_aura(&mut self, aura: AuraId, duration: AuraDuration) -> SimResult<Activation> {
        if self.aura(aura)?.active {
            self.refresh_active(aura, duration)
        } else {
            self.activate_aura_for(aura, duration)
        }
    }

    fn refresh_active(&mut self, aura: AuraId, duration: AuraDuration) -> SimResult<Activation> {
        let inst = self.aura(aura)?;
        let target = inst.target;
        let stacks = (inst.stacks + 1).min(inst.config.max_stacks);

        if inst.config.refresh_is_gain {
            self.expire_aura(aura)?;
            self.gain(aura, duration, stacks)?;
            return Ok(Activation::Refreshed);
        }

        self.schedule_expiry(aura, duration)?;
        self.change_stacks(aura, stacks)?;
        debug!(time = ?self.now(), %aura, %target, "aura refreshed");
        self.notify_aura(aura, AuraEvent::Refreshed)?;
        self.emit(SimEvent::AuraRefreshed { aura, target })?;
        Ok(Activation::Refreshed)
    }

    /// Replace any pending expiry with one `duration` from now
    fn schedule_expiry(&mut self, aura: AuraId, duration: AuraDuration) -> SimResult<()> {
        if let Some(old) = self.aura_mut(aura)?.expiry.take() {
            self.queue.cancel(old);
        }
        let (expires_at, expiry) = match duration {
            AuraDuration::Finite(d) => {
                let at = self.now() + d;
                let handle =
                    self.queue
                        .schedule_with_priority(Action::ExpireAura(aura), at, ActionPriority::EXPIRE)?;
                (Some(at), Some(handle))
            }
            AuraDuration::NeverExpires => (None, None),
        };
        let inst = self.aura_mut(aura)?;
        inst.expires_at = expires_at;
        inst.expiry = expiry;
        Ok(())
    }

    fn gain(&mut self, aura: AuraId, duration: AuraDuration, stacks: u32) -> SimResult<()> {
        let now = self.now();
        let inst = self.aura_mut(aura)?;
        inst.active = true;
        inst.stacks = stacks;
        inst.gained_at = now;
        let target = inst.target;
        let category = inst.exclusivity().map(|e| e.category.clone());
        let modifiers = inst.modifiers.clone();
        let dots = inst.dots.clone();

        if let Some(category) = category {
            self.actor_mut(target)?.exclusive.insert(category, aura);
        }
        self.schedule_expiry(aura, duration)?;

        let registry = &mut self.actor_mut(target)?.modifiers;
        for (id, modifier) in &modifiers {
            if modifier.per_stack {
                registry.update_value(*id, modifier.config.value * f64::from(stacks))?;
            }
            registry.activate(*id)?;
        }
        for dot in dots {
            self.start_dot(dot)?;
        }

        debug!(time = ?now, %aura, %target, ?duration, "aura gained");
        self.notify_aura(aura, AuraEvent::Gained)?;
        self.emit(SimEvent::AuraGained { aura, target })
    }

    /// Expire an active aura now: deactivate its modifiers, stop its
    /// periodic effects and notify observers once. Returns false if it was
    /// not active.
    pub fn expire_aura(&mut self, aura: AuraId) -> SimResult<bool> {
        let now = self.now();
        let inst = self.aura_mut(aura)?;
        if !inst.active {
            return Ok(false);
        }
        inst.active = false;
        inst.uptime += now.saturating_sub(inst.gained_at);
        inst.stacks = 0;
        inst.expires_at = None;
        let expiry = inst.expiry.take();
        let target = inst.target;
        let category = inst.exclusivity().map(|e| e.category.clone());
        let modifiers: Vec<ModifierId> = inst.modifiers.iter().map(|(id, _)| *id).collect();
        let dots = inst.dots.clone();

        if let Some(handle) = expiry {
            self.queue.cancel(handle);
        }
        let actor = self.actor_mut(target)?;
        if let Some(category) = category {
            if actor.exclusive.get(&category) == Some(&aura) {
                actor.exclusive.remove(&category);
            }
        }
        for id in modifiers {
            actor.modifiers.deactivate(id)?;
        }
        for dot in dots {
            self.stop_dot(dot)?;
        }

        debug!(time = ?now, %aura, %target, "aura expired");
        self.notify_aura(aura, AuraEvent::Expired)?;
        self.emit(SimEvent::AuraExpired { aura, target })?;
        Ok(true)
    }

    /// Add one stack without touching the duration. Activates an inactive aura.
    pub fn add_stack(&mut self, aura: AuraId) -> SimResult<u32> {
        let inst = self.aura(aura)?;
        if !inst.active {
            self.activate_aura(aura)?;
            return Ok(self.current_stacks(aura));
        }
        let stacks = (inst.stacks + 1).min(inst.config.max_stacks);
        self.change_stacks(aura, stacks)?;
        Ok(stacks)
    }

    /// Consume one stack; the last one expires the aura
    pub fn remove_stack(&mut self, aura: AuraId) -> SimResult<u32> {
        let inst = self.aura(aura)?;
        if !inst.active {
            return Ok(0);
        }
        let stacks = inst.stacks.saturating_sub(1);
        self.set_stacks(aura, stacks)
    }

    /// Set the stack count, clamped to `[0, max_stacks]`. Zero expires the
    /// aura; a positive count activates an inactive one.
    pub fn set_stacks(&mut self, aura: AuraId, stacks: u32) -> SimResult<u32> {
        let inst = self.aura(aura)?;
        let stacks = stacks.min(inst.config.max_stacks);
        if stacks == 0 {
            self.expire_aura(aura)?;
            return Ok(0);
        }
        if !inst.active {
            let duration = inst.config.duration;
            if self.activate_aura_for(aura, duration)? == Activation::Blocked {
                return Ok(0);
            }
        }
        self.change_stacks(aura, stacks)?;
        Ok(stacks)
    }

    fn change_stacks(&mut self, aura: AuraId, new: u32) -> SimResult<()> {
        let inst = self.aura_mut(aura)?;
        let old = inst.stacks;
        if old == new {
            return Ok(());
        }
        inst.stacks = new;
        let target = inst.target;
        let scaled: Vec<(ModifierId, f64)> = inst
            .modifiers
            .iter()
            .filter(|(_, m)| m.per_stack)
            .map(|(id, m)| (*id, m.config.value * f64::from(new)))
            .collect();

        let registry = &mut self.actor_mut(target)?.modifiers;
        for (id, value) in scaled {
            registry.update_value(id, value)?;
        }

        trace!(%aura, old, new, "aura stacks changed");
        self.notify_aura(aura, AuraEvent::StacksChanged { old, new })?;
        self.emit(SimEvent::AuraStacksChanged {
            aura,
            target,
            old,
            new,
        })
    }

    // === Queries ===

    /// Whether the aura is active at the current time. An aura lasting `d`
    /// gained at `t` is active on `[t, t + d)`.
    pub fn is_aura_active(&self, aura: AuraId) -> bool {
        let now = self.now();
        self.auras
            .get(aura.index())
            .is_some_and(|a| a.active && a.expires_at.map_or(true, |at| at > now))
    }

    /// Time left before expiry; `Duration::MAX` if it never expires, zero
    /// if inactive
    pub fn remaining_duration(&self, aura: AuraId) -> Duration {
        if !self.is_aura_active(aura) {
            return Duration::ZERO;
        }
        match self.auras.get(aura.index()).and_then(|a| a.expires_at) {
            Some(at) => at.saturating_sub(self.now()),
            None => Duration::MAX,
        }
    }

    pub fn current_stacks(&self, aura: AuraId) -> u32 {
        match self.auras.get(aura.index()) {
            Some(a) if a.active => a.stacks,
            _ => 0,
        }
    }

    /// Total time active so far this iteration
    pub fn aura_uptime(&self, aura: AuraId) -> Duration {
        match self.auras.get(aura.index()) {
            Some(a) if a.active => a.uptime + self.now().saturating_sub(a.gained_at),
            Some(a) => a.uptime,
            None => Duration::ZERO,
        }
    }

    // === Dispatch ===

    pub(crate) fn notify_aura(&mut self, aura: AuraId, event: AuraEvent) -> SimResult<()> {
        let observers = self.aura(aura)?.observers.clone();
        for observer in observers {
            observer(self, aura, &event)?;
        }
        Ok(())
    }

    /// Deliver `event` to every aura bound to `actor`, active or not, so
    /// inactive auras can proc themselves
    pub(crate) fn notify_actor_auras(&mut self, actor: ActorId, event: AuraEvent) -> SimResult<()> {
        let auras = self.actor(actor)?.auras.clone();
        for aura in auras {
            self.notify_aura(aura, event.clone())?;
        }
        Ok(())
    }

    // === Reset ===

    pub(crate) fn reset_auras(&mut self) {
        for inst in &mut self.auras {
            inst.reset();
        }
    }

    pub(crate) fn activate_permanent_auras(&mut self) -> SimResult<()> {
        let permanent: Vec<AuraId> = (0..self.auras.len())
            .filter(|&i| self.auras[i].permanent)
            .map(AuraId::from_index)
            .collect();
        for aura in permanent {
            self.activate_aura_for(aura, AuraDuration::NeverExpires)?;
        }
        Ok(())
    }

    pub(crate) fn notify_reset(&mut self) -> SimResult<()> {
        for i in 0..self.auras.len() {
            self.notify_aura(AuraId::from_index(i), AuraEvent::Reset)?;
        }
        Ok(())
    }

    /// Close uptime accounting at the end of an iteration
    pub(crate) fn finish_auras(&mut self) {
        let now = self.now();
        for inst in &mut self.auras {
            if inst.active {
                inst.uptime += now.saturating_sub(inst.gained_at);
                inst.gained_at = now;
            }
            if let Some(metrics) = self.metrics.actor_mut(inst.target) {
                metrics.add_aura_uptime(&inst.config.label, inst.uptime);
            }
        }
    }
}

//! Simulation context - one iteration's clock, actors, content and metrics
//!
//! A [`Simulation`] owns everything a single iteration mutates: the event
//! queue, the actors with their pools, stats and modifier registries, the
//! registered abilities, auras and periodic effects, and a seeded random
//! stream. Content is registered once; [`Simulation::run_iteration`] resets
//! the mutable state to the registered baseline before every run, so
//! iterations are independent and reproducible from their seed.

mod action;
mod actor;
mod events;

pub use action::CustomAction;
pub use actor::{Actor, ActorConfig};
pub use events::{Listener, LoggedEvent, SimEvent};

pub(crate) use action::Action;
pub(crate) use actor::PendingCast;

use crate::ability::AbilityConfig;
use crate::aura::AuraInstance;
use crate::clock::{ActionHandle, ActionPriority, EventQueue, Fired};
use crate::config::SimConfig;
use crate::dot::DotInstance;
use crate::error::{SimError, SimResult};
use crate::metrics::IterationMetrics;
use crate::modifier::{ModifierKind, ModifierQuery, ModifierRegistry};
use crate::resource::ResourceError;
use crate::rotation::Rotation;
use crate::stats::{Stat, StatBlock};
use crate::types::{ActorId, ClassMask, ResourceKind};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Callback fired when an actor's stat changes: `(actor, stat, old, new)`
pub type StatListener =
    Arc<dyn Fn(&mut Simulation, ActorId, Stat, f64, f64) -> SimResult<()> + Send + Sync>;

pub struct Simulation {
    pub(crate) config: SimConfig,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) queue: EventQueue<Action>,
    pub(crate) actors: Vec<Actor>,
    pub(crate) abilities: Vec<Arc<AbilityConfig>>,
    pub(crate) auras: Vec<AuraInstance>,
    pub(crate) dots: Vec<DotInstance>,
    pub(crate) listeners: Vec<Listener>,
    stat_listeners: Vec<(ActorId, Stat, StatListener)>,
    pub(crate) metrics: IterationMetrics,
    pub(crate) log: Vec<LoggedEvent>,
    iteration: u64,
    pub(crate) next_cast_id: u64,
    baseline_committed: bool,
}

impl Simulation {
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let metrics = IterationMetrics::new(0, config.seed, config.duration);
        Ok(Simulation {
            config,
            rng,
            queue: EventQueue::new(),
            actors: Vec::new(),
            abilities: Vec::new(),
            auras: Vec::new(),
            dots: Vec::new(),
            listeners: Vec::new(),
            stat_listeners: Vec::new(),
            metrics,
            log: Vec::new(),
            iteration: 0,
            next_cast_id: 0,
            baseline_committed: false,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current simulated time
    pub fn now(&self) -> Duration {
        self.queue.now()
    }

    /// Index of the iteration currently running (or last run)
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn add_actor(&mut self, config: ActorConfig) -> ActorId {
        let id = ActorId::from_index(self.actors.len());
        self.metrics.add_actor(&config.name);
        self.actors.push(Actor::new(id, config));
        id
    }

    pub fn actor(&self, id: ActorId) -> SimResult<&Actor> {
        self.actors.get(id.index()).ok_or(SimError::UnknownActor(id))
    }

    pub(crate) fn actor_mut(&mut self, id: ActorId) -> SimResult<&mut Actor> {
        self.actors.get_mut(id.index()).ok_or(SimError::UnknownActor(id))
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    /// Metrics of the iteration in progress
    pub fn metrics(&self) -> &IterationMetrics {
        &self.metrics
    }

    /// Hand an actor to the decision layer. It is asked what to do at the
    /// start of every iteration and whenever it becomes ready again.
    pub fn set_rotation(&mut self, actor: ActorId, rotation: Box<dyn Rotation>) -> SimResult<()> {
        let actor = self.actor_mut(actor)?;
        actor.rotation = Some(rotation);
        actor.driven = true;
        Ok(())
    }

    /// Roll a proc with the iteration's random stream
    pub fn proc(&mut self, chance: f64) -> bool {
        if chance <= 0.0 {
            return false;
        }
        self.rng.gen::<f64>() < chance
    }

    /// The iteration's random stream, for content that needs its own rolls
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    // === Scheduling ===

    /// Run `action` once at simulated time `at`
    pub fn schedule_at<F>(&mut self, at: Duration, action: F) -> SimResult<ActionHandle>
    where
        F: FnMut(&mut Simulation) -> SimResult<()> + Send + 'static,
    {
        self.queue
            .schedule_with_priority(Action::Custom(Box::new(action)), at, ActionPriority::DEFAULT)
    }

    pub fn schedule_after<F>(&mut self, delay: Duration, action: F) -> SimResult<ActionHandle>
    where
        F: FnMut(&mut Simulation) -> SimResult<()> + Send + 'static,
    {
        let at = self.now() + delay;
        self.schedule_at(at, action)
    }

    /// Run `action` every `period`, first at `now + period`, until cancelled
    pub fn start_periodic_action<F>(&mut self, period: Duration, action: F) -> SimResult<ActionHandle>
    where
        F: FnMut(&mut Simulation) -> SimResult<()> + Send + 'static,
    {
        let first = self.now() + period;
        self.queue.schedule_recurring(
            Action::Custom(Box::new(action)),
            first,
            period,
            ActionPriority::DEFAULT,
        )
    }

    /// Cancel a scheduled action. Dead handles are a no-op.
    pub fn cancel_action(&mut self, handle: ActionHandle) -> bool {
        self.queue.cancel(handle)
    }

    pub fn is_action_pending(&self, handle: ActionHandle) -> bool {
        self.queue.is_pending(handle)
    }

    fn execute(&mut self, fired: Fired<Action>) -> SimResult<()> {
        let Fired {
            handle,
            action,
            recurring,
            ..
        } = fired;
        trace!(time = ?self.now(), ?action, "execute");

        if recurring {
            if let Some(copy) = action.replicate() {
                self.queue.restore(handle, copy);
            }
        }

        match action {
            Action::Custom(mut callback) => {
                let result = callback(self);
                if recurring {
                    self.queue.restore(handle, Action::Custom(callback));
                }
                result
            }
            Action::ExpireAura(aura) => self.expire_aura(aura).map(|_| ()),
            Action::Tick(dot) => self.tick_dot(dot, handle),
            Action::CompleteCast { actor, cast } => self.complete_pending_cast(actor, cast),
            Action::Ready(actor) => self.actor_ready(actor),
            Action::Regen { actor, kind } => self.regen_tick(actor, kind),
            Action::Swing(actor) => self.swing(actor),
        }
    }

    // === Run loop ===

    /// Run one iteration from a fresh reset until the encounter bound or
    /// until nothing is left to do.
    ///
    /// Any error aborts the iteration and is returned wrapped in
    /// [`SimError::IterationAborted`].
    pub fn run_iteration(&mut self, iteration: u64) -> SimResult<IterationMetrics> {
        self.run_inner(iteration).map_err(|source| {
            warn!(iteration, error = %source, "iteration aborted");
            SimError::IterationAborted {
                iteration,
                source: Box::new(source),
            }
        })
    }

    fn run_inner(&mut self, iteration: u64) -> SimResult<IterationMetrics> {
        self.reset(iteration)?;
        let end = self.config.duration;
        self.advance_to(end)?;
        self.finish_auras();
        self.metrics.duration = end;
        debug!(
            iteration,
            damage = self.metrics.total_damage(),
            "iteration finished"
        );
        Ok(self.metrics.clone())
    }

    /// Pop and execute the earliest pending action, moving the clock to its
    /// due time. Returns false once the queue is empty.
    pub fn advance_to_next(&mut self) -> SimResult<bool> {
        match self.queue.pop_next()? {
            Some(fired) => {
                self.execute(fired)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Execute every action due strictly before `end`, then move the clock to `end`
    pub fn advance_to(&mut self, end: Duration) -> SimResult<()> {
        loop {
            match self.queue.peek_time() {
                Some(due) if due < end => {}
                _ => break,
            }
            let Some(fired) = self.queue.pop_next()? else {
                break;
            };
            self.execute(fired)?;
        }
        self.queue.advance_to(end)
    }

    /// Restore the registered baseline and seed the random stream for `iteration`
    pub fn reset(&mut self, iteration: u64) -> SimResult<()> {
        if !self.baseline_committed {
            for actor in &mut self.actors {
                actor.modifiers.commit_baseline();
                actor.baseline_stats = actor.stats.clone();
            }
            self.baseline_committed = true;
        }

        self.iteration = iteration;
        self.next_cast_id = 0;
        let seed = self.config.seed.wrapping_add(iteration);
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.queue.reset();
        self.log.clear();
        self.metrics = IterationMetrics::new(iteration, seed, self.config.duration);
        for actor in &self.actors {
            self.metrics.add_actor(&actor.name);
        }

        self.reset_auras();
        self.reset_dots();
        for actor in &mut self.actors {
            actor.reset();
        }

        self.activate_permanent_auras()?;
        self.notify_reset()?;

        // Every pool ticks, so a rate raised from zero mid-iteration applies
        let interval = self.config.constants.regen_interval;
        let regen: Vec<(ActorId, ResourceKind)> = self
            .actors
            .iter()
            .flat_map(|actor| actor.resources.pools().map(move |pool| (actor.id, pool.kind)))
            .collect();
        for (actor, kind) in regen {
            self.queue.schedule_recurring(
                Action::Regen { actor, kind },
                interval,
                interval,
                ActionPriority::DEFAULT,
            )?;
        }

        self.start_auto_attacks()?;

        let driven: Vec<ActorId> = self.actors.iter().filter(|a| a.driven).map(|a| a.id).collect();
        for actor in driven {
            self.schedule_ready(actor)?;
        }
        Ok(())
    }

    // === Resources ===

    /// Gain into a pool; returns the amount absorbed after clamping
    pub fn gain_resource(&mut self, actor: ActorId, kind: ResourceKind, amount: f64) -> SimResult<f64> {
        let absorbed = self.actor_mut(actor)?.resources.gain(kind, amount)?;
        if let Some(metrics) = self.metrics.actor_mut(actor) {
            let resource = metrics.resource_mut(kind);
            resource.gained += absorbed;
            resource.wasted += (amount - absorbed).max(0.0);
        }
        Ok(absorbed)
    }

    /// Spend from a pool. Returns false, leaving the pool untouched, when it
    /// is short.
    pub fn spend_resource(&mut self, actor: ActorId, kind: ResourceKind, amount: f64) -> SimResult<bool> {
        match self.actor_mut(actor)?.resources.spend(kind, amount) {
            Ok(()) => {}
            Err(ResourceError::Insufficient { .. }) => return Ok(false),
            Err(err) => return Err(err.into()),
        }
        if let Some(metrics) = self.metrics.actor_mut(actor) {
            metrics.resource_mut(kind).spent += amount;
        }
        Ok(true)
    }

    /// Change a pool's regeneration rate for the rest of the iteration.
    ///
    /// Takes effect from the next regen tick; the next reset restores the
    /// registered rate.
    pub fn set_regen_rate(&mut self, actor: ActorId, kind: ResourceKind, per_second: f64) -> SimResult<()> {
        self.actor_mut(actor)?
            .resources
            .pool_mut(kind)?
            .set_regen_rate(per_second);
        Ok(())
    }

    fn regen_tick(&mut self, actor: ActorId, kind: ResourceKind) -> SimResult<()> {
        let interval = self.config.constants.regen_interval;
        let amount = match self.actor(actor)?.resources.pool(kind) {
            Some(pool) => pool.regen_over(interval),
            None => return Err(ResourceError::UnknownPool(kind).into()),
        };
        if amount > 0.0 {
            self.gain_resource(actor, kind, amount)?;
        }
        Ok(())
    }

    // === Stats ===

    /// Change a stat by `delta` mid-iteration and notify stat listeners
    pub fn add_stat_dynamic(&mut self, actor: ActorId, stat: Stat, delta: f64) -> SimResult<()> {
        self.change_stat(actor, stat, |stats| stats.add_flat(stat, delta))
    }

    /// Scale a stat by an increased% (0.1 = +10%) mid-iteration; a negative
    /// amount of the same size reverts it
    pub fn add_stat_percent_dynamic(&mut self, actor: ActorId, stat: Stat, increased: f64) -> SimResult<()> {
        self.change_stat(actor, stat, |stats| stats.add_increased(stat, increased))
    }

    fn change_stat<F>(&mut self, actor: ActorId, stat: Stat, change: F) -> SimResult<()>
    where
        F: FnOnce(&mut StatBlock),
    {
        let stats = &mut self.actor_mut(actor)?.stats;
        let old = stats.get(stat);
        change(stats);
        let new = stats.get(stat);
        trace!(%actor, ?stat, old, new, "stat changed");

        let listeners: Vec<StatListener> = self
            .stat_listeners
            .iter()
            .filter(|(a, s, _)| *a == actor && *s == stat)
            .map(|(_, _, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(self, actor, stat, old, new)?;
        }
        Ok(())
    }

    /// Register a callback for changes of one actor's stat
    pub fn on_stat_changed(&mut self, actor: ActorId, stat: Stat, listener: StatListener) -> SimResult<()> {
        self.actor(actor)?;
        self.stat_listeners.push((actor, stat, listener));
        Ok(())
    }

    /// Multiply an actor's cast speed (e.g. 1.2 for a 20% haste effect)
    pub fn multiply_cast_speed(&mut self, actor: ActorId, factor: f64) -> SimResult<()> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(SimError::InvalidDefinition(format!(
                "cast speed factor must be positive, got {factor}"
            )));
        }
        self.actor_mut(actor)?.stats.multiply_cast_speed(factor);
        Ok(())
    }

    /// Effective cast speed of an actor (1.0 = unhasted)
    pub fn cast_speed(&self, actor: ActorId) -> SimResult<f64> {
        let haste = self.config.constants.haste_rating_per_percent;
        Ok(self.actor(actor)?.stats.cast_speed(haste))
    }

    // === Queries ===

    pub fn current_resource(&self, actor: ActorId, kind: ResourceKind) -> Option<f64> {
        self.actors.get(actor.index())?.resources.current(kind)
    }

    pub fn stat(&self, actor: ActorId, stat: Stat) -> Option<f64> {
        self.actors.get(actor.index()).map(|a| a.stats.get(stat))
    }

    /// Aggregate of an actor's active modifiers of `kind` matching `mask`.
    ///
    /// Unknown actors report the neutral value (0 for flat kinds, 1 for
    /// percent kinds).
    pub fn effective_modifier_value(&self, actor: ActorId, mask: ClassMask, kind: ModifierKind) -> f64 {
        self.effective_modifier_value_for(actor, &ModifierQuery::mask(mask), kind)
    }

    pub fn effective_modifier_value_for(&self, actor: ActorId, query: &ModifierQuery, kind: ModifierKind) -> f64 {
        match self.actors.get(actor.index()) {
            Some(a) => a.modifiers.effective_value_for(query, kind),
            None if kind.is_percent() => 1.0,
            None => 0.0,
        }
    }

    /// Modifier registry of an actor, for content that registers its own modifiers
    pub fn modifiers_mut(&mut self, actor: ActorId) -> SimResult<&mut ModifierRegistry> {
        Ok(&mut self.actor_mut(actor)?.modifiers)
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.now())
            .field("iteration", &self.iteration)
            .field("actors", &self.actors.len())
            .field("abilities", &self.abilities.len())
            .field("auras", &self.auras.len())
            .field("pending", &self.queue.len())
            .finish()
    }
}

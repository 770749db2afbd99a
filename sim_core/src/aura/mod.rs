//! Aura lifecycle - timed and permanent stateful effects bound to an actor
//!
//! An aura instance is one [`AuraConfig`] bound to one target actor. It is
//! either inactive or active with a well-defined remaining duration; gains
//! and expiries always alternate, and every observer sees exactly one
//! `Expired` per `Gained`.

mod lifecycle;

use crate::clock::ActionHandle;
use crate::combat::Outcome;
use crate::error::SimResult;
use crate::modifier::ModifierConfig;
use crate::sim::Simulation;
use crate::types::{AbilityId, ActorId, AuraDuration, AuraId, DotId, ModifierId, ProcMask};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle and observation events delivered to an aura's observers
#[derive(Debug, Clone, PartialEq)]
pub enum AuraEvent {
    Gained,
    /// Re-activated while active without counting as a fresh gain
    Refreshed,
    Expired,
    StacksChanged { old: u32, new: u32 },
    /// The aura's owner completed a cast
    CastCompleted {
        ability: AbilityId,
        target: ActorId,
        outcome: Outcome,
        proc_mask: ProcMask,
    },
    /// The aura's owner dealt damage or healing
    HitDealt {
        target: ActorId,
        ability: Option<AbilityId>,
        outcome: Outcome,
        amount: f64,
        proc_mask: ProcMask,
    },
    /// A periodic effect cast by the aura's owner ticked
    PeriodicTick { dot: DotId, target: ActorId, tick: u32 },
    /// The simulation was reset for a new iteration
    Reset,
}

/// Observer attached to one aura. Receives the aura's own id.
pub type AuraObserver = Arc<dyn Fn(&mut Simulation, AuraId, &AuraEvent) -> SimResult<()> + Send + Sync>;

/// A modifier owned by an aura: active exactly while the aura is
#[derive(Debug, Clone, PartialEq)]
pub struct AuraModifier {
    pub config: ModifierConfig,
    /// Scale the value by the current stack count
    pub per_stack: bool,
}

/// Membership in a mutually exclusive group of auras on one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusivity {
    pub category: String,
    /// A member cannot replace an active member of strictly higher priority
    pub priority: i32,
}

/// Registration data for an aura
#[derive(Clone)]
pub struct AuraConfig {
    pub label: String,
    pub duration: AuraDuration,
    pub max_stacks: u32,
    pub exclusive: Option<Exclusivity>,
    /// Re-gaining while active runs a full expire/gain cycle
    pub refresh_is_gain: bool,
    /// Reactivated with no expiry at every reset
    pub permanent: bool,
    pub modifiers: Vec<AuraModifier>,
    pub observers: Vec<AuraObserver>,
}

impl AuraConfig {
    pub fn new(label: impl Into<String>, duration: AuraDuration) -> Self {
        AuraConfig {
            label: label.into(),
            duration,
            max_stacks: 1,
            exclusive: None,
            refresh_is_gain: false,
            permanent: false,
            modifiers: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    pub fn exclusive(mut self, category: impl Into<String>, priority: i32) -> Self {
        self.exclusive = Some(Exclusivity {
            category: category.into(),
            priority,
        });
        self
    }

    pub fn refresh_is_gain(mut self) -> Self {
        self.refresh_is_gain = true;
        self
    }

    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }

    pub fn with_modifier(mut self, config: ModifierConfig) -> Self {
        self.modifiers.push(AuraModifier {
            config,
            per_stack: false,
        });
        self
    }

    /// Modifier whose value is multiplied by the stack count
    pub fn with_stacking_modifier(mut self, config: ModifierConfig) -> Self {
        self.modifiers.push(AuraModifier {
            config,
            per_stack: true,
        });
        self
    }

    pub fn on_event(mut self, observer: AuraObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn on_gain<F>(self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) -> SimResult<()> + Send + Sync + 'static,
    {
        self.on_event(Arc::new(move |sim, aura, event| match event {
            AuraEvent::Gained => f(sim, aura),
            _ => Ok(()),
        }))
    }

    pub fn on_expire<F>(self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) -> SimResult<()> + Send + Sync + 'static,
    {
        self.on_event(Arc::new(move |sim, aura, event| match event {
            AuraEvent::Expired => f(sim, aura),
            _ => Ok(()),
        }))
    }

    pub fn on_stacks_changed<F>(self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, u32, u32) -> SimResult<()> + Send + Sync + 'static,
    {
        self.on_event(Arc::new(move |sim, aura, event| match *event {
            AuraEvent::StacksChanged { old, new } => f(sim, aura, old, new),
            _ => Ok(()),
        }))
    }

    /// Observe the owner's completed casts, e.g. for procs
    pub fn on_cast_complete<F>(self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, AbilityId, Outcome, ProcMask) -> SimResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.on_event(Arc::new(move |sim, aura, event| match *event {
            AuraEvent::CastCompleted {
                ability,
                outcome,
                proc_mask,
                ..
            } => f(sim, aura, ability, outcome, proc_mask),
            _ => Ok(()),
        }))
    }

    pub fn on_reset<F>(self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) -> SimResult<()> + Send + Sync + 'static,
    {
        self.on_event(Arc::new(move |sim, aura, event| match event {
            AuraEvent::Reset => f(sim, aura),
            _ => Ok(()),
        }))
    }
}

impl fmt::Debug for AuraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuraConfig")
            .field("label", &self.label)
            .field("duration", &self.duration)
            .field("max_stacks", &self.max_stacks)
            .field("exclusive", &self.exclusive)
            .field("refresh_is_gain", &self.refresh_is_gain)
            .field("permanent", &self.permanent)
            .field("modifiers", &self.modifiers)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Result of activating an aura
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Was inactive and is now active
    Gained,
    /// Was already active; duration (and stacks) updated
    Refreshed,
    /// A strictly higher-priority member of its exclusivity category is active
    Blocked,
}

/// Mutable per-iteration state of one registered aura
pub(crate) struct AuraInstance {
    pub config: Arc<AuraConfig>,
    pub target: ActorId,
    pub observers: Vec<AuraObserver>,
    pub permanent: bool,
    pub active: bool,
    pub stacks: u32,
    pub gained_at: Duration,
    /// `None` while inactive or when it never expires
    pub expires_at: Option<Duration>,
    pub expiry: Option<ActionHandle>,
    pub modifiers: Vec<(ModifierId, AuraModifier)>,
    pub dots: Vec<DotId>,
    pub uptime: Duration,
}

impl AuraInstance {
    fn exclusivity(&self) -> Option<&Exclusivity> {
        self.config.exclusive.as_ref()
    }

    pub(crate) fn reset(&mut self) {
        self.active = false;
        self.stacks = 0;
        self.gained_at = Duration::ZERO;
        self.expires_at = None;
        self.expiry = None;
        self.uptime = Duration::ZERO;
    }
}

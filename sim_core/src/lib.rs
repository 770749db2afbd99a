//! sim_core - Discrete-event combat simulation engine
//!
//! This library provides:
//! - Clock & event queue: logical time and ordered, cancellable actions
//! - Resource ledger: bounded pools with regeneration
//! - Modifier registry: mask-scoped flat and percent adjustments
//! - Auras: gain/refresh/expire lifecycle with stacks and exclusivity
//! - Periodic effects: dots and hots riding on auras
//! - Outcome resolution, damage/heal application and melee swing timers
//! - Casting pipeline: costs, cast times, global and per-ability cooldowns
//! - Metrics and parallel batch running over many seeded iterations

pub mod ability;
pub mod aura;
pub mod clock;
pub mod combat;
pub mod config;
pub mod dot;
pub mod error;
pub mod metrics;
pub mod modifier;
pub mod prelude;
pub mod resource;
pub mod rotation;
pub mod runner;
pub mod sim;
pub mod stats;
pub mod types;

// Re-export core types for convenience
pub use ability::{AbilityConfig, CastContext, CastResult, EffectFn, RejectReason};
pub use aura::{Activation, AuraConfig, AuraEvent};
pub use clock::{ActionHandle, ActionPriority};
pub use combat::{AutoAttackConfig, Outcome, OutcomeMode};
pub use config::{CombatConstants, ConfigError, SimConfig};
pub use dot::{DotConfig, SnapshotPolicy, TickEffect};
pub use error::{SimError, SimResult};
pub use metrics::{AggregateMetrics, IterationMetrics};
pub use modifier::{ModifierConfig, ModifierKind};
pub use resource::{ResourceLedger, ResourcePool};
pub use rotation::{Decision, PriorityList, Rotation};
pub use runner::{run_batch, run_sequential};
pub use sim::{ActorConfig, SimEvent, Simulation};
pub use stats::{Stat, StatBlock};
pub use types::{
    AbilityId, ActorId, AuraDuration, AuraId, ClassMask, DotId, ModifierId, ProcMask, ResourceKind,
    SpellSchool,
};

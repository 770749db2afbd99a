//! Prelude module for convenient imports
//!
//! ```rust
//! use sim_core::prelude::*;
//! ```

// Core types
pub use crate::error::{SimError, SimResult};
pub use crate::types::{
    AbilityId, ActorId, AuraDuration, AuraId, ClassMask, DotId, ProcMask, ResourceKind, SpellSchool,
};

// Engine
pub use crate::config::SimConfig;
pub use crate::sim::{ActorConfig, SimEvent, Simulation};

// Content definitions
pub use crate::ability::{effects, AbilityConfig, CastContext, CastResult};
pub use crate::aura::{AuraConfig, AuraEvent, AuraModifier, Exclusivity};
pub use crate::dot::{DotConfig, SnapshotPolicy, TickEffect};
pub use crate::modifier::{ModifierConfig, ModifierKind};
pub use crate::resource::ResourcePool;
pub use crate::stats::{Stat, StatBlock};

// Combat
pub use crate::combat::{AutoAttackConfig, Outcome, OutcomeMode};

// Decisions and batches
pub use crate::metrics::{AggregateMetrics, IterationMetrics};
pub use crate::rotation::{Decision, PriorityList, Rotation};
pub use crate::runner::{run_batch, run_sequential};

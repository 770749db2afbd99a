//! Actors - casters and targets owning pools, stats, modifiers and auras

use crate::clock::ActionHandle;
use crate::combat::SwingTimer;
use crate::modifier::ModifierRegistry;
use crate::resource::{ResourceLedger, ResourcePool};
use crate::rotation::Rotation;
use crate::stats::StatBlock;
use crate::types::{AbilityId, ActorId, AuraId};
use std::collections::HashMap;
use std::time::Duration;

/// Registration data for an actor
#[derive(Debug, Clone, Default)]
pub struct ActorConfig {
    pub name: String,
    pub pools: Vec<ResourcePool>,
    pub stats: StatBlock,
}

impl ActorConfig {
    pub fn new(name: impl Into<String>) -> Self {
        ActorConfig {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_pool(mut self, pool: ResourcePool) -> Self {
        self.pools.push(pool);
        self
    }

    pub fn with_stats(mut self, stats: StatBlock) -> Self {
        self.stats = stats;
        self
    }
}

/// A cast waiting for its completion action
#[derive(Debug, Clone)]
pub(crate) struct PendingCast {
    pub id: u64,
    pub ability: AbilityId,
    pub target: ActorId,
    pub handle: ActionHandle,
    pub started_at: Duration,
    pub completes_at: Duration,
    pub cost_paid: f64,
}

pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub(crate) resources: ResourceLedger,
    pub(crate) stats: StatBlock,
    pub(crate) baseline_stats: StatBlock,
    pub(crate) modifiers: ModifierRegistry,
    /// Auras bound to this actor, in registration order
    pub(crate) auras: Vec<AuraId>,
    /// Active member of each exclusivity category
    pub(crate) exclusive: HashMap<String, AuraId>,
    pub(crate) gcd_ready_at: Duration,
    pub(crate) cooldowns: HashMap<AbilityId, Duration>,
    pub(crate) casting: Option<PendingCast>,
    pub(crate) ready_action: Option<ActionHandle>,
    /// Taken out while the rotation is choosing
    pub(crate) rotation: Option<Box<dyn Rotation>>,
    /// Whether a rotation drives this actor
    pub(crate) driven: bool,
    pub(crate) auto_attack: Option<SwingTimer>,
}

impl Actor {
    pub(crate) fn new(id: ActorId, config: ActorConfig) -> Self {
        let mut resources = ResourceLedger::new();
        for pool in config.pools {
            resources.add_pool(pool);
        }
        Actor {
            id,
            name: config.name,
            resources,
            baseline_stats: config.stats.clone(),
            stats: config.stats,
            modifiers: ModifierRegistry::new(id),
            auras: Vec::new(),
            exclusive: HashMap::new(),
            gcd_ready_at: Duration::ZERO,
            cooldowns: HashMap::new(),
            casting: None,
            ready_action: None,
            rotation: None,
            driven: false,
            auto_attack: None,
        }
    }

    pub fn resources(&self) -> &ResourceLedger {
        &self.resources
    }

    pub fn stats(&self) -> &StatBlock {
        &self.stats
    }

    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    pub fn is_casting(&self) -> bool {
        self.casting.is_some()
    }

    pub fn gcd_ready_at(&self) -> Duration {
        self.gcd_ready_at
    }

    pub fn cooldown_ready_at(&self, ability: AbilityId) -> Duration {
        self.cooldowns.get(&ability).copied().unwrap_or(Duration::ZERO)
    }

    /// Restore per-iteration state. Auras are reset separately.
    pub(crate) fn reset(&mut self) {
        self.resources.reset();
        self.stats = self.baseline_stats.clone();
        self.modifiers.reset();
        self.exclusive.clear();
        self.gcd_ready_at = Duration::ZERO;
        self.cooldowns.clear();
        self.casting = None;
        self.ready_action = None;
        if let Some(timer) = self.auto_attack.as_mut() {
            timer.reset();
        }
        if let Some(rotation) = self.rotation.as_mut() {
            rotation.reset();
        }
    }
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("resources", &self.resources)
            .field("casting", &self.casting)
            .field("driven", &self.driven)
            .finish()
    }
}

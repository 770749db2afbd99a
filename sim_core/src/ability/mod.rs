//! Ability casting - definitions and the cast state machine
//!
//! A cast attempt moves Requested → cost check → (Rejected | Casting) →
//! Resolving → Applied. Instant casts resolve within the request; casts with
//! a cast time schedule a completion action and may be interrupted until it
//! fires. The global cooldown and per-ability cooldowns are timed locks on
//! the caster, independent of cast time.

mod cast;
pub mod effects;

pub use cast::{CastResult, RejectReason};

use crate::combat::{Outcome, OutcomeMode};
use crate::error::{SimError, SimResult};
use crate::sim::Simulation;
use crate::types::{AbilityId, ActorId, ClassMask, ProcMask, ResourceKind, SpellSchool};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resource price of an ability before cost modifiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    pub kind: ResourceKind,
    pub amount: f64,
}

/// What an effect function knows about the cast it resolves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastContext {
    pub cast: u64,
    pub caster: ActorId,
    pub target: ActorId,
    pub ability: AbilityId,
    pub outcome: Outcome,
}

/// Effect run when a cast resolves, with the rolled outcome
pub type EffectFn = Arc<dyn Fn(&mut Simulation, &CastContext) -> SimResult<()> + Send + Sync>;

/// Extra predicate checked when a cast is requested: `(sim, caster, target)`
pub type CastCondition = Arc<dyn Fn(&Simulation, ActorId, ActorId) -> bool + Send + Sync>;

/// Registration data for an ability
#[derive(Clone)]
pub struct AbilityConfig {
    pub label: String,
    pub class_mask: ClassMask,
    pub school: SpellSchool,
    pub proc_mask: ProcMask,
    pub cost: Option<Cost>,
    /// Zero for instant casts
    pub cast_time: Duration,
    pub triggers_gcd: bool,
    /// Overrides the configured default GCD
    pub gcd: Option<Duration>,
    pub cooldown: Option<Duration>,
    pub outcome: OutcomeMode,
    /// Whether the caster's haste shortens the cast time
    pub hasted_cast: bool,
    pub effects: Vec<EffectFn>,
    pub conditions: Vec<CastCondition>,
}

impl AbilityConfig {
    pub fn new(label: impl Into<String>) -> Self {
        AbilityConfig {
            label: label.into(),
            class_mask: ClassMask::NONE,
            school: SpellSchool::empty(),
            proc_mask: ProcMask::SPELL_DAMAGE,
            cost: None,
            cast_time: Duration::ZERO,
            triggers_gcd: true,
            gcd: None,
            cooldown: None,
            outcome: OutcomeMode::SpellHitAndCrit,
            hasted_cast: true,
            effects: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn with_mask(mut self, class_mask: ClassMask) -> Self {
        self.class_mask = class_mask;
        self
    }

    pub fn with_school(mut self, school: SpellSchool) -> Self {
        self.school = school;
        self
    }

    pub fn with_proc_mask(mut self, proc_mask: ProcMask) -> Self {
        self.proc_mask = proc_mask;
        self
    }

    pub fn with_cost(mut self, kind: ResourceKind, amount: f64) -> Self {
        self.cost = Some(Cost { kind, amount });
        self
    }

    pub fn with_cast_time(mut self, secs: f64) -> Self {
        self.cast_time = Duration::from_secs_f64(secs.max(0.0));
        self
    }

    pub fn with_cooldown(mut self, secs: f64) -> Self {
        self.cooldown = Some(Duration::from_secs_f64(secs.max(0.0)));
        self
    }

    pub fn off_gcd(mut self) -> Self {
        self.triggers_gcd = false;
        self
    }

    pub fn with_gcd(mut self, secs: f64) -> Self {
        self.gcd = Some(Duration::from_secs_f64(secs.max(0.0)));
        self
    }

    pub fn with_outcome(mut self, outcome: OutcomeMode) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn unhasted(mut self) -> Self {
        self.hasted_cast = false;
        self
    }

    pub fn with_effect(mut self, effect: EffectFn) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_condition(mut self, condition: CastCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_instant(&self) -> bool {
        self.cast_time.is_zero()
    }
}

impl fmt::Debug for AbilityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityConfig")
            .field("label", &self.label)
            .field("class_mask", &self.class_mask)
            .field("school", &self.school)
            .field("cost", &self.cost)
            .field("cast_time", &self.cast_time)
            .field("triggers_gcd", &self.triggers_gcd)
            .field("cooldown", &self.cooldown)
            .field("outcome", &self.outcome)
            .field("effects", &self.effects.len())
            .field("conditions", &self.conditions.len())
            .finish()
    }
}

impl Simulation {
    pub fn register_ability(&mut self, config: AbilityConfig) -> SimResult<AbilityId> {
        if let Some(cost) = config.cost {
            if !cost.amount.is_finite() || cost.amount < 0.0 {
                return Err(SimError::InvalidDefinition(format!(
                    "ability '{}' has invalid cost {}",
                    config.label, cost.amount
                )));
            }
        }
        let id = AbilityId::from_index(self.abilities.len());
        debug!(ability = %id, label = %config.label, "ability registered");
        self.abilities.push(Arc::new(config));
        Ok(id)
    }

    pub fn ability_config(&self, ability: AbilityId) -> SimResult<Arc<AbilityConfig>> {
        self.abilities
            .get(ability.index())
            .cloned()
            .ok_or(SimError::UnknownAbility(ability))
    }

    pub fn ability_label(&self, ability: AbilityId) -> Option<&str> {
        self.abilities.get(ability.index()).map(|a| a.label.as_str())
    }

    /// Look up a registered ability by label
    pub fn find_ability(&self, label: &str) -> Option<AbilityId> {
        self.abilities
            .iter()
            .position(|a| a.label == label)
            .map(AbilityId::from_index)
    }
}

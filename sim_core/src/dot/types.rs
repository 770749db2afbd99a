//! Periodic effect definitions

use crate::error::SimResult;
use crate::sim::Simulation;
use crate::stats::Stat;
use crate::types::{ActorId, AuraId, ClassMask, DotId, ProcMask, ResourceKind, SpellSchool};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// When a periodic effect reads the caster's stats and modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPolicy {
    /// Captured once when the effect is applied
    #[default]
    Snapshot,
    /// Re-read at every tick
    Dynamic,
}

/// Callback run on every tick of a custom periodic effect
pub type TickFn = Arc<dyn Fn(&mut Simulation, &TickContext) -> SimResult<()> + Send + Sync>;

/// What a tick does
#[derive(Clone)]
pub enum TickEffect {
    /// `base + coefficient × power` damage per tick to the aura's target
    Damage { base: f64, coefficient: f64, power: Stat },
    Healing { base: f64, coefficient: f64, power: Stat },
    /// Restore a resource to the aura's target; with `percent_of_max` the
    /// amount is a fraction of the pool's maximum
    Resource {
        kind: ResourceKind,
        amount: f64,
        percent_of_max: bool,
    },
    Custom(TickFn),
}

impl fmt::Debug for TickEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickEffect::Damage {
                base,
                coefficient,
                power,
            } => write!(f, "Damage({base} + {coefficient} x {power:?})"),
            TickEffect::Healing {
                base,
                coefficient,
                power,
            } => write!(f, "Healing({base} + {coefficient} x {power:?})"),
            TickEffect::Resource {
                kind,
                amount,
                percent_of_max,
            } => write!(f, "Resource({kind:?}, {amount}, percent_of_max: {percent_of_max})"),
            TickEffect::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Configuration of a periodic effect (dot or hot)
#[derive(Debug, Clone)]
pub struct DotConfig {
    pub label: String,
    pub tick_interval: Duration,
    /// Number of ticks; `None` ticks until the owning aura expires
    pub tick_count: Option<u32>,
    pub snapshot: SnapshotPolicy,
    pub effect: TickEffect,
    /// Divide the tick interval by the caster's cast speed at application
    pub hasted: bool,
    pub can_crit: bool,
    pub class_mask: ClassMask,
    pub school: SpellSchool,
    pub proc_mask: ProcMask,
}

impl DotConfig {
    pub fn new(label: impl Into<String>, tick_interval: Duration, tick_count: Option<u32>, effect: TickEffect) -> Self {
        let proc_mask = match effect {
            TickEffect::Healing { .. } => ProcMask::PERIODIC_HEALING,
            _ => ProcMask::PERIODIC_DAMAGE,
        };
        DotConfig {
            label: label.into(),
            tick_interval,
            tick_count,
            snapshot: SnapshotPolicy::Snapshot,
            effect,
            hasted: false,
            can_crit: false,
            class_mask: ClassMask::NONE,
            school: SpellSchool::empty(),
            proc_mask,
        }
    }

    pub fn with_snapshot(mut self, snapshot: SnapshotPolicy) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn hasted(mut self) -> Self {
        self.hasted = true;
        self
    }

    pub fn can_crit(mut self) -> Self {
        self.can_crit = true;
        self
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

    /// Nominal duration before haste: `interval × count`
    pub fn base_duration(&self) -> Option<Duration> {
        self.tick_count.map(|n| self.tick_interval * n)
    }
}

/// Caster-side values a tick is computed from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickSnapshot {
    /// The effect's scaling stat
    pub power: f64,
    /// Sum of matching flat damage modifiers
    pub flat: f64,
    /// Product of matching percent damage modifiers
    pub multiplier: f64,
    pub crit_chance: f64,
    pub crit_multiplier: f64,
}

impl Default for TickSnapshot {
    fn default() -> Self {
        TickSnapshot {
            power: 0.0,
            flat: 0.0,
            multiplier: 1.0,
            crit_chance: 0.0,
            crit_multiplier: 1.0,
        }
    }
}

impl TickSnapshot {
    /// Amount of one non-critical tick
    pub fn amount(&self, base: f64, coefficient: f64) -> f64 {
        ((base + coefficient * self.power + self.flat) * self.multiplier).max(0.0)
    }
}

/// Everything a tick callback needs to know
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub dot: DotId,
    pub aura: AuraId,
    pub caster: ActorId,
    pub target: ActorId,
    /// 1-based index of this tick since application
    pub tick: u32,
    pub snapshot: TickSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_duration() {
        let dot = DotConfig::new(
            "corruption",
            Duration::from_secs(3),
            Some(5),
            TickEffect::Damage {
                base: 100.0,
                coefficient: 0.2,
                power: Stat::SpellPower,
            },
        );
        assert_eq!(dot.base_duration(), Some(Duration::from_secs(15)));
        assert_eq!(dot.proc_mask, ProcMask::PERIODIC_DAMAGE);
    }

    #[test]
    fn test_snapshot_amount_formula() {
        let snapshot = TickSnapshot {
            power: 1000.0,
            flat: 20.0,
            multiplier: 1.1,
            ..Default::default()
        };
        assert!((snapshot.amount(100.0, 0.2) - 352.0).abs() < 1e-9);
    }
}

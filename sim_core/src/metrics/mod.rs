//! Per-iteration metrics and their aggregation across iterations

mod aggregate;

pub use aggregate::{AbilitySummary, ActorSummary, AggregateMetrics, Summary};

use crate::combat::Outcome;
use crate::types::{ActorId, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Counters for one ability or periodic effect of one actor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityMetrics {
    pub casts: u64,
    pub hits: u64,
    pub crits: u64,
    pub misses: u64,
    pub dodges: u64,
    pub glances: u64,
    pub ticks: u64,
    pub crit_ticks: u64,
    pub interrupts: u64,
    pub damage: f64,
    pub healing: f64,
}

impl AbilityMetrics {
    pub fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Hit => self.hits += 1,
            Outcome::Crit => self.crits += 1,
            Outcome::Miss => self.misses += 1,
            Outcome::Dodge => self.dodges += 1,
            Outcome::Glance => self.glances += 1,
        }
    }

    /// Share of resolved casts that crit
    pub fn crit_rate(&self) -> f64 {
        let resolved = self.hits + self.crits + self.misses + self.dodges + self.glances;
        if resolved == 0 {
            0.0
        } else {
            self.crits as f64 / resolved as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    /// Amount actually absorbed by the pool
    pub gained: f64,
    /// Gains lost to the pool's maximum
    pub wasted: f64,
    pub spent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorMetrics {
    pub name: String,
    pub damage_done: f64,
    pub healing_done: f64,
    pub abilities: BTreeMap<String, AbilityMetrics>,
    pub resources: BTreeMap<ResourceKind, ResourceMetrics>,
    /// Seconds each aura bound to this actor was active
    pub aura_uptime: BTreeMap<String, f64>,
}

impl ActorMetrics {
    pub fn new(name: impl Into<String>) -> Self {
        ActorMetrics {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn ability_mut(&mut self, label: &str) -> &mut AbilityMetrics {
        self.abilities.entry(label.to_string()).or_default()
    }

    pub fn resource_mut(&mut self, kind: ResourceKind) -> &mut ResourceMetrics {
        self.resources.entry(kind).or_default()
    }

    pub fn add_aura_uptime(&mut self, label: &str, uptime: Duration) {
        *self.aura_uptime.entry(label.to_string()).or_default() += uptime.as_secs_f64();
    }

    /// Damage per second over an encounter of `duration`
    pub fn dps(&self, duration: Duration) -> f64 {
        per_second(self.damage_done, duration)
    }

    pub fn hps(&self, duration: Duration) -> f64 {
        per_second(self.healing_done, duration)
    }
}

fn per_second(amount: f64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        amount / secs
    } else {
        0.0
    }
}

/// Everything measured during one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationMetrics {
    pub iteration: u64,
    pub seed: u64,
    #[serde(rename = "duration_secs", with = "crate::config::secs")]
    pub duration: Duration,
    /// Indexed by actor id
    pub actors: Vec<ActorMetrics>,
}

impl IterationMetrics {
    pub fn new(iteration: u64, seed: u64, duration: Duration) -> Self {
        IterationMetrics {
            iteration,
            seed,
            duration,
            actors: Vec::new(),
        }
    }

    pub fn add_actor(&mut self, name: &str) {
        self.actors.push(ActorMetrics::new(name));
    }

    pub fn actor(&self, id: ActorId) -> Option<&ActorMetrics> {
        self.actors.get(id.index())
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut ActorMetrics> {
        self.actors.get_mut(id.index())
    }

    pub fn total_damage(&self) -> f64 {
        self.actors.iter().map(|a| a.damage_done).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

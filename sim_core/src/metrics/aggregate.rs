//! Cross-iteration aggregation
//!
//! Every accumulator here merges associatively, so partial aggregates built
//! on different worker threads can be reduced in any grouping.

use super::{AbilityMetrics, IterationMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running count, mean, variance and range of a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: u64,
    pub mean: f64,
    /// Sum of squared deviations from the mean
    m2: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for Summary {
    fn default() -> Self {
        Summary {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Summary {
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &Summary) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let (a, b, n) = (self.count as f64, other.count as f64, count as f64);
        self.mean += delta * b / n;
        self.m2 += other.m2 + delta * delta * a * b / n;
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Sample standard deviation
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }

    /// Standard error of the mean
    pub fn std_error(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.std_dev() / (self.count as f64).sqrt()
        }
    }
}

impl AbilityMetrics {
    fn absorb(&mut self, other: &AbilityMetrics) {
        self.casts += other.casts;
        self.hits += other.hits;
        self.crits += other.crits;
        self.misses += other.misses;
        self.dodges += other.dodges;
        self.glances += other.glances;
        self.ticks += other.ticks;
        self.crit_ticks += other.crit_ticks;
        self.interrupts += other.interrupts;
        self.damage += other.damage;
        self.healing += other.healing;
    }
}

/// Per-ability totals over all recorded iterations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilitySummary {
    pub totals: AbilityMetrics,
}

impl AbilitySummary {
    pub fn mean_damage(&self, iterations: u64) -> f64 {
        per_iteration(self.totals.damage, iterations)
    }

    pub fn mean_casts(&self, iterations: u64) -> f64 {
        per_iteration(self.totals.casts as f64, iterations)
    }
}

fn per_iteration(total: f64, iterations: u64) -> f64 {
    if iterations == 0 {
        0.0
    } else {
        total / iterations as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorSummary {
    pub name: String,
    pub dps: Summary,
    pub hps: Summary,
    pub abilities: BTreeMap<String, AbilitySummary>,
    /// Total active seconds per aura over all iterations
    pub aura_uptime: BTreeMap<String, f64>,
}

impl ActorSummary {
    fn merge(&mut self, other: &ActorSummary) {
        if self.name.is_empty() {
            self.name.clone_from(&other.name);
        }
        self.dps.merge(&other.dps);
        self.hps.merge(&other.hps);
        for (label, ability) in &other.abilities {
            self.abilities
                .entry(label.clone())
                .or_default()
                .totals
                .absorb(&ability.totals);
        }
        for (label, secs) in &other.aura_uptime {
            *self.aura_uptime.entry(label.clone()).or_default() += secs;
        }
    }
}

/// Statistics over many iterations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub iterations: u64,
    /// Total simulated seconds
    pub simulated_secs: f64,
    /// Indexed by actor id
    pub actors: Vec<ActorSummary>,
}

impl AggregateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, metrics: &IterationMetrics) {
        self.iterations += 1;
        self.simulated_secs += metrics.duration.as_secs_f64();
        if self.actors.len() < metrics.actors.len() {
            self.actors.resize_with(metrics.actors.len(), ActorSummary::default);
        }
        for (summary, actor) in self.actors.iter_mut().zip(&metrics.actors) {
            if summary.name.is_empty() {
                summary.name.clone_from(&actor.name);
            }
            summary.dps.add(actor.dps(metrics.duration));
            summary.hps.add(actor.hps(metrics.duration));
            for (label, ability) in &actor.abilities {
                summary
                    .abilities
                    .entry(label.clone())
                    .or_default()
                    .totals
                    .absorb(ability);
            }
            for (label, secs) in &actor.aura_uptime {
                *summary.aura_uptime.entry(label.clone()).or_default() += secs;
            }
        }
    }

    /// Combine with an aggregate built from other iterations
    pub fn merge(mut self, other: AggregateMetrics) -> AggregateMetrics {
        self.iterations += other.iterations;
        self.simulated_secs += other.simulated_secs;
        if self.actors.len() < other.actors.len() {
            self.actors.resize_with(other.actors.len(), ActorSummary::default);
        }
        for (mine, theirs) in self.actors.iter_mut().zip(&other.actors) {
            mine.merge(theirs);
        }
        self
    }

    /// Average fraction of the encounter an aura was active
    pub fn uptime_fraction(&self, actor: usize, aura: &str) -> f64 {
        match self.actors.get(actor).and_then(|a| a.aura_uptime.get(aura)) {
            Some(&secs) if self.simulated_secs > 0.0 => secs / self.simulated_secs,
            _ => 0.0,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

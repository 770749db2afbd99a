//! Events emitted to content code and the optional event log

use super::Simulation;
use crate::combat::Outcome;
use crate::error::SimResult;
use crate::types::{fmt_time, AbilityId, ActorId, AuraId, DotId};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Notification emitted by the engine. Content observes these to implement
/// cross-ability procs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SimEvent {
    CastStarted {
        caster: ActorId,
        ability: AbilityId,
        target: ActorId,
        cast: u64,
        completes_at: Duration,
    },
    CastCompleted {
        caster: ActorId,
        ability: AbilityId,
        target: ActorId,
        cast: u64,
        outcome: Outcome,
    },
    CastInterrupted {
        caster: ActorId,
        ability: AbilityId,
        cast: u64,
        refunded: f64,
    },
    /// Damage or healing applied, direct or periodic
    Hit {
        caster: ActorId,
        target: ActorId,
        source: String,
        outcome: Outcome,
        amount: f64,
        periodic: bool,
        healing: bool,
    },
    AuraGained {
        aura: AuraId,
        target: ActorId,
    },
    AuraRefreshed {
        aura: AuraId,
        target: ActorId,
    },
    AuraExpired {
        aura: AuraId,
        target: ActorId,
    },
    AuraStacksChanged {
        aura: AuraId,
        target: ActorId,
        old: u32,
        new: u32,
    },
    PeriodicTick {
        dot: DotId,
        caster: ActorId,
        target: ActorId,
        tick: u32,
    },
}

/// Observer of every emitted event
pub type Listener = Arc<dyn Fn(&mut Simulation, &SimEvent) -> SimResult<()> + Send + Sync>;

/// An event with the simulated time it was emitted at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedEvent {
    pub time: Duration,
    pub event: SimEvent,
}

impl std::fmt::Display for LoggedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:?}", fmt_time(self.time), self.event)
    }
}

impl Simulation {
    /// Register a listener for every emitted event
    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    /// Ordered log of emitted events (empty unless `record_events` is set)
    pub fn event_log(&self) -> &[LoggedEvent] {
        &self.log
    }

    pub(crate) fn emit(&mut self, event: SimEvent) -> SimResult<()> {
        tracing::trace!(time = ?self.now(), ?event, "emit");
        if self.config.record_events {
            self.log.push(LoggedEvent {
                time: self.now(),
                event: event.clone(),
            });
        }
        if self.listeners.is_empty() {
            return Ok(());
        }
        // Listeners may subscribe more listeners or emit recursively
        let listeners = self.listeners.clone();
        for listener in listeners {
            listener(self, &event)?;
        }
        Ok(())
    }
}

//! Periodic effects - damage, healing or resource ticks bound to an aura
//!
//! A periodic effect is attached to one aura and ticks only while that aura
//! is active. Gaining the aura schedules the first tick one interval later as
//! a recurring action; the action stops itself after the configured number of
//! ticks, and expiring the aura cancels it at once, so no tick ever lands
//! after the aura is gone.

mod engine;
mod types;

pub use types::{DotConfig, SnapshotPolicy, TickContext, TickEffect, TickFn, TickSnapshot};

use crate::clock::ActionHandle;
use crate::types::{ActorId, AuraId};
use std::sync::Arc;
use std::time::Duration;

/// Mutable per-iteration state of one attached periodic effect
pub(crate) struct DotInstance {
    pub config: Arc<DotConfig>,
    pub aura: AuraId,
    pub caster: ActorId,
    /// Recurring tick action while ticking
    pub handle: Option<ActionHandle>,
    /// Ticks fired since the last application
    pub ticks: u32,
    /// Interval in effect since the last application, after haste
    pub interval: Duration,
    pub snapshot: TickSnapshot,
}

impl DotInstance {
    pub(crate) fn reset(&mut self) {
        self.handle = None;
        self.ticks = 0;
        self.interval = self.config.tick_interval;
        self.snapshot = TickSnapshot::default();
    }
}

//! ResourcePool - a single depletable, regenerating pool

use super::ResourceError;
use crate::types::ResourceKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A depletable pool such as mana or energy.
///
/// `0 <= current <= max` holds after every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub kind: ResourceKind,
    current: f64,
    max: f64,
    /// Amount restored per simulated second by the regen action
    regen_per_second: f64,
    /// Amount the pool holds at the start of every iteration
    initial: f64,
    base_max: f64,
    base_regen_per_second: f64,
}

impl ResourcePool {
    /// Create a full pool
    pub fn new(kind: ResourceKind, max: f64) -> Self {
        let max = max.max(0.0);
        ResourcePool {
            kind,
            current: max,
            max,
            regen_per_second: 0.0,
            initial: max,
            base_max: max,
            base_regen_per_second: 0.0,
        }
    }

    /// Start (and reset) at `initial` instead of full
    pub fn with_initial(mut self, initial: f64) -> Self {
        self.initial = initial.clamp(0.0, self.max);
        self.current = self.initial;
        self
    }

    pub fn with_regen(mut self, per_second: f64) -> Self {
        self.regen_per_second = per_second.max(0.0);
        self.base_regen_per_second = self.regen_per_second;
        self
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn regen_per_second(&self) -> f64 {
        self.regen_per_second
    }

    pub fn missing(&self) -> f64 {
        self.max - self.current
    }

    /// Fraction of the pool currently filled
    pub fn percent(&self) -> f64 {
        if self.max <= 0.0 {
            return 0.0;
        }
        self.current / self.max
    }

    pub fn can_afford(&self, amount: f64) -> bool {
        amount <= self.current
    }

    /// Spend `amount`; fails without touching the pool when it is short
    pub fn spend(&mut self, amount: f64) -> Result<(), ResourceError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ResourceError::InvalidAmount {
                kind: self.kind,
                amount,
            });
        }
        if amount > self.current {
            return Err(ResourceError::Insufficient {
                kind: self.kind,
                needed: amount,
                available: self.current,
            });
        }
        self.current -= amount;
        Ok(())
    }

    /// Add `amount`, clamped to the maximum. Returns the amount absorbed.
    pub fn gain(&mut self, amount: f64) -> f64 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let absorbed = amount.min(self.missing());
        self.current = (self.current + absorbed).min(self.max);
        absorbed
    }

    /// Analytic regeneration over `elapsed` (before clamping).
    ///
    /// The periodic regen action gains exactly this per tick, so a run of
    /// ticks and the closed form agree until the pool caps.
    pub fn regen_over(&self, elapsed: Duration) -> f64 {
        self.regen_per_second * elapsed.as_secs_f64()
    }

    /// Change the regeneration rate until the next reset
    pub fn set_regen_rate(&mut self, per_second: f64) {
        self.regen_per_second = per_second.max(0.0);
    }

    /// Change the maximum until the next reset, clamping the current
    /// amount into range
    pub fn set_max(&mut self, max: f64) {
        self.max = max.max(0.0);
        self.current = self.current.min(self.max);
    }

    /// Restore the registered maximum, regen rate and starting amount
    pub fn reset(&mut self) {
        self.max = self.base_max;
        self.regen_per_second = self.base_regen_per_second;
        self.current = self.initial;
    }
}

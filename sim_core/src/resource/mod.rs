//! Resource ledger - per-actor depletable pools

mod pool;

pub use pool::ResourcePool;

use crate::types::ResourceKind;
use std::collections::BTreeMap;
use thiserror::Error;

/// Resource operation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("insufficient {kind:?}: need {needed:.1}, have {available:.1}")]
    Insufficient {
        kind: ResourceKind,
        needed: f64,
        available: f64,
    },
    #[error("actor has no {0:?} pool")]
    UnknownPool(ResourceKind),
    #[error("invalid {kind:?} amount {amount}")]
    InvalidAmount { kind: ResourceKind, amount: f64 },
}

/// All pools owned by one actor
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    pools: BTreeMap<ResourceKind, ResourcePool>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a pool
    pub fn add_pool(&mut self, pool: ResourcePool) {
        self.pools.insert(pool.kind, pool);
    }

    pub fn pool(&self, kind: ResourceKind) -> Option<&ResourcePool> {
        self.pools.get(&kind)
    }

    pub fn pool_mut(&mut self, kind: ResourceKind) -> Result<&mut ResourcePool, ResourceError> {
        self.pools.get_mut(&kind).ok_or(ResourceError::UnknownPool(kind))
    }

    pub fn pools(&self) -> impl Iterator<Item = &ResourcePool> {
        self.pools.values()
    }

    pub fn current(&self, kind: ResourceKind) -> Option<f64> {
        self.pools.get(&kind).map(ResourcePool::current)
    }

    pub fn can_afford(&self, kind: ResourceKind, amount: f64) -> bool {
        self.pools.get(&kind).is_some_and(|p| p.can_afford(amount))
    }

    pub fn spend(&mut self, kind: ResourceKind, amount: f64) -> Result<(), ResourceError> {
        self.pool_mut(kind)?.spend(amount)
    }

    /// Gain into a pool, returning the amount actually absorbed
    pub fn gain(&mut self, kind: ResourceKind, amount: f64) -> Result<f64, ResourceError> {
        Ok(self.pool_mut(kind)?.gain(amount))
    }

    pub fn reset(&mut self) {
        for pool in self.pools.values_mut() {
            pool.reset();
        }
    }
}

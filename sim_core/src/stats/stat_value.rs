//! StatValue - base value with flat, increased and multiplicative layers

use serde::{Deserialize, Serialize};

/// A stat following the Flat → Increased → Multiplier model.
///
/// Final value is `(base + flat) × (1 + increased) × multiplier`.
/// `multiplier` is kept as a running product so a dynamic effect can undo
/// itself by multiplying with the inverse factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatValue {
    pub base: f64,
    pub flat: f64,
    /// Sum of increased% as decimal (0.40 = 40%)
    pub increased: f64,
    pub multiplier: f64,
}

impl Default for StatValue {
    fn default() -> Self {
        StatValue::with_base(0.0)
    }
}

impl StatValue {
    pub fn with_base(base: f64) -> Self {
        StatValue {
            base,
            flat: 0.0,
            increased: 0.0,
            multiplier: 1.0,
        }
    }

    pub fn compute(&self) -> f64 {
        (self.base + self.flat) * (1.0 + self.increased) * self.multiplier
    }

    pub fn add_flat(&mut self, value: f64) {
        self.flat += value;
    }

    pub fn add_increased(&mut self, value: f64) {
        self.increased += value;
    }

    /// Multiply by `factor`; apply `1.0 / factor` to revert
    pub fn multiply(&mut self, factor: f64) {
        self.multiplier *= factor;
    }
}

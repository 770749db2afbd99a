//! Modifier registry - activatable numeric adjustments scoped by class mask
//!
//! Every actor owns one registry. Modifiers are registered inactive and only
//! contribute while active; toggling is idempotent.

mod kind;

pub use kind::{ModifierConfig, ModifierKind, ModifierQuery, Quantity};

use crate::error::{SimError, SimResult};
use crate::types::{ActorId, ClassMask, ModifierId};

#[derive(Debug, Clone)]
struct Modifier {
    config: ModifierConfig,
    active: bool,
    baseline_value: f64,
    baseline_active: bool,
}

#[derive(Debug, Clone)]
pub struct ModifierRegistry {
    owner: ActorId,
    /// `None` once discarded; slots are never reused
    slots: Vec<Option<Modifier>>,
}

impl ModifierRegistry {
    pub fn new(owner: ActorId) -> Self {
        ModifierRegistry {
            owner,
            slots: Vec::new(),
        }
    }

    /// Register an inactive modifier
    pub fn register(&mut self, config: ModifierConfig) -> ModifierId {
        let slot = self.slots.len() as u32;
        self.slots.push(Some(Modifier {
            baseline_value: config.value,
            config,
            active: false,
            baseline_active: false,
        }));
        ModifierId {
            owner: self.owner,
            slot,
        }
    }

    fn get(&self, id: ModifierId) -> SimResult<&Modifier> {
        if id.owner != self.owner {
            return Err(SimError::UnknownModifier(id));
        }
        self.slots
            .get(id.slot as usize)
            .and_then(Option::as_ref)
            .ok_or(SimError::UnknownModifier(id))
    }

    fn get_mut(&mut self, id: ModifierId) -> SimResult<&mut Modifier> {
        if id.owner != self.owner {
            return Err(SimError::UnknownModifier(id));
        }
        self.slots
            .get_mut(id.slot as usize)
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownModifier(id))
    }

    /// Start contributing. Returns false if it was already active.
    pub fn activate(&mut self, id: ModifierId) -> SimResult<bool> {
        let modifier = self.get_mut(id)?;
        let changed = !modifier.active;
        modifier.active = true;
        Ok(changed)
    }

    /// Stop contributing. Returns false if it was already inactive.
    pub fn deactivate(&mut self, id: ModifierId) -> SimResult<bool> {
        let modifier = self.get_mut(id)?;
        let changed = modifier.active;
        modifier.active = false;
        Ok(changed)
    }

    /// Change the magnitude; takes effect immediately even while active
    pub fn update_value(&mut self, id: ModifierId, value: f64) -> SimResult<()> {
        self.get_mut(id)?.config.value = value;
        Ok(())
    }

    pub fn is_active(&self, id: ModifierId) -> SimResult<bool> {
        Ok(self.get(id)?.active)
    }

    pub fn value(&self, id: ModifierId) -> SimResult<f64> {
        Ok(self.get(id)?.config.value)
    }

    /// Deactivate and drop a modifier. Later lookups of `id` fail.
    pub fn discard(&mut self, id: ModifierId) -> SimResult<()> {
        self.get(id)?;
        self.slots[id.slot as usize] = None;
        Ok(())
    }

    fn active_matching<'a>(
        &'a self,
        query: &'a ModifierQuery,
        kind: ModifierKind,
    ) -> impl Iterator<Item = f64> + 'a {
        self.slots
            .iter()
            .flatten()
            .filter(move |m| m.active && m.config.kind == kind && query.matches(&m.config))
            .map(|m| m.config.value)
    }

    /// Aggregate of all active modifiers of `kind` whose mask intersects `mask`.
    ///
    /// Flat kinds return the sum (0 when none); percent kinds return the
    /// product of `1 + value` (1 when none).
    pub fn effective_value(&self, mask: ClassMask, kind: ModifierKind) -> f64 {
        self.effective_value_for(&ModifierQuery::mask(mask), kind)
    }

    pub fn effective_value_for(&self, query: &ModifierQuery, kind: ModifierKind) -> f64 {
        if kind.is_percent() {
            self.active_matching(query, kind).map(|v| 1.0 + v).product()
        } else {
            self.active_matching(query, kind).sum()
        }
    }

    /// `(base + flat) × percent` for one quantity
    pub fn apply(&self, query: &ModifierQuery, quantity: Quantity, base: f64) -> f64 {
        let (flat, percent) = quantity.kinds();
        let flat = flat.map_or(0.0, |k| self.effective_value_for(query, k));
        let percent = percent.map_or(1.0, |k| self.effective_value_for(query, k));
        (base + flat) * percent
    }

    /// Record the current state as what [`Self::reset`] restores.
    ///
    /// Content setup may activate permanent modifiers before the first
    /// iteration; those stay active across resets.
    pub fn commit_baseline(&mut self) {
        for modifier in self.slots.iter_mut().flatten() {
            modifier.baseline_active = modifier.active;
            modifier.baseline_value = modifier.config.value;
        }
    }

    /// Restore the baseline activation state and values
    pub fn reset(&mut self) {
        for modifier in self.slots.iter_mut().flatten() {
            modifier.active = modifier.baseline_active;
            modifier.config.value = modifier.baseline_value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRE: ClassMask = ClassMask::tag(0);
    const FROST: ClassMask = ClassMask::tag(1);

    fn registry() -> ModifierRegistry {
        ModifierRegistry::new(ActorId(0))
    }

    #[test]
    fn test_registered_modifier_starts_inactive() {
        let mut reg = registry();
        let id = reg.register(ModifierConfig::new(ModifierKind::DamageFlat, 50.0, FIRE));
        assert!(!reg.is_active(id).unwrap());
        assert_eq!(reg.effective_value(FIRE, ModifierKind::DamageFlat), 0.0);
    }

    #[test]
    fn test_flat_sum_then_percent_product() {
        let mut reg = registry();
        let a = reg.register(ModifierConfig::new(ModifierKind::DamageFlat, 50.0, FIRE));
        let b = reg.register(ModifierConfig::new(ModifierKind::DamageFlat, 30.0, FIRE | FROST));
        let c = reg.register(ModifierConfig::new(ModifierKind::DamagePercent, 0.2, FIRE));
        for id in [a, b] {
            reg.activate(id).unwrap();
        }
        assert!((reg.effective_value(FIRE, ModifierKind::DamageFlat) - 80.0).abs() < 1e-9);

        reg.activate(c).unwrap();
        let base = 100.0;
        let applied = reg.apply(&ModifierQuery::mask(FIRE), Quantity::Damage, base);
        assert!((applied - (base + 80.0) * 1.2).abs() < 1e-9);

        // Frost only sees the multi-school flat bonus
        let frost = reg.apply(&ModifierQuery::mask(FROST), Quantity::Damage, base);
        assert!((frost - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_percent_modifiers_multiply() {
        let mut reg = registry();
        for v in [0.1, 0.2] {
            let id = reg.register(ModifierConfig::new(ModifierKind::CostPercent, v, FIRE));
            reg.activate(id).unwrap();
        }
        let product = reg.effective_value(FIRE, ModifierKind::CostPercent);
        assert!((product - 1.1 * 1.2).abs() < 1e-9);
        assert_eq!(reg.effective_value(FROST, ModifierKind::CostPercent), 1.0);
    }

    #[test]
    fn test_double_activate_never_double_applies() {
        let mut reg = registry();
        let id = reg.register(ModifierConfig::new(ModifierKind::DamageFlat, 10.0, FIRE));
        assert!(reg.activate(id).unwrap());
        assert!(!reg.activate(id).unwrap());
        assert!((reg.effective_value(FIRE, ModifierKind::DamageFlat) - 10.0).abs() < 1e-9);

        assert!(reg.deactivate(id).unwrap());
        assert!(!reg.deactivate(id).unwrap());
        assert_eq!(reg.effective_value(FIRE, ModifierKind::DamageFlat), 0.0);
    }

    #[test]
    fn test_update_value_while_active() {
        let mut reg = registry();
        let id = reg.register(ModifierConfig::new(ModifierKind::DamagePercent, 0.16, FROST));
        reg.activate(id).unwrap();
        reg.update_value(id, 0.30).unwrap();
        assert!((reg.effective_value(FROST, ModifierKind::DamagePercent) - 1.30).abs() < 1e-9);
    }

    #[test]
    fn test_discard_removes_contribution() {
        let mut reg = registry();
        let id = reg.register(ModifierConfig::new(ModifierKind::CritChance, 0.05, FIRE));
        reg.activate(id).unwrap();
        reg.discard(id).unwrap();
        assert_eq!(reg.effective_value(FIRE, ModifierKind::CritChance), 0.0);
        assert!(matches!(reg.activate(id), Err(SimError::UnknownModifier(_))));
    }

    #[test]
    fn test_foreign_id_rejected() {
        let mut mine = registry();
        let mut theirs = ModifierRegistry::new(ActorId(1));
        let id = theirs.register(ModifierConfig::new(ModifierKind::CritChance, 0.05, FIRE));
        mine.register(ModifierConfig::new(ModifierKind::CritChance, 0.05, FIRE));
        assert!(mine.activate(id).is_err());
    }

    #[test]
    fn test_reset_restores_registered_values() {
        let mut reg = registry();
        let id = reg.register(ModifierConfig::new(ModifierKind::DamageFlat, 5.0, FIRE));
        reg.activate(id).unwrap();
        reg.update_value(id, 9.0).unwrap();
        reg.reset();
        assert!(!reg.is_active(id).unwrap());
        assert_eq!(reg.value(id).unwrap(), 5.0);
    }

    #[test]
    fn test_reset_keeps_committed_baseline() {
        let mut reg = registry();
        let talent = reg.register(ModifierConfig::new(ModifierKind::DamagePercent, 0.1, FIRE));
        let buff = reg.register(ModifierConfig::new(ModifierKind::DamagePercent, 0.2, FIRE));
        reg.activate(talent).unwrap();
        reg.commit_baseline();

        reg.activate(buff).unwrap();
        reg.deactivate(talent).unwrap();
        reg.reset();
        assert!(reg.is_active(talent).unwrap());
        assert!(!reg.is_active(buff).unwrap());
    }
}

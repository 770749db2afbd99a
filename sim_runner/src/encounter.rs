//! Encounter descriptions loaded from TOML
//!
//! An encounter lists actors, auras (optionally carrying a periodic effect),
//! abilities built from a handful of effect building blocks, and a priority
//! list per actor. [`EncounterConfig::build`] registers all of it on a fresh
//! [`Simulation`]; names are resolved once there, so a typo fails the run
//! before any iteration starts.

use serde::{Deserialize, Serialize};
use sim_core::ability::{effects, EffectFn};
use sim_core::config::{opt_secs, secs};
use sim_core::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterConfig {
    pub sim: SimConfig,
    #[serde(default)]
    pub actors: Vec<ActorEntry>,
    #[serde(default)]
    pub auras: Vec<AuraEntry>,
    #[serde(default)]
    pub abilities: Vec<AbilityEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorEntry {
    pub name: String,
    #[serde(default)]
    pub stats: BTreeMap<Stat, f64>,
    #[serde(default)]
    pub pools: Vec<PoolEntry>,
    /// Highest priority first
    #[serde(default)]
    pub rotation: Vec<RotationEntry>,
    #[serde(default)]
    pub auto_attack: Option<AutoAttackEntry>,
}

/// A main-hand weapon swinging on its own timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoAttackEntry {
    pub target: String,
    pub speed_secs: f64,
    pub damage: f64,
    #[serde(default = "default_melee_label")]
    pub label: String,
    #[serde(default)]
    pub tags: Vec<u32>,
}

fn default_melee_label() -> String {
    "melee".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEntry {
    pub kind: ResourceKind,
    pub max: f64,
    /// Starts full when absent
    #[serde(default)]
    pub initial: Option<f64>,
    #[serde(default)]
    pub regen_per_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationEntry {
    pub ability: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierEntry {
    pub kind: ModifierKind,
    pub value: f64,
    /// Class mask tags (0..64); abilities sharing a tag are affected
    #[serde(default)]
    pub tags: Vec<u32>,
    #[serde(default)]
    pub school: Option<SpellSchool>,
    /// Scale with the owning aura's stacks
    #[serde(default)]
    pub per_stack: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusiveEntry {
    pub category: String,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuraEntry {
    pub label: String,
    /// Actor the aura is bound to
    pub target: String,
    /// Never expires when absent
    #[serde(default, rename = "duration_secs", with = "opt_secs")]
    pub duration: Option<Duration>,
    #[serde(default = "default_stacks")]
    pub max_stacks: u32,
    #[serde(default)]
    pub exclusive: Option<ExclusiveEntry>,
    #[serde(default)]
    pub refresh_is_gain: bool,
    #[serde(default)]
    pub permanent: bool,
    #[serde(default)]
    pub modifiers: Vec<ModifierEntry>,
    #[serde(default)]
    pub dot: Option<DotEntry>,
}

fn default_stacks() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotEntry {
    pub caster: String,
    #[serde(rename = "interval_secs", with = "secs")]
    pub interval: Duration,
    /// Ticks for as long as the aura lasts when absent
    #[serde(default)]
    pub ticks: Option<u32>,
    pub effect: TickEntry,
    #[serde(default)]
    pub snapshot: SnapshotPolicy,
    #[serde(default)]
    pub hasted: bool,
    #[serde(default)]
    pub can_crit: bool,
    #[serde(default)]
    pub tags: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TickEntry {
    Damage {
        base: f64,
        #[serde(default)]
        coefficient: f64,
        #[serde(default = "default_power")]
        power: Stat,
    },
    Healing {
        base: f64,
        #[serde(default)]
        coefficient: f64,
        #[serde(default = "default_power")]
        power: Stat,
    },
    Resource {
        kind: ResourceKind,
        amount: f64,
        #[serde(default)]
        percent_of_max: bool,
    },
}

fn default_power() -> Stat {
    Stat::SpellPower
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountEntry {
    pub base: f64,
    #[serde(default)]
    pub coefficient: f64,
    #[serde(default = "default_power")]
    pub power: Stat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub kind: ResourceKind,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityEntry {
    pub label: String,
    #[serde(default)]
    pub tags: Vec<u32>,
    #[serde(default)]
    pub school: Option<SpellSchool>,
    #[serde(default)]
    pub cost: Option<ResourceEntry>,
    #[serde(default)]
    pub cast_time_secs: f64,
    #[serde(default)]
    pub cooldown_secs: Option<f64>,
    #[serde(default = "default_true")]
    pub triggers_gcd: bool,
    #[serde(default)]
    pub outcome: Option<OutcomeMode>,
    #[serde(default)]
    pub damage: Option<AmountEntry>,
    #[serde(default)]
    pub heal: Option<AmountEntry>,
    /// Label of an aura to apply on a landed cast
    #[serde(default)]
    pub apply_aura: Option<String>,
    /// Label of an aura whose periodic effect is applied on a landed cast
    #[serde(default)]
    pub apply_dot: Option<String>,
    /// Resource restored to the caster
    #[serde(default)]
    pub gain: Option<ResourceEntry>,
}

fn default_true() -> bool {
    true
}

fn mask(tags: &[u32]) -> SimResult<ClassMask> {
    tags.iter().try_fold(ClassMask::NONE, |mask, &tag| {
        if tag >= 64 {
            Err(SimError::InvalidDefinition(format!(
                "class mask tag {tag} out of range (0..64)"
            )))
        } else {
            Ok(mask | ClassMask::tag(tag))
        }
    })
}

fn lookup<T: Copy>(map: &HashMap<&str, T>, what: &str, name: &str) -> SimResult<T> {
    map.get(name)
        .copied()
        .ok_or_else(|| SimError::InvalidDefinition(format!("unknown {what} '{name}'")))
}

impl TickEntry {
    fn to_effect(&self) -> TickEffect {
        match *self {
            TickEntry::Damage {
                base,
                coefficient,
                power,
            } => TickEffect::Damage {
                base,
                coefficient,
                power,
            },
            TickEntry::Healing {
                base,
                coefficient,
                power,
            } => TickEffect::Healing {
                base,
                coefficient,
                power,
            },
            TickEntry::Resource {
                kind,
                amount,
                percent_of_max,
            } => TickEffect::Resource {
                kind,
                amount,
                percent_of_max,
            },
        }
    }
}

impl EncounterConfig {
    /// Register the whole encounter on a new simulation configured by `config`
    pub fn build(&self, config: &SimConfig) -> SimResult<Simulation> {
        let mut sim = Simulation::new(config.clone())?;

        let mut actors: HashMap<&str, ActorId> = HashMap::new();
        for entry in &self.actors {
            let stats = entry
                .stats
                .iter()
                .fold(StatBlock::new(), |stats, (&stat, &value)| stats.with(stat, value));
            let mut actor = ActorConfig::new(entry.name.as_str()).with_stats(stats);
            for pool in &entry.pools {
                let mut built = ResourcePool::new(pool.kind, pool.max).with_regen(pool.regen_per_sec);
                if let Some(initial) = pool.initial {
                    built = built.with_initial(initial);
                }
                actor = actor.with_pool(built);
            }
            let id = sim.add_actor(actor);
            if actors.insert(entry.name.as_str(), id).is_some() {
                return Err(SimError::InvalidDefinition(format!(
                    "duplicate actor '{}'",
                    entry.name
                )));
            }
        }

        for entry in &self.actors {
            if let Some(weapon) = &entry.auto_attack {
                let weapon_config = AutoAttackConfig::new(
                    lookup(&actors, "actor", &weapon.target)?,
                    weapon.speed_secs,
                    weapon.damage,
                )
                .with_label(weapon.label.as_str())
                .with_mask(mask(&weapon.tags)?);
                sim.enable_auto_attacks(lookup(&actors, "actor", &entry.name)?, weapon_config)?;
            }
        }

        let mut auras: HashMap<&str, AuraId> = HashMap::new();
        let mut dots: HashMap<&str, DotId> = HashMap::new();
        for entry in &self.auras {
            let target = lookup(&actors, "actor", &entry.target)?;
            let duration = entry
                .duration
                .map_or(AuraDuration::NeverExpires, AuraDuration::Finite);
            let mut aura = AuraConfig::new(entry.label.as_str(), duration).with_max_stacks(entry.max_stacks);
            if let Some(exclusive) = &entry.exclusive {
                aura = aura.exclusive(exclusive.category.as_str(), exclusive.priority);
            }
            if entry.refresh_is_gain {
                aura = aura.refresh_is_gain();
            }
            if entry.permanent {
                aura = aura.permanent();
            }
            for modifier in &entry.modifiers {
                let mut config = ModifierConfig::new(modifier.kind, modifier.value, mask(&modifier.tags)?);
                if let Some(school) = modifier.school {
                    config = config.with_school(school);
                }
                aura = if modifier.per_stack {
                    aura.with_stacking_modifier(config)
                } else {
                    aura.with_modifier(config)
                };
            }
            let id = sim.register_aura(target, aura)?;
            auras.insert(entry.label.as_str(), id);

            if let Some(dot) = &entry.dot {
                let caster = lookup(&actors, "actor", &dot.caster)?;
                let mut config = DotConfig::new(entry.label.as_str(), dot.interval, dot.ticks, dot.effect.to_effect())
                    .with_snapshot(dot.snapshot)
                    .with_mask(mask(&dot.tags)?);
                if dot.hasted {
                    config = config.hasted();
                }
                if dot.can_crit {
                    config = config.can_crit();
                }
                dots.insert(entry.label.as_str(), sim.attach_dot(id, caster, config)?);
            }
        }

        let mut abilities: HashMap<&str, AbilityId> = HashMap::new();
        for entry in &self.abilities {
            let config = self.ability(entry, &auras, &dots)?;
            abilities.insert(entry.label.as_str(), sim.register_ability(config)?);
        }

        for entry in &self.actors {
            if entry.rotation.is_empty() {
                continue;
            }
            let mut list = PriorityList::new();
            for step in &entry.rotation {
                list = list.with(
                    lookup(&abilities, "ability", &step.ability)?,
                    lookup(&actors, "actor", &step.target)?,
                );
            }
            debug!(actor = %entry.name, entries = list.len(), "rotation set");
            sim.set_rotation(lookup(&actors, "actor", &entry.name)?, Box::new(list))?;
        }
        Ok(sim)
    }

    fn ability(
        &self,
        entry: &AbilityEntry,
        auras: &HashMap<&str, AuraId>,
        dots: &HashMap<&str, DotId>,
    ) -> SimResult<AbilityConfig> {
        let mut config = AbilityConfig::new(entry.label.as_str())
            .with_mask(mask(&entry.tags)?)
            .with_cast_time(entry.cast_time_secs);
        if let Some(school) = entry.school {
            config = config.with_school(school);
        }
        if let Some(cost) = &entry.cost {
            config = config.with_cost(cost.kind, cost.amount);
        }
        if let Some(cooldown) = entry.cooldown_secs {
            config = config.with_cooldown(cooldown);
        }
        if !entry.triggers_gcd {
            config = config.off_gcd();
        }
        if let Some(outcome) = entry.outcome {
            config = config.with_outcome(outcome);
        }
        if entry.heal.is_some() && entry.damage.is_none() {
            config = config.with_proc_mask(ProcMask::SPELL_HEALING);
        }

        let mut steps: Vec<EffectFn> = Vec::new();
        if let Some(damage) = &entry.damage {
            steps.push(effects::direct_damage(damage.base, damage.coefficient, damage.power));
        }
        if let Some(heal) = &entry.heal {
            steps.push(effects::direct_heal(heal.base, heal.coefficient, heal.power));
        }
        if let Some(label) = &entry.apply_aura {
            steps.push(effects::apply_aura(lookup(auras, "aura", label)?));
        }
        if let Some(label) = &entry.apply_dot {
            steps.push(effects::apply_dot(lookup(dots, "periodic effect", label)?));
        }
        if let Some(gain) = &entry.gain {
            steps.push(effects::gain_resource(gain.kind, gain.amount));
        }
        if !steps.is_empty() {
            config = config.with_effect(effects::chain(steps));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::config::parse_toml;

    const FIRE_MAGE: &str = include_str!("../encounters/fire_mage.toml");

    #[test]
    fn test_parse_bundled_encounter() {
        let encounter: EncounterConfig = parse_toml(FIRE_MAGE).unwrap();
        assert_eq!(encounter.actors.len(), 2);
        assert!(encounter.auras.iter().any(|a| a.dot.is_some()));
        assert!(encounter.abilities.iter().any(|a| a.apply_dot.is_some()));
        assert_eq!(encounter.sim.duration, Duration::from_secs(180));
    }

    #[test]
    fn test_bundled_encounter_runs() {
        let encounter: EncounterConfig = parse_toml(FIRE_MAGE).unwrap();
        let mut sim = encounter.build(&encounter.sim).unwrap();
        let metrics = sim.run_iteration(0).unwrap();
        let mage = &metrics.actors[0];
        assert!(mage.damage_done > 0.0);
        assert!(mage.abilities["fireball"].casts > 0);
        assert!(mage.abilities["living_bomb"].ticks > 0);
        assert!(mage.aura_uptime["molten_armor"] > 0.0);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let toml = r#"
[sim]
duration_secs = 30.0

[[actors]]
name = "mage"
rotation = [{ ability = "frostbolt", target = "nobody" }]

[[abilities]]
label = "frostbolt"
"#;
        let encounter: EncounterConfig = parse_toml(toml).unwrap();
        let err = encounter.build(&encounter.sim).unwrap_err();
        assert!(err.to_string().contains("unknown actor 'nobody'"));
    }

    #[test]
    fn test_auto_attacks_swing() {
        let toml = r#"
[sim]
duration_secs = 30.0

[[actors]]
name = "death_knight"
stats = { attack_power = 2800.0 }
auto_attack = { target = "dummy", speed_secs = 3.0, damage = 400.0 }

[[actors]]
name = "dummy"
pools = [{ kind = "health", max = 1e7 }]
"#;
        let encounter: EncounterConfig = parse_toml(toml).unwrap();
        let mut sim = encounter.build(&encounter.sim).unwrap();
        let metrics = sim.run_iteration(0).unwrap();
        // Swings at 0, 3, ..., 27
        assert_eq!(metrics.actors[0].abilities["melee"].casts, 10);
    }

    #[test]
    fn test_out_of_range_tag_rejected() {
        assert!(mask(&[3, 63]).is_ok());
        assert!(matches!(mask(&[64]), Err(SimError::InvalidDefinition(_))));
    }
}

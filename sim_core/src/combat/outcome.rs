//! Outcome resolution - attack tables rolled on the iteration's random stream

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Result of an attack or spell roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Miss,
    Dodge,
    Glance,
    Hit,
    Crit,
}

impl Outcome {
    /// Whether the effect lands at all
    pub fn landed(self) -> bool {
        matches!(self, Outcome::Hit | Outcome::Crit | Outcome::Glance)
    }

    pub fn is_crit(self) -> bool {
        self == Outcome::Crit
    }
}

/// Which table an ability or tick rolls on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeMode {
    /// Hit roll, then crit roll
    SpellHitAndCrit,
    /// Hit roll only (e.g. debuffs)
    SpellHitNoCrit,
    /// Crit roll only (e.g. heals)
    SpellCrit,
    /// Single roll: miss, dodge, crit, hit
    MeleeSpecial,
    /// Single roll: miss, dodge, glance, crit, hit
    MeleeAuto,
    /// Periodic tick that cannot crit
    Tick,
    /// Periodic tick with a crit roll
    TickCrit,
    AlwaysHit,
}

impl OutcomeMode {
    pub fn is_melee(self) -> bool {
        matches!(self, OutcomeMode::MeleeSpecial | OutcomeMode::MeleeAuto)
    }

    /// Mode used by periodic ticks
    pub fn for_tick(can_crit: bool) -> OutcomeMode {
        if can_crit {
            OutcomeMode::TickCrit
        } else {
            OutcomeMode::Tick
        }
    }
}

/// Probabilities in `[0, 1]` fed into [`resolve`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AttackChances {
    pub miss: f64,
    pub dodge: f64,
    pub glance: f64,
    pub crit: f64,
}

/// Roll an outcome.
///
/// Spells use two independent rolls (hit, then crit among hits). Melee uses
/// one roll on a table where each entry takes its share in order; entries
/// that overflow the table are pushed off the end.
pub fn resolve(mode: OutcomeMode, chances: &AttackChances, rng: &mut impl Rng) -> Outcome {
    match mode {
        OutcomeMode::SpellHitAndCrit => {
            if rng.gen::<f64>() < chances.miss {
                Outcome::Miss
            } else if rng.gen::<f64>() < chances.crit {
                Outcome::Crit
            } else {
                Outcome::Hit
            }
        }
        OutcomeMode::SpellHitNoCrit => {
            if rng.gen::<f64>() < chances.miss {
                Outcome::Miss
            } else {
                Outcome::Hit
            }
        }
        OutcomeMode::SpellCrit | OutcomeMode::TickCrit => {
            if rng.gen::<f64>() < chances.crit {
                Outcome::Crit
            } else {
                Outcome::Hit
            }
        }
        OutcomeMode::MeleeSpecial | OutcomeMode::MeleeAuto => {
            let glance = if mode == OutcomeMode::MeleeAuto {
                chances.glance
            } else {
                0.0
            };
            let roll = rng.gen::<f64>();
            let table = [
                (chances.miss, Outcome::Miss),
                (chances.dodge, Outcome::Dodge),
                (glance, Outcome::Glance),
                (chances.crit, Outcome::Crit),
            ];
            let mut edge = 0.0;
            for (chance, outcome) in table {
                edge += chance.max(0.0);
                if roll < edge {
                    return outcome;
                }
            }
            Outcome::Hit
        }
        OutcomeMode::Tick | OutcomeMode::AlwaysHit => Outcome::Hit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn frequencies(mode: OutcomeMode, chances: &AttackChances, n: usize) -> [f64; 5] {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut counts = [0usize; 5];
        for _ in 0..n {
            let slot = match resolve(mode, chances, &mut rng) {
                Outcome::Miss => 0,
                Outcome::Dodge => 1,
                Outcome::Glance => 2,
                Outcome::Hit => 3,
                Outcome::Crit => 4,
            };
            counts[slot] += 1;
        }
        counts.map(|c| c as f64 / n as f64)
    }

    #[test]
    fn test_spell_crit_is_conditional_on_hit() {
        let chances = AttackChances {
            miss: 0.2,
            crit: 0.5,
            ..Default::default()
        };
        let f = frequencies(OutcomeMode::SpellHitAndCrit, &chances, 100_000);
        assert!((f[0] - 0.2).abs() < 0.01);
        // 50% of the 80% that hit
        assert!((f[4] - 0.4).abs() < 0.01);
        assert_eq!(f[1], 0.0);
    }

    #[test]
    fn test_melee_single_roll_table() {
        let chances = AttackChances {
            miss: 0.08,
            dodge: 0.065,
            glance: 0.24,
            crit: 0.25,
        };
        let auto = frequencies(OutcomeMode::MeleeAuto, &chances, 100_000);
        assert!((auto[2] - 0.24).abs() < 0.01);
        assert!((auto[4] - 0.25).abs() < 0.01);

        let special = frequencies(OutcomeMode::MeleeSpecial, &chances, 100_000);
        assert_eq!(special[2], 0.0);
        assert!((special[1] - 0.065).abs() < 0.01);
    }

    #[test]
    fn test_overflowing_table_pushes_hits_off() {
        let chances = AttackChances {
            miss: 0.6,
            dodge: 0.3,
            glance: 0.0,
            crit: 0.5,
        };
        let f = frequencies(OutcomeMode::MeleeSpecial, &chances, 20_000);
        assert_eq!(f[3], 0.0);
        assert!((f[4] - 0.1).abs() < 0.02);
    }

    #[test]
    fn test_ticks_without_crit_never_roll() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut untouched = rng.clone();
        let chances = AttackChances {
            crit: 1.0,
            ..Default::default()
        };
        assert_eq!(resolve(OutcomeMode::Tick, &chances, &mut rng), Outcome::Hit);
        assert_eq!(rng.gen::<u64>(), untouched.gen::<u64>());
        assert_eq!(resolve(OutcomeMode::TickCrit, &chances, &mut rng), Outcome::Crit);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let chances = AttackChances {
            miss: 0.1,
            crit: 0.3,
            ..Default::default()
        };
        let roll = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..64)
                .map(|_| resolve(OutcomeMode::SpellHitAndCrit, &chances, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(roll(7), roll(7));
        assert_ne!(roll(7), roll(8));
    }
}

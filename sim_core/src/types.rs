//! Core types shared by every engine module

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::time::Duration;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                $name(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Stable identity of an actor (caster or target) within a simulation
    ActorId,
    "actor"
);
id_type!(
    /// Handle to a registered ability definition
    AbilityId,
    "ability"
);
id_type!(
    /// Handle to a registered aura instance (one aura config bound to one target)
    AuraId,
    "aura"
);
id_type!(
    /// Handle to a periodic effect attached to an aura
    DotId,
    "dot"
);

/// Handle to a modifier inside one actor's registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModifierId {
    pub owner: ActorId,
    pub slot: u32,
}

impl fmt::Display for ModifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "modifier#{}@{}", self.slot, self.owner)
    }
}

/// Classification bitset used to tag abilities and scope modifiers.
///
/// Up to 64 content-defined tags. Two masks *match* when their bitwise
/// intersection is non-empty, so one modifier can cover many abilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassMask(pub u64);

impl ClassMask {
    pub const NONE: ClassMask = ClassMask(0);
    pub const ALL: ClassMask = ClassMask(u64::MAX);

    /// Mask with only tag `n` set. Panics if `n >= 64`.
    pub const fn tag(n: u32) -> ClassMask {
        assert!(n < 64, "class mask supports at most 64 tags");
        ClassMask(1 << n)
    }

    pub fn matches(self, other: ClassMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ClassMask {
    type Output = ClassMask;

    fn bitor(self, rhs: ClassMask) -> ClassMask {
        ClassMask(self.0 | rhs.0)
    }
}

impl BitAnd for ClassMask {
    type Output = ClassMask;

    fn bitand(self, rhs: ClassMask) -> ClassMask {
        ClassMask(self.0 & rhs.0)
    }
}

bitflags! {
    /// Magic school(s) an ability belongs to. Multi-school abilities set several bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SpellSchool: u8 {
        const PHYSICAL = 1 << 0;
        const ARCANE   = 1 << 1;
        const FIRE     = 1 << 2;
        const FROST    = 1 << 3;
        const HOLY     = 1 << 4;
        const NATURE   = 1 << 5;
        const SHADOW   = 1 << 6;
    }
}

bitflags! {
    /// Engine-level categories that proc listeners key off.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ProcMask: u16 {
        const MELEE_AUTO       = 1 << 0;
        const MELEE_SPECIAL    = 1 << 1;
        const RANGED           = 1 << 2;
        const SPELL_DAMAGE     = 1 << 3;
        const SPELL_HEALING    = 1 << 4;
        const PERIODIC_DAMAGE  = 1 << 5;
        const PERIODIC_HEALING = 1 << 6;

        const MELEE = Self::MELEE_AUTO.bits() | Self::MELEE_SPECIAL.bits();
        const PERIODIC = Self::PERIODIC_DAMAGE.bits() | Self::PERIODIC_HEALING.bits();
    }
}

impl ProcMask {
    /// Intersection test, mirroring [`ClassMask::matches`]
    pub fn matches(self, other: ProcMask) -> bool {
        self.intersects(other)
    }
}

/// Kinds of depletable resource pools an actor may own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Health,
    Mana,
    Energy,
    Rage,
    RunicPower,
}

impl ResourceKind {
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::Health,
            ResourceKind::Mana,
            ResourceKind::Energy,
            ResourceKind::Rage,
            ResourceKind::RunicPower,
        ]
    }
}

/// How long an aura lasts once gained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuraDuration {
    Finite(Duration),
    NeverExpires,
}

impl AuraDuration {
    pub fn secs(secs: f64) -> Self {
        AuraDuration::Finite(Duration::from_secs_f64(secs))
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, AuraDuration::Finite(_))
    }
}

/// Format a simulated time as seconds with millisecond precision
pub fn fmt_time(time: Duration) -> String {
    format!("{:.3}s", time.as_secs_f64())
}

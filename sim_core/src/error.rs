//! Error taxonomy for the engine

use crate::config::ConfigError;
use crate::resource::ResourceError;
use crate::types::{AbilityId, ActorId, AuraId, DotId, ModifierId};
use std::time::Duration;
use thiserror::Error;

/// Fatal engine errors.
///
/// Any of these aborts the current iteration: aggregate statistics are only
/// meaningful when no iteration continued past an inconsistent state.
/// Expected outcomes (a rejected cast, cancelling a dead handle) are not errors.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("cannot schedule at {at:?}: clock is already at {now:?}")]
    InvalidSchedule { at: Duration, now: Duration },
    #[error("event queue corrupted: {0}")]
    CorruptedQueue(String),
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),
    #[error("unknown ability {0}")]
    UnknownAbility(AbilityId),
    #[error("unknown aura {0}")]
    UnknownAura(AuraId),
    #[error("unknown periodic effect {0}")]
    UnknownDot(DotId),
    #[error("unknown modifier {0}")]
    UnknownModifier(ModifierId),
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("iteration {iteration} aborted: {source}")]
    IterationAborted {
        iteration: u64,
        #[source]
        source: Box<SimError>,
    },
}

pub type SimResult<T> = Result<T, SimError>;

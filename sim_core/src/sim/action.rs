//! Payloads the simulation schedules on its event queue

use super::Simulation;
use crate::error::SimResult;
use crate::types::{ActorId, AuraId, DotId, ResourceKind};
use std::fmt;

/// Callback scheduled by content code
pub type CustomAction = Box<dyn FnMut(&mut Simulation) -> SimResult<()> + Send>;

pub(crate) enum Action {
    ExpireAura(AuraId),
    Tick(DotId),
    CompleteCast { actor: ActorId, cast: u64 },
    Ready(ActorId),
    Regen { actor: ActorId, kind: ResourceKind },
    Swing(ActorId),
    Custom(CustomAction),
}

impl Action {
    /// Copy of a plain-data action; closures cannot be copied
    pub(crate) fn replicate(&self) -> Option<Action> {
        match *self {
            Action::ExpireAura(aura) => Some(Action::ExpireAura(aura)),
            Action::Tick(dot) => Some(Action::Tick(dot)),
            Action::CompleteCast { actor, cast } => Some(Action::CompleteCast { actor, cast }),
            Action::Ready(actor) => Some(Action::Ready(actor)),
            Action::Regen { actor, kind } => Some(Action::Regen { actor, kind }),
            Action::Swing(actor) => Some(Action::Swing(actor)),
            Action::Custom(_) => None,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ExpireAura(aura) => write!(f, "ExpireAura({aura})"),
            Action::Tick(dot) => write!(f, "Tick({dot})"),
            Action::CompleteCast { actor, cast } => write!(f, "CompleteCast({actor}, cast {cast})"),
            Action::Ready(actor) => write!(f, "Ready({actor})"),
            Action::Regen { actor, kind } => write!(f, "Regen({actor}, {kind:?})"),
            Action::Swing(actor) => write!(f, "Swing({actor})"),
            Action::Custom(_) => f.write_str("Custom"),
        }
    }
}

//! Decision layer seam
//!
//! An actor with a [`Rotation`] is asked what to do at the start of every
//! iteration and each time it becomes ready again: its global cooldown has
//! elapsed and it is not casting. The engine only acts on the answer; which
//! ability is worth casting is the rotation's business.

use crate::ability::CastResult;
use crate::clock::ActionPriority;
use crate::error::SimResult;
use crate::sim::{Action, Simulation};
use crate::types::{AbilityId, ActorId};
use std::time::Duration;
use tracing::trace;

/// How long an actor waits before asking again after a rejected decision
/// with no known ready time (e.g. short on resources)
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// What a ready actor does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Cast { ability: AbilityId, target: ActorId },
    /// Ask again at this time
    WaitUntil(Duration),
    /// Do nothing for the rest of the iteration
    Idle,
}

pub trait Rotation: Send {
    fn choose(&mut self, sim: &Simulation, actor: ActorId) -> SimResult<Decision>;

    /// Called when the simulation resets for a new iteration
    fn reset(&mut self) {}
}

/// Cast the first castable entry; otherwise wait for the earliest one
#[derive(Debug, Clone, Default)]
pub struct PriorityList {
    entries: Vec<(AbilityId, ActorId)>,
}

impl PriorityList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ability: AbilityId, target: ActorId) -> Self {
        self.entries.push((ability, target));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Rotation for PriorityList {
    fn choose(&mut self, sim: &Simulation, actor: ActorId) -> SimResult<Decision> {
        let now = sim.now();
        let mut earliest: Option<Duration> = None;
        for &(ability, target) in &self.entries {
            match sim.check_cast(actor, ability, target)? {
                None => return Ok(Decision::Cast { ability, target }),
                Some(reason) => {
                    let at = reason.ready_at().unwrap_or(now + RETRY_DELAY);
                    earliest = Some(earliest.map_or(at, |e| e.min(at)));
                }
            }
        }
        Ok(earliest.map_or(Decision::Idle, Decision::WaitUntil))
    }
}

impl Simulation {
    /// Schedule the next decision of a rotation-driven actor for when its
    /// GCD and current cast are both done
    pub(crate) fn schedule_ready(&mut self, actor: ActorId) -> SimResult<()> {
        let a = self.actor(actor)?;
        if !a.driven {
            return Ok(());
        }
        let casting_until = a.casting.as_ref().map_or(Duration::ZERO, |c| c.completes_at);
        let at = self.now().max(a.gcd_ready_at).max(casting_until);
        self.schedule_ready_at(actor, at)
    }

    fn schedule_ready_at(&mut self, actor: ActorId, at: Duration) -> SimResult<()> {
        if let Some(old) = self.actor_mut(actor)?.ready_action.take() {
            self.queue.cancel(old);
        }
        let handle = self
            .queue
            .schedule_with_priority(Action::Ready(actor), at, ActionPriority::READY)?;
        self.actor_mut(actor)?.ready_action = Some(handle);
        Ok(())
    }

    pub(crate) fn actor_ready(&mut self, actor: ActorId) -> SimResult<()> {
        let now = self.now();
        let a = self.actor_mut(actor)?;
        a.ready_action = None;
        if a.is_casting() || a.gcd_ready_at > now {
            return self.schedule_ready(actor);
        }
        let Some(mut rotation) = a.rotation.take() else {
            return Ok(());
        };
        let decision = rotation.choose(self, actor);
        self.actor_mut(actor)?.rotation = Some(rotation);
        let decision = decision?;
        trace!(time = ?now, %actor, ?decision, "actor ready");

        match decision {
            Decision::Cast { ability, target } => match self.try_cast(actor, ability, target)? {
                CastResult::Accepted { .. } => Ok(()),
                CastResult::Rejected(reason) => {
                    let at = reason.ready_at().filter(|&t| t > now).unwrap_or(now + RETRY_DELAY);
                    self.schedule_ready_at(actor, at)
                }
            },
            Decision::WaitUntil(at) => {
                let at = if at > now { at } else { now + RETRY_DELAY };
                self.schedule_ready_at(actor, at)
            }
            Decision::Idle => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AbilityConfig;
    use crate::combat::OutcomeMode;
    use crate::config::SimConfig;
    use crate::resource::ResourcePool;
    use crate::sim::ActorConfig;
    use crate::types::ResourceKind;

    fn setup() -> (Simulation, ActorId, ActorId, AbilityId, AbilityId) {
        let mut sim = Simulation::new(SimConfig::with_duration(10.0)).unwrap();
        let mage = sim.add_actor(
            ActorConfig::new("mage").with_pool(ResourcePool::new(ResourceKind::Mana, 100_000.0)),
        );
        let dummy = sim.add_actor(ActorConfig::new("dummy"));
        let blast = sim
            .register_ability(
                AbilityConfig::new("fire_blast")
                    .with_cooldown(8.0)
                    .with_outcome(OutcomeMode::AlwaysHit),
            )
            .unwrap();
        let lance = sim
            .register_ability(AbilityConfig::new("ice_lance").with_outcome(OutcomeMode::AlwaysHit))
            .unwrap();
        (sim, mage, dummy, blast, lance)
    }

    #[test]
    fn test_priority_list_fills_gcds() {
        let (mut sim, mage, dummy, blast, lance) = setup();
        sim.set_rotation(mage, Box::new(PriorityList::new().with(blast, dummy).with(lance, dummy)))
            .unwrap();
        let metrics = sim.run_iteration(0).unwrap();

        // Fire blast at 0 and 9, ice lance on every GCD in between
        let abilities = &metrics.actors[0].abilities;
        assert_eq!(abilities["fire_blast"].casts, 2);
        assert_eq!(abilities["ice_lance"].casts, 5);
    }

    #[test]
    fn test_waits_for_cooldown() {
        let (mut sim, mage, dummy, blast, _) = setup();
        sim.set_rotation(mage, Box::new(PriorityList::new().with(blast, dummy)))
            .unwrap();
        let metrics = sim.run_iteration(0).unwrap();
        assert_eq!(metrics.actors[0].abilities["fire_blast"].casts, 2);
    }

    #[test]
    fn test_empty_list_idles() {
        let (mut sim, mage, dummy, _, lance) = setup();
        sim.set_rotation(mage, Box::new(PriorityList::new())).unwrap();
        let metrics = sim.run_iteration(0).unwrap();
        assert!(metrics.actors[0].abilities.is_empty());
        assert_eq!(PriorityList::new().with(lance, dummy).len(), 1);
    }

    #[test]
    fn test_choose_reports_earliest_ready_time() {
        let (mut sim, mage, dummy, blast, _) = setup();
        sim.reset(0).unwrap();
        sim.try_cast(mage, blast, dummy).unwrap();
        let mut list = PriorityList::new().with(blast, dummy);
        assert_eq!(
            list.choose(&sim, mage).unwrap(),
            Decision::WaitUntil(Duration::from_millis(1500))
        );
    }
}

//! Clock & event queue
//!
//! Owns logical simulated time and the ordered queue of pending actions.
//! The queue is generic over its payload so it can be exercised on its own;
//! the simulation instantiates it with its internal action type.

mod queue;

pub use queue::{ActionHandle, EventQueue, Fired};

/// Relative ordering of actions due at the same instant.
///
/// Higher runs first; equal priorities run in scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionPriority(pub i32);

impl ActionPriority {
    /// Periodic ticks land before anything else at the same instant, so a
    /// dot's final tick is not cut off by its aura expiring in the same instant.
    pub const PERIODIC: ActionPriority = ActionPriority(20);
    /// Aura expiry. An aura lasting `d` covers `[gain, gain + d)`, so it is
    /// gone before anything else resolves at its expiry instant.
    pub const EXPIRE: ActionPriority = ActionPriority(15);
    /// Cast completions
    pub const CAST: ActionPriority = ActionPriority(10);
    pub const DEFAULT: ActionPriority = ActionPriority(0);
    /// Actors asking the decision layer what to do next
    pub const READY: ActionPriority = ActionPriority(-10);
}

impl Default for ActionPriority {
    fn default() -> Self {
        ActionPriority::DEFAULT
    }
}

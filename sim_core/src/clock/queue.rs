//! Time-ordered queue of pending actions

use super::ActionPriority;
use crate::error::{SimError, SimResult};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Weak handle to a scheduled action, usable only for cancellation and queries.
///
/// Ids are never reused, so a handle to an executed or cancelled action stays
/// dead forever and cancelling it is a harmless no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionHandle(u64);

/// An action popped from the queue, ready to execute
#[derive(Debug)]
pub struct Fired<A> {
    pub handle: ActionHandle,
    pub due: Duration,
    pub action: A,
    /// Whether the action was already re-enqueued for its next period
    pub recurring: bool,
}

#[derive(Debug)]
struct Slot<A> {
    /// Taken out while a recurring action executes
    action: Option<A>,
    period: Option<Duration>,
    priority: ActionPriority,
    /// Sequence number of the heap entry currently representing this slot
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    due: Duration,
    priority: ActionPriority,
    seq: u64,
    id: u64,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: earliest due, then highest priority,
        // then lowest sequence number must compare greatest.
        other
            .due
            .cmp(&self.due)
            .then(self.priority.cmp(&other.priority))
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Logical clock plus the queue of actions scheduled against it
#[derive(Debug)]
pub struct EventQueue<A> {
    now: Duration,
    heap: BinaryHeap<Entry>,
    slots: HashMap<u64, Slot<A>>,
    next_id: u64,
    next_seq: u64,
}

impl<A> Default for EventQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EventQueue<A> {
    pub fn new() -> Self {
        EventQueue {
            now: Duration::ZERO,
            heap: BinaryHeap::new(),
            slots: HashMap::new(),
            next_id: 0,
            next_seq: 0,
        }
    }

    /// Current simulated time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of live (not executed, not cancelled) actions
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Schedule a one-shot action at `due` with default priority
    pub fn schedule(&mut self, action: A, due: Duration) -> SimResult<ActionHandle> {
        self.schedule_with_priority(action, due, ActionPriority::DEFAULT)
    }

    pub fn schedule_with_priority(
        &mut self,
        action: A,
        due: Duration,
        priority: ActionPriority,
    ) -> SimResult<ActionHandle> {
        self.insert(action, due, None, priority)
    }

    /// Schedule a recurring action: first at `first_due`, then every `period`
    pub fn schedule_recurring(
        &mut self,
        action: A,
        first_due: Duration,
        period: Duration,
        priority: ActionPriority,
    ) -> SimResult<ActionHandle> {
        if period.is_zero() {
            return Err(SimError::InvalidDefinition(
                "recurring action needs a positive period".to_string(),
            ));
        }
        self.insert(action, first_due, Some(period), priority)
    }

    fn insert(
        &mut self,
        action: A,
        due: Duration,
        period: Option<Duration>,
        priority: ActionPriority,
    ) -> SimResult<ActionHandle> {
        if due < self.now {
            return Err(SimError::InvalidSchedule { at: due, now: self.now });
        }

        let id = self.next_id;
        self.next_id += 1;
        let seq = self.push_entry(id, due, priority);
        self.slots.insert(
            id,
            Slot {
                action: Some(action),
                period,
                priority,
                seq,
            },
        );
        Ok(ActionHandle(id))
    }

    fn push_entry(&mut self, id: u64, due: Duration, priority: ActionPriority) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { due, priority, seq, id });
        seq
    }

    /// Cancel a pending action. Returns whether anything was cancelled;
    /// dead handles are a no-op.
    pub fn cancel(&mut self, handle: ActionHandle) -> bool {
        // The heap entry is left behind and skipped lazily when popped.
        self.slots.remove(&handle.0).is_some()
    }

    pub fn is_pending(&self, handle: ActionHandle) -> bool {
        self.slots.contains_key(&handle.0)
    }

    /// Due time of the earliest live action, discarding stale heap entries
    pub fn peek_time(&mut self) -> Option<Duration> {
        while let Some(entry) = self.heap.peek() {
            if self.is_live(entry) {
                return Some(entry.due);
            }
            self.heap.pop();
        }
        None
    }

    fn is_live(&self, entry: &Entry) -> bool {
        self.slots
            .get(&entry.id)
            .is_some_and(|slot| slot.seq == entry.seq)
    }

    /// Pop the earliest live action and advance the clock to its due time.
    ///
    /// A recurring action is re-enqueued at `due + period` before it is
    /// returned, so cancelling its handle while it runs prevents the next
    /// occurrence. The caller hands the payload back with [`Self::restore`].
    pub fn pop_next(&mut self) -> SimResult<Option<Fired<A>>> {
        let entry = loop {
            match self.heap.pop() {
                None => return Ok(None),
                Some(entry) if self.is_live(&entry) => break entry,
                Some(_) => continue,
            }
        };

        if entry.due < self.now {
            return Err(SimError::CorruptedQueue(format!(
                "action due at {:?} popped after clock reached {:?}",
                entry.due, self.now
            )));
        }
        self.now = entry.due;

        let (period, priority) = match self.slots.get(&entry.id) {
            Some(slot) => (slot.period, slot.priority),
            None => return Ok(None),
        };

        let handle = ActionHandle(entry.id);
        match period {
            Some(period) => {
                let next_seq = self.push_entry(entry.id, entry.due + period, priority);
                let slot = self
                    .slots
                    .get_mut(&entry.id)
                    .ok_or_else(|| SimError::CorruptedQueue("recurring slot vanished".to_string()))?;
                slot.seq = next_seq;
                let action = slot.action.take().ok_or_else(|| {
                    SimError::CorruptedQueue(format!(
                        "recurring action {:?} fired before its previous run was restored",
                        handle
                    ))
                })?;
                Ok(Some(Fired {
                    handle,
                    due: entry.due,
                    action,
                    recurring: true,
                }))
            }
            None => {
                let slot = self
                    .slots
                    .remove(&entry.id)
                    .ok_or_else(|| SimError::CorruptedQueue("one-shot slot vanished".to_string()))?;
                let action = slot.action.ok_or_else(|| {
                    SimError::CorruptedQueue(format!("one-shot action {:?} has no payload", handle))
                })?;
                Ok(Some(Fired {
                    handle,
                    due: entry.due,
                    action,
                    recurring: false,
                }))
            }
        }
    }

    /// Return a recurring action's payload after it ran. Dropped if the
    /// action was cancelled in the meantime.
    pub fn restore(&mut self, handle: ActionHandle, action: A) {
        if let Some(slot) = self.slots.get_mut(&handle.0) {
            slot.action = Some(action);
        }
    }

    /// Advance the clock without running anything (end-of-encounter bound)
    pub fn advance_to(&mut self, time: Duration) -> SimResult<()> {
        if time < self.now {
            return Err(SimError::InvalidSchedule { at: time, now: self.now });
        }
        if let Some(next) = self.peek_time() {
            if next < time {
                return Err(SimError::CorruptedQueue(format!(
                    "advancing to {:?} would skip an action due at {:?}",
                    time, next
                )));
            }
        }
        self.now = time;
        Ok(())
    }

    /// Drop every pending action and rewind the clock to zero
    pub fn reset(&mut self) {
        self.heap.clear();
        self.slots.clear();
        self.now = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn drain(queue: &mut EventQueue<&'static str>) -> Vec<(Duration, &'static str)> {
        let mut out = Vec::new();
        while let Some(fired) = queue.pop_next().unwrap() {
            if fired.recurring {
                queue.restore(fired.handle, fired.action);
            }
            out.push((fired.due, fired.action));
        }
        out
    }

    #[test]
    fn test_pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.schedule("late", secs(5)).unwrap();
        queue.schedule("early", secs(1)).unwrap();
        queue.schedule("middle", secs(3)).unwrap();

        let order: Vec<_> = drain(&mut queue).into_iter().map(|(_, a)| a).collect();
        assert_eq!(order, vec!["early", "middle", "late"]);
        assert_eq!(queue.now(), secs(5));
    }

    #[test]
    fn test_ties_break_fifo() {
        let mut queue = EventQueue::new();
        for name in ["a", "b", "c", "d"] {
            queue.schedule(name, secs(2)).unwrap();
        }
        let order: Vec<_> = drain(&mut queue).into_iter().map(|(_, a)| a).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_priority_reorders_ties() {
        let mut queue = EventQueue::new();
        queue.schedule("default", secs(2)).unwrap();
        queue
            .schedule_with_priority("tick", secs(2), ActionPriority::PERIODIC)
            .unwrap();
        queue
            .schedule_with_priority("ready", secs(2), ActionPriority::READY)
            .unwrap();
        queue
            .schedule_with_priority("expire", secs(2), ActionPriority::EXPIRE)
            .unwrap();

        let order: Vec<_> = drain(&mut queue).into_iter().map(|(_, a)| a).collect();
        assert_eq!(order, vec!["tick", "expire", "default", "ready"]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut queue = EventQueue::new();
        let handle = queue.schedule("x", secs(1)).unwrap();
        queue.schedule("y", secs(2)).unwrap();

        assert!(queue.cancel(handle));
        assert!(!queue.cancel(handle));

        let order: Vec<_> = drain(&mut queue).into_iter().map(|(_, a)| a).collect();
        assert_eq!(order, vec!["y"]);
    }

    #[test]
    fn test_cancel_after_execution_is_noop() {
        let mut queue = EventQueue::new();
        let handle = queue.schedule("x", secs(1)).unwrap();
        let fired = queue.pop_next().unwrap().unwrap();
        assert_eq!(fired.handle, handle);
        assert!(!queue.cancel(handle));
    }

    #[test]
    fn test_scheduling_in_the_past_is_rejected() {
        let mut queue = EventQueue::new();
        queue.schedule("x", secs(3)).unwrap();
        queue.pop_next().unwrap();

        let err = queue.schedule("past", secs(2)).unwrap_err();
        assert!(matches!(err, SimError::InvalidSchedule { .. }));
        // Scheduling at exactly now is allowed
        assert!(queue.schedule("now", secs(3)).is_ok());
    }

    #[test]
    fn test_recurring_reenqueues_before_running() {
        let mut queue = EventQueue::new();
        let handle = queue
            .schedule_recurring("tick", secs(3), secs(3), ActionPriority::PERIODIC)
            .unwrap();

        let fired = queue.pop_next().unwrap().unwrap();
        assert!(fired.recurring);
        assert_eq!(fired.due, secs(3));
        // Next occurrence is already queued while the callback would run
        assert_eq!(queue.peek_time(), Some(secs(6)));
        assert!(queue.is_pending(handle));

        // Cancelling from "inside the callback" stops the next occurrence
        assert!(queue.cancel(handle));
        queue.restore(fired.handle, fired.action);
        assert!(queue.pop_next().unwrap().is_none());
    }

    #[test]
    fn test_recurring_runs_each_period() {
        let mut queue = EventQueue::new();
        let handle = queue
            .schedule_recurring("tick", secs(2), secs(2), ActionPriority::PERIODIC)
            .unwrap();
        queue.schedule("stop", secs(7)).unwrap();

        let mut ticks = Vec::new();
        while let Some(fired) = queue.pop_next().unwrap() {
            if fired.action == "stop" {
                queue.cancel(handle);
                continue;
            }
            ticks.push(fired.due);
            queue.restore(fired.handle, fired.action);
        }
        assert_eq!(ticks, vec![secs(2), secs(4), secs(6)]);
    }

    #[test]
    fn test_unrestored_recurring_is_corruption() {
        let mut queue = EventQueue::new();
        queue
            .schedule_recurring("tick", secs(1), secs(1), ActionPriority::DEFAULT)
            .unwrap();
        let _ = queue.pop_next().unwrap().unwrap();
        assert!(matches!(queue.pop_next(), Err(SimError::CorruptedQueue(_))));
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut queue = EventQueue::new();
        let result = queue.schedule_recurring("x", secs(1), Duration::ZERO, ActionPriority::DEFAULT);
        assert!(matches!(result, Err(SimError::InvalidDefinition(_))));
    }

    #[test]
    fn test_advance_to_cannot_skip_actions() {
        let mut queue = EventQueue::new();
        queue.schedule("x", secs(5)).unwrap();
        assert!(queue.advance_to(secs(4)).is_ok());
        assert!(queue.advance_to(secs(6)).is_err());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut queue = EventQueue::new();
        queue.schedule("x", secs(5)).unwrap();
        queue.pop_next().unwrap();
        queue.schedule("y", secs(9)).unwrap();
        queue.reset();
        assert!(queue.is_empty());
        assert_eq!(queue.now(), Duration::ZERO);
        assert!(queue.pop_next().unwrap().is_none());
    }
}

//! Virtual-time event scheduling.
//!
//! The application never sleeps nor reads the wall clock: it asks a [`Scheduler`] to call it back
//! after a delay, and the host pops events from an [`EventQueue`] in time order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

/// Handle of a scheduled event. Cancelling a handle that already fired is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

/// What the application needs from the simulation clock
pub trait Scheduler<E> {
    /// Current virtual time
    fn now(&self) -> Duration;
    /// Schedule `event` at `now() + delay`
    fn schedule_after(&mut self, delay: Duration, event: E) -> EventId;
    /// Cancel a pending event. Idempotent.
    fn cancel(&mut self, id: EventId);
    /// Whether the event is still waiting to fire
    fn is_pending(&self, id: EventId) -> bool;
}

#[derive(Debug)]
struct Entry<E> {
    at: Duration,
    id: EventId,
    event: E,
}

// Min-heap on (time, insertion order): events at the same instant fire in FIFO order
impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.at.cmp(&self.at).then_with(|| other.id.cmp(&self.id))
    }
}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for Entry<E> {}

/// A discrete-event queue with nanosecond virtual time
#[derive(Debug)]
pub struct EventQueue<E> {
    now: Duration,
    next_id: u64,
    heap: BinaryHeap<Entry<E>>,
    pending: HashSet<EventId>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        EventQueue {
            now: Duration::ZERO,
            next_id: 0,
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
        }
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events that will still fire
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Time of the next live event, if any
    pub fn peek_time(&mut self) -> Option<Duration> {
        self.discard_cancelled();
        self.heap.peek().map(|e| e.at)
    }

    /// Pop the next live event, moving the clock to its time
    pub fn pop(&mut self) -> Option<(EventId, E)> {
        self.discard_cancelled();
        let entry = self.heap.pop()?;
        self.pending.remove(&entry.id);
        self.now = entry.at;
        Some((entry.id, entry.event))
    }

    /// Pop the next live event if it fires strictly before `limit`
    pub fn pop_before(&mut self, limit: Duration) -> Option<(EventId, E)> {
        match self.peek_time() {
            Some(at) if at < limit => self.pop(),
            _ => None,
        }
    }

    /// Move the clock forward without firing anything. The clock never goes backward.
    pub fn advance_to(&mut self, t: Duration) {
        if t > self.now {
            self.now = t;
        }
    }

    fn discard_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.pending.contains(&top.id) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<E> Scheduler<E> for EventQueue<E> {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule_after(&mut self, delay: Duration, event: E) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        let at = self.now.saturating_add(delay);
        self.heap.push(Entry { at, id, event });
        self.pending.insert(id);
        id
    }

    fn cancel(&mut self, id: EventId) {
        self.pending.remove(&id);
    }

    fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains(&id)
    }
}

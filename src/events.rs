use crate::scheduler::{EventId, Scheduler};

use std::collections::{BTreeMap, HashMap};

/// Events handled by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Initial send-scheduling pass after a start
    StartSending,
    /// One cycle of the burst process: draws the next arrival and its departure
    NextBurst,
    BurstArrival { burst: u64 },
    BurstDeparture { burst: u64 },
    /// Re-derive the send interval once an off period ends
    ResumeSending,
    SendPacket,
}

/// Roles that own at most one pending event each. Departures are tracked separately since
/// several bursts can be active at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventRole {
    StartStop,
    Continuation,
    Arrival,
    Send,
}

impl EventRole {
    pub const ALL: [EventRole; 4] = [
        EventRole::StartStop,
        EventRole::Continuation,
        EventRole::Arrival,
        EventRole::Send,
    ];
}

/// The pending event handles of one application
#[derive(Debug, Default)]
pub struct EventRegistry {
    slots: HashMap<EventRole, EventId>,
    departures: BTreeMap<u64, EventId>,
}

impl EventRegistry {
    /// Record the pending event of a role, cancelling the one it replaces
    pub fn set<E>(&mut self, role: EventRole, id: EventId, sched: &mut impl Scheduler<E>) {
        if let Some(previous) = self.slots.insert(role, id) {
            if previous != id {
                sched.cancel(previous);
            }
        }
    }

    pub fn get(&self, role: EventRole) -> Option<EventId> {
        self.slots.get(&role).copied()
    }

    /// Whether the role has an event that has neither fired nor been cancelled
    pub fn is_pending<E>(&self, role: EventRole, sched: &impl Scheduler<E>) -> bool {
        self.get(role).is_some_and(|id| sched.is_pending(id))
    }

    /// Forget the handle of an event that just fired
    pub fn fired(&mut self, role: EventRole, id: EventId) {
        if self.slots.get(&role) == Some(&id) {
            self.slots.remove(&role);
        }
    }

    pub fn cancel<E>(&mut self, role: EventRole, sched: &mut impl Scheduler<E>) {
        if let Some(id) = self.slots.remove(&role) {
            sched.cancel(id);
        }
    }

    pub fn track_departure(&mut self, burst: u64, id: EventId) {
        self.departures.insert(burst, id);
    }

    pub fn departure_fired(&mut self, burst: u64) {
        self.departures.remove(&burst);
    }

    pub fn pending_departures(&self) -> usize {
        self.departures.len()
    }

    /// Cancel every pending event, departures included
    pub fn cancel_all<E>(&mut self, sched: &mut impl Scheduler<E>) {
        for role in EventRole::ALL {
            self.cancel(role, sched);
        }
        for (_, id) in std::mem::take(&mut self.departures) {
            sched.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::EventQueue;
    use std::time::Duration;

    #[test]
    fn replacing_a_slot_cancels_the_previous_event() {
        let mut q = EventQueue::new();
        let mut reg = EventRegistry::default();
        let a = q.schedule_after(Duration::from_secs(1), AppEvent::SendPacket);
        reg.set(EventRole::Send, a, &mut q);
        let b = q.schedule_after(Duration::from_secs(2), AppEvent::SendPacket);
        reg.set(EventRole::Send, b, &mut q);
        assert!(!q.is_pending(a));
        assert!(reg.is_pending(EventRole::Send, &q));
    }

    #[test]
    fn fired_only_clears_matching_handle() {
        let mut q = EventQueue::new();
        let mut reg = EventRegistry::default();
        let a = q.schedule_after(Duration::ZERO, AppEvent::NextBurst);
        let b = q.schedule_after(Duration::ZERO, AppEvent::NextBurst);
        reg.set(EventRole::Continuation, b, &mut q);
        reg.fired(EventRole::Continuation, a);
        assert_eq!(reg.get(EventRole::Continuation), Some(b));
        reg.fired(EventRole::Continuation, b);
        assert_eq!(reg.get(EventRole::Continuation), None);
    }

    #[test]
    fn cancel_all_includes_departures() {
        let mut q = EventQueue::new();
        let mut reg = EventRegistry::default();
        for burst in 0..3 {
            let id = q.schedule_after(
                Duration::from_secs(burst + 1),
                AppEvent::BurstDeparture { burst },
            );
            reg.track_departure(burst, id);
        }
        let arrival = q.schedule_after(Duration::ZERO, AppEvent::BurstArrival { burst: 3 });
        reg.set(EventRole::Arrival, arrival, &mut q);
        reg.cancel_all(&mut q);
        reg.cancel_all(&mut q);
        assert_eq!(reg.pending_departures(), 0);
        assert_eq!(q.pending_count(), 0);
        assert!(q.pop().is_none());
    }
}

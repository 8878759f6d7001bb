//! Event queue with deterministic ordering.

use crate::event::Event;
use crate::NodeIndex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Virtual time (earlier first)
/// 2. Insertion sequence (FIFO for events at the same time)
///
/// The sequence is a monotonic tie-breaker, so equal-time events always
/// fire in the order they were scheduled.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    /// When this event fires.
    pub time: Duration,
    /// Monotonic insertion counter.
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => self.sequence.cmp(&other.sequence),
            ord => ord,
        }
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A scheduled event together with its target node.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub node: NodeIndex,
    pub event: Event,
}

/// The global event queue: a single ordered map from key to event.
///
/// `schedule` hands back the [`EventKey`], which doubles as the
/// cancellation handle; `cancel` removes in O(log n) and is idempotent.
#[derive(Debug, Default)]
pub struct EventQueue {
    entries: BTreeMap<EventKey, ScheduledEvent>,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event` for `node` at virtual time `at`.
    ///
    /// Panics if `at` lies before `now`: the clock is monotone and
    /// handlers may only schedule into the future (or the present).
    pub fn schedule(
        &mut self,
        now: Duration,
        at: Duration,
        node: NodeIndex,
        event: Event,
    ) -> EventKey {
        assert!(
            at >= now,
            "event scheduled into the past: {at:?} < {now:?}"
        );
        self.next_sequence += 1;
        let key = EventKey {
            time: at,
            sequence: self.next_sequence,
        };
        self.entries.insert(key, ScheduledEvent { node, event });
        key
    }

    /// Remove a scheduled event. Returns whether it was still pending.
    pub fn cancel(&mut self, key: EventKey) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Pop the earliest event.
    pub fn pop_first(&mut self) -> Option<(EventKey, ScheduledEvent)> {
        self.entries.pop_first()
    }

    /// Virtual time of the earliest pending event.
    pub fn peek_time(&self) -> Option<Duration> {
        self.entries.first_key_value().map(|(key, _)| key.time)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

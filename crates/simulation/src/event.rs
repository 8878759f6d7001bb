//! Event and effect types for the deterministic node state machines.

use crate::NodeIndex;
use leosim_types::Message;
use std::time::Duration;

/// All possible events a node can receive.
///
/// Events are **passive data** - they describe something that happened. A
/// node processes an event and returns [`Output`] effects; it never touches
/// the queue or another node directly. Periodic timers are plain events
/// that the runner reschedules after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Satellite topology tick: recompute position, refresh neighbours,
    /// update routes, broadcast.
    PositionUpdateTimer,

    /// Ground-station tick: re-evaluate the serving satellite.
    HandoverTimer,

    /// Ground-station tick: generate one data packet.
    TrafficTimer,

    /// Self-wake scheduled for the instant the busy outbound channel frees.
    TxQueueWake,

    /// A message finished transmission and propagation and arrives here.
    MessageDelivery(Message),
}

impl Event {
    /// Event type name for logging and statistics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::PositionUpdateTimer => "PositionUpdateTimer",
            Event::HandoverTimer => "HandoverTimer",
            Event::TrafficTimer => "TrafficTimer",
            Event::TxQueueWake => "TxQueueWake",
            Event::MessageDelivery(_) => "MessageDelivery",
        }
    }
}

/// Effects returned by a node handler, applied by the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// A message was admitted to a channel; deliver it to `to` at `at`
    /// (transmission end plus propagation delay).
    Deliver {
        to: NodeIndex,
        at: Duration,
        message: Message,
    },
    /// The outbound channel is busy until `at`; wake this node then.
    Wake { at: Duration },
}

//! Core types shared across the simulator.
//!
//! Everything here is **passive data**: packets and advertisements describe
//! something that travels through the network, never behaviour. Nodes refer
//! to each other by [`Address`]; in-memory handles live in the simulation
//! crate's registry, not here.

use std::fmt;
use std::time::Duration;

/// Network-layer address of a node.
///
/// Satellites and ground stations draw from the same address space but the
/// two populations are disjoint (enforced at scenario build).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u32);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user data packet.
///
/// Immutable after creation except for `hop_count`, which each forwarding
/// satellite increments.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPacket {
    pub source: Address,
    pub destination: Address,
    /// Per-source sequence number, assigned at generation.
    pub packet_id: u64,
    /// Number of satellite forwarding hops traversed so far.
    pub hop_count: u32,
    /// Virtual time at which the source created the packet.
    pub created_at: Duration,
    /// Payload length on the wire.
    pub bits: u64,
}

/// One round of a satellite's distance-vector table, broadcast to each
/// current neighbour. Contains every table entry plus the self-entry
/// `(source, 0.0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingAdvertisement {
    pub source: Address,
    /// `(destination, cost in km)` pairs.
    pub entries: Vec<(Address, f64)>,
}

/// Everything that can travel over a channel.
///
/// A closed variant rather than trait objects: the message set is small and
/// fixed, and matching on it keeps dispatch exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Data(DataPacket),
    Routing(RoutingAdvertisement),
}

impl Message {
    /// Transmission length. Routing advertisements are control traffic and
    /// occupy the channel for zero time; only propagation delay applies.
    pub fn bits(&self) -> u64 {
        match self {
            Message::Data(packet) => packet.bits,
            Message::Routing(_) => 0,
        }
    }

    /// Short name for logging and statistics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Data(_) => "Data",
            Message::Routing(_) => "Routing",
        }
    }
}

/// One row of a satellite's forwarding table.
///
/// Invariant: `next_hop` is the address of a current neighbour, and there is
/// at most one entry per destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEntry {
    pub destination: Address,
    pub next_hop: Address,
    pub cost_km: f64,
}

/// Why a packet was discarded. Drops are counted, never propagated as
/// errors; a dropped packet has no effect on any other node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    /// Routing table has no entry for the destination.
    NoRoute,
    /// The outbound gate lost its peer while the packet sat in the queue.
    GateDisconnected,
    /// Tail drop at enqueue: the bounded FIFO was full.
    QueueOverflow,
    /// A ground station tried to send while unattached.
    NoServingSatellite,
}

impl DropReason {
    pub const ALL: [DropReason; 4] = [
        DropReason::NoRoute,
        DropReason::GateDisconnected,
        DropReason::QueueOverflow,
        DropReason::NoServingSatellite,
    ];

    /// Stable label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            DropReason::NoRoute => "no-route",
            DropReason::GateDisconnected => "gate-disconnected",
            DropReason::QueueOverflow => "queue-overflow",
            DropReason::NoServingSatellite => "no-serving-satellite",
        }
    }

    /// Scalar name for the per-reason drop counter in result files.
    pub fn scalar_name(&self) -> &'static str {
        match self {
            DropReason::NoRoute => "PacketsDropped_NoRoute",
            DropReason::GateDisconnected => "PacketsDropped_GateDisconnected",
            DropReason::QueueOverflow => "PacketsDropped_QueueOverflow",
            DropReason::NoServingSatellite => "PacketsDropped_NoServingSatellite",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//! Deterministic constellation simulation.
//!
//! This crate provides a fully deterministic discrete-event environment for
//! a LEO constellation carrying ground-to-ground traffic. Given the same
//! scenario and seed, it produces identical results every run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Event Queue (BTreeMap<EventKey, Event>)        │ │
//! │  │     Ordered by: virtual time, insertion sequence   │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     nodes: Vec<Node>                               │ │
//! │  │     Satellite / GroundStation state machines       │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Outputs → deliveries and wakes as new events   │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers run to completion; waiting is always expressed as a future
//! event. Cross-node mutation (message delivery, handover gate surgery)
//! happens only in the runner, which owns the node registry.

mod config;
mod event;
mod event_queue;
mod ground_station;
mod link;
mod queue;
mod routing;
mod runner;
mod satellite;
mod stats;

pub use config::{
    GroundStationSpec, IslSpec, SatelliteSpec, Scenario, DEFAULT_ISL_DATARATE_BPS,
};
pub use event::{Event, Output};
pub use event_queue::{EventKey, EventQueue, ScheduledEvent};
pub use ground_station::{Attachment, GroundStation};
pub use link::{propagation_delay, Channel, Gate, GROUND_LINK_DATARATE_BPS, PROCESSING_DELAY};
pub use queue::{TxQueue, DEFAULT_TX_QUEUE_CAPACITY};
pub use routing::RoutingTable;
pub use runner::{
    Node, SimulationRunner, SimulationStats, HANDOVER_CHECK_INTERVAL, TOPOLOGY_REFRESH_INTERVAL,
};
pub use satellite::{Neighbor, SatGateRef, Satellite};
pub use stats::{NodeReport, NodeStats, ScalarValue, SimulationReport};

/// Index of a node in the runner's registry.
///
/// This is a simulation-only handle for routing between in-process nodes;
/// protocol-level identity is the [`leosim_types::Address`].
pub type NodeIndex = usize;

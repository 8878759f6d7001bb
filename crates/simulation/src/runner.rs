//! Deterministic simulation runner.
//!
//! Owns the node registry, the event queue, the virtual clock and the
//! seeded RNG. Processes events in deterministic (time, insertion) order;
//! node handlers return effect lists that the runner turns into new events.
//! Given the same scenario and seed, every run is identical.

use crate::config::Scenario;
use crate::event::{Event, Output};
use crate::event_queue::{EventKey, EventQueue, ScheduledEvent};
use crate::ground_station::{Attachment, GroundStation};
use crate::link::{propagation_delay, Channel, Gate, GROUND_LINK_DATARATE_BPS};
use crate::satellite::Satellite;
use crate::stats::{NodeReport, SimulationReport};
use crate::NodeIndex;
use leosim_orbit::EcefPosition;
use leosim_types::Address;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Period of each satellite's topology/routing refresh.
pub const TOPOLOGY_REFRESH_INTERVAL: Duration = Duration::from_secs(1);
/// Period of each ground station's serving-satellite re-evaluation.
pub const HANDOVER_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// A registry entry: every node lives for the whole run.
#[derive(Debug)]
pub enum Node {
    Satellite(Satellite),
    Ground(GroundStation),
}

impl Node {
    pub fn address(&self) -> Address {
        match self {
            Node::Satellite(sat) => sat.address,
            Node::Ground(gs) => gs.address,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Node::Satellite(sat) => format!("sat[{}]", sat.address),
            Node::Ground(gs) => format!("gs[{}]", gs.address),
        }
    }
}

/// Periodic timers tracked for shutdown cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TimerKind {
    PositionUpdate,
    Handover,
    Traffic,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by type name.
    pub events_by_type: BTreeMap<&'static str, u64>,
    /// Messages admitted to a channel (data and routing).
    pub messages_transmitted: u64,
    /// Self-wakes scheduled for busy channels.
    pub wakes_scheduled: u64,
    /// Periodic timer arms.
    pub timers_set: u64,
    /// Timers cancelled at shutdown.
    pub timers_cancelled: u64,
    /// Completed ground-station handovers.
    pub handovers: u64,
}

pub struct SimulationRunner {
    nodes: Vec<Node>,
    queue: EventQueue,
    now: Duration,
    horizon: Duration,
    rng: ChaCha8Rng,
    stats: SimulationStats,
    timers: BTreeMap<(NodeIndex, TimerKind), EventKey>,
}

impl SimulationRunner {
    // ─── Construction ───

    /// Build the node registry and static ISL mesh, run the initial
    /// topology refresh and ground-station attach at t = 0, and arm the
    /// periodic timers.
    pub fn new(scenario: &Scenario, seed: u64) -> Self {
        let mut nodes = Vec::with_capacity(
            scenario.satellites.len() + scenario.ground_stations.len(),
        );

        for spec in &scenario.satellites {
            let index = nodes.len();
            nodes.push(Node::Satellite(Satellite::new(
                index,
                Address(spec.id),
                spec.orbit,
                spec.max_isl_range_km,
            )));
        }
        for spec in &scenario.ground_stations {
            let index = nodes.len();
            nodes.push(Node::Ground(GroundStation::new(
                index,
                Address(spec.address),
                spec.location,
                spec.max_range_km,
                spec.send_interval,
                spec.packet_size_bytes,
                spec.targets.iter().map(|&t| Address(t)).collect(),
            )));
        }

        let index_of = |nodes: &[Node], id: u32| -> NodeIndex {
            nodes
                .iter()
                .position(|node| node.address() == Address(id))
                .expect("scenario validated before build")
        };

        let mut runner = Self {
            queue: EventQueue::new(),
            now: Duration::ZERO,
            horizon: scenario.horizon,
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats: SimulationStats::default(),
            timers: BTreeMap::new(),
            nodes,
        };

        for isl in &scenario.isls {
            let a = index_of(&runner.nodes, isl.a);
            let b = index_of(&runner.nodes, isl.b);
            let addr_a = runner.nodes[a].address();
            let addr_b = runner.nodes[b].address();
            // Full duplex: one channel per direction, each owned by its
            // sender. The first refresh sets the real delay before any
            // traffic is admitted.
            if let Node::Satellite(sat) = &mut runner.nodes[a] {
                sat.add_isl_gate(Gate::new(
                    b,
                    addr_b,
                    Channel::new(isl.datarate_bps, Duration::ZERO),
                ));
            }
            if let Node::Satellite(sat) = &mut runner.nodes[b] {
                sat.add_isl_gate(Gate::new(
                    a,
                    addr_a,
                    Channel::new(isl.datarate_bps, Duration::ZERO),
                ));
            }
        }

        info!(
            satellites = scenario.satellites.len(),
            ground_stations = scenario.ground_stations.len(),
            isl_edges = scenario.isls.len(),
            horizon_s = scenario.horizon.as_secs_f64(),
            seed,
            "Created simulation runner"
        );

        runner.initialize();
        runner
    }

    /// Initial refresh/attach pass plus timer arming, all at t = 0.
    fn initialize(&mut self) {
        let positions = self.node_positions(Duration::ZERO);
        for index in 0..self.nodes.len() {
            if let Node::Satellite(sat) = &mut self.nodes[index] {
                let outputs = sat.refresh_topology(Duration::ZERO, &positions);
                self.apply_outputs(index, outputs);
            }
        }
        for index in 0..self.nodes.len() {
            if matches!(self.nodes[index], Node::Ground(_)) {
                self.evaluate_serving_satellite(index, true);
            }
        }

        for index in 0..self.nodes.len() {
            match &self.nodes[index] {
                Node::Satellite(_) => {
                    self.arm_timer(
                        index,
                        TimerKind::PositionUpdate,
                        TOPOLOGY_REFRESH_INTERVAL,
                        Event::PositionUpdateTimer,
                    );
                }
                Node::Ground(gs) => {
                    let send_interval = gs.send_interval;
                    self.arm_timer(
                        index,
                        TimerKind::Handover,
                        HANDOVER_CHECK_INTERVAL,
                        Event::HandoverTimer,
                    );
                    self.arm_timer(index, TimerKind::Traffic, send_interval, Event::TrafficTimer);
                }
            }
        }
    }

    // ─── Accessors ───

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn satellite(&self, index: NodeIndex) -> Option<&Satellite> {
        match self.nodes.get(index) {
            Some(Node::Satellite(sat)) => Some(sat),
            _ => None,
        }
    }

    pub fn ground_station(&self, index: NodeIndex) -> Option<&GroundStation> {
        match self.nodes.get(index) {
            Some(Node::Ground(gs)) => Some(gs),
            _ => None,
        }
    }

    pub fn index_of(&self, address: Address) -> Option<NodeIndex> {
        self.nodes.iter().position(|node| node.address() == address)
    }

    /// Schedule an event from the outside (test harness surface).
    pub fn schedule_initial_event(&mut self, node: NodeIndex, delay: Duration, event: Event) {
        self.queue.schedule(self.now, self.now + delay, node, event);
    }

    // ─── Main loop ───

    /// Drain the queue until the given virtual time. May be called
    /// repeatedly with increasing horizons.
    pub fn run_until(&mut self, end_time: Duration) {
        while let Some(time) = self.queue.peek_time() {
            if time > end_time {
                break;
            }
            let (key, ScheduledEvent { node, event }) =
                self.queue.pop_first().expect("peeked entry");
            self.now = key.time;
            self.stats.events_processed += 1;
            *self
                .stats
                .events_by_type
                .entry(event.type_name())
                .or_insert(0) += 1;
            trace!(
                time_s = self.now.as_secs_f64(),
                node,
                event = event.type_name(),
                "processing event"
            );
            self.dispatch(node, event);
        }
        if self.now < end_time {
            self.now = end_time;
        }
    }

    /// Run to the scenario horizon and cancel outstanding periodic timers.
    pub fn run_to_horizon(&mut self) {
        let horizon = self.horizon;
        self.run_until(horizon);
        self.shutdown();
    }

    /// Cancel every outstanding periodic timer.
    pub fn shutdown(&mut self) {
        let timers = std::mem::take(&mut self.timers);
        for (_, key) in timers {
            if self.queue.cancel(key) {
                self.stats.timers_cancelled += 1;
            }
        }
        debug!(
            cancelled = self.stats.timers_cancelled,
            remaining_events = self.queue.len(),
            "simulation shut down"
        );
    }

    // ─── Dispatch ───

    fn dispatch(&mut self, index: NodeIndex, event: Event) {
        match event {
            Event::PositionUpdateTimer => {
                let positions = self.node_positions(self.now);
                let now = self.now;
                let outputs = match &mut self.nodes[index] {
                    Node::Satellite(sat) => sat.refresh_topology(now, &positions),
                    Node::Ground(_) => {
                        warn!(index, "position-update timer fired on a ground station");
                        Vec::new()
                    }
                };
                self.apply_outputs(index, outputs);
                self.arm_timer(
                    index,
                    TimerKind::PositionUpdate,
                    TOPOLOGY_REFRESH_INTERVAL,
                    Event::PositionUpdateTimer,
                );
            }
            Event::HandoverTimer => {
                self.evaluate_serving_satellite(index, false);
                self.arm_timer(
                    index,
                    TimerKind::Handover,
                    HANDOVER_CHECK_INTERVAL,
                    Event::HandoverTimer,
                );
            }
            Event::TrafficTimer => {
                let now = self.now;
                let (outputs, send_interval) = match &mut self.nodes[index] {
                    Node::Ground(gs) if gs.targets.is_empty() => (Vec::new(), gs.send_interval),
                    Node::Ground(gs) => {
                        let destination = gs.targets[self.rng.gen_range(0..gs.targets.len())];
                        (gs.generate_packet(now, destination), gs.send_interval)
                    }
                    Node::Satellite(_) => {
                        warn!(index, "traffic timer fired on a satellite");
                        (Vec::new(), TOPOLOGY_REFRESH_INTERVAL)
                    }
                };
                self.apply_outputs(index, outputs);
                self.arm_timer(index, TimerKind::Traffic, send_interval, Event::TrafficTimer);
            }
            Event::TxQueueWake => {
                let now = self.now;
                let outputs = match &mut self.nodes[index] {
                    Node::Satellite(sat) => sat.on_tx_wake(now),
                    Node::Ground(gs) => gs.on_tx_wake(now),
                };
                self.apply_outputs(index, outputs);
            }
            Event::MessageDelivery(message) => {
                let now = self.now;
                let outputs = match &mut self.nodes[index] {
                    Node::Satellite(sat) => sat.on_message(now, message),
                    Node::Ground(gs) => gs.on_message(now, message),
                };
                self.apply_outputs(index, outputs);
            }
        }
    }

    fn apply_outputs(&mut self, from: NodeIndex, outputs: Vec<Output>) {
        for output in outputs {
            match output {
                Output::Deliver { to, at, message } => {
                    self.stats.messages_transmitted += 1;
                    self.queue
                        .schedule(self.now, at, to, Event::MessageDelivery(message));
                }
                Output::Wake { at } => {
                    self.stats.wakes_scheduled += 1;
                    self.queue.schedule(self.now, at, from, Event::TxQueueWake);
                }
            }
        }
    }

    fn arm_timer(
        &mut self,
        index: NodeIndex,
        kind: TimerKind,
        interval: Duration,
        event: Event,
    ) {
        let key = self
            .queue
            .schedule(self.now, self.now + interval, index, event);
        self.timers.insert((index, kind), key);
        self.stats.timers_set += 1;
    }

    // ─── Handover ───

    /// Re-evaluate the serving satellite of one ground station and perform
    /// the gate surgery on both ends if the nearest in-range satellite
    /// changed. `initial` marks the t = 0 attach pass, which is not
    /// counted as a handover.
    fn evaluate_serving_satellite(&mut self, gs_index: NodeIndex, initial: bool) {
        let positions = self.node_positions(self.now);
        let (gs_addr, gs_position, max_range_km, current) = match &self.nodes[gs_index] {
            Node::Ground(gs) => (gs.address, gs.position, gs.max_range_km, gs.serving),
            Node::Satellite(_) => {
                warn!(index = gs_index, "handover evaluated on a satellite");
                return;
            }
        };

        let mut best: Option<(NodeIndex, f64)> = None;
        for (index, node) in self.nodes.iter().enumerate() {
            if let Node::Satellite(_) = node {
                let distance_km = gs_position.distance_to(&positions[index]);
                if distance_km <= max_range_km
                    && best.map_or(true, |(_, d)| distance_km < d)
                {
                    best = Some((index, distance_km));
                }
            }
        }

        if best.map(|(index, _)| index) == current.map(|attachment| attachment.node) {
            return;
        }

        if let Some(attachment) = current {
            if let Node::Satellite(sat) = &mut self.nodes[attachment.node] {
                sat.detach_ground(attachment.radio_gate, gs_addr);
            }
            if let Node::Ground(gs) = &mut self.nodes[gs_index] {
                gs.detach();
            }
            info!(
                time_s = self.now.as_secs_f64(),
                gs = %gs_addr,
                from = %attachment.address,
                "ground station detached"
            );
        }

        if let Some((sat_index, distance_km)) = best {
            let delay = propagation_delay(distance_km);
            let (sat_addr, radio_gate) = match &mut self.nodes[sat_index] {
                Node::Satellite(sat) => {
                    let gate = Gate::new(
                        gs_index,
                        gs_addr,
                        Channel::new(GROUND_LINK_DATARATE_BPS, delay),
                    );
                    (sat.address, sat.attach_ground(gate, distance_km))
                }
                Node::Ground(_) => unreachable!("best candidate is a satellite"),
            };
            if let Node::Ground(gs) = &mut self.nodes[gs_index] {
                gs.attach(
                    Attachment {
                        node: sat_index,
                        address: sat_addr,
                        radio_gate,
                    },
                    Gate::new(
                        sat_index,
                        sat_addr,
                        Channel::new(GROUND_LINK_DATARATE_BPS, delay),
                    ),
                );
            }
            info!(
                time_s = self.now.as_secs_f64(),
                gs = %gs_addr,
                sat = %sat_addr,
                distance_km,
                delay_s = delay.as_secs_f64(),
                "ground station attached"
            );
        } else {
            info!(
                time_s = self.now.as_secs_f64(),
                gs = %gs_addr,
                "no satellite in range"
            );
        }

        if !initial {
            self.stats.handovers += 1;
            if let Node::Ground(gs) = &mut self.nodes[gs_index] {
                gs.stats.handovers += 1;
                gs.handover_log.push(self.now);
            }
        }

        // Anything queued during the gap either flows to the new serving
        // satellite or drains as gate-disconnected.
        let now = self.now;
        let outputs = match &mut self.nodes[gs_index] {
            Node::Ground(gs) => gs.process_tx_queue(now),
            Node::Satellite(_) => Vec::new(),
        };
        self.apply_outputs(gs_index, outputs);
    }

    // ─── Helpers ───

    /// Snapshot of every node's ECEF position at virtual time `t`.
    /// Satellite positions are propagated; ground stations are fixed.
    fn node_positions(&self, t: Duration) -> Vec<EcefPosition> {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Satellite(sat) => sat.orbit.position_ecef(t.as_secs_f64()),
                Node::Ground(gs) => gs.position,
            })
            .collect()
    }

    // ─── Reporting ───

    /// Snapshot all per-node results. The clock at call time is the run
    /// duration used for rate scalars.
    pub fn report(&self) -> SimulationReport {
        let duration = self.now;
        let nodes = self
            .nodes
            .iter()
            .map(|node| match node {
                Node::Satellite(sat) => NodeReport {
                    name: node.name(),
                    scalars: sat.stats.satellite_scalars(duration),
                    vectors: sat.stats.vectors(),
                },
                Node::Ground(gs) => NodeReport {
                    name: node.name(),
                    scalars: gs.stats.ground_scalars(duration),
                    vectors: gs.stats.vectors(),
                },
            })
            .collect();
        SimulationReport { duration, nodes }
    }
}

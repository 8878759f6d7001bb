//! Satellite node: orbital router.
//!
//! A satellite owns its outbound gates (static ISL array plus a radio array
//! that grows with ground-station attachments), its neighbour list, its
//! distance-vector table and its transmit queue. It is a router only:
//! user traffic never terminates here.

use crate::event::Output;
use crate::link::Gate;
use crate::queue::TxQueue;
use crate::routing::RoutingTable;
use crate::stats::NodeStats;
use crate::NodeIndex;
use leosim_orbit::{EcefPosition, OrbitalElements};
use leosim_types::{Address, DataPacket, DropReason, Message};
use std::time::Duration;
use tracing::{debug, trace};

/// Which outbound gate array a reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatGateRef {
    Isl(usize),
    Radio(usize),
}

/// A currently usable peer: connected and within range at the last refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub address: Address,
    pub node: NodeIndex,
    pub distance_km: f64,
    pub gate: SatGateRef,
}

#[derive(Debug)]
pub struct Satellite {
    pub index: NodeIndex,
    pub address: Address,
    pub orbit: OrbitalElements,
    pub max_isl_range_km: f64,
    /// ECEF position cached at the last topology refresh.
    pub position: EcefPosition,
    /// Static inter-satellite gates, wired once at scenario build.
    pub isl_gates: Vec<Gate>,
    /// Dynamic ground-station gates. Slots are retired on detach, never
    /// reused, so indices held elsewhere stay stable.
    pub radio_gates: Vec<Gate>,
    pub neighbors: Vec<Neighbor>,
    pub routing: RoutingTable,
    pub tx_queue: TxQueue<SatGateRef>,
    wake_pending: bool,
    pub stats: NodeStats,
}

impl Satellite {
    pub fn new(
        index: NodeIndex,
        address: Address,
        orbit: OrbitalElements,
        max_isl_range_km: f64,
    ) -> Self {
        let position = orbit.position_ecef(0.0);
        Self {
            index,
            address,
            orbit,
            max_isl_range_km,
            position,
            isl_gates: Vec::new(),
            radio_gates: Vec::new(),
            neighbors: Vec::new(),
            routing: RoutingTable::new(),
            tx_queue: TxQueue::new(),
            wake_pending: false,
            stats: NodeStats::new(),
        }
    }

    pub fn gate(&self, gate: SatGateRef) -> &Gate {
        match gate {
            SatGateRef::Isl(i) => &self.isl_gates[i],
            SatGateRef::Radio(i) => &self.radio_gates[i],
        }
    }

    fn gate_mut(&mut self, gate: SatGateRef) -> &mut Gate {
        match gate {
            SatGateRef::Isl(i) => &mut self.isl_gates[i],
            SatGateRef::Radio(i) => &mut self.radio_gates[i],
        }
    }

    /// Wire a static ISL gate at scenario build. The delay is set by the
    /// first topology refresh, before any traffic can be admitted.
    pub fn add_isl_gate(&mut self, gate: Gate) -> usize {
        self.isl_gates.push(gate);
        self.isl_gates.len() - 1
    }

    /// Grow the radio array for a newly attached ground station and make it
    /// immediately routable: direct route now, advertisement at the next
    /// broadcast.
    pub fn attach_ground(&mut self, gate: Gate, distance_km: f64) -> usize {
        let address = gate.peer_addr;
        let node = gate.peer;
        self.radio_gates.push(gate);
        let index = self.radio_gates.len() - 1;
        self.neighbors.push(Neighbor {
            address,
            node,
            distance_km,
            gate: SatGateRef::Radio(index),
        });
        self.routing.insert_local(address, distance_km);
        index
    }

    /// Tear down the radio gate of a departing ground station. Routes
    /// through it are purged immediately rather than waiting for the next
    /// refresh.
    pub fn detach_ground(&mut self, radio_gate: usize, address: Address) {
        if let Some(gate) = self.radio_gates.get_mut(radio_gate) {
            gate.connected = false;
        }
        self.neighbors.retain(|neighbor| neighbor.address != address);
        self.routing.purge_next_hop(address);
    }

    /// Topology tick: recompute position, refresh ISL delays and ranges,
    /// rebuild the neighbour list, update routes, broadcast.
    ///
    /// `positions` holds the current ECEF position of every node in the
    /// registry, indexed by `NodeIndex`.
    pub fn refresh_topology(
        &mut self,
        now: Duration,
        positions: &[EcefPosition],
    ) -> Vec<Output> {
        self.position = positions[self.index];
        self.neighbors.clear();

        for i in 0..self.isl_gates.len() {
            if !self.isl_gates[i].connected {
                continue;
            }
            let peer = self.isl_gates[i].peer;
            let peer_addr = self.isl_gates[i].peer_addr;
            let distance_km = self.position.distance_to(&positions[peer]);
            self.isl_gates[i]
                .channel
                .set_delay(crate::link::propagation_delay(distance_km));

            if distance_km <= self.max_isl_range_km {
                self.neighbors.push(Neighbor {
                    address: peer_addr,
                    node: peer,
                    distance_km,
                    gate: SatGateRef::Isl(i),
                });
            } else {
                trace!(
                    sat = %self.address,
                    peer = %peer_addr,
                    distance_km,
                    max_km = self.max_isl_range_km,
                    "ISL peer out of range"
                );
            }
        }

        for i in 0..self.radio_gates.len() {
            if !self.radio_gates[i].connected {
                continue;
            }
            let peer = self.radio_gates[i].peer;
            self.neighbors.push(Neighbor {
                address: self.radio_gates[i].peer_addr,
                node: peer,
                distance_km: self.position.distance_to(&positions[peer]),
                gate: SatGateRef::Radio(i),
            });
        }

        self.routing.local_update(
            self.neighbors
                .iter()
                .map(|neighbor| (neighbor.address, neighbor.distance_km))
                .collect::<Vec<_>>(),
        );

        self.broadcast_routes(now)
    }

    /// Send one advertisement to every current neighbour.
    fn broadcast_routes(&mut self, now: Duration) -> Vec<Output> {
        let advert = self.routing.advertisement(self.address);
        let targets: Vec<SatGateRef> = self.neighbors.iter().map(|n| n.gate).collect();

        let mut outputs = Vec::new();
        for gate in targets {
            outputs.extend(self.enqueue(now, gate, Message::Routing(advert.clone())));
        }
        outputs
    }

    pub fn on_message(&mut self, now: Duration, message: Message) -> Vec<Output> {
        match message {
            Message::Routing(advert) => {
                // Link cost is the cached distance to the advertising
                // neighbour; an advert from a non-neighbour is stale.
                let link_cost = self
                    .neighbors
                    .iter()
                    .find(|neighbor| neighbor.address == advert.source)
                    .map(|neighbor| neighbor.distance_km);
                match link_cost {
                    Some(cost) => {
                        let changed = self.routing.merge(self.address, &advert, cost);
                        trace!(
                            sat = %self.address,
                            from = %advert.source,
                            changed,
                            "advertisement merged"
                        );
                    }
                    None => trace!(
                        sat = %self.address,
                        from = %advert.source,
                        "advertisement from non-neighbour ignored"
                    ),
                }
                Vec::new()
            }
            Message::Data(packet) => {
                if packet.destination == self.address {
                    // Satellites are routers, not sinks; the counter exists
                    // as a diagnostic and stays zero for user traffic.
                    self.stats.record_received(now, &packet);
                    return Vec::new();
                }
                self.forward_packet(now, packet)
            }
        }
    }

    fn forward_packet(&mut self, now: Duration, mut packet: DataPacket) -> Vec<Output> {
        let Some(next_hop) = self.routing.next_hop(packet.destination) else {
            debug!(
                sat = %self.address,
                destination = %packet.destination,
                packet_id = packet.packet_id,
                reason = %DropReason::NoRoute,
                "packet dropped"
            );
            self.stats.record_drop(DropReason::NoRoute);
            return Vec::new();
        };
        let Some(neighbor) = self
            .neighbors
            .iter()
            .find(|neighbor| neighbor.address == next_hop)
            .copied()
        else {
            debug!(
                sat = %self.address,
                destination = %packet.destination,
                %next_hop,
                reason = %DropReason::NoRoute,
                "next hop is not a neighbour, packet dropped"
            );
            self.stats.record_drop(DropReason::NoRoute);
            return Vec::new();
        };

        packet.hop_count += 1;
        self.enqueue(now, neighbor.gate, Message::Data(packet))
    }

    pub fn on_tx_wake(&mut self, now: Duration) -> Vec<Output> {
        self.wake_pending = false;
        self.process_tx_queue(now)
    }

    /// Admit a message to the transmit queue (tail drop when full) and run
    /// the drain loop.
    pub fn enqueue(&mut self, now: Duration, gate: SatGateRef, message: Message) -> Vec<Output> {
        if let Err(rejected) = self.tx_queue.push(gate, message) {
            if let Message::Data(packet) = &rejected {
                debug!(
                    sat = %self.address,
                    packet_id = packet.packet_id,
                    reason = %DropReason::QueueOverflow,
                    "packet dropped"
                );
                self.stats.record_drop(DropReason::QueueOverflow);
            }
            return Vec::new();
        }
        self.process_tx_queue(now)
    }

    /// Drain the head of the queue: drop messages whose gate is gone, hold
    /// (with a single pending wake) while the head's channel is busy,
    /// otherwise transmit and repeat.
    fn process_tx_queue(&mut self, now: Duration) -> Vec<Output> {
        let mut outputs = Vec::new();
        while let Some(&(gate_ref, _)) = self.tx_queue.peek() {
            let gate = self.gate(gate_ref);
            if !gate.connected {
                let (_, message) = self.tx_queue.pop().expect("peeked entry");
                if let Message::Data(packet) = &message {
                    debug!(
                        sat = %self.address,
                        packet_id = packet.packet_id,
                        reason = %DropReason::GateDisconnected,
                        "packet dropped"
                    );
                    self.stats.record_drop(DropReason::GateDisconnected);
                }
                continue;
            }
            if gate.channel.is_busy(now) {
                if !self.wake_pending {
                    let at = gate.channel.busy_until();
                    self.wake_pending = true;
                    outputs.push(Output::Wake { at });
                }
                break;
            }

            let (gate_ref, message) = self.tx_queue.pop().expect("peeked entry");
            let bits = message.bits();
            if let Message::Data(_) = &message {
                self.stats.record_forwarded(bits);
            }
            let gate = self.gate_mut(gate_ref);
            let to = gate.peer;
            let at = gate.channel.transmit(now, bits);
            trace!(
                sat = %self.address,
                to = %self.gate(gate_ref).peer_addr,
                kind = message.type_name(),
                bits,
                arrival_s = at.as_secs_f64(),
                "message admitted"
            );
            outputs.push(Output::Deliver { to, at, message });
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{propagation_delay, Channel};
    use leosim_orbit::EARTH_RADIUS_KM;

    fn test_orbit() -> OrbitalElements {
        OrbitalElements::circular(550.0, 53.0)
    }

    fn sat_with_one_isl(max_range_km: f64) -> Satellite {
        let mut sat = Satellite::new(0, Address(1), test_orbit(), max_range_km);
        sat.add_isl_gate(Gate::new(
            1,
            Address(2),
            Channel::new(1e9, Duration::ZERO),
        ));
        sat
    }

    fn positions(distance_km: f64) -> Vec<EcefPosition> {
        let r = EARTH_RADIUS_KM + 550.0;
        vec![
            EcefPosition {
                x_km: r,
                y_km: 0.0,
                z_km: 0.0,
            },
            EcefPosition {
                x_km: r,
                y_km: distance_km,
                z_km: 0.0,
            },
        ]
    }

    #[test]
    fn refresh_builds_neighbors_and_broadcasts() {
        let mut sat = sat_with_one_isl(5000.0);
        let outputs = sat.refresh_topology(Duration::ZERO, &positions(1000.0));

        assert_eq!(sat.neighbors.len(), 1);
        assert_eq!(sat.neighbors[0].address, Address(2));
        assert_eq!(sat.neighbors[0].distance_km, 1000.0);
        assert_eq!(sat.routing.next_hop(Address(2)), Some(Address(2)));
        assert_eq!(
            sat.isl_gates[0].channel.delay(),
            propagation_delay(1000.0)
        );

        // One advertisement to the single neighbour.
        assert_eq!(outputs.len(), 1);
        match &outputs[0] {
            Output::Deliver { to, message, .. } => {
                assert_eq!(*to, 1);
                assert_eq!(message.type_name(), "Routing");
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn out_of_range_peer_is_hidden_from_routing() {
        let mut sat = sat_with_one_isl(500.0);
        let outputs = sat.refresh_topology(Duration::ZERO, &positions(1000.0));

        assert!(sat.neighbors.is_empty());
        assert!(sat.routing.is_empty());
        assert!(outputs.is_empty());
        // The channel itself survives the range violation.
        assert!(sat.isl_gates[0].connected);
    }

    #[test]
    fn forwarding_without_a_route_drops() {
        let mut sat = sat_with_one_isl(5000.0);
        let outputs = sat.on_message(
            Duration::ZERO,
            Message::Data(DataPacket {
                source: Address(99),
                destination: Address(42),
                packet_id: 7,
                hop_count: 0,
                created_at: Duration::ZERO,
                bits: 8192,
            }),
        );

        assert!(outputs.is_empty());
        assert_eq!(sat.stats.dropped(DropReason::NoRoute), 1);
    }

    #[test]
    fn forwarding_increments_hop_count() {
        let mut sat = sat_with_one_isl(5000.0);
        sat.refresh_topology(Duration::ZERO, &positions(1000.0));

        let outputs = sat.on_message(
            Duration::from_secs(1),
            Message::Data(DataPacket {
                source: Address(99),
                destination: Address(2),
                packet_id: 0,
                hop_count: 1,
                created_at: Duration::ZERO,
                bits: 8192,
            }),
        );

        let delivered = outputs
            .iter()
            .find_map(|out| match out {
                Output::Deliver { message: Message::Data(p), .. } => Some(p),
                _ => None,
            })
            .expect("packet transmitted");
        assert_eq!(delivered.hop_count, 2);
        assert_eq!(sat.stats.packets_forwarded, 1);
    }

    #[test]
    fn only_one_wake_is_outstanding() {
        let mut sat = sat_with_one_isl(5000.0);
        sat.refresh_topology(Duration::ZERO, &positions(1000.0));

        let data = |id| {
            Message::Data(DataPacket {
                source: Address(99),
                destination: Address(2),
                packet_id: id,
                hop_count: 0,
                created_at: Duration::ZERO,
                bits: 80_000_000,
            })
        };

        // First transmission occupies the channel for 80 ms.
        let first = sat.enqueue(Duration::ZERO, SatGateRef::Isl(0), data(0));
        assert!(matches!(first[0], Output::Deliver { .. }));

        let second = sat.enqueue(Duration::ZERO, SatGateRef::Isl(0), data(1));
        assert!(matches!(second[..], [Output::Wake { .. }]));

        // Another enqueue while the wake is pending must not add a second.
        let third = sat.enqueue(Duration::ZERO, SatGateRef::Isl(0), data(2));
        assert!(third.is_empty());

        // Each wake transmits the head and re-arms for the next packet.
        let at = match second[0] {
            Output::Wake { at } => at,
            _ => unreachable!(),
        };
        let drained = sat.on_tx_wake(at);
        assert!(matches!(
            drained[..],
            [Output::Deliver { .. }, Output::Wake { .. }]
        ));

        let at = match drained[1] {
            Output::Wake { at } => at,
            _ => unreachable!(),
        };
        let last = sat.on_tx_wake(at);
        assert!(matches!(last[..], [Output::Deliver { .. }]));
        assert!(sat.tx_queue.is_empty());
    }

    #[test]
    fn disconnected_gate_drops_queued_packets() {
        let mut sat = sat_with_one_isl(5000.0);
        sat.refresh_topology(Duration::ZERO, &positions(1000.0));
        sat.isl_gates[0].connected = false;

        let outputs = sat.enqueue(
            Duration::ZERO,
            SatGateRef::Isl(0),
            Message::Data(DataPacket {
                source: Address(99),
                destination: Address(2),
                packet_id: 0,
                hop_count: 0,
                created_at: Duration::ZERO,
                bits: 8192,
            }),
        );

        assert!(outputs.is_empty());
        assert_eq!(sat.stats.dropped(DropReason::GateDisconnected), 1);
    }
}

//! Ground-station node: traffic source and sink with dynamic attachment.
//!
//! A ground station sits at a fixed ECEF position and owns at most one
//! outbound gate, pointed at its current serving satellite. The serving
//! state machine (`Unattached` ↔ attached) is driven by the runner, which
//! is the only place that can wire both ends of the dynamic link.

use crate::event::Output;
use crate::link::Gate;
use crate::queue::TxQueue;
use crate::stats::NodeStats;
use crate::NodeIndex;
use leosim_orbit::{EcefPosition, GeoCoord};
use leosim_types::{Address, DataPacket, DropReason, Message};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// The attached half of the serving state: which satellite, and which slot
/// in its radio-gate array carries the return link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attachment {
    pub node: NodeIndex,
    pub address: Address,
    pub radio_gate: usize,
}

#[derive(Debug)]
pub struct GroundStation {
    pub index: NodeIndex,
    pub address: Address,
    pub location: GeoCoord,
    /// Fixed ECEF position; the station rotates with the Earth.
    pub position: EcefPosition,
    pub max_range_km: f64,
    pub send_interval: Duration,
    pub packet_size_bytes: u64,
    /// Destinations this station draws from, uniformly, per generated
    /// packet.
    pub targets: Vec<Address>,
    /// `None` while unattached.
    pub serving: Option<Attachment>,
    /// Outbound gate to the serving satellite; replaced wholesale on every
    /// handover.
    pub gate: Option<Gate>,
    pub tx_queue: TxQueue<()>,
    wake_pending: bool,
    next_packet_id: u64,
    /// Virtual times of completed handovers.
    pub handover_log: Vec<Duration>,
    pub stats: NodeStats,
}

impl GroundStation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: NodeIndex,
        address: Address,
        location: GeoCoord,
        max_range_km: f64,
        send_interval: Duration,
        packet_size_bytes: u64,
        targets: Vec<Address>,
    ) -> Self {
        Self {
            index,
            address,
            location,
            position: location.to_ecef(),
            max_range_km,
            send_interval,
            packet_size_bytes,
            targets,
            serving: None,
            gate: None,
            tx_queue: TxQueue::new(),
            wake_pending: false,
            next_packet_id: 0,
            handover_log: Vec::new(),
            stats: NodeStats::new(),
        }
    }

    /// Install the new serving satellite and its outbound gate, then let
    /// anything queued during the gap flow again.
    pub fn attach(&mut self, attachment: Attachment, gate: Gate) {
        self.serving = Some(attachment);
        self.gate = Some(gate);
    }

    /// Drop the serving satellite. Queued packets are drained as
    /// gate-disconnected on the next queue pass.
    pub fn detach(&mut self) -> Option<Attachment> {
        self.gate = None;
        self.serving.take()
    }

    /// Generate one data packet toward `destination`.
    ///
    /// Every generated packet counts as sent, so the global conservation
    /// packets_sent = received + dropped + in-flight holds even for packets
    /// discarded right here.
    pub fn generate_packet(&mut self, now: Duration, destination: Address) -> Vec<Output> {
        let packet = DataPacket {
            source: self.address,
            destination,
            packet_id: self.next_packet_id,
            hop_count: 0,
            created_at: now,
            bits: self.packet_size_bytes * 8,
        };
        self.next_packet_id += 1;
        self.stats.packets_sent += 1;

        if self.serving.is_none() {
            debug!(
                gs = %self.address,
                packet_id = packet.packet_id,
                reason = %DropReason::NoServingSatellite,
                "packet dropped"
            );
            self.stats.record_drop(DropReason::NoServingSatellite);
            return Vec::new();
        }
        trace!(
            gs = %self.address,
            %destination,
            packet_id = packet.packet_id,
            "packet generated"
        );
        self.enqueue(now, Message::Data(packet))
    }

    pub fn on_message(&mut self, now: Duration, message: Message) -> Vec<Output> {
        match message {
            Message::Data(packet) if packet.destination == self.address => {
                trace!(
                    gs = %self.address,
                    from = %packet.source,
                    packet_id = packet.packet_id,
                    hops = packet.hop_count,
                    delay_s = now.saturating_sub(packet.created_at).as_secs_f64(),
                    "packet received"
                );
                self.stats.record_received(now, &packet);
            }
            Message::Data(packet) => {
                // A satellite handed us someone else's packet: the uplink
                // gate pointed here between detach and the peer's refresh.
                warn!(
                    gs = %self.address,
                    destination = %packet.destination,
                    packet_id = packet.packet_id,
                    "misdelivered packet discarded"
                );
            }
            Message::Routing(advert) => {
                // Ground stations do not participate in routing.
                trace!(gs = %self.address, from = %advert.source, "advertisement ignored");
            }
        }
        Vec::new()
    }

    pub fn on_tx_wake(&mut self, now: Duration) -> Vec<Output> {
        self.wake_pending = false;
        self.process_tx_queue(now)
    }

    fn enqueue(&mut self, now: Duration, message: Message) -> Vec<Output> {
        if let Err(rejected) = self.tx_queue.push((), message) {
            if let Message::Data(packet) = &rejected {
                debug!(
                    gs = %self.address,
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

    /// Same drain discipline as the satellite, over the single ground gate.
    pub fn process_tx_queue(&mut self, now: Duration) -> Vec<Output> {
        let mut outputs = Vec::new();
        while self.tx_queue.peek().is_some() {
            let connected = self.gate.as_ref().is_some_and(|gate| gate.connected);
            if !connected {
                let (_, message) = self.tx_queue.pop().expect("peeked entry");
                if let Message::Data(packet) = &message {
                    debug!(
                        gs = %self.address,
                        packet_id = packet.packet_id,
                        reason = %DropReason::GateDisconnected,
                        "packet dropped"
                    );
                    self.stats.record_drop(DropReason::GateDisconnected);
                }
                continue;
            }

            let gate = self.gate.as_mut().expect("connected gate");
            if gate.channel.is_busy(now) {
                if !self.wake_pending {
                    self.wake_pending = true;
                    outputs.push(Output::Wake {
                        at: gate.channel.busy_until(),
                    });
                }
                break;
            }

            let (_, message) = self.tx_queue.pop().expect("peeked entry");
            let gate = self.gate.as_mut().expect("connected gate");
            let to = gate.peer;
            let at = gate.channel.transmit(now, message.bits());
            trace!(
                gs = %self.address,
                to = %gate.peer_addr,
                kind = message.type_name(),
                arrival_s = at.as_secs_f64(),
                "message admitted"
            );
            outputs.push(Output::Deliver { to, at, message });
        }
        outputs
    }
}

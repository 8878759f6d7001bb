//! Per-node statistics and result reporting.
//!
//! Counters accumulate during the run; the runner snapshots them into a
//! [`SimulationReport`] at the end. Rendering is deterministic: nodes in
//! registry order, scalars in a fixed sequence, vectors in record order.

use leosim_types::{DataPacket, DropReason};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

/// Window below which the first→last packet span is considered degenerate
/// and throughput falls back to the full run duration.
const MIN_ACTIVE_WINDOW_S: f64 = 0.001;

/// Counters and vectors for one node.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeStats {
    /// Packets this node originated (ground stations only).
    pub packets_sent: u64,
    /// Packets for which this node was the destination.
    pub packets_received: u64,
    /// Data packets this node put on an outbound channel for a next hop.
    pub packets_forwarded: u64,
    pub bits_received: u64,
    pub bits_forwarded: u64,
    drops: BTreeMap<DropReason, u64>,
    pub first_packet_at: Option<Duration>,
    pub last_packet_at: Option<Duration>,
    /// Receive-side end-to-end delay samples: (record time s, delay s).
    pub end_to_end_delay: Vec<(f64, f64)>,
    /// Receive-side hop-count samples: (record time s, hops).
    pub hop_count: Vec<(f64, u32)>,
    /// Completed serving-satellite changes (ground stations only).
    pub handovers: u64,
}

impl NodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_drop(&mut self, reason: DropReason) {
        *self.drops.entry(reason).or_insert(0) += 1;
    }

    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.drops.get(&reason).copied().unwrap_or(0)
    }

    pub fn packets_dropped(&self) -> u64 {
        self.drops.values().sum()
    }

    /// Record delivery of a packet addressed to this node.
    pub fn record_received(&mut self, now: Duration, packet: &DataPacket) {
        self.packets_received += 1;
        self.bits_received += packet.bits;
        if self.first_packet_at.is_none() {
            self.first_packet_at = Some(now);
        }
        self.last_packet_at = Some(now);

        let delay = now.saturating_sub(packet.created_at).as_secs_f64();
        self.end_to_end_delay.push((now.as_secs_f64(), delay));
        self.hop_count.push((now.as_secs_f64(), packet.hop_count));
    }

    pub fn record_forwarded(&mut self, bits: u64) {
        self.packets_forwarded += 1;
        self.bits_forwarded += bits;
    }

    /// Receive window in seconds: last − first packet, falling back to the
    /// run duration when the span is degenerate.
    fn active_window_s(&self, run: Duration) -> f64 {
        match (self.first_packet_at, self.last_packet_at) {
            (Some(first), Some(last)) => {
                let window = (last - first).as_secs_f64();
                if window <= MIN_ACTIVE_WINDOW_S {
                    run.as_secs_f64()
                } else {
                    window
                }
            }
            _ => run.as_secs_f64(),
        }
    }

    pub fn throughput_bps(&self, run: Duration) -> f64 {
        let window = self.active_window_s(run);
        if window > 0.0 {
            self.bits_received as f64 / window
        } else {
            0.0
        }
    }

    pub fn forward_throughput_bps(&self, run: Duration) -> f64 {
        let window = run.as_secs_f64();
        if window > 0.0 {
            self.bits_forwarded as f64 / window
        } else {
            0.0
        }
    }

    /// Fraction of handled packets that were not dropped. 1.0 when idle.
    pub fn delivery_ratio(&self) -> f64 {
        let success = self.packets_received + self.packets_forwarded;
        let total = success + self.packets_dropped();
        if total == 0 {
            1.0
        } else {
            success as f64 / total as f64
        }
    }

    /// Fraction of forwarding attempts that reached a next hop. 1.0 when
    /// idle.
    pub fn forward_success_rate(&self) -> f64 {
        let total = self.packets_forwarded + self.packets_dropped();
        if total == 0 {
            1.0
        } else {
            self.packets_forwarded as f64 / total as f64
        }
    }

    fn drop_scalars(&self, scalars: &mut Vec<(&'static str, ScalarValue)>) {
        for reason in DropReason::ALL {
            let count = self.dropped(reason);
            if count > 0 {
                scalars.push((reason.scalar_name(), ScalarValue::Count(count)));
            }
        }
    }

    /// Scalar set emitted for a satellite.
    pub fn satellite_scalars(&self, run: Duration) -> Vec<(&'static str, ScalarValue)> {
        let mut scalars = vec![
            ("PacketsReceived", ScalarValue::Count(self.packets_received)),
            (
                "PacketsForwarded",
                ScalarValue::Count(self.packets_forwarded),
            ),
            (
                "PacketsDropped",
                ScalarValue::Count(self.packets_dropped()),
            ),
            (
                "ForwardThroughput_bps",
                ScalarValue::Value(self.forward_throughput_bps(run)),
            ),
            (
                "PacketDeliveryRatio",
                ScalarValue::Value(self.delivery_ratio()),
            ),
            (
                "ForwardSuccessRate",
                ScalarValue::Value(self.forward_success_rate()),
            ),
        ];
        self.drop_scalars(&mut scalars);
        scalars
    }

    /// Scalar set emitted for a ground station.
    pub fn ground_scalars(&self, run: Duration) -> Vec<(&'static str, ScalarValue)> {
        let mut scalars = vec![
            ("PacketsSent", ScalarValue::Count(self.packets_sent)),
            ("PacketsReceived", ScalarValue::Count(self.packets_received)),
            (
                "PacketsDropped",
                ScalarValue::Count(self.packets_dropped()),
            ),
            (
                "Throughput_bps",
                ScalarValue::Value(self.throughput_bps(run)),
            ),
            ("Handovers", ScalarValue::Count(self.handovers)),
        ];
        self.drop_scalars(&mut scalars);
        scalars
    }

    /// Vector set emitted for any node (only the non-empty ones).
    pub fn vectors(&self) -> Vec<(&'static str, Vec<(f64, f64)>)> {
        let mut vectors = Vec::new();
        if !self.end_to_end_delay.is_empty() {
            vectors.push(("endToEndDelay", self.end_to_end_delay.clone()));
        }
        if !self.hop_count.is_empty() {
            vectors.push((
                "hopCount",
                self.hop_count
                    .iter()
                    .map(|&(t, hops)| (t, hops as f64))
                    .collect(),
            ));
        }
        vectors
    }
}

/// A single result value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Count(u64),
    Value(f64),
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Count(count) => write!(f, "{count}"),
            ScalarValue::Value(value) => write!(f, "{value}"),
        }
    }
}

/// Results of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReport {
    pub name: String,
    pub scalars: Vec<(&'static str, ScalarValue)>,
    pub vectors: Vec<(&'static str, Vec<(f64, f64)>)>,
}

/// Results of a whole run, rendered as a line-oriented text table:
/// `scalar <node> <name> <value>` and `vector <node> <name> <t> <value>`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub duration: Duration,
    pub nodes: Vec<NodeReport>,
}

impl SimulationReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "run leosim duration-s {}", self.duration.as_secs_f64());
        for node in &self.nodes {
            for (name, value) in &node.scalars {
                let _ = writeln!(out, "scalar {} {} {}", node.name, name, value);
            }
        }
        for node in &self.nodes {
            for (name, samples) in &node.vectors {
                for (time, value) in samples {
                    let _ = writeln!(out, "vector {} {} {} {}", node.name, name, time, value);
                }
            }
        }
        out
    }
}

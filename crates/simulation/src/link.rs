//! Point-to-point channel model.
//!
//! A [`Channel`] is the sender-owned half of a unidirectional link:
//! a datarate, a one-way delay, and the instant until which an ongoing
//! transmission occupies it. Full duplex between two nodes is two channels,
//! one per direction, each owned by its sender.

use crate::NodeIndex;
use leosim_orbit::SPEED_OF_LIGHT_KM_S;
use leosim_types::Address;
use std::time::Duration;

/// Fixed per-link processing margin added on top of propagation.
pub const PROCESSING_DELAY: Duration = Duration::from_millis(1);

/// Datarate of dynamically created ground↔satellite links.
pub const GROUND_LINK_DATARATE_BPS: f64 = 4e9;

/// One-way link delay for a span of `distance_km`: propagation at the speed
/// of light plus the processing margin.
pub fn propagation_delay(distance_km: f64) -> Duration {
    Duration::from_secs_f64(distance_km / SPEED_OF_LIGHT_KM_S) + PROCESSING_DELAY
}

/// Transmission state of one unidirectional link.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    datarate_bps: f64,
    delay: Duration,
    busy_until: Duration,
}

impl Channel {
    pub fn new(datarate_bps: f64, delay: Duration) -> Self {
        Self {
            datarate_bps,
            delay,
            busy_until: Duration::ZERO,
        }
    }

    /// A channel is busy iff `now < busy_until` (strictly), so a message
    /// submitted exactly when the previous transmission ends goes out
    /// immediately.
    pub fn is_busy(&self, now: Duration) -> bool {
        now < self.busy_until
    }

    pub fn busy_until(&self) -> Duration {
        self.busy_until
    }

    pub fn datarate_bps(&self) -> f64 {
        self.datarate_bps
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Update the one-way delay. Takes effect for subsequently admitted
    /// messages only; anything already transmitted keeps the arrival time
    /// computed at admission.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Admit a message of `bits` length at `now`. The channel must not be
    /// busy. Returns the arrival instant at the receiver: transmission end
    /// plus one-way delay.
    pub fn transmit(&mut self, now: Duration, bits: u64) -> Duration {
        debug_assert!(!self.is_busy(now), "transmit on a busy channel");
        let tx_duration = Duration::from_secs_f64(bits as f64 / self.datarate_bps);
        self.busy_until = now + tx_duration;
        self.busy_until + self.delay
    }
}

/// The outbound half of a link as seen from its owning node: the peer's
/// registry handle and address, the channel, and whether the gate is still
/// wired. Handover disconnects gates without destroying them, so indices
/// held by queued messages stay valid.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub peer: NodeIndex,
    pub peer_addr: Address,
    pub channel: Channel,
    pub connected: bool,
}

impl Gate {
    pub fn new(peer: NodeIndex, peer_addr: Address, channel: Channel) -> Self {
        Self {
            peer,
            peer_addr,
            channel,
            connected: true,
        }
    }
}

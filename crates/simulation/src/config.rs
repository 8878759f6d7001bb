//! Typed scenario description consumed by the runner.
//!
//! These structs are the resolved form of a scenario: every parameter is
//! looked up exactly once at build time. File parsing and validation live
//! in the simulator crate; the runner assumes a well-formed scenario.

use leosim_orbit::{GeoCoord, OrbitalElements};
use std::time::Duration;

/// Datarate of an ISL edge when the scenario does not name one.
pub const DEFAULT_ISL_DATARATE_BPS: f64 = 10e9;

#[derive(Debug, Clone)]
pub struct SatelliteSpec {
    pub id: u32,
    pub orbit: OrbitalElements,
    pub max_isl_range_km: f64,
}

#[derive(Debug, Clone)]
pub struct GroundStationSpec {
    pub address: u32,
    pub location: GeoCoord,
    pub max_range_km: f64,
    pub send_interval: Duration,
    pub packet_size_bytes: u64,
    /// Destination addresses; each generated packet picks one uniformly.
    pub targets: Vec<u32>,
}

/// One undirected ISL edge; the runner wires a channel in each direction.
#[derive(Debug, Clone)]
pub struct IslSpec {
    pub a: u32,
    pub b: u32,
    pub datarate_bps: f64,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub satellites: Vec<SatelliteSpec>,
    pub ground_stations: Vec<GroundStationSpec>,
    pub isls: Vec<IslSpec>,
    pub horizon: Duration,
    pub seed: u64,
}

impl Scenario {
    pub fn new(horizon: Duration, seed: u64) -> Self {
        Self {
            satellites: Vec::new(),
            ground_stations: Vec::new(),
            isls: Vec::new(),
            horizon,
            seed,
        }
    }

    pub fn with_satellite(mut self, spec: SatelliteSpec) -> Self {
        self.satellites.push(spec);
        self
    }

    pub fn with_ground_station(mut self, spec: GroundStationSpec) -> Self {
        self.ground_stations.push(spec);
        self
    }

    /// Add an ISL edge at the default datarate.
    pub fn with_isl(self, a: u32, b: u32) -> Self {
        self.with_isl_at(a, b, DEFAULT_ISL_DATARATE_BPS)
    }

    pub fn with_isl_at(mut self, a: u32, b: u32, datarate_bps: f64) -> Self {
        self.isls.push(IslSpec { a, b, datarate_bps });
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

//! Scenario loading and validation.
//!
//! Scenarios are TOML files resolved once, at build time, into the typed
//! [`Scenario`] the runner consumes. Anything malformed (unknown keys,
//! out-of-range values, dangling references) is a fatal
//! [`ScenarioError`]; there is no partial scenario.

use leosim_orbit::{GeoCoord, OrbitError, OrbitalElements, EARTH_RADIUS_KM};
use leosim_simulation::{
    GroundStationSpec, IslSpec, SatelliteSpec, Scenario, DEFAULT_ISL_DATARATE_BPS,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("scenario has no satellites")]
    NoSatellites,
    #[error("satellite ids start at 1, got {0}")]
    InvalidSatelliteId(u32),
    #[error("duplicate satellite id {0}")]
    DuplicateSatellite(u32),
    #[error("duplicate ground-station address {0}")]
    DuplicateAddress(u32),
    #[error("address {0} is used by both a satellite and a ground station")]
    AddressCollision(u32),
    #[error("satellite {id}: {source}")]
    InvalidOrbit { id: u32, source: OrbitError },
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("ISL edge references unknown satellite {0}")]
    UnknownSatellite(u32),
    #[error("ISL edge {0} -> {0} is a self-loop")]
    SelfLoop(u32),
    #[error("ground station {station} targets unknown address {target}")]
    UnknownTarget { station: u32, target: u32 },
    #[error("ground station {0} has an empty target list")]
    EmptyTargets(u32),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ScenarioFile {
    sim_time_limit_s: f64,
    seed: u64,
    #[serde(default, rename = "satellite")]
    satellites: Vec<SatelliteEntry>,
    #[serde(default, rename = "ground-station")]
    ground_stations: Vec<GroundStationEntry>,
    #[serde(default, rename = "isl")]
    isls: Vec<IslEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct SatelliteEntry {
    id: u32,
    altitude_km: f64,
    inclination_deg: f64,
    #[serde(default)]
    raan_deg: f64,
    #[serde(default)]
    arg_perigee_deg: f64,
    /// Mean anomaly at epoch.
    #[serde(default)]
    initial_angle_deg: f64,
    #[serde(default)]
    eccentricity: f64,
    max_isl_range_km: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct GroundStationEntry {
    address: u32,
    latitude_deg: f64,
    longitude_deg: f64,
    #[serde(default)]
    altitude_km: f64,
    max_range_km: f64,
    send_interval_s: f64,
    packet_size_bytes: u64,
    targets: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct IslEntry {
    a: u32,
    b: u32,
    datarate_bps: Option<f64>,
}

/// Load and validate a scenario file.
pub fn load(path: &Path) -> Result<Scenario, ScenarioError> {
    let text = std::fs::read_to_string(path)?;
    from_str(&text)
}

/// Parse and validate scenario TOML.
pub fn from_str(text: &str) -> Result<Scenario, ScenarioError> {
    let file: ScenarioFile = toml::from_str(text)?;
    resolve(file)
}

fn positive(field: &'static str, value: f64) -> Result<f64, ScenarioError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ScenarioError::NonPositive { field, value })
    }
}

fn resolve(file: ScenarioFile) -> Result<Scenario, ScenarioError> {
    if file.satellites.is_empty() {
        return Err(ScenarioError::NoSatellites);
    }
    positive("sim-time-limit-s", file.sim_time_limit_s)?;

    let mut satellite_ids = BTreeSet::new();
    let mut satellites = Vec::with_capacity(file.satellites.len());
    for entry in &file.satellites {
        if entry.id == 0 {
            return Err(ScenarioError::InvalidSatelliteId(entry.id));
        }
        if !satellite_ids.insert(entry.id) {
            return Err(ScenarioError::DuplicateSatellite(entry.id));
        }
        positive("max-isl-range-km", entry.max_isl_range_km)?;
        let orbit = OrbitalElements {
            semi_major_axis_km: EARTH_RADIUS_KM + entry.altitude_km,
            eccentricity: entry.eccentricity,
            inclination_deg: entry.inclination_deg,
            raan_deg: entry.raan_deg,
            arg_perigee_deg: entry.arg_perigee_deg,
            mean_anomaly_deg: entry.initial_angle_deg,
        };
        orbit
            .validate()
            .map_err(|source| ScenarioError::InvalidOrbit {
                id: entry.id,
                source,
            })?;
        satellites.push(SatelliteSpec {
            id: entry.id,
            orbit,
            max_isl_range_km: entry.max_isl_range_km,
        });
    }

    let mut station_addresses = BTreeSet::new();
    for entry in &file.ground_stations {
        if !station_addresses.insert(entry.address) {
            return Err(ScenarioError::DuplicateAddress(entry.address));
        }
        if satellite_ids.contains(&entry.address) {
            return Err(ScenarioError::AddressCollision(entry.address));
        }
    }

    let mut ground_stations = Vec::with_capacity(file.ground_stations.len());
    for entry in &file.ground_stations {
        positive("max-range-km", entry.max_range_km)?;
        positive("send-interval-s", entry.send_interval_s)?;
        positive("packet-size-bytes", entry.packet_size_bytes as f64)?;
        if entry.targets.is_empty() {
            return Err(ScenarioError::EmptyTargets(entry.address));
        }
        for &target in &entry.targets {
            if !station_addresses.contains(&target) {
                return Err(ScenarioError::UnknownTarget {
                    station: entry.address,
                    target,
                });
            }
        }
        ground_stations.push(GroundStationSpec {
            address: entry.address,
            location: GeoCoord {
                latitude_deg: entry.latitude_deg,
                longitude_deg: entry.longitude_deg,
                altitude_km: entry.altitude_km,
            },
            max_range_km: entry.max_range_km,
            send_interval: Duration::from_secs_f64(entry.send_interval_s),
            packet_size_bytes: entry.packet_size_bytes,
            targets: entry.targets.clone(),
        });
    }

    let mut isls = Vec::with_capacity(file.isls.len());
    for entry in &file.isls {
        if entry.a == entry.b {
            return Err(ScenarioError::SelfLoop(entry.a));
        }
        for id in [entry.a, entry.b] {
            if !satellite_ids.contains(&id) {
                return Err(ScenarioError::UnknownSatellite(id));
            }
        }
        let datarate_bps = entry.datarate_bps.unwrap_or(DEFAULT_ISL_DATARATE_BPS);
        positive("datarate-bps", datarate_bps)?;
        isls.push(IslSpec {
            a: entry.a,
            b: entry.b,
            datarate_bps,
        });
    }

    debug!(
        satellites = satellites.len(),
        ground_stations = ground_stations.len(),
        isl_edges = isls.len(),
        "scenario resolved"
    );

    Ok(Scenario {
        satellites,
        ground_stations,
        isls,
        horizon: Duration::from_secs_f64(file.sim_time_limit_s),
        seed: file.seed,
    })
}

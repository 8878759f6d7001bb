//! Orbital Mechanics Library
//!
//! Keplerian propagation, ECEF/geodetic transforms, and distance math for
//! the constellation simulator. The propagator is pure and time-reentrant:
//! position is a function of the orbital elements and virtual time only.
//!
//! The Earth model is spherical (radius 6371 km); there is no oblateness,
//! J2 drift, or drag.

use thiserror::Error;
use tracing::warn;

/// Mean Earth radius (km), spherical model.
pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Earth gravitational parameter μ (km³/s²).
pub const EARTH_MU_KM3_S2: f64 = 398600.4418;
/// Earth sidereal rotation rate ω⊕ (rad/s).
pub const EARTH_ROTATION_RAD_S: f64 = 7.2921159e-5;
/// Speed of light (km/s).
pub const SPEED_OF_LIGHT_KM_S: f64 = 299792.458;

/// Kepler solver iteration bound. Fixed for determinism; for e ≤ 0.1 the
/// residual is far below the convergence threshold well before the bound.
const KEPLER_MAX_ITERATIONS: usize = 10;
/// Kepler solver convergence threshold (rad).
const KEPLER_TOLERANCE: f64 = 1e-10;

#[derive(Error, Debug)]
pub enum OrbitError {
    #[error("semi-major axis {0} km must exceed the Earth radius {EARTH_RADIUS_KM} km")]
    SemiMajorAxisTooSmall(f64),
    #[error("eccentricity {0} outside [0, 1)")]
    EccentricityOutOfRange(f64),
}

/// Classical Keplerian elements. All angles in degrees, lengths in km.
///
/// `mean_anomaly_deg` is the mean anomaly at epoch (t = 0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    pub semi_major_axis_km: f64,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub arg_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
}

impl OrbitalElements {
    /// A circular orbit at the given altitude above the spherical Earth.
    pub fn circular(altitude_km: f64, inclination_deg: f64) -> Self {
        Self {
            semi_major_axis_km: EARTH_RADIUS_KM + altitude_km,
            eccentricity: 0.0,
            inclination_deg,
            raan_deg: 0.0,
            arg_perigee_deg: 0.0,
            mean_anomaly_deg: 0.0,
        }
    }

    /// Mean motion n = √(μ/a³) in rad/s.
    pub fn mean_motion_rad_s(&self) -> f64 {
        (EARTH_MU_KM3_S2 / self.semi_major_axis_km.powi(3)).sqrt()
    }

    /// Orbital period in seconds.
    pub fn period_s(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.mean_motion_rad_s()
    }

    pub fn validate(&self) -> Result<(), OrbitError> {
        if self.semi_major_axis_km <= EARTH_RADIUS_KM {
            return Err(OrbitError::SemiMajorAxisTooSmall(self.semi_major_axis_km));
        }
        if !(0.0..1.0).contains(&self.eccentricity) {
            return Err(OrbitError::EccentricityOutOfRange(self.eccentricity));
        }
        Ok(())
    }

    /// Propagate to virtual time `t` seconds after epoch and return the
    /// position in the rotating Earth-fixed frame.
    ///
    /// Steps: mean anomaly → eccentric anomaly (Newton–Raphson) → true
    /// anomaly → perifocal radius → RAAN/inclination rotation into ECI →
    /// sidereal rotation into ECEF.
    pub fn position_ecef(&self, t_seconds: f64) -> EcefPosition {
        let e = self.eccentricity;
        let mean_anomaly =
            self.mean_anomaly_deg.to_radians() + self.mean_motion_rad_s() * t_seconds;

        let eccentric_anomaly = solve_kepler(mean_anomaly, e);

        // True anomaly and orbital-plane radius.
        let true_anomaly = ((1.0 - e * e).sqrt() * eccentric_anomaly.sin())
            .atan2(eccentric_anomaly.cos() - e);
        let radius = self.semi_major_axis_km * (1.0 - e * eccentric_anomaly.cos());

        // Argument of latitude: angle from the ascending node.
        let u = true_anomaly + self.arg_perigee_deg.to_radians();
        let x_plane = radius * u.cos();
        let y_plane = radius * u.sin();

        let raan = self.raan_deg.to_radians();
        let incl = self.inclination_deg.to_radians();

        let x_eci = x_plane * raan.cos() - y_plane * incl.cos() * raan.sin();
        let y_eci = x_plane * raan.sin() + y_plane * incl.cos() * raan.cos();
        let z_eci = y_plane * incl.sin();

        // Sidereal rotation: ECI → ECEF.
        let theta = EARTH_ROTATION_RAD_S * t_seconds;
        EcefPosition {
            x_km: x_eci * theta.cos() + y_eci * theta.sin(),
            y_km: -x_eci * theta.sin() + y_eci * theta.cos(),
            z_km: z_eci,
        }
    }
}

/// Solve Kepler's equation M = E − e·sin E for E by Newton–Raphson.
///
/// Starts at E₀ = M and runs a fixed, deterministic number of steps with an
/// early exit once the step falls below the tolerance. If the bound is
/// exhausted without convergence (which cannot happen for e ≤ 0.1) the last
/// iterate is returned after a diagnostic.
pub fn solve_kepler(mean_anomaly_rad: f64, eccentricity: f64) -> f64 {
    let mut e_anom = mean_anomaly_rad;
    let mut delta = f64::MAX;
    for _ in 0..KEPLER_MAX_ITERATIONS {
        delta = (e_anom - eccentricity * e_anom.sin() - mean_anomaly_rad)
            / (1.0 - eccentricity * e_anom.cos());
        e_anom -= delta;
        if delta.abs() < KEPLER_TOLERANCE {
            return e_anom;
        }
    }
    warn!(
        mean_anomaly_rad,
        eccentricity,
        residual = delta.abs(),
        "Kepler iteration did not converge, continuing with last iterate"
    );
    e_anom
}

/// Cartesian position in the Earth-Centered Earth-Fixed frame (km).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcefPosition {
    pub x_km: f64,
    pub y_km: f64,
    pub z_km: f64,
}

impl EcefPosition {
    /// Euclidean distance to another position in km.
    pub fn distance_to(&self, other: &EcefPosition) -> f64 {
        let dx = self.x_km - other.x_km;
        let dy = self.y_km - other.y_km;
        let dz = self.z_km - other.z_km;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance from the Earth centre in km.
    pub fn radius_km(&self) -> f64 {
        (self.x_km * self.x_km + self.y_km * self.y_km + self.z_km * self.z_km).sqrt()
    }

    /// Convert back to geodetic coordinates on the spherical Earth.
    pub fn to_geo(&self) -> GeoCoord {
        let r = self.radius_km();
        GeoCoord {
            latitude_deg: (self.z_km / r).asin().to_degrees(),
            longitude_deg: self.y_km.atan2(self.x_km).to_degrees(),
            altitude_km: r - EARTH_RADIUS_KM,
        }
    }
}

/// Geodetic coordinate on the spherical Earth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoord {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

impl GeoCoord {
    /// Convert to ECEF. Ground stations rotate with the Earth, so their
    /// ECEF position is constant over the whole run.
    pub fn to_ecef(&self) -> EcefPosition {
        let lat = self.latitude_deg.to_radians();
        let lon = self.longitude_deg.to_radians();
        let r = EARTH_RADIUS_KM + self.altitude_km;
        EcefPosition {
            x_km: r * lat.cos() * lon.cos(),
            y_km: r * lat.cos() * lon.sin(),
            z_km: r * lat.sin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leo_elements() -> OrbitalElements {
        OrbitalElements {
            semi_major_axis_km: EARTH_RADIUS_KM + 550.0,
            eccentricity: 0.01,
            inclination_deg: 53.0,
            raan_deg: 40.0,
            arg_perigee_deg: 10.0,
            mean_anomaly_deg: 25.0,
        }
    }

    #[test]
    fn kepler_is_exact_for_circular_orbits() {
        for m in [0.0, 0.5, 1.5, 3.0, 6.0] {
            assert_eq!(solve_kepler(m, 0.0), m);
        }
    }

    #[test]
    fn kepler_satisfies_the_equation() {
        for &(m, e) in &[(0.3, 0.05), (2.0, 0.1), (5.5, 0.01)] {
            let big_e = solve_kepler(m, e);
            assert!((big_e - e * big_e.sin() - m).abs() < 1e-10);
        }
    }

    #[test]
    fn radius_matches_conic_equation() {
        let elements = leo_elements();
        for t in [0.0, 90.0, 1234.5, 5400.0] {
            let mean_anomaly =
                elements.mean_anomaly_deg.to_radians() + elements.mean_motion_rad_s() * t;
            let e_anom = solve_kepler(mean_anomaly, elements.eccentricity);
            let expected =
                elements.semi_major_axis_km * (1.0 - elements.eccentricity * e_anom.cos());
            let actual = elements.position_ecef(t).radius_km();
            assert!(
                (actual - expected).abs() < 1e-6,
                "t={t}: radius {actual} vs conic {expected}"
            );
        }
    }

    #[test]
    fn leo_period_is_about_95_minutes() {
        let elements = OrbitalElements::circular(550.0, 53.0);
        let period_min = elements.period_s() / 60.0;
        assert!(
            (90.0..101.0).contains(&period_min),
            "period {period_min} min"
        );
    }

    #[test]
    fn geo_ecef_round_trip() {
        let original = GeoCoord {
            latitude_deg: 41.015,
            longitude_deg: 28.979,
            altitude_km: 0.1,
        };
        let back = original.to_ecef().to_geo();
        assert!((back.latitude_deg - original.latitude_deg).abs() < 1e-9);
        assert!((back.longitude_deg - original.longitude_deg).abs() < 1e-9);
        assert!((back.altitude_km - original.altitude_km).abs() < 1e-9);
    }

    #[test]
    fn equatorial_satellite_starts_over_the_reference_meridian() {
        let elements = OrbitalElements::circular(550.0, 0.0);
        let pos = elements.position_ecef(0.0);
        assert!((pos.x_km - (EARTH_RADIUS_KM + 550.0)).abs() < 1e-9);
        assert!(pos.y_km.abs() < 1e-9);
        assert!(pos.z_km.abs() < 1e-9);
    }

    #[test]
    fn distance_is_symmetric_and_euclidean() {
        let a = EcefPosition {
            x_km: 7000.0,
            y_km: 0.0,
            z_km: 0.0,
        };
        let b = EcefPosition {
            x_km: 7000.0,
            y_km: 300.0,
            z_km: 400.0,
        };
        assert_eq!(a.distance_to(&b), 500.0);
        assert_eq!(b.distance_to(&a), 500.0);
    }

    #[test]
    fn validate_rejects_degenerate_elements() {
        let mut elements = leo_elements();
        elements.semi_major_axis_km = 100.0;
        assert!(matches!(
            elements.validate(),
            Err(OrbitError::SemiMajorAxisTooSmall(_))
        ));

        let mut elements = leo_elements();
        elements.eccentricity = 1.0;
        assert!(matches!(
            elements.validate(),
            Err(OrbitError::EccentricityOutOfRange(_))
        ));

        assert!(leo_elements().validate().is_ok());
    }

    #[test]
    fn propagation_is_time_reentrant() {
        let elements = leo_elements();
        let first = elements.position_ecef(777.0);
        let _ = elements.position_ecef(12.0);
        let second = elements.position_ecef(777.0);
        assert_eq!(first, second);
    }
}

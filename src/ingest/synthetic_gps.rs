//! Route playback position source.
//!
//! Moves along a waypoint route at constant speed and emits fixes at a fixed
//! update rate on a simulated clock.

use super::PositionSource;
use crate::config::SyntheticGpsConfig;
use crate::error::ConfigError;
use crate::types::PositionFix;
use crate::utils::{ns_to_secs, secs_to_ns};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial bearing from point 1 to point 2, degrees clockwise from north in [0, 360).
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlambda = (lon2 - lon1).to_radians();
    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

#[derive(Debug, Clone)]
pub struct SyntheticGpsSource {
    waypoints: Vec<[f64; 2]>,
    /// Cumulative distance at the start of each waypoint
    cumulative_m: Vec<f64>,
    speed_mps: f64,
    interval_ns: i64,
    loop_route: bool,
    start_ns: i64,
    next_index: u64,
}

impl SyntheticGpsSource {
    pub fn new(config: &SyntheticGpsConfig) -> Result<Self, ConfigError> {
        if config.waypoints.is_empty() {
            return Err(ConfigError::invalid("GPS route needs at least one waypoint"));
        }
        if !(config.update_rate_hz.is_finite() && config.update_rate_hz > 0.0) {
            return Err(ConfigError::invalid("GPS update rate must be > 0 Hz"));
        }
        if !(config.speed_mps.is_finite() && config.speed_mps >= 0.0) {
            return Err(ConfigError::invalid("GPS speed must be >= 0 m/s"));
        }
        if let Some(bad) = config
            .waypoints
            .iter()
            .find(|[lat, lon]| !PositionFix::new(0, *lat, *lon).has_valid_coordinates())
        {
            return Err(ConfigError::invalid(format!(
                "Waypoint {:?} has invalid coordinates",
                bad
            )));
        }

        let mut cumulative_m = Vec::with_capacity(config.waypoints.len());
        let mut total = 0.0;
        cumulative_m.push(0.0);
        for pair in config.waypoints.windows(2) {
            total += haversine_m(pair[0][0], pair[0][1], pair[1][0], pair[1][1]);
            cumulative_m.push(total);
        }

        Ok(Self {
            waypoints: config.waypoints.clone(),
            cumulative_m,
            speed_mps: config.speed_mps,
            interval_ns: secs_to_ns(config.update_rate_hz.recip()),
            loop_route: config.loop_route,
            start_ns: 0,
            next_index: 0,
        })
    }

    pub fn with_start_ns(mut self, start_ns: i64) -> Self {
        self.start_ns = start_ns;
        self
    }

    pub fn route_length_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }

    pub fn interval_ns(&self) -> i64 {
        self.interval_ns
    }

    /// Position and heading at `distance_m` along the route.
    fn position_at(&self, distance_m: f64) -> (f64, f64, Option<f64>) {
        if self.waypoints.len() == 1 {
            let [lat, lon] = self.waypoints[0];
            return (lat, lon, None);
        }

        // Segment whose end lies beyond `distance_m`, clamped to the last one
        let seg = self
            .cumulative_m
            .partition_point(|&c| c <= distance_m)
            .saturating_sub(1)
            .min(self.waypoints.len() - 2);

        let [lat1, lon1] = self.waypoints[seg];
        let [lat2, lon2] = self.waypoints[seg + 1];
        let seg_len = self.cumulative_m[seg + 1] - self.cumulative_m[seg];
        let t = if seg_len > 0.0 {
            ((distance_m - self.cumulative_m[seg]) / seg_len).clamp(0.0, 1.0)
        } else {
            0.0
        };

        (
            lat1 + (lat2 - lat1) * t,
            lon1 + (lon2 - lon1) * t,
            Some(bearing_deg(lat1, lon1, lat2, lon2)),
        )
    }
}

impl PositionSource for SyntheticGpsSource {
    fn next_fix(&mut self) -> Option<PositionFix> {
        let index = self.next_index;
        let elapsed_s = index as f64 * ns_to_secs(self.interval_ns);
        let total = self.route_length_m();
        let mut distance = elapsed_s * self.speed_mps;

        if distance > total {
            if self.loop_route && total > 0.0 {
                distance %= total;
            } else if !self.loop_route {
                return None;
            }
        }

        let (lat_deg, lon_deg, heading_deg) = self.position_at(distance);
        self.next_index += 1;

        Some(PositionFix {
            gps_timestamp_ns: self.start_ns + index as i64 * self.interval_ns,
            lat_deg,
            lon_deg,
            alt_m: None,
            heading_deg,
            speed_mps: Some(self.speed_mps),
        })
    }
}

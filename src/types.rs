//! Records flowing through the pipeline.

use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One frame of complex baseband samples from a sample source.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    /// Strictly increasing per source instance
    pub frame_id: u64,
    pub timestamp_ns: i64,
    pub center_freq_hz: f64,
    pub sample_rate_sps: f64,
    pub gain_db: Option<f64>,
    pub samples: Vec<Complex32>,
}

/// A single position measurement with its own timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub gps_timestamp_ns: i64,
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: Option<f64>,
    pub heading_deg: Option<f64>,
    pub speed_mps: Option<f64>,
}

impl PositionFix {
    /// Fix with coordinates only.
    pub fn new(gps_timestamp_ns: i64, lat_deg: f64, lon_deg: f64) -> Self {
        Self {
            gps_timestamp_ns,
            lat_deg,
            lon_deg,
            alt_m: None,
            heading_deg: None,
            speed_mps: None,
        }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180], both finite.
    pub fn has_valid_coordinates(&self) -> bool {
        self.lat_deg.is_finite()
            && self.lon_deg.is_finite()
            && (-90.0..=90.0).contains(&self.lat_deg)
            && (-180.0..=180.0).contains(&self.lon_deg)
    }
}

fn default_threshold_offset_db() -> f32 {
    6.0
}

/// A named frequency band, in absolute RF Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSpec {
    pub name: String,
    pub freq_low_hz: f64,
    pub freq_high_hz: f64,
    /// Occupancy threshold above the noise floor
    #[serde(default = "default_threshold_offset_db")]
    pub threshold_offset_db: f32,
}

impl BandSpec {
    pub fn new(name: impl Into<String>, freq_low_hz: f64, freq_high_hz: f64) -> Self {
        Self {
            name: name.into(),
            freq_low_hz,
            freq_high_hz,
            threshold_offset_db: default_threshold_offset_db(),
        }
    }

    pub fn contains(&self, freq_hz: f64) -> bool {
        (self.freq_low_hz..=self.freq_high_hz).contains(&freq_hz)
    }
}

/// Spectral features extracted from one sample frame.
///
/// Created once per input frame and never mutated afterwards, except that the
/// pipeline fills `lat_deg`/`lon_deg` from the fix aligner before handing it on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub frame_id: u64,
    pub timestamp_ns: i64,
    pub lat_deg: Option<f64>,
    pub lon_deg: Option<f64>,
    /// Bin centers relative to the carrier, ascending
    pub freq_bins_hz: Vec<f32>,
    pub psd_db: Vec<f32>,
    pub psd_smoothed_db: Vec<f32>,
    pub noise_floor_db: f32,
    /// Parallel to the configured band list
    pub bandpower_db: Vec<f32>,
    pub occupancy_pct: Vec<f32>,
    pub anomaly_score: Option<f32>,
}

impl FeatureRecord {
    /// Both coordinates present.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lat_deg, self.lon_deg) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn num_bands(&self) -> usize {
        self.bandpower_db.len()
    }
}

/// Integer tile coordinates relative to the grid center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub tile_x: i32,
    pub tile_y: i32,
}

impl TileKey {
    pub fn new(tile_x: i32, tile_y: i32) -> Self {
        Self { tile_x, tile_y }
    }

    /// Stable string identifier, e.g. `tile_x-3_y12`.
    pub fn tile_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile_x{}_y{}", self.tile_x, self.tile_y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTileKeyError(String);

impl fmt::Display for ParseTileKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid tile id '{}'", self.0)
    }
}

impl std::error::Error for ParseTileKeyError {}

impl FromStr for TileKey {
    type Err = ParseTileKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTileKeyError(s.to_string());
        let rest = s.strip_prefix("tile_x").ok_or_else(err)?;
        let (x, y) = rest.split_once("_y").ok_or_else(err)?;
        Ok(Self {
            tile_x: x.parse().map_err(|_| err())?,
            tile_y: y.parse().map_err(|_| err())?,
        })
    }
}

/// Windowed statistics for one tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileMetrics {
    pub tile_id: String,
    pub tile_x: i32,
    pub tile_y: i32,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub frame_count: u64,
    pub timestamp_min_ns: i64,
    pub timestamp_max_ns: i64,
    pub bandpower_mean_db: Vec<f32>,
    pub bandpower_max_db: Vec<f32>,
    pub occupancy_mean_pct: Vec<f32>,
    pub anomaly_score_max: Option<f32>,
}

impl TileMetrics {
    pub fn key(&self) -> TileKey {
        TileKey::new(self.tile_x, self.tile_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_id_round_trip() {
        for key in [TileKey::new(0, 0), TileKey::new(-3, 12), TileKey::new(7, -1)] {
            let parsed: TileKey = key.tile_id().parse().unwrap();
            assert_eq!(parsed, key);
        }
    }

    #[test]
    fn test_tile_id_rejects_garbage() {
        assert!("tile_3_4".parse::<TileKey>().is_err());
        assert!("tile_xa_y1".parse::<TileKey>().is_err());
        assert!("out_of_bounds".parse::<TileKey>().is_err());
    }

    #[test]
    fn test_fix_coordinate_validation() {
        assert!(PositionFix::new(0, 45.0, -120.0).has_valid_coordinates());
        assert!(!PositionFix::new(0, 91.0, 0.0).has_valid_coordinates());
        assert!(!PositionFix::new(0, 0.0, f64::NAN).has_valid_coordinates());
    }

    #[test]
    fn test_band_default_offset_from_toml() {
        let band: BandSpec =
            toml::from_str("name = \"a\"\nfreq_low_hz = 1.0\nfreq_high_hz = 2.0").unwrap();
        assert_eq!(band.threshold_offset_db, 6.0);
        assert!(band.contains(1.5));
    }
}

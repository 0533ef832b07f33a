//! Observatory configuration with TOML persistence.
//!
//! Every section has defaults; values are validated once when components are
//! constructed, never per frame.

use crate::dsp::window::WindowKind;
use crate::error::{ConfigError, Result};
use crate::types::BandSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Receiver and FFT parameters
    pub rf: RfConfig,

    /// Spectral feature extraction
    pub dsp: DspConfig,

    /// Tile grid and aggregation window
    pub geo: GeoConfig,

    /// Position fix alignment
    pub fusion: FusionConfig,

    /// Synthetic sample and position sources
    pub synthetic: SyntheticConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RfConfig {
    pub center_freq_hz: f64,
    pub sample_rate_sps: f64,
    /// Samples per frame; any size >= 1, powers of two are fastest
    pub fft_size: usize,
    pub window: WindowKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DspConfig {
    /// EMA weight of the newest frame, in (0, 1]
    pub smoothing_alpha: f32,
    /// Percentile of the smoothed PSD taken as noise floor, in [0, 100]
    pub noise_floor_percentile: f32,
    pub bands: Vec<BandSpec>,
    pub anomaly: AnomalyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub enabled: bool,
    /// Peak-over-floor distance that maps to a score of 1.0
    pub span_db: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub center_lat_deg: f64,
    pub center_lon_deg: f64,
    pub tile_size_m: f64,
    /// Side length of the square grid extent
    pub grid_extent_m: f64,
    /// Pending records that trigger an aggregation cycle
    pub aggregate_window_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub tolerance_ns: i64,
    pub retention_ns: i64,
    pub max_fixes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SyntheticConfig {
    pub iq: SyntheticIqConfig,
    pub gps: SyntheticGpsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticIqConfig {
    pub seed: u64,
    pub num_carriers: usize,
    pub carrier_power_db: f32,
    pub noise_floor_db: f32,
    /// Spacing between frame timestamps; 0 means back-to-back capture
    pub frame_interval_ms: f64,
    pub burst_jammer: BurstJammerConfig,
    pub swept_tone: SweptToneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstJammerConfig {
    pub enabled: bool,
    pub period_frames: u64,
    pub duty_cycle: f64,
    pub power_db: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweptToneConfig {
    pub enabled: bool,
    pub sweep_rate_hz_per_sec: f64,
    pub power_db: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticGpsConfig {
    /// Route as `[lat_deg, lon_deg]` pairs
    pub waypoints: Vec<[f64; 2]>,
    pub update_rate_hz: f64,
    pub speed_mps: f64,
    pub loop_route: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,

    /// Histogram precision (significant value digits)
    pub histogram_precision: u8,

    /// Maximum histogram value in microseconds
    pub histogram_max_us: u64,
}

impl Default for RfConfig {
    fn default() -> Self {
        Self {
            center_freq_hz: 3.5e9,
            sample_rate_sps: 30.72e6,
            fft_size: 1024,
            window: WindowKind::Hann,
        }
    }
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.2,
            noise_floor_percentile: 10.0,
            bands: vec![
                BandSpec::new("n78_lower", 3.4900e9, 3.4995e9),
                BandSpec::new("n78_upper", 3.5005e9, 3.5100e9),
            ],
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            span_db: 40.0,
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            center_lat_deg: 37.7749,
            center_lon_deg: -122.4194,
            tile_size_m: 100.0,
            grid_extent_m: 2000.0,
            aggregate_window_frames: 50,
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            tolerance_ns: 1_000_000_000,
            retention_ns: 5_000_000_000,
            max_fixes: 1024,
        }
    }
}

impl Default for SyntheticIqConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_carriers: 5,
            carrier_power_db: -30.0,
            noise_floor_db: -80.0,
            frame_interval_ms: 20.0,
            burst_jammer: BurstJammerConfig::default(),
            swept_tone: SweptToneConfig::default(),
        }
    }
}

impl Default for BurstJammerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period_frames: 50,
            duty_cycle: 0.1,
            power_db: -20.0,
        }
    }
}

impl Default for SweptToneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sweep_rate_hz_per_sec: 1e6,
            power_db: -25.0,
        }
    }
}

impl Default for SyntheticGpsConfig {
    fn default() -> Self {
        Self {
            waypoints: vec![
                [37.7749, -122.4194],
                [37.7790, -122.4194],
                [37.7790, -122.4140],
                [37.7749, -122.4140],
            ],
            update_rate_hz: 5.0,
            speed_mps: 15.0,
            loop_route: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_precision: 2,
            histogram_max_us: 10_000_000,
        }
    }
}

impl RfConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_size == 0 {
            return Err(ConfigError::invalid("FFT size must be at least 1"));
        }
        if !(self.sample_rate_sps.is_finite() && self.sample_rate_sps > 0.0) {
            return Err(ConfigError::invalid(format!(
                "Sample rate {} must be positive",
                self.sample_rate_sps
            )));
        }
        if !self.center_freq_hz.is_finite() {
            return Err(ConfigError::invalid("Center frequency must be finite"));
        }
        if !self.fft_size.is_power_of_two() {
            tracing::debug!(fft_size = self.fft_size, "FFT size is not a power of two");
        }
        Ok(())
    }
}

impl DspConfig {
    /// Bands are checked against the Nyquist range of `rf`.
    pub fn validate(&self, rf: &RfConfig) -> Result<(), ConfigError> {
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(ConfigError::invalid(format!(
                "Smoothing alpha {} out of range (0, 1]",
                self.smoothing_alpha
            )));
        }
        if !(0.0..=100.0).contains(&self.noise_floor_percentile) {
            return Err(ConfigError::invalid(format!(
                "Noise floor percentile {} out of range 0-100",
                self.noise_floor_percentile
            )));
        }
        if self.anomaly.enabled && !(self.anomaly.span_db.is_finite() && self.anomaly.span_db > 0.0)
        {
            return Err(ConfigError::invalid("Anomaly span must be > 0 dB"));
        }

        let nyquist = rf.sample_rate_sps / 2.0;
        let lowest = rf.center_freq_hz - nyquist;
        let highest = rf.center_freq_hz + nyquist;
        let mut names = HashSet::new();

        for band in &self.bands {
            if !names.insert(band.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "Duplicate band name '{}'",
                    band.name
                )));
            }
            if !(band.freq_low_hz.is_finite() && band.freq_high_hz.is_finite())
                || band.freq_low_hz >= band.freq_high_hz
            {
                return Err(ConfigError::invalid(format!(
                    "Band '{}' must have finite low < high ({} .. {})",
                    band.name, band.freq_low_hz, band.freq_high_hz
                )));
            }
            if band.freq_low_hz < lowest || band.freq_high_hz > highest {
                return Err(ConfigError::invalid(format!(
                    "Band '{}' ({} .. {} Hz) exceeds Nyquist range {} .. {} Hz",
                    band.name, band.freq_low_hz, band.freq_high_hz, lowest, highest
                )));
            }
            if !band.threshold_offset_db.is_finite() {
                return Err(ConfigError::invalid(format!(
                    "Band '{}' threshold offset must be finite",
                    band.name
                )));
            }
        }
        Ok(())
    }
}

impl GeoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.center_lat_deg.is_finite() && self.center_lat_deg.abs() < 90.0) {
            return Err(ConfigError::invalid(format!(
                "Grid center latitude {} must be inside (-90, 90)",
                self.center_lat_deg
            )));
        }
        if !(self.center_lon_deg.is_finite() && (-180.0..=180.0).contains(&self.center_lon_deg)) {
            return Err(ConfigError::invalid(format!(
                "Grid center longitude {} out of range -180..180",
                self.center_lon_deg
            )));
        }
        if !(self.tile_size_m.is_finite() && self.tile_size_m > 0.0) {
            return Err(ConfigError::invalid(format!(
                "Tile size {} m must be > 0",
                self.tile_size_m
            )));
        }
        if !(self.grid_extent_m.is_finite() && self.grid_extent_m > 0.0) {
            return Err(ConfigError::invalid(format!(
                "Grid extent {} m must be > 0",
                self.grid_extent_m
            )));
        }
        if self.aggregate_window_frames == 0 {
            return Err(ConfigError::invalid("Aggregation window must be >= 1 frame"));
        }
        Ok(())
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tolerance_ns < 0 {
            return Err(ConfigError::invalid(format!(
                "Alignment tolerance {} ns must be >= 0",
                self.tolerance_ns
            )));
        }
        if self.retention_ns < 0 {
            return Err(ConfigError::invalid(format!(
                "Fix retention {} ns must be >= 0",
                self.retention_ns
            )));
        }
        if self.max_fixes == 0 {
            return Err(ConfigError::invalid("Fix buffer must hold at least one fix"));
        }
        Ok(())
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iq.frame_interval_ms < 0.0 || !self.iq.frame_interval_ms.is_finite() {
            return Err(ConfigError::invalid("Frame interval must be >= 0 ms"));
        }
        if self.iq.burst_jammer.enabled && self.iq.burst_jammer.period_frames == 0 {
            return Err(ConfigError::invalid("Burst jammer period must be >= 1 frame"));
        }
        if !(self.gps.update_rate_hz.is_finite() && self.gps.update_rate_hz > 0.0) {
            return Err(ConfigError::invalid("GPS update rate must be > 0 Hz"));
        }
        if !(self.gps.speed_mps.is_finite() && self.gps.speed_mps >= 0.0) {
            return Err(ConfigError::invalid("GPS speed must be >= 0 m/s"));
        }
        if self.gps.waypoints.is_empty() {
            return Err(ConfigError::invalid("GPS route needs at least one waypoint"));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::LoadFailed {
            path: Box::new(path.to_path_buf()),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::InvalidFormat {
            path: Box::new(path.to_path_buf()),
            source,
        })
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::SaveFailed {
                path: Box::new(path.to_path_buf()),
                source,
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|source| ConfigError::SerializationFailed { source })?;

        std::fs::write(path, contents).map_err(|source| ConfigError::SaveFailed {
            path: Box::new(path.to_path_buf()),
            source,
        })
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rf-observatory");

        config_dir.join("config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rf.validate()?;
        self.dsp.validate(&self.rf)?;
        self.geo.validate()?;
        self.fusion.validate()?;
        self.synthetic.validate()?;

        if !(1..=5).contains(&self.metrics.histogram_precision) {
            return Err(ConfigError::invalid(format!(
                "Histogram precision {} out of range 1-5",
                self.metrics.histogram_precision
            )));
        }
        if self.metrics.histogram_max_us < 2 {
            return Err(ConfigError::invalid("Histogram max must be >= 2 us"));
        }

        Ok(())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }

        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = AppConfig::default();
        config.validate().expect("Default config should be valid");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).expect("Should serialize");
        let deserialized: AppConfig = toml::from_str(&toml_str).expect("Should deserialize");
        assert_eq!(deserialized.dsp.bands, config.dsp.bands);
        assert_eq!(deserialized.rf.window, config.rf.window);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("[rf]\nfft_size = 256\n").unwrap();
        assert_eq!(config.rf.fft_size, 256);
        assert_eq!(config.rf.sample_rate_sps, RfConfig::default().sample_rate_sps);
        assert_eq!(config.geo.aggregate_window_frames, 50);
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_fft_size() {
        let mut config = AppConfig::default();
        config.rf.fft_size = 0;
        assert!(config.validate().is_err());

        for size in [1, 3, 1000, 1023] {
            config.rf.fft_size = size;
            assert!(config.validate().is_ok(), "fft_size {size}");
        }
    }

    #[test]
    fn test_validation_alpha() {
        let mut config = AppConfig::default();
        config.dsp.smoothing_alpha = 0.0;
        assert!(config.validate().is_err());

        config.dsp.smoothing_alpha = 1.5;
        assert!(config.validate().is_err());

        config.dsp.smoothing_alpha = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_percentile() {
        let mut config = AppConfig::default();
        config.dsp.noise_floor_percentile = -1.0;
        assert!(config.validate().is_err());

        config.dsp.noise_floor_percentile = 100.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_bands() {
        let mut config = AppConfig::default();
        config.dsp.bands.push(BandSpec::new("n78_lower", 3.49e9, 3.491e9));
        assert!(config.validate().is_err(), "duplicate name");

        let mut config = AppConfig::default();
        config.dsp.bands = vec![BandSpec::new("inverted", 3.51e9, 3.50e9)];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.dsp.bands = vec![BandSpec::new("beyond_nyquist", 3.50e9, 3.52e9)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_geo_and_fusion() {
        let mut config = AppConfig::default();
        config.geo.tile_size_m = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fusion.tolerance_ns = -1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fusion.tolerance_ns = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.geo.tile_size_m = 250.0;
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.geo.tile_size_m, 250.0);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AppConfig::load_or_default("/nonexistent/rf-observatory.toml");
        assert_eq!(config.rf.fft_size, 1024);
    }
}

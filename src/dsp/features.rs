//! Per-frame scalar features: noise floor, bandpower, occupancy, anomaly score.

use super::spectrum::FLOOR_DB;
use crate::types::{BandSpec, FeatureRecord};
use std::ops::Range;

/// Linear power floor for integrated bandpower (-120 dB).
const BANDPOWER_FLOOR_LINEAR: f64 = 1e-12;

/// P-th percentile of `values` with linear interpolation between closest ranks.
///
/// `scratch` is reused across calls to keep the per-frame path allocation free.
pub fn percentile(values: &[f32], pct: f32, scratch: &mut Vec<f32>) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    scratch.clear();
    scratch.extend_from_slice(values);
    scratch.sort_unstable_by(f32::total_cmp);

    let rank = (pct.clamp(0.0, 100.0) as f64 / 100.0) * (scratch.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    scratch[lo] + (scratch[hi] - scratch[lo]) * frac
}

/// Bin ranges for each configured band, resolved against one carrier/sample-rate pair.
#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    center_freq_hz: f64,
    sample_rate_sps: f64,
    ranges: Vec<Range<usize>>,
}

impl BandLayout {
    /// Locate the contiguous bins whose centers fall inside each band.
    ///
    /// `freq_bins_hz` must be ascending and relative to `center_freq_hz`.
    pub fn resolve(
        bands: &[BandSpec],
        freq_bins_hz: &[f32],
        center_freq_hz: f64,
        sample_rate_sps: f64,
    ) -> Self {
        let ranges = bands
            .iter()
            .map(|band| {
                let lo = band.freq_low_hz - center_freq_hz;
                let hi = band.freq_high_hz - center_freq_hz;
                let start = freq_bins_hz.partition_point(|&f| (f as f64) < lo);
                let end = freq_bins_hz.partition_point(|&f| (f as f64) <= hi);
                start..end.max(start)
            })
            .collect();

        Self {
            center_freq_hz,
            sample_rate_sps,
            ranges,
        }
    }

    /// Whether this layout was resolved for the given frame parameters.
    pub fn matches(&self, center_freq_hz: f64, sample_rate_sps: f64) -> bool {
        self.center_freq_hz.to_bits() == center_freq_hz.to_bits()
            && self.sample_rate_sps.to_bits() == sample_rate_sps.to_bits()
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }
}

/// Integrated power over `range` in dB.
pub fn bandpower_db(psd_linear: &[f32], range: Range<usize>, bin_width_hz: f64) -> f32 {
    let sum: f64 = psd_linear[range].iter().map(|&p| p as f64).sum();
    let db = 10.0 * (sum * bin_width_hz).max(BANDPOWER_FLOOR_LINEAR).log10();
    (db as f32).max(FLOOR_DB)
}

/// Percentage of bins in `range` strictly above `threshold_db`; 0 for an empty range.
pub fn occupancy_pct(smoothed_db: &[f32], range: Range<usize>, threshold_db: f32) -> f32 {
    let bins = &smoothed_db[range];
    if bins.is_empty() {
        return 0.0;
    }
    let occupied = bins.iter().filter(|&&v| v > threshold_db).count();
    occupied as f32 / bins.len() as f32 * 100.0
}

/// Optional per-record anomaly score.
///
/// Implementations may only read the record they are given, so extraction
/// stays deterministic given the EMA state.
pub trait AnomalyScorer: Send {
    /// Score in [0, 1], or `None` when the record carries too little to judge.
    fn score(&self, record: &FeatureRecord) -> Option<f32>;
}

/// Scores how far the strongest smoothed bin stands above the noise floor.
#[derive(Debug, Clone, Copy)]
pub struct PeakToFloorScorer {
    span_db: f32,
}

impl PeakToFloorScorer {
    pub fn new(span_db: f32) -> Self {
        Self { span_db }
    }
}

impl AnomalyScorer for PeakToFloorScorer {
    fn score(&self, record: &FeatureRecord) -> Option<f32> {
        let peak = record
            .psd_smoothed_db
            .iter()
            .copied()
            .max_by(f32::total_cmp)?;
        let excess = peak - record.noise_floor_db;
        if !excess.is_finite() {
            return None;
        }
        Some((excess / self.span_db).clamp(0.0, 1.0))
    }
}

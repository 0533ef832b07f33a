//! Deterministic sample frames and feature records for tests and benchmarks
//!
//! Signals are generated from closed-form expressions so tests never depend
//! on capture files or a seeded RNG.

use crate::types::{FeatureRecord, SampleFrame};
use num_complex::Complex32;
use std::f64::consts::PI;

/// Generate a frame holding one complex tone
///
/// # Arguments
/// * `tone_offset_hz` - Tone frequency relative to `center_freq_hz`
/// * `amplitude` - Peak amplitude; the tone carries `amplitude²` power
///
/// # Example
/// ```
/// use rf_observatory::test_fixtures::tone_frame;
/// let frame = tone_frame(0, 0, 1024, 1.024e6, 100e6, 25e3, 1.0);
/// assert_eq!(frame.samples.len(), 1024);
/// ```
pub fn tone_frame(
    frame_id: u64,
    timestamp_ns: i64,
    num_samples: usize,
    sample_rate_sps: f64,
    center_freq_hz: f64,
    tone_offset_hz: f64,
    amplitude: f32,
) -> SampleFrame {
    let samples = (0..num_samples)
        .map(|i| {
            let phase = 2.0 * PI * tone_offset_hz * i as f64 / sample_rate_sps;
            Complex32::new(
                amplitude * phase.cos() as f32,
                amplitude * phase.sin() as f32,
            )
        })
        .collect();

    SampleFrame {
        frame_id,
        timestamp_ns,
        center_freq_hz,
        sample_rate_sps,
        gain_db: None,
        samples,
    }
}

/// Generate a frame where every sample is `value`
pub fn constant_frame(
    frame_id: u64,
    timestamp_ns: i64,
    num_samples: usize,
    sample_rate_sps: f64,
    center_freq_hz: f64,
    value: Complex32,
) -> SampleFrame {
    SampleFrame {
        frame_id,
        timestamp_ns,
        center_freq_hz,
        sample_rate_sps,
        gain_db: None,
        samples: vec![value; num_samples],
    }
}

/// Generate pseudo-random complex noise
///
/// Deterministic noise based on frame id and sample index for reproducible tests.
pub fn noise_frame(
    frame_id: u64,
    timestamp_ns: i64,
    num_samples: usize,
    sample_rate_sps: f64,
    center_freq_hz: f64,
    amplitude: f32,
) -> SampleFrame {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let unit = |frame_id: u64, i: usize, lane: u8| -> f32 {
        let mut hasher = DefaultHasher::new();
        (frame_id, i, lane).hash(&mut hasher);
        let hash = hasher.finish();
        // Map to -1.0..1.0
        ((hash % 20_000) as f32 / 10_000.0) - 1.0
    };

    let samples = (0..num_samples)
        .map(|i| {
            Complex32::new(
                amplitude * unit(frame_id, i, 0),
                amplitude * unit(frame_id, i, 1),
            )
        })
        .collect();

    SampleFrame {
        frame_id,
        timestamp_ns,
        center_freq_hz,
        sample_rate_sps,
        gain_db: None,
        samples,
    }
}

/// Feature record with the given band powers and zero occupancy
///
/// Spectrum fields hold a two-bin placeholder; aggregation and export never read them.
pub fn feature_record(
    frame_id: u64,
    timestamp_ns: i64,
    position: Option<(f64, f64)>,
    bandpower_db: &[f32],
) -> FeatureRecord {
    FeatureRecord {
        frame_id,
        timestamp_ns,
        lat_deg: position.map(|(lat, _)| lat),
        lon_deg: position.map(|(_, lon)| lon),
        freq_bins_hz: vec![-0.5, 0.5],
        psd_db: vec![-100.0, -100.0],
        psd_smoothed_db: vec![-100.0, -100.0],
        noise_floor_db: -100.0,
        bandpower_db: bandpower_db.to_vec(),
        occupancy_pct: vec![0.0; bandpower_db.len()],
        anomaly_score: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_frame_amplitude() {
        let frame = tone_frame(3, 9, 256, 1.0e6, 10e6, 1.0e3, 0.5);
        assert_eq!(frame.frame_id, 3);
        assert_eq!(frame.timestamp_ns, 9);
        assert!(frame
            .samples
            .iter()
            .all(|s| (s.norm() - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_noise_frame_deterministic() {
        let a = noise_frame(1, 0, 128, 1.0e6, 0.0, 1.0);
        let b = noise_frame(1, 0, 128, 1.0e6, 0.0, 1.0);
        let c = noise_frame(2, 0, 128, 1.0e6, 0.0, 1.0);
        assert_eq!(a, b);
        assert_ne!(a.samples, c.samples);
        assert!(a
            .samples
            .iter()
            .all(|s| s.re.abs() <= 1.0 && s.im.abs() <= 1.0));
    }

    #[test]
    fn test_feature_record_position() {
        let rec = feature_record(0, 0, Some((1.0, 2.0)), &[-60.0, -70.0]);
        assert_eq!(rec.position(), Some((1.0, 2.0)));
        assert_eq!(rec.occupancy_pct.len(), 2);
        assert!(feature_record(0, 0, None, &[]).position().is_none());
    }
}

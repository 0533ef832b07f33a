use super::features::{
    bandpower_db, occupancy_pct, percentile, AnomalyScorer, BandLayout, PeakToFloorScorer,
};
use super::smoothing::EmaFilter;
use super::spectrum::{
    half_spectrum_bin_width, half_spectrum_bins, power_to_db, PsdEstimator, FLOOR_DB,
};
use crate::config::{DspConfig, RfConfig};
use crate::error::{ConfigError, FrameError};
use crate::types::{BandSpec, FeatureRecord, SampleFrame};
use std::fmt;

/// Turns sample frames into feature records.
///
/// Owns the only persistent DSP state: the EMA buffer and the precomputed
/// window/FFT plan. Frames must be fed strictly in order.
pub struct SpectralExtractor {
    fft_size: usize,
    estimator: PsdEstimator,
    ema: EmaFilter,
    noise_floor_percentile: f32,
    bands: Vec<BandSpec>,
    layout: Option<BandLayout>,
    psd_linear: Vec<f32>,
    percentile_scratch: Vec<f32>,
    scorer: Option<Box<dyn AnomalyScorer>>,
}

impl fmt::Debug for SpectralExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralExtractor")
            .field("fft_size", &self.fft_size)
            .field("bands", &self.bands.len())
            .field("ema_initialized", &self.ema.is_initialized())
            .field("has_scorer", &self.scorer.is_some())
            .finish()
    }
}

impl SpectralExtractor {
    pub fn new(rf: &RfConfig, dsp: &DspConfig) -> Result<Self, ConfigError> {
        rf.validate()?;
        dsp.validate(rf)?;

        let half = rf.fft_size / 2;
        let estimator = PsdEstimator::new(rf.fft_size, rf.window);
        let scorer: Option<Box<dyn AnomalyScorer>> = dsp
            .anomaly
            .enabled
            .then(|| Box::new(PeakToFloorScorer::new(dsp.anomaly.span_db)) as _);

        tracing::debug!(
            fft_size = rf.fft_size,
            window = ?rf.window,
            window_power = estimator.window_power(),
            bands = dsp.bands.len(),
            "Spectral extractor created"
        );

        Ok(Self {
            fft_size: rf.fft_size,
            estimator,
            ema: EmaFilter::new(dsp.smoothing_alpha, half),
            noise_floor_percentile: dsp.noise_floor_percentile,
            bands: dsp.bands.clone(),
            layout: None,
            psd_linear: vec![0.0; half],
            percentile_scratch: Vec::with_capacity(half),
            scorer,
        })
    }

    /// Replace the anomaly scorer, or disable scoring with `None`.
    pub fn set_anomaly_scorer(&mut self, scorer: Option<Box<dyn AnomalyScorer>>) {
        self.scorer = scorer;
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bands(&self) -> &[BandSpec] {
        &self.bands
    }

    /// Extract features from one frame.
    ///
    /// On error the frame is rejected and no state is advanced.
    pub fn process(&mut self, frame: &SampleFrame) -> Result<FeatureRecord, FrameError> {
        self.check_frame(frame)?;

        let fs = frame.sample_rate_sps;
        self.estimator
            .compute(&frame.samples, fs, &mut self.psd_linear);
        // Non-finite power must never reach the EMA state
        if let Some(bin) = self.psd_linear.iter().position(|p| !p.is_finite()) {
            return Err(FrameError::PowerOverflow { bin });
        }

        let freq_bins_hz = half_spectrum_bins(self.fft_size, fs);
        let psd_db: Vec<f32> = self.psd_linear.iter().map(|&p| power_to_db(p)).collect();
        let psd_smoothed_db = self.ema.update(&psd_db).to_vec();

        let noise_floor_db = if psd_smoothed_db.is_empty() {
            FLOOR_DB
        } else {
            percentile(
                &psd_smoothed_db,
                self.noise_floor_percentile,
                &mut self.percentile_scratch,
            )
        };

        if !self
            .layout
            .as_ref()
            .is_some_and(|l| l.matches(frame.center_freq_hz, fs))
        {
            self.layout = Some(BandLayout::resolve(
                &self.bands,
                &freq_bins_hz,
                frame.center_freq_hz,
                fs,
            ));
        }
        let ranges = self.layout.as_ref().map(BandLayout::ranges).unwrap_or(&[]);

        let bin_width = half_spectrum_bin_width(self.fft_size, fs);
        let mut bandpower = Vec::with_capacity(self.bands.len());
        let mut occupancy = Vec::with_capacity(self.bands.len());
        for (band, range) in self.bands.iter().zip(ranges) {
            bandpower.push(bandpower_db(&self.psd_linear, range.clone(), bin_width));
            occupancy.push(occupancy_pct(
                &psd_smoothed_db,
                range.clone(),
                noise_floor_db + band.threshold_offset_db,
            ));
        }

        let mut record = FeatureRecord {
            frame_id: frame.frame_id,
            timestamp_ns: frame.timestamp_ns,
            lat_deg: None,
            lon_deg: None,
            freq_bins_hz,
            psd_db,
            psd_smoothed_db,
            noise_floor_db,
            bandpower_db: bandpower,
            occupancy_pct: occupancy,
            anomaly_score: None,
        };
        record.anomaly_score = self.scorer.as_ref().and_then(|s| s.score(&record));

        tracing::trace!(
            frame_id = record.frame_id,
            noise_floor_db = record.noise_floor_db,
            "Frame processed"
        );

        Ok(record)
    }

    /// Forget smoothing history; the next frame starts a fresh EMA.
    pub fn reset(&mut self) {
        self.ema.reset();
    }

    fn check_frame(&self, frame: &SampleFrame) -> Result<(), FrameError> {
        if frame.samples.len() != self.fft_size {
            return Err(FrameError::ShapeMismatch {
                expected: self.fft_size,
                actual: frame.samples.len(),
            });
        }
        if !(frame.sample_rate_sps.is_finite() && frame.sample_rate_sps > 0.0) {
            return Err(FrameError::InvalidMetadata {
                reason: format!("sample rate {} must be positive", frame.sample_rate_sps),
            });
        }
        if !frame.center_freq_hz.is_finite() {
            return Err(FrameError::InvalidMetadata {
                reason: "center frequency must be finite".to_string(),
            });
        }
        if let Some(index) = frame
            .samples
            .iter()
            .position(|s| !(s.re.is_finite() && s.im.is_finite()))
        {
            return Err(FrameError::InvalidSample { index });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::window::WindowKind;
    use crate::test_fixtures::{constant_frame, tone_frame};
    use num_complex::Complex32;

    const FS: f64 = 1.024e6;
    const CENTER: f64 = 100.0e6;

    fn rf(fft_size: usize) -> RfConfig {
        RfConfig {
            center_freq_hz: CENTER,
            sample_rate_sps: FS,
            fft_size,
            window: WindowKind::Rectangular,
        }
    }

    fn dsp(alpha: f32) -> DspConfig {
        DspConfig {
            smoothing_alpha: alpha,
            noise_floor_percentile: 10.0,
            bands: vec![
                // Tone at +128 kHz lives here
                BandSpec::new("upper", CENTER + 100e3, CENTER + 200e3),
                BandSpec::new("lower", CENTER - 300e3, CENTER - 200e3),
            ],
            anomaly: Default::default(),
        }
    }

    #[test]
    fn test_output_shape() {
        let mut ex = SpectralExtractor::new(&rf(256), &dsp(0.5)).unwrap();
        let rec = ex
            .process(&tone_frame(7, 1_000, 256, FS, CENTER, 128e3, 1.0))
            .unwrap();
        assert_eq!(rec.frame_id, 7);
        assert_eq!(rec.timestamp_ns, 1_000);
        assert_eq!(rec.freq_bins_hz.len(), 128);
        assert_eq!(rec.psd_db.len(), 128);
        assert_eq!(rec.psd_smoothed_db.len(), 128);
        assert_eq!(rec.bandpower_db.len(), 2);
        assert_eq!(rec.occupancy_pct.len(), 2);
        assert!(rec.lat_deg.is_none() && rec.lon_deg.is_none());
        assert!(rec.freq_bins_hz.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_band_metrics_follow_tone() {
        let mut ex = SpectralExtractor::new(&rf(256), &dsp(1.0)).unwrap();
        let rec = ex
            .process(&tone_frame(0, 0, 256, FS, CENTER, 128e3, 1.0))
            .unwrap();
        // Unit tone integrates to 0 dB
        assert!(rec.bandpower_db[0].abs() < 0.1, "{}", rec.bandpower_db[0]);
        assert!(rec.bandpower_db[0] - rec.bandpower_db[1] > 30.0);
        assert!(rec.occupancy_pct[0] > 0.0);
        assert!(rec.anomaly_score.is_some());
    }

    #[test]
    fn test_silence_hits_floor() {
        let mut ex = SpectralExtractor::new(&rf(64), &dsp(0.5)).unwrap();
        let rec = ex
            .process(&constant_frame(0, 0, 64, FS, CENTER, Complex32::new(0.0, 0.0)))
            .unwrap();
        assert!(rec.psd_db.iter().all(|&v| v == -120.0));
        assert_eq!(rec.noise_floor_db, -120.0);
        assert_eq!(rec.bandpower_db, vec![-120.0, -120.0]);
        assert_eq!(rec.occupancy_pct, vec![0.0, 0.0]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut ex = SpectralExtractor::new(&rf(64), &dsp(0.5)).unwrap();
        let err = ex
            .process(&tone_frame(0, 0, 32, FS, CENTER, 0.0, 1.0))
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::ShapeMismatch {
                expected: 64,
                actual: 32
            }
        );
    }

    #[test]
    fn test_non_finite_sample_rejected() {
        let mut ex = SpectralExtractor::new(&rf(64), &dsp(0.5)).unwrap();
        let mut frame = tone_frame(0, 0, 64, FS, CENTER, 0.0, 1.0);
        frame.samples[5] = Complex32::new(f32::NAN, 0.0);
        assert_eq!(
            ex.process(&frame).unwrap_err(),
            FrameError::InvalidSample { index: 5 }
        );

        frame.samples[5] = Complex32::new(0.0, 0.0);
        frame.sample_rate_sps = 0.0;
        assert!(matches!(
            ex.process(&frame).unwrap_err(),
            FrameError::InvalidMetadata { .. }
        ));
    }

    #[test]
    fn test_rejected_frame_does_not_advance_state() {
        let a = tone_frame(0, 0, 128, FS, CENTER, 64e3, 1.0);
        let b = tone_frame(2, 2, 128, FS, CENTER, -64e3, 0.5);
        let mut bad = tone_frame(1, 1, 128, FS, CENTER, 0.0, 1.0);
        bad.samples[0] = Complex32::new(f32::INFINITY, 0.0);

        let mut clean = SpectralExtractor::new(&rf(128), &dsp(0.3)).unwrap();
        clean.process(&a).unwrap();
        let expected = clean.process(&b).unwrap();

        let mut noisy = SpectralExtractor::new(&rf(128), &dsp(0.3)).unwrap();
        noisy.process(&a).unwrap();
        assert!(noisy.process(&bad).is_err());
        assert!(noisy
            .process(&tone_frame(1, 1, 64, FS, CENTER, 0.0, 1.0))
            .is_err());
        let got = noisy.process(&b).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn test_first_frame_unsmoothed_and_reset() {
        let a = tone_frame(0, 0, 128, FS, CENTER, 64e3, 1.0);
        let b = tone_frame(1, 1, 128, FS, CENTER, -128e3, 1.0);

        let mut ex = SpectralExtractor::new(&rf(128), &dsp(0.1)).unwrap();
        let first = ex.process(&a).unwrap();
        assert_eq!(first.psd_smoothed_db, first.psd_db);

        let second = ex.process(&b).unwrap();
        assert_ne!(second.psd_smoothed_db, second.psd_db);

        ex.reset();
        let after_reset = ex.process(&b).unwrap();
        assert_eq!(after_reset.psd_smoothed_db, after_reset.psd_db);
    }

    #[test]
    fn test_ema_converges_to_constant_input() {
        let alpha = 0.5;
        let start = tone_frame(0, 0, 128, FS, CENTER, 64e3, 1.0);
        let steady = tone_frame(1, 1, 128, FS, CENTER, -128e3, 0.1);

        let mut ex = SpectralExtractor::new(&rf(128), &dsp(alpha)).unwrap();
        ex.process(&start).unwrap();

        let max_gap = |r: &FeatureRecord| {
            r.psd_db
                .iter()
                .zip(&r.psd_smoothed_db)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max)
        };

        let first = ex.process(&steady).unwrap();
        let initial_gap = max_gap(&first);
        assert!(initial_gap > 1.0);

        let mut last = first;
        for n in 2..40 {
            last = ex.process(&steady).unwrap();
            let bound = initial_gap * (1.0 - alpha).powi(n - 1) + 1e-3;
            assert!(max_gap(&last) <= bound, "iteration {n}");
        }
        assert!(max_gap(&last) < 1e-3);
    }

    #[test]
    fn test_retunes_band_layout_per_frame_center() {
        let mut ex = SpectralExtractor::new(&rf(256), &dsp(1.0)).unwrap();
        // Carrier 150 kHz up, tone +20 kHz: absolute offset 170 kHz is in "upper"
        let rec = ex
            .process(&tone_frame(0, 0, 256, FS, CENTER + 150e3, 20e3, 1.0))
            .unwrap();
        assert!(rec.bandpower_db[0] > -1.0, "{}", rec.bandpower_db[0]);

        // Same relative tone at the nominal carrier is outside every band
        let rec = ex
            .process(&tone_frame(1, 1, 256, FS, CENTER, 20e3, 1.0))
            .unwrap();
        assert!(rec.bandpower_db[0] < -100.0, "{}", rec.bandpower_db[0]);
    }

    #[test]
    fn test_anomaly_disabled() {
        let mut cfg = dsp(0.5);
        cfg.anomaly.enabled = false;
        let mut ex = SpectralExtractor::new(&rf(64), &cfg).unwrap();
        let rec = ex
            .process(&tone_frame(0, 0, 64, FS, CENTER, 0.0, 1.0))
            .unwrap();
        assert!(rec.anomaly_score.is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(SpectralExtractor::new(&rf(0), &dsp(0.5)).is_err());
        assert!(SpectralExtractor::new(&rf(64), &dsp(0.0)).is_err());
    }

    #[test]
    fn test_odd_fft_size() {
        let mut ex = SpectralExtractor::new(&rf(255), &dsp(1.0)).unwrap();
        let rec = ex
            .process(&tone_frame(0, 0, 255, FS, CENTER, 128e3, 1.0))
            .unwrap();
        assert_eq!(rec.freq_bins_hz.len(), 127);
        assert_eq!(rec.psd_smoothed_db.len(), 127);
        assert!(rec.freq_bins_hz.windows(2).all(|w| w[0] < w[1]));
        assert!(rec.bandpower_db[0] > -1.0, "{}", rec.bandpower_db[0]);
        assert!(rec.bandpower_db[0] - rec.bandpower_db[1] > 20.0);
    }

    #[test]
    fn test_single_sample_frames() {
        let mut ex = SpectralExtractor::new(&rf(1), &dsp(0.5)).unwrap();
        let rec = ex
            .process(&constant_frame(0, 0, 1, FS, CENTER, Complex32::new(1.0, 0.0)))
            .unwrap();
        assert!(rec.freq_bins_hz.is_empty());
        assert_eq!(rec.noise_floor_db, FLOOR_DB);
        assert_eq!(rec.bandpower_db, vec![-120.0, -120.0]);
        assert_eq!(rec.occupancy_pct, vec![0.0, 0.0]);
    }

    #[test]
    fn test_huge_frame_keeps_smoothing_finite() {
        let good = |id: u64| tone_frame(id, id as i64, 256, FS, CENTER, 128e3, 1.0);
        let loud = constant_frame(1, 1, 256, FS, CENTER, Complex32::new(1.0e20, 0.0));

        let mut ex = SpectralExtractor::new(&rf(256), &dsp(0.5)).unwrap();
        ex.process(&good(0)).unwrap();
        let rec = ex.process(&loud).unwrap();
        assert!(rec.psd_db.iter().all(|v| v.is_finite()));

        for id in 2..6 {
            let rec = ex.process(&good(id)).unwrap();
            assert!(rec.psd_smoothed_db.iter().all(|v| v.is_finite()), "frame {id}");
            assert!(rec.noise_floor_db.is_finite());
            assert!(rec.anomaly_score.is_some());
        }
    }

    #[test]
    fn test_overflowing_frame_rejected_without_state_change() {
        let a = tone_frame(0, 0, 128, FS, CENTER, 64e3, 1.0);
        let b = tone_frame(2, 2, 128, FS, CENTER, -64e3, 0.5);
        let overflow = constant_frame(1, 1, 128, FS, CENTER, Complex32::new(f32::MAX, 0.0));

        let mut clean = SpectralExtractor::new(&rf(128), &dsp(0.3)).unwrap();
        clean.process(&a).unwrap();
        let expected = clean.process(&b).unwrap();

        let mut ex = SpectralExtractor::new(&rf(128), &dsp(0.3)).unwrap();
        ex.process(&a).unwrap();
        assert!(matches!(
            ex.process(&overflow).unwrap_err(),
            FrameError::PowerOverflow { .. }
        ));
        assert_eq!(ex.process(&b).unwrap(), expected);
    }

    struct FixedScorer(f32);

    impl AnomalyScorer for FixedScorer {
        fn score(&self, record: &FeatureRecord) -> Option<f32> {
            (!record.psd_db.is_empty()).then_some(self.0)
        }
    }

    #[test]
    fn test_custom_anomaly_scorer() {
        let frame = tone_frame(0, 0, 64, FS, CENTER, 0.0, 1.0);
        let mut ex = SpectralExtractor::new(&rf(64), &dsp(0.5)).unwrap();

        ex.set_anomaly_scorer(Some(Box::new(FixedScorer(0.75))));
        assert_eq!(ex.process(&frame).unwrap().anomaly_score, Some(0.75));

        ex.set_anomaly_scorer(None);
        assert_eq!(ex.process(&frame).unwrap().anomaly_score, None);
    }
}

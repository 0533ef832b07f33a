//! Seeded synthetic IQ generator.
//!
//! Each frame carries complex Gaussian noise, a set of evenly spaced carriers
//! with per-frame power variation, and optionally a burst jammer and a swept
//! tone. Timestamps come from a simulated clock so runs are reproducible.

use super::SampleSource;
use crate::config::{RfConfig, SyntheticIqConfig};
use crate::error::ConfigError;
use crate::types::SampleFrame;
use crate::utils::secs_to_ns;
use num_complex::Complex32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Fraction of the sample rate occupied by carriers.
const CARRIER_SPAN: f64 = 0.8;

/// Peak-to-peak per-frame carrier power variation.
const CARRIER_VARIATION_DB: f64 = 30.0;

fn db_to_amplitude(db: f32) -> f64 {
    10f64.powf(db as f64 / 20.0)
}

#[derive(Debug, Clone, Copy)]
struct BurstJammer {
    period_frames: u64,
    on_frames: u64,
    amplitude: f64,
}

#[derive(Debug, Clone, Copy)]
struct SweptTone {
    rate_hz_per_sec: f64,
    amplitude: f64,
    freq_hz: f64,
}

#[derive(Debug)]
pub struct SyntheticIqSource {
    rng: StdRng,
    /// Per-lane unit-variance complex noise
    unit_noise: Normal<f64>,
    center_freq_hz: f64,
    sample_rate_sps: f64,
    fft_size: usize,
    carrier_offsets_hz: Vec<f64>,
    carrier_amplitude: f64,
    noise_amplitude: f64,
    burst_jammer: Option<BurstJammer>,
    swept_tone: Option<SweptTone>,
    start_ns: i64,
    interval_ns: i64,
    next_frame_id: u64,
}

impl SyntheticIqSource {
    pub fn new(rf: &RfConfig, config: &SyntheticIqConfig) -> Result<Self, ConfigError> {
        rf.validate()?;
        if !(config.frame_interval_ms.is_finite() && config.frame_interval_ms >= 0.0) {
            return Err(ConfigError::invalid("Frame interval must be >= 0 ms"));
        }

        let unit_noise = Normal::new(0.0, std::f64::consts::FRAC_1_SQRT_2)
            .map_err(|e| ConfigError::invalid(format!("Noise distribution: {e}")))?;

        let span = rf.sample_rate_sps * CARRIER_SPAN;
        let spacing = span / (config.num_carriers + 1) as f64;
        let carrier_offsets_hz = (0..config.num_carriers)
            .map(|i| -span / 2.0 + (i + 1) as f64 * spacing)
            .collect();

        let burst_jammer = if config.burst_jammer.enabled {
            if config.burst_jammer.period_frames == 0 {
                return Err(ConfigError::invalid("Burst jammer period must be >= 1 frame"));
            }
            Some(BurstJammer {
                period_frames: config.burst_jammer.period_frames,
                on_frames: (config.burst_jammer.period_frames as f64
                    * config.burst_jammer.duty_cycle.clamp(0.0, 1.0)) as u64,
                amplitude: db_to_amplitude(config.burst_jammer.power_db),
            })
        } else {
            None
        };

        let swept_tone = config.swept_tone.enabled.then(|| SweptTone {
            rate_hz_per_sec: config.swept_tone.sweep_rate_hz_per_sec,
            amplitude: db_to_amplitude(config.swept_tone.power_db),
            freq_hz: 0.0,
        });

        let interval_ns = if config.frame_interval_ms > 0.0 {
            secs_to_ns(config.frame_interval_ms / 1e3)
        } else {
            secs_to_ns(rf.fft_size as f64 / rf.sample_rate_sps)
        };

        tracing::debug!(
            seed = config.seed,
            carriers = config.num_carriers,
            interval_ns,
            jammer = burst_jammer.is_some(),
            sweep = swept_tone.is_some(),
            "Synthetic IQ source created"
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            unit_noise,
            center_freq_hz: rf.center_freq_hz,
            sample_rate_sps: rf.sample_rate_sps,
            fft_size: rf.fft_size,
            carrier_offsets_hz,
            carrier_amplitude: db_to_amplitude(config.carrier_power_db),
            noise_amplitude: db_to_amplitude(config.noise_floor_db),
            burst_jammer,
            swept_tone,
            start_ns: 0,
            interval_ns,
            next_frame_id: 0,
        })
    }

    /// Start the simulated clock at `start_ns` instead of zero.
    pub fn with_start_ns(mut self, start_ns: i64) -> Self {
        self.start_ns = start_ns;
        self
    }

    /// Carrier frequencies in absolute Hz.
    pub fn carrier_freqs_hz(&self) -> Vec<f64> {
        self.carrier_offsets_hz
            .iter()
            .map(|f| self.center_freq_hz + f)
            .collect()
    }

    pub fn interval_ns(&self) -> i64 {
        self.interval_ns
    }

    fn add_noise(&mut self, samples: &mut [Complex32], amplitude: f64) {
        for s in samples.iter_mut() {
            let re = self.unit_noise.sample(&mut self.rng) * amplitude;
            let im = self.unit_noise.sample(&mut self.rng) * amplitude;
            *s += Complex32::new(re as f32, im as f32);
        }
    }

    fn add_tone(&self, samples: &mut [Complex32], freq_hz: f64, phase: f64, amplitude: f64) {
        let step = 2.0 * PI * freq_hz / self.sample_rate_sps;
        for (i, s) in samples.iter_mut().enumerate() {
            let theta = step * i as f64 + phase;
            *s += Complex32::new(
                (amplitude * theta.cos()) as f32,
                (amplitude * theta.sin()) as f32,
            );
        }
    }

    /// Generate the next frame.
    pub fn generate(&mut self) -> SampleFrame {
        let frame_id = self.next_frame_id;
        let mut samples = vec![Complex32::new(0.0, 0.0); self.fft_size];

        self.add_noise(&mut samples, self.noise_amplitude);

        for k in 0..self.carrier_offsets_hz.len() {
            let phase = self.rng.gen::<f64>() * 2.0 * PI;
            let variation_db = (self.rng.gen::<f64>() - 0.5) * CARRIER_VARIATION_DB;
            let amplitude = self.carrier_amplitude * 10f64.powf(variation_db / 20.0);
            self.add_tone(&mut samples, self.carrier_offsets_hz[k], phase, amplitude);
        }

        if let Some(jammer) = self.burst_jammer {
            if frame_id % jammer.period_frames < jammer.on_frames {
                self.add_noise(&mut samples, jammer.amplitude);
            }
        }

        if let Some(mut sweep) = self.swept_tone {
            let frame_secs = self.fft_size as f64 / self.sample_rate_sps;
            let nyquist = self.sample_rate_sps / 2.0;
            // Wrap over the full band in either sweep direction
            sweep.freq_hz = (sweep.freq_hz + sweep.rate_hz_per_sec * frame_secs + nyquist)
                .rem_euclid(self.sample_rate_sps)
                - nyquist;
            self.add_tone(&mut samples, sweep.freq_hz, 0.0, sweep.amplitude);
            self.swept_tone = Some(sweep);
        }

        self.next_frame_id += 1;

        SampleFrame {
            frame_id,
            timestamp_ns: self.start_ns + frame_id as i64 * self.interval_ns,
            center_freq_hz: self.center_freq_hz,
            sample_rate_sps: self.sample_rate_sps,
            gain_db: None,
            samples,
        }
    }
}

impl SampleSource for SyntheticIqSource {
    fn next_frame(&mut self) -> Option<SampleFrame> {
        Some(self.generate())
    }
}

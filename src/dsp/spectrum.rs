//! Windowed FFT to carrier-centered half-resolution PSD.
//!
//! The full N-point spectrum is zero-frequency shifted, then adjacent bin
//! pairs are averaged so the record carries N/2 bins spanning the whole band.
//! For odd N the highest shifted bin has no partner and is folded into the
//! last output bin, so integrated power is the same for every size.

use super::window::{power_correction, WindowKind};
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Lower bound for dB values; exact zeros map here instead of `-inf`.
pub const FLOOR_DB: f32 = -120.0;

/// Convert linear power to dB, clamped at [`FLOOR_DB`].
#[inline]
pub fn power_to_db(linear: f32) -> f32 {
    (10.0 * linear.log10()).max(FLOOR_DB)
}

/// Center frequencies (Hz, relative to the carrier) of the N/2 output bins.
///
/// Shifted bin `j` sits at `(j - N/2) * fs / N`; output bin `m` is centered
/// between shifted bins `2m` and `2m + 1`.
pub fn half_spectrum_bins(fft_size: usize, sample_rate_sps: f64) -> Vec<f32> {
    let half = fft_size / 2;
    let resolution = sample_rate_sps / fft_size as f64;
    (0..half)
        .map(|m| ((2 * m) as f64 + 0.5 - half as f64) * resolution)
        .map(|hz| hz as f32)
        .collect()
}

/// Width in Hz of one output bin.
pub fn half_spectrum_bin_width(fft_size: usize, sample_rate_sps: f64) -> f64 {
    2.0 * sample_rate_sps / fft_size as f64
}

/// Planned FFT plus reusable buffers for one frame size.
pub struct PsdEstimator {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    window_power: f64,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl fmt::Debug for PsdEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PsdEstimator")
            .field("fft_size", &self.fft_size)
            .field("window_power", &self.window_power)
            .finish()
    }
}

impl PsdEstimator {
    pub fn new(fft_size: usize, kind: WindowKind) -> Self {
        let window = kind.coefficients(fft_size);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let window_power = power_correction(&window);

        Self {
            fft_size,
            fft,
            window,
            window_power,
            buffer: vec![Complex32::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn window_power(&self) -> f64 {
        self.window_power
    }

    /// Compute the shifted, pair-averaged linear PSD into `psd_out` (length N/2).
    ///
    /// `samples.len()` must equal the FFT size; the caller validates shape.
    /// Power is accumulated in f64, but a bin can still exceed the f32 range
    /// for extreme input levels; callers check the output for finiteness.
    pub fn compute(&mut self, samples: &[Complex32], sample_rate_sps: f64, psd_out: &mut [f32]) {
        let n = self.fft_size;
        let half = n / 2;
        debug_assert_eq!(samples.len(), n);
        debug_assert_eq!(psd_out.len(), half);

        for ((dst, &s), &w) in self.buffer.iter_mut().zip(samples).zip(&self.window) {
            *dst = s * w;
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let norm = 1.0 / (n as f64 * sample_rate_sps * self.window_power);
        // Shifted index 0 holds the most negative frequency for both parities
        let shift = n - half;
        let shifted_power = |j: usize| -> f64 {
            let bin = self.buffer[(j + shift) % n];
            let (re, im) = (bin.re as f64, bin.im as f64);
            (re * re + im * im) * norm
        };

        for (m, out) in psd_out.iter_mut().enumerate() {
            let mut sum = shifted_power(2 * m) + shifted_power(2 * m + 1);
            if n % 2 == 1 && m + 1 == half {
                sum += shifted_power(n - 1);
            }
            *out = (0.5 * sum) as f32;
        }
    }
}

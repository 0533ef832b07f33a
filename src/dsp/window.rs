//! Window functions applied before the FFT.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Rectangular,
    #[default]
    Hann,
    Hamming,
    Blackman,
}

impl WindowKind {
    /// Periodic (DFT-even) coefficients of length `size`.
    pub fn coefficients(self, size: usize) -> Vec<f32> {
        let n = size as f64;
        (0..size)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / n;
                let w = match self {
                    WindowKind::Rectangular => 1.0,
                    WindowKind::Hann => 0.5 - 0.5 * x.cos(),
                    WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
                    WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                };
                w as f32
            })
            .collect()
    }
}

/// Mean of the squared coefficients, used to undo the window's power loss.
pub fn power_correction(window: &[f32]) -> f64 {
    if window.is_empty() {
        return 1.0;
    }
    window.iter().map(|&w| (w as f64) * (w as f64)).sum::<f64>() / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangular_is_flat() {
        let w = WindowKind::Rectangular.coefficients(16);
        assert!(w.iter().all(|&c| c == 1.0));
        assert!((power_correction(&w) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hann_power_correction() {
        // Periodic Hann has mean-square exactly 3/8
        let w = WindowKind::Hann.coefficients(1024);
        assert!((power_correction(&w) - 0.375).abs() < 1e-6);
        assert_eq!(w[0], 0.0);
        assert!((w[512] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hamming_endpoints() {
        let w = WindowKind::Hamming.coefficients(64);
        assert!((w[0] - 0.08).abs() < 1e-6);
    }

    #[test]
    fn test_window_kind_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            window: WindowKind,
        }
        let parsed: Wrapper = toml::from_str("window = \"blackman\"").unwrap();
        assert_eq!(parsed.window, WindowKind::Blackman);
    }
}

//! Spectral feature extraction: window, FFT, PSD, EMA, noise floor, band metrics.

pub mod extractor;
pub mod features;
pub mod smoothing;
pub mod spectrum;
pub mod window;

pub use extractor::SpectralExtractor;
pub use features::{AnomalyScorer, PeakToFloorScorer};
pub use window::WindowKind;

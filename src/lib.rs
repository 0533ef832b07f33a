// Library interface for RF Observatory components

pub mod config;
pub mod dsp;
pub mod error;
pub mod export;
pub mod fusion;
pub mod geo;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod run;
pub mod types;
pub mod utils;

// Deterministic frames and records for tests and benchmarks
pub mod test_fixtures;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ConfigError, ExportError, FrameError, ObservatoryError, Result};
pub use pipeline::{ObservatoryPipeline, PipelineOutput};
pub use types::{BandSpec, FeatureRecord, PositionFix, SampleFrame, TileKey, TileMetrics};

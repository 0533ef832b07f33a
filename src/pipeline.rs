use crate::config::AppConfig;
use crate::dsp::SpectralExtractor;
use crate::error::{ConfigError, FrameError};
use crate::fusion::{FixAligner, SharedFixAligner};
use crate::geo::TileAggregator;
use crate::metrics::PipelineMetrics;
use crate::types::{BandSpec, FeatureRecord, PositionFix, SampleFrame, TileMetrics};
use std::time::Instant;

/// Result of pushing one frame through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Feature record, positioned when a fix was within tolerance
    pub features: FeatureRecord,
    /// Tiles emitted by an aggregation window that completed on this frame
    pub tiles: Vec<TileMetrics>,
}

/// Single-stream frame pipeline: extract, align, tile, aggregate.
///
/// Frames must be processed one at a time and in order. Fixes may be added
/// concurrently through [`ObservatoryPipeline::fix_handle`].
#[derive(Debug)]
pub struct ObservatoryPipeline {
    extractor: SpectralExtractor,
    fixes: SharedFixAligner,
    tolerance_ns: i64,
    aggregator: TileAggregator,
    metrics: PipelineMetrics,
}

impl ObservatoryPipeline {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let extractor = SpectralExtractor::new(&config.rf, &config.dsp)?;
        let aligner = FixAligner::new(&config.fusion)?;
        let aggregator = TileAggregator::new(&config.geo, config.dsp.bands.len())?;

        tracing::info!(
            fft_size = config.rf.fft_size,
            bands = config.dsp.bands.len(),
            tile_size_m = config.geo.tile_size_m,
            window_frames = config.geo.aggregate_window_frames,
            "Pipeline created"
        );

        Ok(Self {
            extractor,
            fixes: SharedFixAligner::new(aligner),
            tolerance_ns: config.fusion.tolerance_ns,
            aggregator,
            metrics: PipelineMetrics::new(&config.metrics),
        })
    }

    /// Process one frame.
    ///
    /// A rejected frame leaves every buffer untouched, so the caller can drop
    /// it and keep streaming.
    pub fn process(&mut self, frame: &SampleFrame) -> Result<PipelineOutput, FrameError> {
        let start = Instant::now();

        let mut features = match self.extractor.process(frame) {
            Ok(features) => features,
            Err(e) => {
                self.metrics.record_rejected();
                tracing::warn!(frame_id = frame.frame_id, error = %e, "Frame rejected");
                return Err(e);
            }
        };

        let fix = self.fixes.align(features.timestamp_ns);
        if let Some(fix) = fix {
            features.lat_deg = Some(fix.lat_deg);
            features.lon_deg = Some(fix.lon_deg);
        }

        let aggregated = self.aggregator.add(&features);
        let tiles = if self.aggregator.should_aggregate() {
            self.run_aggregation()
        } else {
            Vec::new()
        };

        self.metrics
            .record_frame(start.elapsed(), fix.is_some(), aggregated);

        tracing::debug!(
            frame_id = features.frame_id,
            positioned = fix.is_some(),
            noise_floor_db = features.noise_floor_db,
            "Frame complete"
        );

        Ok(PipelineOutput { features, tiles })
    }

    fn run_aggregation(&mut self) -> Vec<TileMetrics> {
        let tiles = self.aggregator.aggregate();
        self.metrics.record_aggregation(tiles.len());
        tracing::info!(tile_count = tiles.len(), "Aggregation window complete");
        tiles
    }

    /// Buffer a position fix. Returns `false` if the fix was dropped.
    pub fn add_fix(&self, fix: PositionFix) -> bool {
        self.fixes.add_fix(fix)
    }

    /// Handle for a producer that adds fixes from another thread.
    pub fn fix_handle(&self) -> SharedFixAligner {
        self.fixes.clone()
    }

    pub fn fix_tolerance_ns(&self) -> i64 {
        self.tolerance_ns
    }

    /// Reduce the partial aggregation window, e.g. at shutdown.
    pub fn flush(&mut self) -> Vec<TileMetrics> {
        if self.aggregator.pending_len() == 0 {
            return Vec::new();
        }
        self.run_aggregation()
    }

    /// Return to the freshly constructed state: EMA history, buffered fixes
    /// and pending aggregation records are all discarded.
    ///
    /// Must not be called while another thread is adding fixes.
    pub fn reset(&mut self) {
        self.extractor.reset();
        self.fixes.clear();
        self.aggregator.clear();
        tracing::info!("Pipeline reset");
    }

    pub fn bands(&self) -> &[BandSpec] {
        self.extractor.bands()
    }

    pub fn pending_len(&self) -> usize {
        self.aggregator.pending_len()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut PipelineMetrics {
        &mut self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::tone_frame;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.rf.fft_size = 256;
        config.geo.aggregate_window_frames = 3;
        config
    }

    fn frame(cfg: &AppConfig, id: u64, ts: i64) -> SampleFrame {
        tone_frame(
            id,
            ts,
            cfg.rf.fft_size,
            cfg.rf.sample_rate_sps,
            cfg.rf.center_freq_hz,
            -5.0e6,
            0.1,
        )
    }

    #[test]
    fn test_unpositioned_frames_never_aggregate() {
        let cfg = config();
        let mut p = ObservatoryPipeline::new(&cfg).unwrap();
        for i in 0..5 {
            let out = p.process(&frame(&cfg, i, i as i64)).unwrap();
            assert!(out.features.position().is_none());
            assert!(out.tiles.is_empty());
        }
        assert!(p.flush().is_empty());
        assert_eq!(p.metrics().summary().frames_unpositioned, 5);
    }

    #[test]
    fn test_window_emits_tiles() {
        let cfg = config();
        let mut p = ObservatoryPipeline::new(&cfg).unwrap();
        p.add_fix(PositionFix::new(0, cfg.geo.center_lat_deg, cfg.geo.center_lon_deg));

        let outputs: Vec<_> = (0..3)
            .map(|i| p.process(&frame(&cfg, i, i as i64 * 1_000)).unwrap())
            .collect();
        assert!(outputs[0].tiles.is_empty());
        assert!(outputs[1].tiles.is_empty());
        assert_eq!(outputs[2].tiles.len(), 1);
        assert_eq!(outputs[2].tiles[0].frame_count, 3);
        assert_eq!(outputs[2].tiles[0].tile_id, "tile_x0_y0");
        assert_eq!(p.pending_len(), 0);
    }

    #[test]
    fn test_rejected_frame_counts() {
        let cfg = config();
        let mut p = ObservatoryPipeline::new(&cfg).unwrap();
        let mut bad = frame(&cfg, 0, 0);
        bad.samples.pop();
        assert!(p.process(&bad).is_err());
        assert_eq!(p.metrics().summary().frames_rejected, 1);
        assert_eq!(p.metrics().summary().frames_processed, 0);
    }

    #[test]
    fn test_reset_clears_fixes_and_pending() {
        let cfg = config();
        let mut p = ObservatoryPipeline::new(&cfg).unwrap();
        let handle = p.fix_handle();
        handle.add_fix(PositionFix::new(0, cfg.geo.center_lat_deg, cfg.geo.center_lon_deg));
        p.process(&frame(&cfg, 0, 0)).unwrap();
        assert_eq!(p.pending_len(), 1);

        p.reset();
        assert_eq!(p.pending_len(), 0);
        assert!(handle.is_empty());

        let out = p.process(&frame(&cfg, 1, 1)).unwrap();
        assert!(out.features.position().is_none());
        assert_eq!(out.features.psd_smoothed_db, out.features.psd_db);
    }
}

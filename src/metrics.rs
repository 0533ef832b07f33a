//! Pipeline performance metrics.
//!
//! Uses HDR histograms for accurate latency percentiles.

use crate::config::MetricsConfig;
use hdrhistogram::Histogram;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-pipeline metrics
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Frame processing latency histogram (microseconds)
    frame_latency_us: Option<Histogram<u64>>,

    /// Frames that produced a feature record
    frames_processed: AtomicU64,

    /// Frames rejected by the extractor
    frames_rejected: AtomicU64,

    /// Records that received a position fix
    frames_positioned: AtomicU64,

    /// Records without a fix within tolerance
    frames_unpositioned: AtomicU64,

    /// Records accepted into the aggregation buffer
    frames_aggregated: AtomicU64,

    /// Completed aggregation cycles (including flushes)
    aggregation_cycles: AtomicU64,

    /// Tile metrics emitted
    tiles_emitted: AtomicU64,

    /// Last reset timestamp
    started: Instant,
}

/// Summary of key metrics for logging
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    /// P50 frame latency (microseconds)
    pub latency_p50_us: u64,

    /// P95 frame latency (microseconds)
    pub latency_p95_us: u64,

    /// P99 frame latency (microseconds)
    pub latency_p99_us: u64,

    pub frames_processed: u64,
    pub frames_rejected: u64,
    pub frames_positioned: u64,
    pub frames_unpositioned: u64,
    pub frames_aggregated: u64,
    pub aggregation_cycles: u64,
    pub tiles_emitted: u64,

    /// Frames processed per second of uptime
    pub frames_per_sec: f64,

    /// Uptime in seconds
    pub uptime_secs: f64,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}

impl PipelineMetrics {
    /// Create a metrics collector. Latency is not recorded when disabled or
    /// when the histogram bounds are unusable.
    pub fn new(config: &MetricsConfig) -> Self {
        let frame_latency_us = if config.enabled {
            match Histogram::new_with_bounds(
                1,
                config.histogram_max_us.max(2),
                config.histogram_precision.clamp(1, 5),
            ) {
                Ok(h) => Some(h),
                Err(e) => {
                    tracing::warn!("Latency histogram disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            frame_latency_us,
            frames_processed: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            frames_positioned: AtomicU64::new(0),
            frames_unpositioned: AtomicU64::new(0),
            frames_aggregated: AtomicU64::new(0),
            aggregation_cycles: AtomicU64::new(0),
            tiles_emitted: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Record one successfully processed frame
    pub fn record_frame(&mut self, duration: Duration, positioned: bool, aggregated: bool) {
        if let Some(hist) = self.frame_latency_us.as_mut() {
            let us = (duration.as_micros() as u64).max(1);
            if let Err(e) = hist.record(us.min(hist.high())) {
                tracing::warn!("Failed to record frame latency: {}", e);
            }
        }

        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        if positioned {
            self.frames_positioned.fetch_add(1, Ordering::Relaxed);
        } else {
            self.frames_unpositioned.fetch_add(1, Ordering::Relaxed);
        }
        if aggregated {
            self.frames_aggregated.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a rejected frame
    pub fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an aggregation cycle and the number of tiles it produced
    pub fn record_aggregation(&self, tiles: usize) {
        self.aggregation_cycles.fetch_add(1, Ordering::Relaxed);
        self.tiles_emitted.fetch_add(tiles as u64, Ordering::Relaxed);
    }

    /// Get current metrics summary
    pub fn summary(&self) -> MetricsSummary {
        let quantile = |q: f64| {
            self.frame_latency_us
                .as_ref()
                .map_or(0, |h| h.value_at_quantile(q))
        };

        let frames_processed = self.frames_processed.load(Ordering::Relaxed);
        let uptime_secs = self.started.elapsed().as_secs_f64();
        let frames_per_sec = if uptime_secs > 0.0 {
            frames_processed as f64 / uptime_secs
        } else {
            0.0
        };

        MetricsSummary {
            latency_p50_us: quantile(0.5),
            latency_p95_us: quantile(0.95),
            latency_p99_us: quantile(0.99),
            frames_processed,
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            frames_positioned: self.frames_positioned.load(Ordering::Relaxed),
            frames_unpositioned: self.frames_unpositioned.load(Ordering::Relaxed),
            frames_aggregated: self.frames_aggregated.load(Ordering::Relaxed),
            aggregation_cycles: self.aggregation_cycles.load(Ordering::Relaxed),
            tiles_emitted: self.tiles_emitted.load(Ordering::Relaxed),
            frames_per_sec,
            uptime_secs,
        }
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        if let Some(hist) = self.frame_latency_us.as_mut() {
            hist.clear();
        }
        self.frames_processed.store(0, Ordering::Relaxed);
        self.frames_rejected.store(0, Ordering::Relaxed);
        self.frames_positioned.store(0, Ordering::Relaxed);
        self.frames_unpositioned.store(0, Ordering::Relaxed);
        self.frames_aggregated.store(0, Ordering::Relaxed);
        self.aggregation_cycles.store(0, Ordering::Relaxed);
        self.tiles_emitted.store(0, Ordering::Relaxed);
        self.started = Instant::now();
    }
}

impl MetricsSummary {
    /// Emit the summary as one structured log event
    pub fn log(&self) {
        tracing::info!(
            frames = self.frames_processed,
            rejected = self.frames_rejected,
            positioned = self.frames_positioned,
            aggregated = self.frames_aggregated,
            cycles = self.aggregation_cycles,
            tiles = self.tiles_emitted,
            p50_us = self.latency_p50_us,
            p99_us = self.latency_p99_us,
            fps = self.frames_per_sec,
            "Pipeline metrics"
        );
    }
}

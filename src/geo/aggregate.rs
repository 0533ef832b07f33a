//! Windowed per-tile reduction of feature records.
//!
//! Records are buffered in arrival order and grouped only when a window is
//! reduced. Means and maxima over band power are taken directly on the dB
//! values, matching the established output of existing deployments.

use super::grid::TileGrid;
use crate::config::GeoConfig;
use crate::error::ConfigError;
use crate::types::{FeatureRecord, TileKey, TileMetrics};
use std::collections::BTreeMap;

/// Buffered record reduced to the fields aggregation needs.
#[derive(Debug, Clone)]
struct PendingRow {
    key: TileKey,
    timestamp_ns: i64,
    bandpower_db: Vec<f32>,
    occupancy_pct: Vec<f32>,
    anomaly_score: Option<f32>,
}

/// Running statistics for one tile within one window.
#[derive(Debug)]
struct TileAccumulator {
    frame_count: u64,
    timestamp_min_ns: i64,
    timestamp_max_ns: i64,
    bandpower_sum: Vec<f64>,
    bandpower_max: Vec<f32>,
    occupancy_sum: Vec<f64>,
    anomaly_max: Option<f32>,
}

impl TileAccumulator {
    fn new(num_bands: usize) -> Self {
        Self {
            frame_count: 0,
            timestamp_min_ns: i64::MAX,
            timestamp_max_ns: i64::MIN,
            bandpower_sum: vec![0.0; num_bands],
            bandpower_max: vec![f32::NEG_INFINITY; num_bands],
            occupancy_sum: vec![0.0; num_bands],
            anomaly_max: None,
        }
    }

    fn push(&mut self, row: &PendingRow) {
        self.frame_count += 1;
        self.timestamp_min_ns = self.timestamp_min_ns.min(row.timestamp_ns);
        self.timestamp_max_ns = self.timestamp_max_ns.max(row.timestamp_ns);

        for (i, &bp) in row.bandpower_db.iter().enumerate() {
            self.bandpower_sum[i] += bp as f64;
            self.bandpower_max[i] = self.bandpower_max[i].max(bp);
        }
        for (sum, &occ) in self.occupancy_sum.iter_mut().zip(&row.occupancy_pct) {
            *sum += occ as f64;
        }
        if let Some(score) = row.anomaly_score {
            self.anomaly_max = Some(self.anomaly_max.map_or(score, |m| m.max(score)));
        }
    }

    fn finish(self, key: TileKey, grid: &TileGrid) -> TileMetrics {
        let n = self.frame_count as f64;
        let bounds = grid.bounds(key);
        TileMetrics {
            tile_id: key.tile_id(),
            tile_x: key.tile_x,
            tile_y: key.tile_y,
            lat_min: bounds.lat_min,
            lat_max: bounds.lat_max,
            lon_min: bounds.lon_min,
            lon_max: bounds.lon_max,
            frame_count: self.frame_count,
            timestamp_min_ns: self.timestamp_min_ns,
            timestamp_max_ns: self.timestamp_max_ns,
            bandpower_mean_db: self.bandpower_sum.iter().map(|s| (s / n) as f32).collect(),
            bandpower_max_db: self.bandpower_max,
            occupancy_mean_pct: self.occupancy_sum.iter().map(|s| (s / n) as f32).collect(),
            anomaly_score_max: self.anomaly_max,
        }
    }
}

/// Buffers positioned feature records and reduces them into tile metrics.
#[derive(Debug)]
pub struct TileAggregator {
    grid: TileGrid,
    num_bands: usize,
    window_frames: usize,
    pending: Vec<PendingRow>,
}

impl TileAggregator {
    pub fn new(config: &GeoConfig, num_bands: usize) -> Result<Self, ConfigError> {
        let grid = TileGrid::new(config)?;
        Ok(Self::with_grid(grid, num_bands, config.aggregate_window_frames))
    }

    pub fn with_grid(grid: TileGrid, num_bands: usize, window_frames: usize) -> Self {
        Self {
            grid,
            num_bands,
            window_frames: window_frames.max(1),
            pending: Vec::with_capacity(window_frames),
        }
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn window_frames(&self) -> usize {
        self.window_frames
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Buffer a record. Returns `false` when the record is skipped: no
    /// position, outside the grid extent, or a band count that does not
    /// match this aggregator.
    pub fn add(&mut self, record: &FeatureRecord) -> bool {
        let Some((lat, lon)) = record.position() else {
            return false;
        };
        if !self.grid.contains(lat, lon) {
            tracing::debug!(frame_id = record.frame_id, lat, lon, "Record outside grid extent");
            return false;
        }
        if record.bandpower_db.len() != self.num_bands
            || record.occupancy_pct.len() != self.num_bands
        {
            tracing::warn!(
                frame_id = record.frame_id,
                expected = self.num_bands,
                bandpower = record.bandpower_db.len(),
                occupancy = record.occupancy_pct.len(),
                "Skipping record with mismatched band count"
            );
            return false;
        }

        self.pending.push(PendingRow {
            key: self.grid.locate(lat, lon),
            timestamp_ns: record.timestamp_ns,
            bandpower_db: record.bandpower_db.clone(),
            occupancy_pct: record.occupancy_pct.clone(),
            anomaly_score: record.anomaly_score,
        });
        true
    }

    /// True once the pending buffer holds a full window.
    pub fn should_aggregate(&self) -> bool {
        self.pending.len() >= self.window_frames
    }

    /// Reduce every pending record into one [`TileMetrics`] per tile, ordered
    /// by tile key, and clear the buffer.
    pub fn aggregate(&mut self) -> Vec<TileMetrics> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let mut groups: BTreeMap<TileKey, TileAccumulator> = BTreeMap::new();
        for row in self.pending.drain(..) {
            groups
                .entry(row.key)
                .or_insert_with(|| TileAccumulator::new(self.num_bands))
                .push(&row);
        }

        let tiles: Vec<TileMetrics> = groups
            .into_iter()
            .map(|(key, acc)| acc.finish(key, &self.grid))
            .collect();

        tracing::debug!(tile_count = tiles.len(), "Aggregation window reduced");
        tiles
    }

    /// Reduce whatever is pending regardless of the window threshold.
    pub fn flush(&mut self) -> Vec<TileMetrics> {
        self.aggregate()
    }

    /// Drop pending records without reducing them.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

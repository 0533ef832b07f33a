//! Timestamp alignment between feature records and position fixes.
//!
//! Fixes arrive from an independent clock domain at a much lower rate than
//! frames. They are kept sorted by timestamp so each lookup is a binary search.

use crate::config::FusionConfig;
use crate::error::ConfigError;
use crate::types::PositionFix;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded, time-ordered buffer of recent fixes.
#[derive(Debug, Clone)]
pub struct FixAligner {
    fixes: VecDeque<PositionFix>,
    tolerance_ns: i64,
    retention_ns: i64,
    max_fixes: usize,
}

impl FixAligner {
    pub fn new(config: &FusionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fixes: VecDeque::with_capacity(config.max_fixes.min(1024)),
            tolerance_ns: config.tolerance_ns,
            retention_ns: config.retention_ns,
            max_fixes: config.max_fixes,
        })
    }

    /// Buffer a fix. Fixes with invalid coordinates are dropped and `false` returned.
    pub fn add_fix(&mut self, fix: PositionFix) -> bool {
        if !fix.has_valid_coordinates() {
            tracing::warn!(
                timestamp_ns = fix.gps_timestamp_ns,
                lat = fix.lat_deg,
                lon = fix.lon_deg,
                "Dropping position fix with invalid coordinates"
            );
            return false;
        }

        // Late arrivals go after any fix with the same timestamp
        let idx = self
            .fixes
            .partition_point(|f| f.gps_timestamp_ns <= fix.gps_timestamp_ns);
        self.fixes.insert(idx, fix);
        self.evict();
        true
    }

    fn evict(&mut self) {
        let Some(newest) = self.fixes.back().map(|f| f.gps_timestamp_ns) else {
            return;
        };
        let cutoff = newest.saturating_sub(self.retention_ns);
        while self
            .fixes
            .front()
            .is_some_and(|f| f.gps_timestamp_ns < cutoff)
        {
            self.fixes.pop_front();
        }
        while self.fixes.len() > self.max_fixes {
            self.fixes.pop_front();
        }
    }

    /// Fix closest in time to `timestamp_ns`, if within tolerance.
    ///
    /// On equal distance the earlier fix wins.
    pub fn align(&self, timestamp_ns: i64) -> Option<PositionFix> {
        let idx = self
            .fixes
            .partition_point(|f| f.gps_timestamp_ns < timestamp_ns);

        let before = idx.checked_sub(1).and_then(|i| self.fixes.get(i));
        let after = self.fixes.get(idx);

        let best = match (before, after) {
            (Some(b), Some(a)) => {
                if timestamp_ns.abs_diff(b.gps_timestamp_ns)
                    <= a.gps_timestamp_ns.abs_diff(timestamp_ns)
                {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        (best.gps_timestamp_ns.abs_diff(timestamp_ns) <= self.tolerance_ns.unsigned_abs())
            .then_some(*best)
    }

    pub fn clear(&mut self) {
        self.fixes.clear();
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn tolerance_ns(&self) -> i64 {
        self.tolerance_ns
    }

    /// Oldest and newest buffered timestamps.
    pub fn time_span(&self) -> Option<(i64, i64)> {
        Some((
            self.fixes.front()?.gps_timestamp_ns,
            self.fixes.back()?.gps_timestamp_ns,
        ))
    }
}

/// Cloneable handle to a [`FixAligner`] shared between a position producer
/// thread and the frame pipeline.
#[derive(Debug, Clone)]
pub struct SharedFixAligner {
    inner: Arc<Mutex<FixAligner>>,
}

impl SharedFixAligner {
    pub fn new(aligner: FixAligner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(aligner)),
        }
    }

    pub fn add_fix(&self, fix: PositionFix) -> bool {
        self.inner.lock().add_fix(fix)
    }

    pub fn align(&self, timestamp_ns: i64) -> Option<PositionFix> {
        self.inner.lock().align(timestamp_ns)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

//! Equirectangular tile grid around a fixed center point.
//!
//! Tile (0, 0) is centered on the grid center; tile edges sit at
//! `(k ± 0.5) * tile_size_m` from it along each axis.

use super::geometry::TileBounds;
use crate::config::GeoConfig;
use crate::error::ConfigError;
use crate::types::TileKey;

/// Meters per degree of latitude (spherical approximation).
pub const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Fixed-parameter grid; never re-gridded while in use.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    center_lat_deg: f64,
    center_lon_deg: f64,
    tile_size_m: f64,
    extent_m: f64,
    meters_per_deg_lon: f64,
}

impl TileGrid {
    pub fn new(config: &GeoConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let meters_per_deg_lon = METERS_PER_DEG_LAT * config.center_lat_deg.to_radians().cos();

        tracing::debug!(
            center_lat = config.center_lat_deg,
            center_lon = config.center_lon_deg,
            tile_size_m = config.tile_size_m,
            extent_m = config.grid_extent_m,
            "Tile grid created"
        );

        Ok(Self {
            center_lat_deg: config.center_lat_deg,
            center_lon_deg: config.center_lon_deg,
            tile_size_m: config.tile_size_m,
            extent_m: config.grid_extent_m,
            meters_per_deg_lon,
        })
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_lat_deg, self.center_lon_deg)
    }

    pub fn tile_size_m(&self) -> f64 {
        self.tile_size_m
    }

    pub fn meters_per_deg_lon(&self) -> f64 {
        self.meters_per_deg_lon
    }

    /// Tiles per axis needed to cover the extent.
    pub fn tile_span(&self) -> u32 {
        (self.extent_m / self.tile_size_m).ceil() as u32
    }

    /// Offset of a coordinate from the grid center, in meters (east, north).
    fn offset_m(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        (
            (lon_deg - self.center_lon_deg) * self.meters_per_deg_lon,
            (lat_deg - self.center_lat_deg) * METERS_PER_DEG_LAT,
        )
    }

    /// Tile containing a coordinate.
    pub fn locate(&self, lat_deg: f64, lon_deg: f64) -> TileKey {
        let (dx, dy) = self.offset_m(lat_deg, lon_deg);
        TileKey {
            tile_x: (dx / self.tile_size_m + 0.5).floor() as i32,
            tile_y: (dy / self.tile_size_m + 0.5).floor() as i32,
        }
    }

    /// Center coordinate `(lat, lon)` of a tile.
    pub fn center_of(&self, key: TileKey) -> (f64, f64) {
        let dx = key.tile_x as f64 * self.tile_size_m;
        let dy = key.tile_y as f64 * self.tile_size_m;
        (
            self.center_lat_deg + dy / METERS_PER_DEG_LAT,
            self.center_lon_deg + dx / self.meters_per_deg_lon,
        )
    }

    pub fn bounds(&self, key: TileKey) -> TileBounds {
        let half_lat = 0.5 * self.tile_size_m / METERS_PER_DEG_LAT;
        let half_lon = 0.5 * self.tile_size_m / self.meters_per_deg_lon;
        let (lat, lon) = self.center_of(key);
        TileBounds {
            lat_min: lat - half_lat,
            lat_max: lat + half_lat,
            lon_min: lon - half_lon,
            lon_max: lon + half_lon,
        }
    }

    /// Whether a coordinate lies inside the square grid extent.
    pub fn contains(&self, lat_deg: f64, lon_deg: f64) -> bool {
        if !(lat_deg.is_finite() && lon_deg.is_finite()) {
            return false;
        }
        let (dx, dy) = self.offset_m(lat_deg, lon_deg);
        let half = 0.5 * self.extent_m;
        dx.abs() <= half && dy.abs() <= half
    }
}

//! Spatial tiling and windowed tile aggregation.

pub mod aggregate;
pub mod geometry;
pub mod grid;

pub use aggregate::TileAggregator;
pub use geometry::TileBounds;
pub use grid::{TileGrid, METERS_PER_DEG_LAT};

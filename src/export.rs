//! Export of feature records and tile metrics.
//!
//! Tables are written as CSV with per-band arrays flattened into one column per
//! band index. Tile footprints are written as a GeoJSON FeatureCollection.

use crate::error::ExportError;
use crate::geo::TileBounds;
use crate::types::{FeatureRecord, TileMetrics};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Files produced by [`export_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub frames_csv: PathBuf,
    pub tiles_csv: PathBuf,
    pub tiles_geojson: PathBuf,
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn band_cell(values: &[f32], index: usize) -> String {
    optional(values.get(index))
}

/// Column names for a frame table with `num_bands` bands.
pub fn frame_columns(num_bands: usize) -> Vec<String> {
    let mut columns: Vec<String> = [
        "frame_id",
        "timestamp_ns",
        "lat_deg",
        "lon_deg",
        "noise_floor_db",
        "anomaly_score",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    columns.extend((0..num_bands).map(|i| format!("bandpower_db_{i}")));
    columns.extend((0..num_bands).map(|i| format!("occupancy_pct_{i}")));
    columns
}

/// Column names for a tile table with `num_bands` bands.
pub fn tile_columns(num_bands: usize) -> Vec<String> {
    let mut columns: Vec<String> = [
        "tile_id",
        "tile_x",
        "tile_y",
        "lat_min",
        "lat_max",
        "lon_min",
        "lon_max",
        "frame_count",
        "timestamp_min_ns",
        "timestamp_max_ns",
        "anomaly_score_max",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    columns.extend((0..num_bands).map(|i| format!("bandpower_mean_db_{i}")));
    columns.extend((0..num_bands).map(|i| format!("bandpower_max_db_{i}")));
    columns.extend((0..num_bands).map(|i| format!("occupancy_mean_pct_{i}")));
    columns
}

/// Write one row per feature record. The spectrum vectors are not exported.
pub fn write_frames_csv<W: Write>(writer: W, frames: &[FeatureRecord]) -> Result<(), ExportError> {
    let num_bands = frames.iter().map(FeatureRecord::num_bands).max().unwrap_or(0);
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(frame_columns(num_bands))?;

    for rec in frames {
        let mut row = vec![
            rec.frame_id.to_string(),
            rec.timestamp_ns.to_string(),
            optional(rec.lat_deg),
            optional(rec.lon_deg),
            rec.noise_floor_db.to_string(),
            optional(rec.anomaly_score),
        ];
        row.extend((0..num_bands).map(|i| band_cell(&rec.bandpower_db, i)));
        row.extend((0..num_bands).map(|i| band_cell(&rec.occupancy_pct, i)));
        wtr.write_record(&row)?;
    }

    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write one row per tile.
pub fn write_tiles_csv<W: Write>(writer: W, tiles: &[TileMetrics]) -> Result<(), ExportError> {
    let num_bands = tiles
        .iter()
        .map(|t| t.bandpower_mean_db.len())
        .max()
        .unwrap_or(0);
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(tile_columns(num_bands))?;

    for tile in tiles {
        let mut row = vec![
            tile.tile_id.clone(),
            tile.tile_x.to_string(),
            tile.tile_y.to_string(),
            tile.lat_min.to_string(),
            tile.lat_max.to_string(),
            tile.lon_min.to_string(),
            tile.lon_max.to_string(),
            tile.frame_count.to_string(),
            tile.timestamp_min_ns.to_string(),
            tile.timestamp_max_ns.to_string(),
            optional(tile.anomaly_score_max),
        ];
        row.extend((0..num_bands).map(|i| band_cell(&tile.bandpower_mean_db, i)));
        row.extend((0..num_bands).map(|i| band_cell(&tile.bandpower_max_db, i)));
        row.extend((0..num_bands).map(|i| band_cell(&tile.occupancy_mean_pct, i)));
        wtr.write_record(&row)?;
    }

    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

fn tile_properties(tile: &TileMetrics) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("tile_id".into(), json!(tile.tile_id));
    props.insert("tile_x".into(), json!(tile.tile_x));
    props.insert("tile_y".into(), json!(tile.tile_y));
    props.insert("frame_count".into(), json!(tile.frame_count));
    props.insert("timestamp_min_ns".into(), json!(tile.timestamp_min_ns));
    props.insert("timestamp_max_ns".into(), json!(tile.timestamp_max_ns));
    props.insert("anomaly_score_max".into(), json!(tile.anomaly_score_max));

    for (i, v) in tile.bandpower_mean_db.iter().enumerate() {
        props.insert(format!("bandpower_mean_db_{i}"), json!(v));
    }
    for (i, v) in tile.bandpower_max_db.iter().enumerate() {
        props.insert(format!("bandpower_max_db_{i}"), json!(v));
    }
    for (i, v) in tile.occupancy_mean_pct.iter().enumerate() {
        props.insert(format!("occupancy_mean_pct_{i}"), json!(v));
    }
    props
}

/// Build a GeoJSON FeatureCollection with one polygon per tile.
pub fn tiles_to_geojson(tiles: &[TileMetrics]) -> Value {
    let features: Vec<Value> = tiles
        .iter()
        .map(|tile| {
            let ring = TileBounds {
                lat_min: tile.lat_min,
                lat_max: tile.lat_max,
                lon_min: tile.lon_min,
                lon_max: tile.lon_max,
            }
            .polygon_ring();
            json!({
                "type": "Feature",
                "properties": tile_properties(tile),
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [ring],
                },
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

pub fn write_tiles_geojson<W: Write>(writer: W, tiles: &[TileMetrics]) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, &tiles_to_geojson(tiles))?;
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>, ExportError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ExportError::Io {
            path: Box::new(path.to_path_buf()),
            source,
        })
}

fn finish(mut writer: BufWriter<File>, path: &Path) -> Result<(), ExportError> {
    writer.flush().map_err(|source| ExportError::Io {
        path: Box::new(path.to_path_buf()),
        source,
    })
}

/// Write `frames.csv`, `tiles.csv` and `tiles.geojson` into `dir`, creating it if needed.
pub fn export_all(
    dir: impl AsRef<Path>,
    frames: &[FeatureRecord],
    tiles: &[TileMetrics],
) -> Result<ExportPaths, ExportError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: Box::new(dir.to_path_buf()),
        source,
    })?;

    let paths = ExportPaths {
        frames_csv: dir.join("frames.csv"),
        tiles_csv: dir.join("tiles.csv"),
        tiles_geojson: dir.join("tiles.geojson"),
    };

    let mut out = create(&paths.frames_csv)?;
    write_frames_csv(&mut out, frames)?;
    finish(out, &paths.frames_csv)?;

    let mut out = create(&paths.tiles_csv)?;
    write_tiles_csv(&mut out, tiles)?;
    finish(out, &paths.tiles_csv)?;

    let mut out = create(&paths.tiles_geojson)?;
    write_tiles_geojson(&mut out, tiles)?;
    finish(out, &paths.tiles_geojson)?;

    tracing::info!(
        dir = %dir.display(),
        frames = frames.len(),
        tiles = tiles.len(),
        "Export complete"
    );

    Ok(paths)
}

use rf_observatory::config::AppConfig;
use rf_observatory::export::{export_all, tiles_to_geojson};
use rf_observatory::geo::TileAggregator;
use rf_observatory::test_fixtures::feature_record;
use rf_observatory::TileKey;

fn sample_tiles() -> (Vec<rf_observatory::FeatureRecord>, Vec<rf_observatory::TileMetrics>) {
    let config = AppConfig::default();
    let mut agg = TileAggregator::new(&config.geo, 2).unwrap();
    let (lat, lon) = (config.geo.center_lat_deg, config.geo.center_lon_deg);

    let mut frames = vec![
        feature_record(0, 0, Some((lat, lon)), &[-60.0, -70.0]),
        feature_record(1, 10, Some((lat + 0.002, lon)), &[-55.0, -75.0]),
        feature_record(2, 20, None, &[-50.0, -80.0]),
    ];
    frames[1].anomaly_score = Some(0.4);
    for f in &frames {
        agg.add(f);
    }
    (frames, agg.flush())
}

#[test]
fn test_export_all_writes_three_files() {
    let dir = tempfile::tempdir().unwrap();
    let (frames, tiles) = sample_tiles();
    assert_eq!(tiles.len(), 2);

    let paths = export_all(dir.path().join("out"), &frames, &tiles).unwrap();

    let frames_csv = std::fs::read_to_string(&paths.frames_csv).unwrap();
    assert_eq!(frames_csv.lines().count(), 4);
    assert!(frames_csv.lines().next().unwrap().ends_with("occupancy_pct_1"));

    let tiles_csv = std::fs::read_to_string(&paths.tiles_csv).unwrap();
    let mut reader = csv::Reader::from_reader(tiles_csv.as_bytes());
    let headers = reader.headers().unwrap().clone();
    let id_col = headers.iter().position(|h| h == "tile_id").unwrap();
    let mean_col = headers
        .iter()
        .position(|h| h == "bandpower_mean_db_1")
        .unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][id_col], "tile_x0_y0");
    assert_eq!(&rows[0][mean_col], "-70");

    let geojson: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&paths.tiles_geojson).unwrap()).unwrap();
    assert_eq!(geojson["features"].as_array().unwrap().len(), 2);
}

#[test]
fn test_geojson_ring_matches_tile_bounds() {
    let (_, tiles) = sample_tiles();
    let geojson = tiles_to_geojson(&tiles);

    for (feature, tile) in geojson["features"].as_array().unwrap().iter().zip(&tiles) {
        let key: TileKey = feature["properties"]["tile_id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(key, tile.key());

        let ring = feature["geometry"]["coordinates"][0].as_array().unwrap();
        let lons: Vec<f64> = ring.iter().map(|p| p[0].as_f64().unwrap()).collect();
        let lats: Vec<f64> = ring.iter().map(|p| p[1].as_f64().unwrap()).collect();
        assert_eq!(lons.iter().cloned().fold(f64::INFINITY, f64::min), tile.lon_min);
        assert_eq!(lats.iter().cloned().fold(f64::NEG_INFINITY, f64::max), tile.lat_max);
    }

    let anomaly = &geojson["features"][1]["properties"]["anomaly_score_max"];
    assert!((anomaly.as_f64().unwrap() - 0.4).abs() < 1e-6);
}

#[test]
fn test_export_into_unwritable_path_fails() {
    let file = tempfile::NamedTempFile::new().unwrap();
    // A regular file cannot be used as the output directory
    let result = export_all(file.path(), &[], &[]);
    assert!(result.is_err());
}

use serde::Serialize;

/// Geographic bounding box of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TileBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl TileBounds {
    /// Closed polygon ring in `[lon, lat]` order, counter-clockwise.
    pub fn polygon_ring(&self) -> [[f64; 2]; 5] {
        [
            [self.lon_min, self.lat_min],
            [self.lon_max, self.lat_min],
            [self.lon_max, self.lat_max],
            [self.lon_min, self.lat_max],
            [self.lon_min, self.lat_min],
        ]
    }

    pub fn contains(&self, lat_deg: f64, lon_deg: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat_deg)
            && (self.lon_min..=self.lon_max).contains(&lon_deg)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            0.5 * (self.lat_min + self.lat_max),
            0.5 * (self.lon_min + self.lon_max),
        )
    }
}

use crate::global_variables::{EARTH_RADIUS_M, REFERENCE_LAT_DEG, REFERENCE_LON_DEG};
use crate::shared_data::GeoPosition;

/// Geographic anchor of the simulator's (0, 0).
///
/// The projection is a local equirectangular approximation: good within a few
/// kilometers of the anchor, increasingly wrong further away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReference {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl Default for GeoReference {
    fn default() -> Self {
        Self {
            lat_deg: REFERENCE_LAT_DEG,
            lon_deg: REFERENCE_LON_DEG,
        }
    }
}

impl GeoReference {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    /// Converts simulator meters (x east, y north) to WGS84 degrees.
    pub fn project(&self, x: f64, y: f64) -> GeoPosition {
        let ref_lat = self.lat_deg.to_radians();
        let ref_lon = self.lon_deg.to_radians();

        let d_lat = y / EARTH_RADIUS_M;
        let d_lon = x / (EARTH_RADIUS_M * ref_lat.cos());

        GeoPosition {
            lat: (ref_lat + d_lat).to_degrees(),
            lon: (ref_lon + d_lon).to_degrees(),
        }
    }
}

/// Projects with the default anchor.
pub fn project_to_geographic(x: f64, y: f64) -> GeoPosition {
    GeoReference::default().project(x, y)
}

use serde::{Deserialize, Serialize};

use crate::monitoring::{GeoReference, HazardMatch};
use crate::shared_data::GeoPosition;

/// Hand-off record for the notifier: one per acknowledged pending warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedLightWarning {
    pub message_id: u64,
    pub timestamp_ms: u64,
    pub tick: u64,
    /// Vehicle the warning is about (the watched vehicle, or the route file default).
    pub station_id: Option<String>,
    pub traffic_light_id: Option<String>,
    pub signal_state: Option<String>,
    pub distance: Option<f64>,
    pub position: Option<GeoPosition>,
}

impl RedLightWarning {
    /// Builds a warning from the last detection, falling back to `default_station`.
    pub fn from_hazard(
        message_id: u64,
        timestamp_ms: u64,
        tick: u64,
        hazard: Option<&HazardMatch>,
        default_station: Option<&str>,
        reference: &GeoReference,
    ) -> Self {
        match hazard {
            Some(found) => Self {
                message_id,
                timestamp_ms,
                tick,
                station_id: Some(found.vehicle_id.clone()),
                traffic_light_id: Some(found.traffic_light.id.clone()),
                signal_state: Some(found.traffic_light.signal_state.clone()),
                distance: Some(found.distance),
                position: Some(reference.project(found.vehicle_position.x, found.vehicle_position.y)),
            },
            None => Self {
                message_id,
                timestamp_ms,
                tick,
                station_id: default_station.map(str::to_string),
                traffic_light_id: None,
                signal_state: None,
                distance: None,
                position: None,
            },
        }
    }
}

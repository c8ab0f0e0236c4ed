// src/shared_data.rs

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A point in the simulator's Cartesian plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Straight-line distance in simulator units.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// WGS84 latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
}

/// Snapshot of one vehicle, fetched fresh on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub id: String,
    pub position: Position,
}

/// Snapshot of a traffic-light program and the junction it controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficControlState {
    pub id: String,
    /// One character per controlled movement, e.g. "rrGGyy".
    pub signal_state: String,
    pub junction_position: Position,
}

impl TrafficControlState {
    /// Red as soon as one movement shows a lowercase 'r'.
    pub fn is_red(&self) -> bool {
        signal_state_is_red(&self.signal_state)
    }
}

pub fn signal_state_is_red(signal_state: &str) -> bool {
    signal_state.contains('r')
}

/// Milliseconds since the UNIX epoch.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

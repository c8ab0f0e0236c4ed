use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared_data::Position;
use crate::traci::error::TraciResult;

/// API level and build string reported by the simulator on handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorVersion {
    pub api_version: i32,
    pub simulator: String,
}

impl fmt::Display for SimulatorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraCI {} | {}", self.api_version, self.simulator)
    }
}

/// The semantic operations the hazard monitor needs from a running simulation.
///
/// Every call is a blocking round-trip. Implementations report any transport
/// or protocol fault as a [`TraciError`](crate::traci::TraciError) and leave
/// policy (logging, fallback values) to the caller.
pub trait SimulationLink {
    fn connect(&mut self, host: &str, port: u16) -> TraciResult<SimulatorVersion>;
    fn close(&mut self) -> TraciResult<()>;

    /// Advances the simulation by one tick.
    fn simulation_step(&mut self) -> TraciResult<()>;

    fn vehicle_ids(&mut self) -> TraciResult<Vec<String>>;
    fn vehicle_position(&mut self, vehicle_id: &str) -> TraciResult<Position>;

    fn traffic_light_ids(&mut self) -> TraciResult<Vec<String>>;
    fn red_yellow_green_state(&mut self, tls_id: &str) -> TraciResult<String>;

    /// Position of the junction a traffic light is named after.
    fn junction_position(&mut self, junction_id: &str) -> TraciResult<Position>;

    /// Vehicles still running plus those waiting to be inserted.
    fn min_expected_vehicles(&mut self) -> TraciResult<i32>;
}

//! An in-process stand-in for a running simulation.
//!
//! [`InMemorySimulation`] answers the same queries as a TraCI connection from
//! plain vectors, and can replay a script of per-tick changes. It backs the
//! unit tests, the benches and the `--dry-run` mode of the monitor binary.

use std::collections::VecDeque;
use std::io;

use crate::shared_data::{Position, TrafficControlState, VehicleState};
use crate::traci::error::{TraciError, TraciResult};
use crate::traci::link::{SimulationLink, SimulatorVersion};

/// Changes applied when the simulation advances one tick.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    signal_states: Vec<(String, String)>,
    vehicle_positions: Vec<(String, Position)>,
    departed: Vec<String>,
    fail: bool,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(mut self, tls_id: &str, state: &str) -> Self {
        self.signal_states
            .push((tls_id.to_string(), state.to_string()));
        self
    }

    /// Moves a vehicle, inserting it at the end of the ID list if unknown.
    pub fn vehicle(mut self, vehicle_id: &str, position: Position) -> Self {
        self.vehicle_positions
            .push((vehicle_id.to_string(), position));
        self
    }

    pub fn depart(mut self, vehicle_id: &str) -> Self {
        self.departed.push(vehicle_id.to_string());
        self
    }

    /// The step consuming this frame fails and leaves the world untouched.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[derive(Debug)]
pub struct InMemorySimulation {
    connected: bool,
    refuse_connections: bool,
    fail_queries: bool,
    vehicles: Vec<VehicleState>,
    traffic_lights: Vec<TrafficControlState>,
    frames: VecDeque<Frame>,
    waiting_vehicles: i32,
    steps: u64,
    queries: u64,
}

impl Default for InMemorySimulation {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySimulation {
    pub fn new() -> Self {
        Self {
            connected: false,
            refuse_connections: false,
            fail_queries: false,
            vehicles: Vec::new(),
            traffic_lights: Vec::new(),
            frames: VecDeque::new(),
            waiting_vehicles: 0,
            steps: 0,
            queries: 0,
        }
    }

    pub fn with_vehicle(mut self, vehicle_id: &str, position: Position) -> Self {
        self.place_vehicle(vehicle_id, position);
        self
    }

    pub fn with_traffic_light(mut self, tls_id: &str, state: &str, junction: Position) -> Self {
        self.traffic_lights.push(TrafficControlState {
            id: tls_id.to_string(),
            signal_state: state.to_string(),
            junction_position: junction,
        });
        self
    }

    pub fn with_frames<I: IntoIterator<Item = Frame>>(mut self, frames: I) -> Self {
        self.frames.extend(frames);
        self
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    pub fn refuse_connections(&mut self, refuse: bool) {
        self.refuse_connections = refuse;
    }

    /// Makes every query (not the tick advance) fail until switched off.
    pub fn fail_queries(&mut self, fail: bool) {
        self.fail_queries = fail;
    }

    pub fn set_waiting_vehicles(&mut self, waiting: i32) {
        self.waiting_vehicles = waiting;
    }

    pub fn set_signal_state(&mut self, tls_id: &str, state: &str) {
        if let Some(tls) = self.traffic_lights.iter_mut().find(|t| t.id == tls_id) {
            tls.signal_state = state.to_string();
        }
    }

    pub fn place_vehicle(&mut self, vehicle_id: &str, position: Position) {
        match self.vehicles.iter_mut().find(|v| v.id == vehicle_id) {
            Some(vehicle) => vehicle.position = position,
            None => self.vehicles.push(VehicleState {
                id: vehicle_id.to_string(),
                position,
            }),
        }
    }

    pub fn remove_vehicle(&mut self, vehicle_id: &str) {
        self.vehicles.retain(|v| v.id != vehicle_id);
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Number of state queries answered or refused so far.
    pub fn query_count(&self) -> u64 {
        self.queries
    }

    fn query(&mut self) -> TraciResult<()> {
        self.queries += 1;
        if !self.connected {
            return Err(TraciError::NotConnected);
        }
        if self.fail_queries {
            return Err(TraciError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "simulated query failure",
            )));
        }
        Ok(())
    }

    fn apply(&mut self, frame: Frame) {
        for (tls_id, state) in &frame.signal_states {
            self.set_signal_state(tls_id, state);
        }
        for (vehicle_id, position) in frame.vehicle_positions {
            self.place_vehicle(&vehicle_id, position);
        }
        for vehicle_id in &frame.departed {
            self.remove_vehicle(vehicle_id);
        }
    }
}

impl SimulationLink for InMemorySimulation {
    fn connect(&mut self, _host: &str, _port: u16) -> TraciResult<SimulatorVersion> {
        if self.refuse_connections {
            return Err(TraciError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "simulated connection refusal",
            )));
        }
        self.connected = true;
        Ok(SimulatorVersion {
            api_version: 21,
            simulator: "SUMO in-memory".to_string(),
        })
    }

    fn close(&mut self) -> TraciResult<()> {
        if !self.connected {
            return Err(TraciError::NotConnected);
        }
        self.connected = false;
        Ok(())
    }

    fn simulation_step(&mut self) -> TraciResult<()> {
        if !self.connected {
            return Err(TraciError::NotConnected);
        }
        if let Some(frame) = self.frames.pop_front() {
            if frame.fail {
                return Err(TraciError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "simulated step failure",
                )));
            }
            self.apply(frame);
        }
        self.steps += 1;
        Ok(())
    }

    fn vehicle_ids(&mut self) -> TraciResult<Vec<String>> {
        self.query()?;
        Ok(self.vehicles.iter().map(|v| v.id.clone()).collect())
    }

    fn vehicle_position(&mut self, vehicle_id: &str) -> TraciResult<Position> {
        self.query()?;
        self.vehicles
            .iter()
            .find(|v| v.id == vehicle_id)
            .map(|v| v.position)
            .ok_or_else(|| TraciError::UnknownObject(vehicle_id.to_string()))
    }

    fn traffic_light_ids(&mut self) -> TraciResult<Vec<String>> {
        self.query()?;
        Ok(self.traffic_lights.iter().map(|t| t.id.clone()).collect())
    }

    fn red_yellow_green_state(&mut self, tls_id: &str) -> TraciResult<String> {
        self.query()?;
        self.traffic_lights
            .iter()
            .find(|t| t.id == tls_id)
            .map(|t| t.signal_state.clone())
            .ok_or_else(|| TraciError::UnknownObject(tls_id.to_string()))
    }

    fn junction_position(&mut self, junction_id: &str) -> TraciResult<Position> {
        self.query()?;
        self.traffic_lights
            .iter()
            .find(|t| t.id == junction_id)
            .map(|t| t.junction_position)
            .ok_or_else(|| TraciError::UnknownObject(junction_id.to_string()))
    }

    fn min_expected_vehicles(&mut self) -> TraciResult<i32> {
        self.query()?;
        Ok(self.vehicles.len() as i32 + self.waiting_vehicles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_apply_in_order_one_per_step() {
        let mut sim = InMemorySimulation::new()
            .with_traffic_light("A1", "GGGG", Position::new(0.0, 0.0))
            .with_frames([
                Frame::new().signal("A1", "rrrr"),
                Frame::new().vehicle("car0", Position::new(1.0, 2.0)),
            ]);
        sim.connect("127.0.0.1", 9999).unwrap();

        sim.simulation_step().unwrap();
        assert_eq!(sim.red_yellow_green_state("A1").unwrap(), "rrrr");
        assert!(sim.vehicle_ids().unwrap().is_empty());

        sim.simulation_step().unwrap();
        assert_eq!(sim.vehicle_ids().unwrap(), vec!["car0".to_string()]);
        assert_eq!(sim.step_count(), 2);
    }

    #[test]
    fn failing_frame_leaves_world_untouched() {
        let mut sim = InMemorySimulation::new()
            .with_traffic_light("A1", "GG", Position::default())
            .with_frames([Frame::new().signal("A1", "rr").failing()]);
        sim.connect("127.0.0.1", 9999).unwrap();

        assert!(sim.simulation_step().is_err());
        assert_eq!(sim.red_yellow_green_state("A1").unwrap(), "GG");
        assert_eq!(sim.step_count(), 0);
    }

    #[test]
    fn queries_need_a_connection() {
        let mut sim = InMemorySimulation::new().with_vehicle("car0", Position::default());
        assert!(matches!(sim.vehicle_ids(), Err(TraciError::NotConnected)));
    }

    #[test]
    fn min_expected_counts_running_and_waiting() {
        let mut sim = InMemorySimulation::new().with_vehicle("car0", Position::default());
        sim.set_waiting_vehicles(2);
        sim.connect("127.0.0.1", 9999).unwrap();
        assert_eq!(sim.min_expected_vehicles().unwrap(), 3);
    }
}

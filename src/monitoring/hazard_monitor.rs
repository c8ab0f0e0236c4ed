// hazard_monitor.rs
use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::global_variables::{DEFAULT_SUMO_HOST, DEFAULT_SUMO_PORT, HAZARD_DISTANCE};
use crate::monitoring::projection::GeoReference;
use crate::monitoring::route_file::{load_vehicle_id, RouteFileError};
use crate::monitoring::sink::{HazardEvent, HazardSink, SinkSlot};
use crate::monitoring::warning_latch::WarningLatch;
use crate::shared_data::{
    current_timestamp_ms, GeoPosition, Position, TrafficControlState,
};
use crate::traci::{SimulationLink, SimulatorVersion, TraciError, TraciResult};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("connection to {host}:{port} failed: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: TraciError,
    },

    #[error(transparent)]
    RouteFile(#[from] RouteFileError),
}

/// Endpoint and state of the link to the simulation process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub host: String,
    pub port: u16,
    connected: bool,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            host: DEFAULT_SUMO_HOST.to_string(),
            port: DEFAULT_SUMO_PORT,
            connected: false,
        }
    }
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

/// The red light that made the last detection pass positive.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardMatch {
    pub vehicle_id: String,
    pub vehicle_position: Position,
    pub traffic_light: TrafficControlState,
    pub distance: f64,
}

/// Result of one monitored tick.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The tick could not be advanced; detection was skipped.
    StepFailed,
    /// No hazard this tick.
    Clear,
    /// A new hazard episode started and a warning was raised.
    HazardRaised(HazardEvent),
    /// The current hazard episode continues; nothing new was emitted.
    HazardOngoing,
}

/// Samples a running simulation once per tick and raises a debounced red-light warning.
///
/// The monitor owns its [`SimulationLink`] exclusively. All public operations
/// handle failures where they occur: errors are logged and surface as
/// `false`, `None`, empty lists or a [`StepOutcome::StepFailed`].
///
/// Only the first vehicle in the simulator's enumeration order is watched.
pub struct TrafficHazardMonitor<L: SimulationLink> {
    link: L,
    connection: Connection,
    hazard_distance: f64,
    reference: GeoReference,
    latch: WarningLatch,
    sink: SinkSlot,
    default_vehicle_id: Option<String>,
    tick: u64,
    last_hazard: Option<HazardMatch>,
}

impl<L: SimulationLink> TrafficHazardMonitor<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            connection: Connection::default(),
            hazard_distance: HAZARD_DISTANCE,
            reference: GeoReference::default(),
            latch: WarningLatch::new(),
            sink: SinkSlot::default(),
            default_vehicle_id: None,
            tick: 0,
            last_hazard: None,
        }
    }

    pub fn with_hazard_distance(mut self, hazard_distance: f64) -> Self {
        self.hazard_distance = hazard_distance;
        self
    }

    pub fn with_reference(mut self, reference: GeoReference) -> Self {
        self.reference = reference;
        self
    }

    // Connection lifecycle

    /// Connects to the simulation and returns the version it reports.
    ///
    /// An existing connection is closed first.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<SimulatorVersion, MonitorError> {
        if self.connection.connected {
            warn!("[SumoInterface] Already connected; closing the previous connection");
            self.close();
        }
        self.connection.host = host.to_string();
        self.connection.port = port;

        info!("[SumoInterface] Connecting to SUMO at {}:{} ...", host, port);
        match self.link.connect(host, port) {
            Ok(version) => {
                self.connection.connected = true;
                info!("[SumoInterface] Connected. {}", version);
                Ok(version)
            }
            Err(source) => {
                error!("[SumoInterface] Connection error: {}", source);
                self.connection.connected = false;
                Err(MonitorError::Connection {
                    host: host.to_string(),
                    port,
                    source,
                })
            }
        }
    }

    /// Closes the link if it is open. Never fails.
    pub fn close(&mut self) {
        if !self.connection.connected {
            return;
        }
        match self.link.close() {
            Ok(()) => info!("[SumoInterface] Disconnected from SUMO"),
            Err(e) => error!("[SumoInterface] Error closing TraCI connection: {}", e),
        }
        self.connection.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.connected
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    // Per-tick operations

    /// Advances the simulation one tick without running detection.
    pub fn advance_step(&mut self) -> bool {
        if !self.connection.connected {
            error!("[SumoInterface] simulationStep error: {}", TraciError::NotConnected);
            return false;
        }
        match self.link.simulation_step() {
            Ok(()) => {
                self.tick += 1;
                true
            }
            Err(e) => {
                error!("[SumoInterface] simulationStep error: {}", e);
                false
            }
        }
    }

    /// Advances one tick, runs hazard detection and updates the warning flags.
    ///
    /// `sink` is attached on the first call only; later calls keep the
    /// first sink even if they pass a different one.
    pub fn advance_step_with_monitoring(&mut self, sink: &Arc<dyn HazardSink>) -> StepOutcome {
        self.attach_sink(Arc::clone(sink));

        if !self.advance_step() {
            return StepOutcome::StepFailed;
        }

        let Some(found) = self.find_hazard() else {
            self.latch.hazard_cleared();
            return StepOutcome::Clear;
        };
        if !self.latch.hazard_present() {
            return StepOutcome::HazardOngoing;
        }
        let event = self.hazard_event(found);
        self.sink.emit(&event);
        StepOutcome::HazardRaised(event)
    }

    /// Attaches the diagnostic sink. Returns `false` if one was already attached.
    pub fn attach_sink(&mut self, sink: Arc<dyn HazardSink>) -> bool {
        self.sink.attach(sink)
    }

    /// True if a red light lies within the hazard distance of the first vehicle.
    ///
    /// A positive answer also sets the pending-warning latch.
    pub fn is_hazard_ahead(&mut self) -> bool {
        self.find_hazard().is_some()
    }

    /// Like [`is_hazard_ahead`](Self::is_hazard_ahead), returning what was found.
    pub fn find_hazard(&mut self) -> Option<HazardMatch> {
        if !self.connection.connected {
            return None;
        }
        let found = match self.scan_for_red_light() {
            Ok(found) => found,
            Err(e) => {
                warn!("[V2I] Hazard scan aborted: {}", e);
                None
            }
        };
        if found.is_some() {
            self.latch.raise_pending();
            self.last_hazard = found.clone();
        } else if !self.latch.has_pending() {
            self.last_hazard = None;
        }
        found
    }

    fn scan_for_red_light(&mut self) -> TraciResult<Option<HazardMatch>> {
        let tls_ids = self.link.traffic_light_ids()?;
        if tls_ids.is_empty() {
            return Ok(None);
        }

        let vehicle_ids = self.link.vehicle_ids()?;
        let Some(vehicle_id) = vehicle_ids.into_iter().next() else {
            return Ok(None);
        };
        let vehicle_position = self.link.vehicle_position(&vehicle_id)?;

        for tls_id in tls_ids {
            let signal_state = self.link.red_yellow_green_state(&tls_id)?;
            let junction_position = self.link.junction_position(&tls_id)?;
            let traffic_light = TrafficControlState {
                id: tls_id,
                signal_state,
                junction_position,
            };
            let distance = vehicle_position.distance_to(&traffic_light.junction_position);

            debug!(
                "[V2I] TL {} state={} dist={:.2}",
                traffic_light.id, traffic_light.signal_state, distance
            );

            if traffic_light.is_red() && distance < self.hazard_distance {
                info!("[V2I] WARNING: Red light detected at {}", traffic_light.id);
                return Ok(Some(HazardMatch {
                    vehicle_id,
                    vehicle_position,
                    traffic_light,
                    distance,
                }));
            }
        }
        Ok(None)
    }

    fn hazard_event(&self, found: HazardMatch) -> HazardEvent {
        let geo_position = self
            .reference
            .project(found.vehicle_position.x, found.vehicle_position.y);
        HazardEvent {
            tick: self.tick,
            timestamp_ms: current_timestamp_ms(),
            vehicle_id: found.vehicle_id,
            traffic_light_id: found.traffic_light.id,
            signal_state: found.traffic_light.signal_state,
            distance: found.distance,
            vehicle_position: found.vehicle_position,
            geo_position,
        }
    }

    // Warning flags

    pub fn has_pending_warning(&self) -> bool {
        self.latch.has_pending()
    }

    pub fn clear_pending_warning(&mut self) {
        self.latch.clear_pending();
    }

    /// Marks a warning as pending without a detection pass.
    pub fn raise_warning(&mut self) {
        self.latch.raise_pending();
    }

    /// True while the current hazard episode has already been reported.
    pub fn warning_sent(&self) -> bool {
        self.latch.warning_sent()
    }

    /// The match behind the pending warning, or the latest detection if none is pending.
    ///
    /// A pending warning keeps its match through later clear passes until it
    /// is acknowledged, so a retried notification still describes it.
    pub fn last_hazard(&self) -> Option<&HazardMatch> {
        self.last_hazard.as_ref()
    }

    /// Ticks successfully advanced through this monitor.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    // Auxiliary queries

    pub fn list_vehicle_ids(&mut self) -> Vec<String> {
        if !self.connection.connected {
            return Vec::new();
        }
        self.link.vehicle_ids().unwrap_or_else(|e| {
            debug!("[SumoInterface] Error listing vehicles: {}", e);
            Vec::new()
        })
    }

    /// Planar position of a vehicle in simulator units.
    pub fn vehicle_position_xy(&mut self, vehicle_id: &str) -> Option<Position> {
        if !self.connection.connected {
            return None;
        }
        match self.link.vehicle_position(vehicle_id) {
            Ok(position) => Some(position),
            Err(e) => {
                error!("[SumoInterface] Error getting vehicle position: {}", e);
                None
            }
        }
    }

    /// Geographic position of a vehicle.
    pub fn vehicle_position(&mut self, vehicle_id: &str) -> Option<GeoPosition> {
        self.vehicle_position_xy(vehicle_id)
            .map(|p| self.reference.project(p.x, p.y))
    }

    pub fn project_to_geographic(&self, x: f64, y: f64) -> GeoPosition {
        self.reference.project(x, y)
    }

    /// True while the simulator still expects vehicles to run.
    pub fn is_simulation_active(&mut self) -> bool {
        if !self.connection.connected {
            return false;
        }
        match self.link.min_expected_vehicles() {
            Ok(expected) => expected > 0,
            Err(e) => {
                debug!("[SumoInterface] Error querying expected vehicles: {}", e);
                false
            }
        }
    }

    /// Reads and caches the first vehicle ID defined in a route file.
    pub fn load_default_vehicle_id<P: AsRef<Path>>(&mut self, path: P) -> Result<String, MonitorError> {
        match load_vehicle_id(path) {
            Ok(id) => {
                info!("[SumoInterface] Vehicle: {}", id);
                self.default_vehicle_id = Some(id.clone());
                Ok(id)
            }
            Err(e) => {
                error!("[SumoInterface] {}", e);
                Err(e.into())
            }
        }
    }

    pub fn default_vehicle_id(&self) -> Option<&str> {
        self.default_vehicle_id.as_deref()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

impl<L: SimulationLink> Drop for TrafficHazardMonitor<L> {
    fn drop(&mut self) {
        self.close();
    }
}

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::shared_data::{GeoPosition, Position};

/// Emitted once per hazard episode, on its first tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardEvent {
    pub tick: u64,
    pub timestamp_ms: u64,
    pub vehicle_id: String,
    pub traffic_light_id: String,
    pub signal_state: String,
    pub distance: f64,
    pub vehicle_position: Position,
    pub geo_position: GeoPosition,
}

/// Receiver of hazard diagnostics. Never queried by the monitor.
pub trait HazardSink: Send + Sync {
    fn on_hazard(&self, event: &HazardEvent);
}

/// Writes hazard events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl HazardSink for LogSink {
    fn on_hazard(&self, event: &HazardEvent) {
        info!(
            "[V2I] Red light {} ({}) {:.1} m ahead of {} at tick {} -> warning pending",
            event.traffic_light_id,
            event.signal_state,
            event.distance,
            event.vehicle_id,
            event.tick
        );
    }
}

/// Forwards every event to each inner sink, in order.
#[derive(Default)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn HazardSink>>,
}

impl FanOutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn HazardSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl HazardSink for FanOutSink {
    fn on_hazard(&self, event: &HazardEvent) {
        for sink in &self.sinks {
            sink.on_hazard(event);
        }
    }
}

/// Holds the sink attached first; later attachments are ignored.
#[derive(Default)]
pub struct SinkSlot {
    sink: Option<Arc<dyn HazardSink>>,
}

impl SinkSlot {
    /// Returns `true` only for the call that actually attached a sink.
    pub fn attach(&mut self, sink: Arc<dyn HazardSink>) -> bool {
        match &self.sink {
            Some(current) => {
                if !Arc::ptr_eq(current, &sink) {
                    debug!("Hazard sink already attached; ignoring a different instance");
                }
                false
            }
            None => {
                self.sink = Some(sink);
                true
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn emit(&self, event: &HazardEvent) {
        if let Some(sink) = &self.sink {
            sink.on_hazard(event);
        }
    }
}

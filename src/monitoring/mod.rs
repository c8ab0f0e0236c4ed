// monitoring/mod.rs
pub mod hazard_monitor;
pub mod projection;
pub mod route_file;
pub mod sink;
pub mod warning_latch;

pub use hazard_monitor::{
    Connection, HazardMatch, MonitorError, StepOutcome, TrafficHazardMonitor,
};
pub use projection::{project_to_geographic, GeoReference};
pub use route_file::{load_vehicle_id, RouteFileError};
pub use sink::{FanOutSink, HazardEvent, HazardSink, LogSink, SinkSlot};
pub use warning_latch::WarningLatch;

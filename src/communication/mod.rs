// communication/mod.rs
pub mod csv_log;
pub mod messages;
pub mod publisher;

pub use csv_log::{read_hazard_log, CsvHazardLog, HazardRecord};
pub use messages::RedLightWarning;
pub use publisher::{
    AmqpWarningPublisher, LogPublisher, NotifierError, WarningNotifier, WarningPublisher,
};

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::error;
use serde::{Deserialize, Serialize};

use crate::monitoring::{HazardEvent, HazardSink};

/// Flat CSV row for a hazard event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardRecord {
    pub tick: u64,
    pub timestamp_ms: u64,
    pub vehicle_id: String,
    pub traffic_light_id: String,
    pub signal_state: String,
    pub distance: f64,
    pub x: f64,
    pub y: f64,
    pub lat: f64,
    pub lon: f64,
}

impl From<&HazardEvent> for HazardRecord {
    fn from(event: &HazardEvent) -> Self {
        Self {
            tick: event.tick,
            timestamp_ms: event.timestamp_ms,
            vehicle_id: event.vehicle_id.clone(),
            traffic_light_id: event.traffic_light_id.clone(),
            signal_state: event.signal_state.clone(),
            distance: event.distance,
            x: event.vehicle_position.x,
            y: event.vehicle_position.y,
            lat: event.geo_position.lat,
            lon: event.geo_position.lon,
        }
    }
}

// Generic helper to append a record to a CSV file, writing headers on creation.
fn log_to_csv<T: Serialize>(path: &Path, record: &T) -> Result<(), Box<dyn Error>> {
    let file_exists = path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

/// Reads every hazard record back from a CSV log.
pub fn read_hazard_log<P: AsRef<Path>>(path: P) -> Result<Vec<HazardRecord>, Box<dyn Error>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Hazard sink that appends one CSV row per event.
pub struct CsvHazardLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvHazardLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HazardSink for CsvHazardLog {
    fn on_hazard(&self, event: &HazardEvent) {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = log_to_csv(&self.path, &HazardRecord::from(event)) {
            error!("Error logging hazard event: {}", e);
        }
    }
}

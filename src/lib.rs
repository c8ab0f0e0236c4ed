//! V2I red-light hazard bridge.
//!
//! Polls a running SUMO simulation over TraCI once per tick, watches the first
//! vehicle for a red traffic light within a proximity threshold, and raises a
//! debounced warning that a notifier publishes downstream.

pub mod communication;
pub mod config;
pub mod delivery_metrics;
pub mod global_variables;
pub mod monitoring;
pub mod shared_data;
pub mod traci;

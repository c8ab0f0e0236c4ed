// traci/mod.rs
pub mod client;
pub mod codec;
pub mod constants;
pub mod error;
pub mod link;
pub mod memory;

pub use client::TraciClient;
pub use error::{TraciError, TraciResult};
pub use link::{SimulationLink, SimulatorVersion};
pub use memory::{Frame, InMemorySimulation};

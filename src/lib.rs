//! Store-and-forward relay simulation between a ground node, an orbiting
//! relay and a set of ground stations.

#![forbid(unsafe_code, unused_must_use)]
#![warn(clippy::all, missing_docs)]

/// Default simulation constants.
pub mod common;

/// Simulation parameters.
pub mod config;

/// Prepared ephemeris and ground station types.
pub mod ephemeris;

/// Crate error type.
pub mod error;

/// Distance, coverage and latency helpers.
pub mod geometry;

/// CSV input loaders.
pub mod input;

/// Per-station summaries.
pub mod report;

/// Relay protocol state machine.
pub mod simulation;

pub use config::SimulationConfig;
pub use ephemeris::{Ephemeris, GroundStation, Timestep};
pub use error::{Error, Result};
pub use report::{Report, StationSummary};
pub use simulation::{Hop, RelaySimulator, RunEnd, StationRun};

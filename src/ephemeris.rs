use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::geometry::{CoverageModel, Position, distance};

/// One raw ephemeris sample: the relay position at an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EphemerisRow {
    /// Sample time
    pub time: NaiveDateTime,
    /// Relay position
    pub position: Position,
}

/// One prepared ephemeris step, with the node visibility resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Timestep {
    /// Sample time
    pub time: NaiveDateTime,
    /// Relay position
    pub position: Position,
    /// Whether the node is inside the relay coverage at this step
    pub node_in_coverage: bool,
    /// Slant range between the relay and the node, km
    pub distance_to_node: f64,
}

/// A fixed downlink site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundStation {
    /// Station name, used as the report key
    pub name: String,
    /// Station position
    pub position: Position,
}

impl GroundStation {
    /// Creates a new ground station.
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Relay ephemeris prepared against a fixed node.
///
/// Shared read-only by every station run.
#[derive(Debug, Clone)]
pub struct Ephemeris {
    steps: Vec<Timestep>,
}

impl Ephemeris {
    /// Resolves node distance and visibility for every row.
    ///
    /// Rows are expected in strictly increasing time order; the loaders in
    /// [`crate::input`] enforce this.
    pub fn prepare(rows: &[EphemerisRow], node: Position, coverage: &CoverageModel) -> Self {
        let steps: Vec<Timestep> = rows
            .iter()
            .map(|row| {
                let distance_to_node = distance(&row.position, &node);
                Timestep {
                    time: row.time,
                    position: row.position,
                    node_in_coverage: coverage.in_coverage(distance_to_node),
                    distance_to_node,
                }
            })
            .collect();

        let visible = steps.iter().filter(|s| s.node_in_coverage).count();
        debug!(steps = steps.len(), visible, "Ephemeris prepared");

        Self { steps }
    }

    /// Builds an ephemeris from already prepared steps.
    pub fn from_steps(steps: Vec<Timestep>) -> Self {
        Self { steps }
    }

    /// Prepared steps, in time order
    pub fn steps(&self) -> &[Timestep] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the ephemeris holds no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

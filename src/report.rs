//! Per-station aggregation and summary rendering.

use std::fmt;

use serde::Serialize;

use crate::{
    error::Result,
    simulation::{Hop, RunEnd, StationRun},
};

/// Arithmetic mean, absent for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Averaged results of one station run.
///
/// A `None` metric means no packet of that kind occurred.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSummary {
    /// Station name
    pub station: String,
    /// Mean node to relay delay, s
    pub node_to_relay_s: Option<f64>,
    /// Mean relay to ground delay, s
    pub relay_to_ground_s: Option<f64>,
    /// Mean ground to relay delay, s
    pub ground_to_relay_s: Option<f64>,
    /// Mean relay to node delay, s
    pub relay_to_node_s: Option<f64>,
    /// Mean round trip, hours
    pub round_trip_h: Option<f64>,
    /// Packets sent by the node
    pub transmissions: usize,
    /// Completed round trips
    pub round_trips: usize,
    /// Terminal protocol state
    pub end: RunEnd,
}

impl StationSummary {
    /// Mean delay for `hop`
    pub fn mean_delay(&self, hop: Hop) -> Option<f64> {
        match hop {
            Hop::NodeToRelay => self.node_to_relay_s,
            Hop::RelayToGround => self.relay_to_ground_s,
            Hop::GroundToRelay => self.ground_to_relay_s,
            Hop::RelayToNode => self.relay_to_node_s,
        }
    }
}

impl From<&StationRun> for StationSummary {
    fn from(run: &StationRun) -> Self {
        Self {
            station: run.station.clone(),
            node_to_relay_s: mean(&run.log.node_to_relay),
            relay_to_ground_s: mean(&run.log.relay_to_ground),
            ground_to_relay_s: mean(&run.log.ground_to_relay),
            relay_to_node_s: mean(&run.log.relay_to_node),
            round_trip_h: mean(&run.round_trips_h),
            transmissions: run.log.node_to_relay.len(),
            round_trips: run.round_trips_h.len(),
            end: run.end,
        }
    }
}

/// Summary over every simulated station, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    /// One entry per station
    pub stations: Vec<StationSummary>,
}

impl Report {
    /// Builds a report from finished runs.
    pub fn from_runs(runs: &[StationRun]) -> Self {
        Self {
            stations: runs.iter().map(StationSummary::from).collect(),
        }
    }

    /// Pretty-printed JSON, absent metrics as `null`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct Metric(Option<f64>, usize, &'static str);

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v:.prec$} {unit}", prec = self.1, unit = self.2),
            None => f.write_str("n/a"),
        }
    }
}

impl fmt::Display for StationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results for {}:", self.station)?;
        for hop in Hop::ALL {
            writeln!(
                f,
                "  Mean {:<16} delay: {}",
                hop.label(),
                Metric(self.mean_delay(hop), 8, "s")
            )?;
        }
        writeln!(f, "  Mean round trip: {}", Metric(self.round_trip_h, 2, "h"))?;
        write!(
            f,
            "  Transmissions: {}, round trips: {}",
            self.transmissions, self.round_trips
        )?;

        match self.end {
            RunEnd::Idle => Ok(()),
            RunEnd::AwaitingGround => write!(f, " (last packet never reached the station)"),
            RunEnd::Stranded => write!(f, " (last response stranded at the relay)"),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, station) in self.stations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{station}")?;
        }
        Ok(())
    }
}

use chrono::TimeDelta;
use clap::Args;
use serde::Serialize;

use crate::{
    common::*,
    error::{Error, Result},
    geometry::CoverageModel,
};

/// Relay protocol parameters.
///
/// Every knob can be set from the command line or a `SPACELINK_*`
/// environment variable (a `.env` file is honoured by the binary).
#[derive(Debug, Clone, PartialEq, Args, Serialize)]
pub struct SimulationConfig {
    /// Ground footprint radius of the relay, km
    #[arg(long, env = "SPACELINK_COVERAGE_RADIUS_KM", default_value_t = COVERAGE_RADIUS_KM)]
    pub coverage_radius_km: f64,

    /// Relay altitude, km
    #[arg(long, env = "SPACELINK_RELAY_ALTITUDE_KM", default_value_t = RELAY_ALTITUDE_KM)]
    pub relay_altitude_km: f64,

    /// Per-packet transmission duration, s
    #[arg(long, env = "SPACELINK_TIME_ON_AIR_S", default_value_t = TIME_ON_AIR_S)]
    pub time_on_air_s: f64,

    /// Relay processing delay as a fraction of time on air
    #[arg(long, env = "SPACELINK_PROCESSING_DELAY_FACTOR", default_value_t = PROCESSING_DELAY_FACTOR)]
    pub processing_delay_factor: f64,

    /// Minimum wait between a reception at the node and its next transmission, minutes
    #[arg(long, env = "SPACELINK_MIN_INTERVAL_MIN", default_value_t = MIN_RETRANSMIT_INTERVAL_MIN)]
    pub min_interval_min: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            coverage_radius_km: COVERAGE_RADIUS_KM,
            relay_altitude_km: RELAY_ALTITUDE_KM,
            time_on_air_s: TIME_ON_AIR_S,
            processing_delay_factor: PROCESSING_DELAY_FACTOR,
            min_interval_min: MIN_RETRANSMIT_INTERVAL_MIN,
        }
    }
}

impl SimulationConfig {
    /// Checks every parameter is finite and within range.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("coverage radius", self.coverage_radius_km),
            ("relay altitude", self.relay_altitude_km),
            ("time on air", self.time_on_air_s),
            ("processing delay factor", self.processing_delay_factor),
        ];

        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }

        if self.coverage_radius_km == 0.0 {
            return Err(Error::config("coverage radius must be positive"));
        }

        if self.min_interval_min <= 0 {
            return Err(Error::config(format!(
                "minimum re-transmission interval must be positive, got {} min",
                self.min_interval_min
            )));
        }

        self.min_interval().map(|_| ())
    }

    /// Coverage model built from the radius and altitude.
    pub fn coverage(&self) -> CoverageModel {
        CoverageModel::new(self.coverage_radius_km, self.relay_altitude_km)
    }

    /// Relay processing delay, s
    pub fn processing_delay_s(&self) -> f64 {
        self.processing_delay_factor * self.time_on_air_s
    }

    /// Minimum re-transmission interval.
    ///
    /// Fails when the minute count does not fit a [`TimeDelta`].
    pub fn min_interval(&self) -> Result<TimeDelta> {
        TimeDelta::try_minutes(self.min_interval_min).ok_or_else(|| {
            Error::config(format!(
                "minimum re-transmission interval of {} min is out of range",
                self.min_interval_min
            ))
        })
    }
}

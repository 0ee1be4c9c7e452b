/// Ground footprint radius of the relay, in km
pub static COVERAGE_RADIUS_KM: f64 = 2300.0;

/// Relay altitude above the ground points, in km
pub static RELAY_ALTITUDE_KM: f64 = 600.0;

/// Signal speed used for propagation latency (speed of light, rounded), km/s
pub static SIGNAL_SPEED_KM_S: f64 = 300_000.0;

/// Per-packet transmission duration
pub static TIME_ON_AIR_S: f64 = 0.741376;

/// Processing delay as a fraction of time on air
pub static PROCESSING_DELAY_FACTOR: f64 = 0.01;

/// Minimum interval between a reception at the node and its next transmission
pub static MIN_RETRANSMIT_INTERVAL_MIN: i64 = 30;

/// Ephemeris timestamp column
pub static TIME_COLUMN: &str = "Time";

/// Position columns shared by every input file
pub static POSITION_COLUMNS: [&str; 3] = ["x (km)", "y (km)", "z (km)"];

/// Ground station name column
pub static STATION_NAME_COLUMN: &str = "Name_of_Ground_Station";

//! Coverage-gated relay protocol simulation.
//!
//! A single packet at a time travels node → relay → ground station → relay →
//! node. The walk over the ephemeris decides when each hop can happen from the
//! relay's visibility of the node and of the station.

use chrono::{NaiveDateTime, TimeDelta};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::{
    config::SimulationConfig,
    ephemeris::{Ephemeris, GroundStation, Timestep},
    error::Result,
    geometry::{CoverageModel, distance, propagation_latency},
};

static SECONDS_PER_HOUR: f64 = 3600.0;

/// Directed packet transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hop {
    /// Node uplink of a new packet
    NodeToRelay,
    /// Relay downlink of the packet to the station
    RelayToGround,
    /// Station acknowledgment back to the relay
    GroundToRelay,
    /// Relay delivery of the response to the node
    RelayToNode,
}

impl Hop {
    /// Every hop, in protocol order
    pub const ALL: [Hop; 4] = [
        Hop::NodeToRelay,
        Hop::RelayToGround,
        Hop::GroundToRelay,
        Hop::RelayToNode,
    ];

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Hop::NodeToRelay => "node -> relay",
            Hop::RelayToGround => "relay -> ground",
            Hop::GroundToRelay => "ground -> relay",
            Hop::RelayToNode => "relay -> node",
        }
    }
}

/// One logged hop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HopEvent {
    /// Ephemeris index the hop happened at
    pub step: usize,
    /// Ephemeris time of the hop
    pub time: NaiveDateTime,
    /// Hop kind
    pub hop: Hop,
    /// Hop delay, s
    pub delay_s: f64,
    /// Link distance, km
    pub distance_km: f64,
}

/// Delay values per hop kind, in logging order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventLog {
    /// Node to relay delays, s
    pub node_to_relay: Vec<f64>,
    /// Relay to ground delays, s
    pub relay_to_ground: Vec<f64>,
    /// Ground to relay delays, s
    pub ground_to_relay: Vec<f64>,
    /// Relay to node delays, s
    pub relay_to_node: Vec<f64>,
}

impl EventLog {
    /// Delays logged for `hop`
    pub fn delays(&self, hop: Hop) -> &[f64] {
        match hop {
            Hop::NodeToRelay => &self.node_to_relay,
            Hop::RelayToGround => &self.relay_to_ground,
            Hop::GroundToRelay => &self.ground_to_relay,
            Hop::RelayToNode => &self.relay_to_node,
        }
    }

    fn push(&mut self, hop: Hop, delay_s: f64) {
        match hop {
            Hop::NodeToRelay => self.node_to_relay.push(delay_s),
            Hop::RelayToGround => self.relay_to_ground.push(delay_s),
            Hop::GroundToRelay => self.ground_to_relay.push(delay_s),
            Hop::RelayToNode => self.relay_to_node.push(delay_s),
        }
    }
}

/// Where the protocol stood when the ephemeris ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEnd {
    /// No packet outstanding
    Idle,
    /// A packet was still waiting for the relay to reach the station
    AwaitingGround,
    /// The station answered but the relay never saw the node again
    Stranded,
}

/// Result of one station run.
#[derive(Debug, Clone, Serialize)]
pub struct StationRun {
    /// Station name
    pub station: String,
    /// Per-hop delays
    pub log: EventLog,
    /// Completed round trips, hours
    pub round_trips_h: Vec<f64>,
    /// Every hop in logging order
    pub events: Vec<HopEvent>,
    /// Whether the node was allowed to transmit at the end
    pub node_can_transmit: bool,
    /// Terminal protocol state
    pub end: RunEnd,
}

/// Mutable protocol state, private to one station run.
struct SimulationState {
    node_can_transmit: bool,
    packet_pending: bool,
    stranded: bool,
    /// `None` leaves the gate open, as if the last reception lay arbitrarily far back
    last_reception_time: Option<NaiveDateTime>,
    transmission_start_time: Option<NaiveDateTime>,
    log: EventLog,
    round_trips_h: Vec<f64>,
    events: Vec<HopEvent>,
}

impl SimulationState {
    /// Seeds the last reception one interval before the first step, so the
    /// node may transmit on the very first step.
    fn new(first_time: NaiveDateTime, min_interval: TimeDelta) -> Self {
        Self::with_last_reception(first_time.checked_sub_signed(min_interval))
    }

    fn with_last_reception(last_reception_time: Option<NaiveDateTime>) -> Self {
        Self {
            node_can_transmit: true,
            packet_pending: false,
            stranded: false,
            last_reception_time,
            transmission_start_time: None,
            log: EventLog::default(),
            round_trips_h: Vec::new(),
            events: Vec::new(),
        }
    }

    fn record(&mut self, step: usize, ts: &Timestep, hop: Hop, delay_s: f64, distance_km: f64) {
        self.log.push(hop, delay_s);
        self.events.push(HopEvent {
            step,
            time: ts.time,
            hop,
            delay_s,
            distance_km,
        });

        trace!(
            time = %ts.time,
            hop = hop.label(),
            delay_s,
            distance_km,
            total = self.log.delays(hop).len(),
            "Packet sent"
        );
    }

    fn finish(self, station: &GroundStation) -> StationRun {
        let end = if self.packet_pending {
            RunEnd::AwaitingGround
        } else if self.stranded {
            RunEnd::Stranded
        } else {
            RunEnd::Idle
        };

        StationRun {
            station: station.name.clone(),
            log: self.log,
            round_trips_h: self.round_trips_h,
            events: self.events,
            node_can_transmit: self.node_can_transmit,
            end,
        }
    }
}

/// Runs the relay protocol over a prepared ephemeris.
///
/// Holds only shared, immutable inputs; every [`RelaySimulator::run`] call
/// owns its own state, so station runs can execute in parallel.
#[derive(Debug, Clone)]
pub struct RelaySimulator<'a> {
    ephemeris: &'a Ephemeris,
    coverage: CoverageModel,
    time_on_air_s: f64,
    processing_delay_s: f64,
    min_interval: TimeDelta,
}

impl<'a> RelaySimulator<'a> {
    /// Creates a simulator over `ephemeris`.
    ///
    /// The ephemeris must have been prepared with the same coverage model as
    /// `config` describes. Fails when `config` does not validate.
    pub fn new(ephemeris: &'a Ephemeris, config: &SimulationConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            ephemeris,
            coverage: config.coverage(),
            time_on_air_s: config.time_on_air_s,
            processing_delay_s: config.processing_delay_s(),
            min_interval: config.min_interval()?,
        })
    }

    /// First step at or after `from` where the node is visible to the relay.
    fn next_node_window(&self, from: usize) -> Option<usize> {
        let steps = self.ephemeris.steps();
        (from..steps.len()).find(|&i| steps[i].node_in_coverage)
    }

    /// Simulates the protocol for one ground station.
    #[instrument(skip(self, station), fields(station = %station.name))]
    pub fn run(&self, station: &GroundStation) -> StationRun {
        let steps = self.ephemeris.steps();
        let Some(first) = steps.first() else {
            debug!("Empty ephemeris");
            return SimulationState::with_last_reception(None).finish(station);
        };

        let mut state = SimulationState::new(first.time, self.min_interval);

        for (step, ts) in steps.iter().enumerate() {
            if state.node_can_transmit
                && ts.node_in_coverage
                && state
                    .last_reception_time
                    .is_none_or(|last| ts.time - last >= self.min_interval)
            {
                let delay = propagation_latency(ts.distance_to_node) + self.time_on_air_s;
                state.record(step, ts, Hop::NodeToRelay, delay, ts.distance_to_node);

                state.transmission_start_time = Some(ts.time);
                state.node_can_transmit = false;
                state.packet_pending = true;
            }

            if !state.packet_pending {
                continue;
            }

            let station_distance = distance(&ts.position, &station.position);
            if !self.coverage.in_coverage(station_distance) {
                continue;
            }

            let downlink = propagation_latency(station_distance) + self.processing_delay_s;
            state.record(step, ts, Hop::RelayToGround, downlink, station_distance);
            state.packet_pending = false;

            // acknowledgment carries no time on air or processing
            let ack = propagation_latency(station_distance);
            state.record(step, ts, Hop::GroundToRelay, ack, station_distance);

            let Some(future) = self.next_node_window(step) else {
                warn!(time = %ts.time, "No node window left, response stranded");
                state.stranded = true;
                continue;
            };

            let future_ts = &steps[future];
            let delay = propagation_latency(future_ts.distance_to_node)
                + self.processing_delay_s
                + self.time_on_air_s;
            state.record(future, future_ts, Hop::RelayToNode, delay, future_ts.distance_to_node);

            if let Some(start) = state.transmission_start_time.take() {
                let elapsed = future_ts.time - start;
                let seconds = elapsed
                    .num_microseconds()
                    .map_or(elapsed.num_seconds() as f64, |us| us as f64 / 1e6);
                let hours = seconds / SECONDS_PER_HOUR;
                state.round_trips_h.push(hours);
                trace!(round_trip_h = hours, "Round trip completed");
            }

            state.node_can_transmit = true;
            state.last_reception_time = Some(future_ts.time);
        }

        let run = state.finish(station);
        debug!(
            transmissions = run.log.node_to_relay.len(),
            round_trips = run.round_trips_h.len(),
            end = ?run.end,
            "Station run finished"
        );
        run
    }

    /// Runs every station in parallel, keeping input order.
    ///
    /// `on_done` is called once per finished run, from worker threads.
    pub fn run_all<F>(&self, stations: &[GroundStation], on_done: F) -> Vec<StationRun>
    where
        F: Fn(&StationRun) + Sync + Send,
    {
        stations
            .par_iter()
            .map(|station| {
                let run = self.run(station);
                on_done(&run);
                run
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;
    use chrono::NaiveDate;

    static NODE_VISIBLE_KM: f64 = 1200.0;
    static NODE_HIDDEN_KM: f64 = 9000.0;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn station() -> GroundStation {
        GroundStation::new("Svalbard", Position::new(0.0, 0.0, 0.0))
    }

    /// A step `minute` minutes in, with the node and station visibility given.
    fn step(minute: i64, node_visible: bool, over_station: bool) -> Timestep {
        Timestep {
            time: t0() + TimeDelta::minutes(minute),
            position: if over_station {
                Position::new(0.0, 0.0, 600.0)
            } else {
                Position::new(0.0, 0.0, 10_000.0)
            },
            node_in_coverage: node_visible,
            distance_to_node: if node_visible {
                NODE_VISIBLE_KM
            } else {
                NODE_HIDDEN_KM
            },
        }
    }

    fn run(steps: Vec<Timestep>) -> StationRun {
        run_with(steps, &SimulationConfig::default())
    }

    fn run_with(steps: Vec<Timestep>, config: &SimulationConfig) -> StationRun {
        let ephemeris = Ephemeris::from_steps(steps);
        RelaySimulator::new(&ephemeris, config).unwrap().run(&station())
    }

    fn hops(run: &StationRun) -> Vec<(usize, Hop)> {
        run.events.iter().map(|e| (e.step, e.hop)).collect()
    }

    #[test_log::test]
    fn test_single_cycle_then_wait() {
        let steps = (0..4).map(|i| step(i * 10, true, true)).collect();
        let run = run(steps);

        // full cycle at step 0, gate reopens 30 minutes after the reception
        assert_eq!(
            hops(&run),
            vec![
                (0, Hop::NodeToRelay),
                (0, Hop::RelayToGround),
                (0, Hop::GroundToRelay),
                (0, Hop::RelayToNode),
                (3, Hop::NodeToRelay),
                (3, Hop::RelayToGround),
                (3, Hop::GroundToRelay),
                (3, Hop::RelayToNode),
            ]
        );
        assert_eq!(run.round_trips_h, vec![0.0, 0.0]);
        assert_eq!(run.end, RunEnd::Idle);
        assert!(run.node_can_transmit);
    }

    #[test_log::test]
    fn test_hop_delays() {
        let run = run(vec![step(0, true, true)]);
        let config = SimulationConfig::default();
        let proc = config.processing_delay_s();

        let uplink = NODE_VISIBLE_KM / 300_000.0 + config.time_on_air_s;
        let downlink = 600.0 / 300_000.0 + proc;
        let ack = 600.0 / 300_000.0;
        let response = NODE_VISIBLE_KM / 300_000.0 + proc + config.time_on_air_s;

        assert!((run.log.node_to_relay[0] - uplink).abs() < 1e-12);
        assert!((run.log.relay_to_ground[0] - downlink).abs() < 1e-12);
        assert!((run.log.ground_to_relay[0] - ack).abs() < 1e-12);
        assert!((run.log.relay_to_node[0] - response).abs() < 1e-12);
        assert_eq!(run.events[1].distance_km, 600.0);
    }

    #[test_log::test]
    fn test_gate_inclusive_boundary() {
        let run = run(vec![
            step(0, true, true),
            step(29, true, true),
            step(30, true, true),
        ]);

        let uplinks: Vec<usize> = run
            .events
            .iter()
            .filter(|e| e.hop == Hop::NodeToRelay)
            .map(|e| e.step)
            .collect();

        assert_eq!(uplinks, vec![0, 2]);
    }

    #[test_log::test]
    fn test_gate_measured_from_reception() {
        let run = run(vec![
            // sent, relay not yet over the station
            step(0, true, false),
            // delivered, node hidden
            step(10, false, true),
            // response reaches the node
            step(20, true, false),
            // 40 minutes after sending, only 20 after reception
            step(40, true, false),
            step(50, true, false),
        ]);

        assert_eq!(
            hops(&run),
            vec![
                (0, Hop::NodeToRelay),
                (1, Hop::RelayToGround),
                (1, Hop::GroundToRelay),
                (2, Hop::RelayToNode),
                (4, Hop::NodeToRelay),
            ]
        );
        assert!((run.round_trips_h[0] - 20.0 / 60.0).abs() < 1e-12);
        assert_eq!(run.end, RunEnd::AwaitingGround);
    }

    #[test_log::test]
    fn test_stranded_response() {
        let run = run(vec![
            step(0, true, true),
            step(30, true, false),
            step(40, false, true),
            step(50, false, false),
            step(60, false, true),
        ]);

        assert_eq!(run.log.node_to_relay.len(), 2);
        assert_eq!(run.log.relay_to_ground.len(), 2);
        assert_eq!(run.log.ground_to_relay.len(), 2);
        assert_eq!(run.log.relay_to_node.len(), 1);
        assert_eq!(run.round_trips_h.len(), run.log.node_to_relay.len() - 1);
        assert!(!run.node_can_transmit);
        assert_eq!(run.end, RunEnd::Stranded);
    }

    #[test_log::test]
    fn test_return_search_includes_delivery_step() {
        let mut delivery = step(10, true, true);
        delivery.distance_to_node = 1500.0;

        let mut later = step(20, true, true);
        later.distance_to_node = 2000.0;

        let run = run(vec![step(0, true, false), delivery, later]);
        let config = SimulationConfig::default();

        let response = run.events.last().unwrap();
        assert_eq!(response.hop, Hop::RelayToNode);
        assert_eq!(response.step, 1);
        assert_eq!(response.distance_km, 1500.0);

        let expected = 1500.0 / 300_000.0 + config.processing_delay_s() + config.time_on_air_s;
        assert!((response.delay_s - expected).abs() < 1e-12);
        assert!((run.round_trips_h[0] - 10.0 / 60.0).abs() < 1e-12);
    }

    #[test_log::test]
    fn test_half_hour_round_trip() {
        let run = run(vec![
            step(0, true, false),
            step(10, false, true),
            step(20, false, false),
            step(30, true, false),
        ]);

        assert_eq!(run.round_trips_h.len(), 1);
        assert!((run.round_trips_h[0] - 0.5).abs() < 1e-12);
        // reception at step 3 closes the gate for that same step
        assert_eq!(run.log.node_to_relay.len(), 1);
        assert_eq!(run.end, RunEnd::Idle);
    }

    #[test_log::test]
    fn test_round_trip_keeps_microseconds() {
        let mut response = step(30, true, false);
        response.time += TimeDelta::microseconds(500);

        let run = run(vec![step(0, true, false), step(10, false, true), response]);

        let expected = (1800.0 + 0.0005) / 3600.0;
        assert!((run.round_trips_h[0] - expected).abs() < 1e-12);
        assert!(run.round_trips_h[0] > 0.5);
    }

    #[test_log::test]
    fn test_interval_longer_than_calendar() {
        // the seed reception would fall before the earliest representable time
        let config = SimulationConfig {
            min_interval_min: 200_000_000_000,
            ..Default::default()
        };
        let run = run_with(
            vec![step(0, true, true), step(30, true, true), step(60, true, true)],
            &config,
        );

        assert_eq!(run.log.node_to_relay.len(), 1);
        assert_eq!(run.round_trips_h, vec![0.0]);
        assert_eq!(run.end, RunEnd::Idle);
    }

    #[test_log::test]
    fn test_rejects_invalid_config() {
        let ephemeris = Ephemeris::from_steps(vec![step(0, true, true)]);
        let config = SimulationConfig {
            min_interval_min: i64::MAX,
            ..Default::default()
        };

        assert!(RelaySimulator::new(&ephemeris, &config).is_err());
    }

    #[test_log::test]
    fn test_node_never_visible() {
        let run = run((0..5).map(|i| step(i * 10, false, true)).collect());

        assert!(run.events.is_empty());
        assert!(run.round_trips_h.is_empty());
        for hop in Hop::ALL {
            assert!(run.log.delays(hop).is_empty());
        }
        assert!(run.node_can_transmit);
        assert_eq!(run.end, RunEnd::Idle);
    }

    #[test_log::test]
    fn test_station_never_visible() {
        let run = run((0..5).map(|i| step(i * 40, true, false)).collect());

        assert_eq!(run.log.node_to_relay.len(), 1);
        assert!(run.log.relay_to_ground.is_empty());
        assert_eq!(run.end, RunEnd::AwaitingGround);
    }

    #[test_log::test]
    fn test_empty_ephemeris() {
        let run = run(Vec::new());

        assert!(run.events.is_empty());
        assert_eq!(run.end, RunEnd::Idle);
    }

    #[test_log::test]
    fn test_run_all_independent_and_ordered() {
        let steps = vec![step(0, true, true), step(30, true, true)];
        let ephemeris = Ephemeris::from_steps(steps);
        let simulator = RelaySimulator::new(&ephemeris, &SimulationConfig::default()).unwrap();

        let stations = vec![
            station(),
            GroundStation::new("Far", Position::new(50_000.0, 0.0, 0.0)),
            GroundStation::new("Svalbard II", Position::new(0.0, 0.0, 0.0)),
        ];

        let done = std::sync::atomic::AtomicUsize::new(0);
        let runs = simulator.run_all(&stations, |_| {
            done.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        });

        assert_eq!(done.into_inner(), 3);
        assert_eq!(runs[0].station, "Svalbard");
        assert_eq!(runs[1].station, "Far");
        assert_eq!(runs[0].round_trips_h.len(), 2);
        assert!(runs[1].round_trips_h.is_empty());
        assert_eq!(runs[1].end, RunEnd::AwaitingGround);
        assert_eq!(runs[0].log, runs[2].log);
    }
}

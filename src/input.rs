//! CSV ingestion for the ephemeris, node and ground station files.
//!
//! All validation happens here, before any simulation starts. A missing column
//! or an unparseable value aborts the load with a descriptive [`Error`].

use std::{io, path::Path};

use chrono::{DateTime, NaiveDateTime};
use csv::{Reader, ReaderBuilder, StringRecord, Trim};
use tracing::{debug, instrument};

use crate::{
    common::*,
    ephemeris::{EphemerisRow, GroundStation},
    error::{Error, Result},
    geometry::Position,
};

const EPHEMERIS: &str = "ephemeris";
const NODE: &str = "node position";
const STATIONS: &str = "ground station list";

/// Naive layouts tried in order after RFC 3339.
static TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%d %b %Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses an ephemeris timestamp.
///
/// Offsets are folded into UTC and dropped, every other accepted layout is
/// read as a naive time in the ephemeris' own time scale.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn csv_reader<R: io::Read>(reader: R) -> Reader<R> {
    ReaderBuilder::new().trim(Trim::All).from_reader(reader)
}

fn open(path: &Path) -> Result<Reader<std::fs::File>> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn column(headers: &StringRecord, input: &'static str, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| Error::MissingColumn {
            input,
            column: name.to_string(),
        })
}

fn position_columns(headers: &StringRecord, input: &'static str) -> Result<[usize; 3]> {
    Ok([
        column(headers, input, POSITION_COLUMNS[0])?,
        column(headers, input, POSITION_COLUMNS[1])?,
        column(headers, input, POSITION_COLUMNS[2])?,
    ])
}

fn number(
    record: &StringRecord,
    headers: &StringRecord,
    idx: usize,
    input: &'static str,
    row: usize,
) -> Result<f64> {
    let value = record.get(idx).unwrap_or_default();

    value.parse::<f64>().map_err(|_| Error::InvalidNumber {
        input,
        row,
        column: headers.get(idx).unwrap_or_default().to_string(),
        value: value.to_string(),
    })
}

fn position(
    record: &StringRecord,
    headers: &StringRecord,
    [x, y, z]: [usize; 3],
    input: &'static str,
    row: usize,
) -> Result<Position> {
    Ok(Position::new(
        number(record, headers, x, input, row)?,
        number(record, headers, y, input, row)?,
        number(record, headers, z, input, row)?,
    ))
}

/// Reads relay ephemeris rows from CSV text.
///
/// Requires a `Time` column and the `x (km)`, `y (km)`, `z (km)` position
/// columns; row times must strictly increase.
pub fn read_ephemeris<R: io::Read>(reader: R) -> Result<Vec<EphemerisRow>> {
    parse_ephemeris(csv_reader(reader))
}

/// Loads relay ephemeris rows from a CSV file.
#[instrument]
pub fn load_ephemeris(path: &Path) -> Result<Vec<EphemerisRow>> {
    parse_ephemeris(open(path)?)
}

fn parse_ephemeris<R: io::Read>(mut reader: Reader<R>) -> Result<Vec<EphemerisRow>> {
    let headers = reader.headers()?.clone();
    let time_idx = column(&headers, EPHEMERIS, TIME_COLUMN)?;
    let pos_idx = position_columns(&headers, EPHEMERIS)?;

    let mut rows: Vec<EphemerisRow> = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;

        let raw_time = record.get(time_idx).unwrap_or_default();
        let time = parse_timestamp(raw_time).ok_or_else(|| Error::InvalidTimestamp {
            row,
            value: raw_time.to_string(),
        })?;

        if let Some(prev) = rows.last()
            && time <= prev.time
        {
            return Err(Error::NonMonotonicTime { row });
        }

        rows.push(EphemerisRow {
            time,
            position: position(&record, &headers, pos_idx, EPHEMERIS, row)?,
        });
    }

    if rows.is_empty() {
        return Err(Error::Empty { input: EPHEMERIS });
    }

    debug!(rows = rows.len(), "Ephemeris loaded");
    Ok(rows)
}

/// Reads the node position from the first row of CSV text.
///
/// Uses the named position columns when present, otherwise the first three
/// columns of the row.
pub fn read_node<R: io::Read>(reader: R) -> Result<Position> {
    parse_node(csv_reader(reader))
}

/// Loads the node position from a CSV file.
#[instrument]
pub fn load_node(path: &Path) -> Result<Position> {
    parse_node(open(path)?)
}

fn parse_node<R: io::Read>(mut reader: Reader<R>) -> Result<Position> {
    let headers = reader.headers()?.clone();

    let pos_idx = match position_columns(&headers, NODE) {
        Ok(idx) => idx,
        Err(_) if headers.len() >= 3 => [0, 1, 2],
        Err(e) => return Err(e),
    };

    let record = reader
        .records()
        .next()
        .ok_or(Error::Empty { input: NODE })??;

    position(&record, &headers, pos_idx, NODE, 1)
}

/// Reads ground stations from CSV text.
///
/// Requires `Name_of_Ground_Station` and the three position columns.
pub fn read_ground_stations<R: io::Read>(reader: R) -> Result<Vec<GroundStation>> {
    parse_ground_stations(csv_reader(reader))
}

/// Loads ground stations from a CSV file.
#[instrument]
pub fn load_ground_stations(path: &Path) -> Result<Vec<GroundStation>> {
    parse_ground_stations(open(path)?)
}

fn parse_ground_stations<R: io::Read>(mut reader: Reader<R>) -> Result<Vec<GroundStation>> {
    let headers = reader.headers()?.clone();
    let name_idx = column(&headers, STATIONS, STATION_NAME_COLUMN)?;
    let pos_idx = position_columns(&headers, STATIONS)?;

    let stations = reader
        .records()
        .enumerate()
        .map(|(i, record)| -> Result<GroundStation> {
            let record = record?;
            let name = record.get(name_idx).unwrap_or_default();
            let position = position(&record, &headers, pos_idx, STATIONS, i + 1)?;
            Ok(GroundStation::new(name, position))
        })
        .collect::<Result<Vec<GroundStation>>>()?;

    if stations.is_empty() {
        return Err(Error::Empty { input: STATIONS });
    }

    debug!(stations = stations.len(), "Ground stations loaded");
    Ok(stations)
}

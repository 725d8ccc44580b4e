//! Key derivation and the per-row emission protocol.

use std::sync::Arc;
use tracing::trace;

use crate::engine::{Counter, Counters};
use crate::models::{ColumnRef, CompositeKey, ResolutionValue, StationColumn, StationMetadata};
use crate::models::is_missing_value;
use crate::utils::constants::{HOUR_PREFIX_LEN, POLLUTION_DELIMITER};

pub struct KeyBuilder;

impl KeyBuilder {
    /// Metadata rows are keyed by station. `line` is the row's position in
    /// its file and decides which duplicate wins.
    pub fn metadata(line: usize, station: StationMetadata) -> (CompositeKey, ResolutionValue) {
        (
            CompositeKey::Station(station.station_id.clone()),
            ResolutionValue::Metadata { line, station },
        )
    }

    pub fn column_mapping(
        source: &Arc<str>,
        index: usize,
        column: StationColumn,
    ) -> (CompositeKey, ResolutionValue) {
        (
            CompositeKey::Column(ColumnRef::new(source.clone(), index)),
            ResolutionValue::Mapping(column),
        )
    }

    /// Raw cells travel under their column's key so they meet the column
    /// mapping in one group; the timestamp rides in the value.
    pub fn data_cell(
        source: &Arc<str>,
        index: usize,
        timestamp: &str,
        value: &str,
    ) -> (CompositeKey, ResolutionValue) {
        (
            CompositeKey::Column(ColumnRef::new(source.clone(), index)),
            ResolutionValue::Cell {
                timestamp: timestamp.to_string(),
                value: value.to_string(),
            },
        )
    }

    pub fn station(station_id: &str) -> CompositeKey {
        CompositeKey::Station(station_id.to_string())
    }

    pub fn station_time(station_id: &str, timestamp: &str) -> CompositeKey {
        CompositeKey::StationTime {
            station_id: station_id.to_string(),
            timestamp: timestamp.to_string(),
        }
    }

    /// Hour bucket key; `None` when the timestamp has no full hour prefix.
    pub fn time_station(timestamp: &str, station_id: &str) -> Option<CompositeKey> {
        let hour = hour_prefix(timestamp)?;
        Some(CompositeKey::TimeStation {
            hour: hour.to_string(),
            station_id: station_id.to_string(),
        })
    }
}

/// `yyyy-MM-ddTHH` of an ISO-8601-like timestamp
pub fn hour_prefix(timestamp: &str) -> Option<&str> {
    timestamp.get(..HOUR_PREFIX_LEN)
}

/// A wide-file data row reduced to its usable cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRow<'a> {
    pub timestamp: &'a str,
    /// (column index, trimmed value) of every non-empty numeric cell
    pub cells: Vec<(usize, &'a str)>,
}

impl<'a> DataRow<'a> {
    /// Returns `None` for rows without a timestamp or value columns.
    /// Empty and non-numeric cells are counted and left out.
    pub fn parse(line: &'a str, counters: &mut Counters) -> Option<Self> {
        let parts: Vec<&str> = line.split(POLLUTION_DELIMITER).collect();
        let timestamp = parts[0].trim();
        if parts.len() <= 1 || timestamp.is_empty() {
            counters.incr(Counter::MalformedDataLines);
            trace!(line, "malformed data line");
            return None;
        }

        let mut cells = Vec::with_capacity(parts.len() - 1);
        for (index, raw) in parts.iter().enumerate().skip(1) {
            let value = raw.trim();
            if is_missing_value(value) {
                counters.incr(Counter::EmptyValues);
            } else if value.parse::<f64>().is_err() {
                counters.incr(Counter::MalformedValues);
            } else {
                cells.push((index, value));
            }
        }

        Some(Self { timestamp, cells })
    }
}

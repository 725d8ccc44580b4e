//! Composite grouping keys and the tagged values routed through them.
//!
//! Every key renders to a tagged text form so that metadata rows, column
//! mappings and data rows can share one key space and still be told apart
//! by the reduce step, by intermediate files and by a person reading logs.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ProcessingError, Result};
use crate::models::{Pollutant, StationMetadata};

pub const STATION_TAG: &str = "STATION:";
pub const MAPPING_TAG: &str = "MAPPING:";
pub const STATION_TIME_TAG: &str = "ST:";
pub const TIME_STATION_TAG: &str = "TS:";

const STATION_TIME_SEPARATOR: char = '#';
const TIME_STATION_SEPARATOR: char = '|';
const COLUMN_SEPARATOR: char = ':';

/// A column of one wide input file. Indices are only meaningful within
/// their source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub source: Arc<str>,
    pub index: usize,
}

impl ColumnRef {
    pub fn new(source: Arc<str>, index: usize) -> Self {
        Self { source, index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompositeKey {
    /// Metadata rows and phase-1 intermediate records
    Station(String),
    /// Column-mapping rows and the raw cells of that column
    Column(ColumnRef),
    /// Pivot groups
    StationTime {
        station_id: String,
        timestamp: String,
    },
    /// Weather/pollution buckets
    TimeStation { hour: String, station_id: String },
}

impl CompositeKey {
    pub fn tag(&self) -> &'static str {
        match self {
            CompositeKey::Station(_) => STATION_TAG,
            CompositeKey::Column(_) => MAPPING_TAG,
            CompositeKey::StationTime { .. } => STATION_TIME_TAG,
            CompositeKey::TimeStation { .. } => TIME_STATION_TAG,
        }
    }

    pub fn station_id(&self) -> Option<&str> {
        match self {
            CompositeKey::Station(id)
            | CompositeKey::StationTime { station_id: id, .. }
            | CompositeKey::TimeStation { station_id: id, .. } => Some(id),
            CompositeKey::Column(_) => None,
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())?;
        match self {
            CompositeKey::Station(id) => write!(f, "{}", id),
            CompositeKey::Column(col) => write!(f, "{}{}{}", col.source, COLUMN_SEPARATOR, col.index),
            CompositeKey::StationTime {
                station_id,
                timestamp,
            } => write!(f, "{}{}{}", station_id, STATION_TIME_SEPARATOR, timestamp),
            CompositeKey::TimeStation { hour, station_id } => {
                write!(f, "{}{}{}", hour, TIME_STATION_SEPARATOR, station_id)
            }
        }
    }
}

impl FromStr for CompositeKey {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProcessingError::InvalidFormat(format!("Invalid composite key: '{}'", s));

        if let Some(id) = s.strip_prefix(STATION_TAG) {
            if id.is_empty() {
                return Err(invalid());
            }
            Ok(CompositeKey::Station(id.to_string()))
        } else if let Some(rest) = s.strip_prefix(MAPPING_TAG) {
            let (source, index) = rest.rsplit_once(COLUMN_SEPARATOR).ok_or_else(invalid)?;
            let index = index.parse::<usize>().map_err(|_| invalid())?;
            Ok(CompositeKey::Column(ColumnRef::new(Arc::from(source), index)))
        } else if let Some(rest) = s.strip_prefix(STATION_TIME_TAG) {
            let (station_id, timestamp) =
                rest.split_once(STATION_TIME_SEPARATOR).ok_or_else(invalid)?;
            Ok(CompositeKey::StationTime {
                station_id: station_id.to_string(),
                timestamp: timestamp.to_string(),
            })
        } else if let Some(rest) = s.strip_prefix(TIME_STATION_TAG) {
            let (hour, station_id) = rest.split_once(TIME_STATION_SEPARATOR).ok_or_else(invalid)?;
            Ok(CompositeKey::TimeStation {
                hour: hour.to_string(),
                station_id: station_id.to_string(),
            })
        } else {
            Err(invalid())
        }
    }
}

/// Resolved meaning of one wide-file column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StationColumn {
    pub station_id: String,
    pub pollutant: Pollutant,
}

/// Values emitted in the column-resolution round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionValue {
    Metadata { line: usize, station: StationMetadata },
    Mapping(StationColumn),
    Cell { timestamp: String, value: String },
}

/// Side tag for the weather/pollution join.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceLine {
    Pollution(String),
    Weather(String),
}

use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};
use crate::models::Pollutant;
use crate::utils::constants::{MISSING_VALUE, POLLUTION_DELIMITER};

/// A single pollutant reading for one station at one timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: String,
    pub station_id: String,
    pub pollutant: Pollutant,
    pub value: String,
}

impl Measurement {
    pub fn new(timestamp: String, station_id: String, pollutant: Pollutant, value: String) -> Self {
        Self {
            timestamp,
            station_id,
            pollutant,
            value,
        }
    }

    pub fn is_missing(&self) -> bool {
        is_missing_value(&self.value)
    }

    /// `timestamp,pollutant,value`, the phase-1 intermediate payload
    pub fn to_intermediate(&self) -> String {
        format!(
            "{}{d}{}{d}{}",
            self.timestamp,
            self.pollutant,
            self.value,
            d = POLLUTION_DELIMITER
        )
    }

    /// Parse an intermediate payload; the station comes from the record key.
    pub fn from_intermediate(station_id: &str, payload: &str) -> Result<Self> {
        let mut parts = payload.splitn(3, POLLUTION_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(timestamp), Some(pollutant), Some(value)) if !timestamp.is_empty() => {
                Ok(Self::new(
                    timestamp.to_string(),
                    station_id.to_string(),
                    pollutant.parse()?,
                    value.to_string(),
                ))
            }
            _ => Err(ProcessingError::InvalidFormat(format!(
                "Invalid intermediate record: '{}'",
                payload
            ))),
        }
    }
}

/// Empty cells and the `NA` token both mean "no reading".
pub fn is_missing_value(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == MISSING_VALUE
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProcessingError, Result};

/// Pollutants published in the wide-format feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "PM10")]
    Pm10,
    #[serde(rename = "PM25", alias = "PM2.5")]
    Pm25,
    #[serde(rename = "SO2")]
    So2,
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "C6H6")]
    C6h6,
}

impl Pollutant {
    pub const ALL: [Pollutant; 5] = [
        Pollutant::Pm10,
        Pollutant::Pm25,
        Pollutant::So2,
        Pollutant::No2,
        Pollutant::C6h6,
    ];

    /// Canonical token used in output and intermediate records
    pub fn as_str(&self) -> &'static str {
        match self {
            Pollutant::Pm10 => "PM10",
            Pollutant::Pm25 => "PM25",
            Pollutant::So2 => "SO2",
            Pollutant::No2 => "NO2",
            Pollutant::C6h6 => "C6H6",
        }
    }

    /// Spellings accepted in header cells
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Pollutant::Pm25 => &["PM25", "PM2.5"],
            Pollutant::Pm10 => &["PM10"],
            Pollutant::So2 => &["SO2"],
            Pollutant::No2 => &["NO2"],
            Pollutant::C6h6 => &["C6H6"],
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pollutant {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        Pollutant::ALL
            .into_iter()
            .find(|p| p.aliases().contains(&s))
            .ok_or_else(|| ProcessingError::InvalidFormat(format!("Unknown pollutant: '{}'", s)))
    }
}

/// Ordered set of pollutants that drives header matching and output columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Pollutant>", into = "Vec<Pollutant>")]
pub struct PollutantSet(Vec<Pollutant>);

impl PollutantSet {
    pub fn new(pollutants: Vec<Pollutant>) -> Result<Self> {
        if pollutants.is_empty() {
            return Err(ProcessingError::Config(
                "Pollutant set must contain at least one pollutant".to_string(),
            ));
        }
        let mut seen = Vec::with_capacity(pollutants.len());
        for p in &pollutants {
            if seen.contains(p) {
                return Err(ProcessingError::Config(format!(
                    "Pollutant {} listed twice",
                    p
                )));
            }
            seen.push(*p);
        }
        Ok(Self(pollutants))
    }

    pub fn iter(&self) -> impl Iterator<Item = Pollutant> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, pollutant: Pollutant) -> bool {
        self.0.contains(&pollutant)
    }

    pub fn position(&self, pollutant: Pollutant) -> Option<usize> {
        self.0.iter().position(|p| *p == pollutant)
    }

    pub fn as_slice(&self) -> &[Pollutant] {
        &self.0
    }
}

impl Default for PollutantSet {
    /// PM10, PM25, SO2, NO2, C6H6
    fn default() -> Self {
        Self(Pollutant::ALL.to_vec())
    }
}

impl TryFrom<Vec<Pollutant>> for PollutantSet {
    type Error = ProcessingError;

    fn try_from(value: Vec<Pollutant>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PollutantSet> for Vec<Pollutant> {
    fn from(value: PollutantSet) -> Self {
        value.0
    }
}

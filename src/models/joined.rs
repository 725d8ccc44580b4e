use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::{Pollutant, PollutantSet, StationMetadata};

/// One wide output row: a station at a timestamp with its metadata and a
/// value slot for every configured pollutant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRecord {
    pub timestamp: String,
    pub station_id: String,
    pub metadata: StationMetadata,
    /// In `PollutantSet` order; `None` renders as the empty marker
    pub values: Vec<(Pollutant, Option<String>)>,
}

impl JoinedRecord {
    pub fn value(&self, pollutant: Pollutant) -> Option<&str> {
        self.values
            .iter()
            .find(|(p, _)| *p == pollutant)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// `timestamp,stationId,internationalId,lat,lon,<pollutants>`
    #[default]
    Comma,
    /// `lat\tlon\tstationId\tstate\tcity\ttime\t<pollutants>`
    Tab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutColumn {
    Timestamp,
    /// Timestamp under the tab layout's `time` heading
    Time,
    StationId,
    InternationalId,
    Latitude,
    Longitude,
    State,
    City,
    Pollutant(Pollutant),
}

impl LayoutColumn {
    fn header(&self) -> &'static str {
        match self {
            LayoutColumn::Timestamp => "timestamp",
            LayoutColumn::Time => "time",
            LayoutColumn::StationId => "stationId",
            LayoutColumn::InternationalId => "internationalId",
            LayoutColumn::Latitude => "lat",
            LayoutColumn::Longitude => "lon",
            LayoutColumn::State => "state",
            LayoutColumn::City => "city",
            LayoutColumn::Pollutant(p) => p.as_str(),
        }
    }
}

/// Delimiter plus column order for rendering joined records. Both published
/// layouts go through this one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    delimiter: u8,
    columns: Vec<LayoutColumn>,
}

/// Pollutant order of the tab-delimited layout
const TAB_POLLUTANT_ORDER: [Pollutant; 5] = [
    Pollutant::C6h6,
    Pollutant::Pm10,
    Pollutant::Pm25,
    Pollutant::No2,
    Pollutant::So2,
];

impl RowLayout {
    pub fn new(delimiter: u8, columns: Vec<LayoutColumn>) -> Self {
        Self { delimiter, columns }
    }

    pub fn for_kind(kind: LayoutKind, pollutants: &PollutantSet) -> Self {
        match kind {
            LayoutKind::Comma => Self::comma(pollutants),
            LayoutKind::Tab => Self::tab(pollutants),
        }
    }

    pub fn comma(pollutants: &PollutantSet) -> Self {
        let mut columns = vec![
            LayoutColumn::Timestamp,
            LayoutColumn::StationId,
            LayoutColumn::InternationalId,
            LayoutColumn::Latitude,
            LayoutColumn::Longitude,
        ];
        columns.extend(pollutants.iter().map(LayoutColumn::Pollutant));
        Self::new(b',', columns)
    }

    pub fn tab(pollutants: &PollutantSet) -> Self {
        let mut columns = vec![
            LayoutColumn::Latitude,
            LayoutColumn::Longitude,
            LayoutColumn::StationId,
            LayoutColumn::State,
            LayoutColumn::City,
            LayoutColumn::Time,
        ];
        columns.extend(
            TAB_POLLUTANT_ORDER
                .into_iter()
                .filter(|p| pollutants.contains(*p))
                .map(LayoutColumn::Pollutant),
        );
        Self::new(b'\t', columns)
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn columns(&self) -> &[LayoutColumn] {
        &self.columns
    }

    pub fn header(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header().to_string()).collect()
    }

    pub fn fields(&self, record: &JoinedRecord, empty_marker: &str) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| match column {
                LayoutColumn::Timestamp | LayoutColumn::Time => record.timestamp.clone(),
                LayoutColumn::StationId => record.station_id.clone(),
                LayoutColumn::InternationalId => record.metadata.international_id.clone(),
                LayoutColumn::Latitude => record.metadata.latitude.clone(),
                LayoutColumn::Longitude => record.metadata.longitude.clone(),
                LayoutColumn::State => record.metadata.state.clone(),
                LayoutColumn::City => record.metadata.city.clone(),
                LayoutColumn::Pollutant(p) => record.value(*p).unwrap_or(empty_marker).to_string(),
            })
            .collect()
    }

    pub fn render(&self, record: &JoinedRecord, empty_marker: &str) -> String {
        self.fields(record, empty_marker)
            .join(&char::from(self.delimiter).to_string())
    }
}

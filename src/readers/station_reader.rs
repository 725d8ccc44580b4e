use encoding_rs::{UTF_8, WINDOWS_1250};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::engine::{load_broadcast_file, Counter, Counters};
use crate::error::{ProcessingError, Result};
use crate::models::StationMetadata;
use crate::utils::constants::{
    METADATA_COL_CITY, METADATA_COL_INTERNATIONAL_ID, METADATA_COL_LATITUDE,
    METADATA_COL_LONGITUDE, METADATA_COL_STATE, METADATA_COL_STATION_ID, METADATA_DELIMITER,
    METADATA_MIN_COLUMNS,
};

/// Immutable station lookup keyed by station id. Ordered so that scans for
/// non-exact matches are deterministic.
pub type StationLookup = BTreeMap<String, StationMetadata>;

pub struct StationReader {
    skip_header: bool,
}

impl StationReader {
    pub fn new() -> Self {
        Self { skip_header: true }
    }

    pub fn with_skip_header(skip_header: bool) -> Self {
        Self { skip_header }
    }

    /// Load the broadcast metadata table. Missing, empty, or row-less
    /// tables abort the task.
    pub fn load_broadcast(&self, path: &Path, counters: &mut Counters) -> Result<StationLookup> {
        let local = load_broadcast_file(path)?;
        let lookup = self.read_stations_map(&local, counters)?;
        if lookup.is_empty() {
            return Err(ProcessingError::EmptyBroadcast(local));
        }
        info!(stations = lookup.len(), path = %local.display(), "station metadata loaded");
        Ok(lookup)
    }

    /// Read station metadata rows in file order
    pub fn read_stations(&self, path: &Path, counters: &mut Counters) -> Result<Vec<StationMetadata>> {
        let bytes = std::fs::read(path)?;
        let content = decode_metadata(&bytes);
        Ok(self.parse_stations(&content, counters))
    }

    pub fn parse_stations(&self, content: &str, counters: &mut Counters) -> Vec<StationMetadata> {
        let mut stations = Vec::new();
        let skip = usize::from(self.skip_header);

        for line in content.lines().skip(skip) {
            if line.trim().is_empty() {
                counters.incr(Counter::EmptyLinesSkipped);
                continue;
            }
            match self.parse_station_line(line) {
                Some(station) => stations.push(station),
                None => {
                    counters.incr(Counter::MalformedMetadataLines);
                    debug!(line, "skipping malformed metadata line");
                }
            }
        }

        stations
    }

    /// Parse a single `;`-delimited metadata row
    pub fn parse_station_line(&self, line: &str) -> Option<StationMetadata> {
        // Number;StationID;InternationalStationID;...;State;City;Address;lat;long
        let parts: Vec<&str> = line.split(METADATA_DELIMITER).map(|s| s.trim()).collect();

        if parts.len() < METADATA_MIN_COLUMNS {
            return None;
        }

        let station_id = parts[METADATA_COL_STATION_ID];
        if station_id.is_empty() {
            return None;
        }

        Some(StationMetadata::new(
            station_id.to_string(),
            parts[METADATA_COL_INTERNATIONAL_ID].to_string(),
            parts[METADATA_COL_LATITUDE].to_string(),
            parts[METADATA_COL_LONGITUDE].to_string(),
            parts[METADATA_COL_STATE].to_string(),
            parts[METADATA_COL_CITY].to_string(),
        ))
    }

    /// Read station metadata into a lookup; later rows replace earlier ones.
    pub fn read_stations_map(&self, path: &Path, counters: &mut Counters) -> Result<StationLookup> {
        let stations = self.read_stations(path, counters)?;
        Ok(build_lookup(stations, counters))
    }
}

impl Default for StationReader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_lookup(stations: Vec<StationMetadata>, counters: &mut Counters) -> StationLookup {
    let mut map = StationLookup::new();
    for station in stations {
        counters.incr(Counter::MetadataRowsLoaded);
        if let Some(previous) = map.insert(station.station_id.clone(), station) {
            counters.incr(Counter::DuplicateMetadataRows);
            debug!(station = %previous.station_id, "duplicate metadata row replaced");
        }
    }
    map
}

/// Metadata exports are UTF-8 or Windows-1250.
pub fn decode_metadata(bytes: &[u8]) -> Cow<'_, str> {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text;
    }
    warn!("station metadata is not valid UTF-8, decoding as Windows-1250");
    let (text, _, _) = WINDOWS_1250.decode(bytes);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Number;StationID;InternationalStationID;a;b;c;d;e;f;g;State;City;Address;lat;long";

    #[test]
    fn test_parse_station_line() {
        let reader = StationReader::new();
        let line = "1;STA01;INTL01;;;;;;;;MAZOWIECKIE;Warszawa;Addr;52.10;21.00";
        let station = reader.parse_station_line(line).unwrap();

        assert_eq!(station.station_id, "STA01");
        assert_eq!(station.international_id, "INTL01");
        assert_eq!(station.state, "MAZOWIECKIE");
        assert_eq!(station.city, "Warszawa");
        assert_eq!(station.latitude, "52.10");
        assert_eq!(station.longitude, "21.00");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let reader = StationReader::new();
        assert!(reader.parse_station_line("1;STA01;INTL01").is_none());
        assert!(reader
            .parse_station_line("1; ;INTL01;;;;;;;;S;C;A;52.1;21.0")
            .is_none());
    }

    #[test]
    fn test_read_stations_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "{}", HEADER)?;
        writeln!(temp_file, "1;STA01;INTL01;;;;;;;;MAZOWIECKIE;Warszawa;Addr;52.10;21.00")?;
        writeln!(temp_file)?;
        writeln!(temp_file, "2;STA02;INTL02;;;;;;;;SLASKIE;Katowice;Addr;50.26;19.02")?;
        writeln!(temp_file, "3;broken")?;
        writeln!(temp_file, "4;STA01;INTL99;;;;;;;;MAZOWIECKIE;Warszawa;Addr;52.20;21.10")?;

        let mut counters = Counters::new();
        let lookup = StationReader::new().read_stations_map(temp_file.path(), &mut counters)?;

        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup["STA01"].international_id, "INTL99");
        assert_eq!(lookup["STA02"].city, "Katowice");
        assert_eq!(counters.get(Counter::MalformedMetadataLines), 1);
        assert_eq!(counters.get(Counter::DuplicateMetadataRows), 1);
        assert_eq!(counters.get(Counter::MetadataRowsLoaded), 3);
        Ok(())
    }

    #[test]
    fn test_header_only_broadcast_is_fatal() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "{}", HEADER)?;
        let err = StationReader::new()
            .load_broadcast(temp_file.path(), &mut Counters::new())
            .unwrap_err();
        assert!(matches!(err, ProcessingError::EmptyBroadcast(_)));
        Ok(())
    }

    #[test]
    fn test_windows_1250_metadata() {
        // "Łódź" in Windows-1250
        let bytes = b"1;STA01;INTL01;;;;;;;;\xa3\xd3DZKIE;\xa3\xf3d\x9f;Addr;51.7;19.4";
        let text = decode_metadata(bytes);
        let station = StationReader::with_skip_header(false)
            .parse_stations(&text, &mut Counters::new())
            .remove(0);
        assert_eq!(station.city, "Łódź");
        assert_eq!(station.state, "ŁÓDZKIE");
    }

    #[test]
    fn test_utf8_bom_removed() {
        let text = decode_metadata("\u{feff}Number;StationID".as_bytes());
        assert_eq!(text, "Number;StationID");
    }
}

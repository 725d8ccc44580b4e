use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::readers::pollutant_reader::source_name;
use crate::utils::constants::{LEADING_FLOAT_PATTERN, WEATHER_HEADER_MARKERS};
use crate::utils::filename::WeatherFileName;

/// Lines of one Open-Meteo export with the station id its name encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherFile {
    pub source: String,
    /// `None` when the file name does not follow `openmeteo_<id>_<year>.csv`
    pub station_id: Option<String>,
    pub lines: Vec<String>,
}

pub struct WeatherReader {
    file_name: WeatherFileName,
}

impl WeatherReader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            file_name: WeatherFileName::new()?,
        })
    }

    /// Every regular file in `dir`, sorted by name
    pub fn read_dir(&self, dir: &Path) -> Result<Vec<WeatherFile>> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        paths.iter().map(|p| self.read_file(p)).collect()
    }

    pub fn read_file(&self, path: &Path) -> Result<WeatherFile> {
        let content = std::fs::read_to_string(path)?;
        let station_id = self.file_name.station_id(path);
        debug!(path = %path.display(), station = ?station_id, "weather file read");
        Ok(WeatherFile {
            source: source_name(path),
            station_id,
            lines: content.lines().map(str::to_string).collect(),
        })
    }
}

/// Open-Meteo exports open with a location preamble (`latitude,...` and a
/// row of bare coordinates) followed by a `time,...` column header.
pub struct WeatherHeaderFilter {
    coordinates: Regex,
}

impl WeatherHeaderFilter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            coordinates: Regex::new(LEADING_FLOAT_PATTERN)?,
        })
    }

    pub fn is_header(&self, line: &str) -> bool {
        WEATHER_HEADER_MARKERS.iter().any(|m| line.starts_with(m)) || self.coordinates.is_match(line)
    }
}

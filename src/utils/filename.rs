use chrono::{Datelike, Local};
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::utils::constants::WEATHER_FILE_PATTERN;

/// Matches `openmeteo_<stationId>_<year>.csv`.
pub struct WeatherFileName {
    pattern: Regex,
}

impl WeatherFileName {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(WEATHER_FILE_PATTERN)?,
        })
    }

    /// Extract the station id the file name encodes
    pub fn station_id(&self, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let caps = self.pattern.captures(name)?;
        Some(caps.get(1)?.as_str().to_string())
    }
}

/// Generate default output filename with format: airquality-joined-{YYMMDD}.{ext}
pub fn generate_default_output_filename(extension: &str) -> PathBuf {
    let now = Local::now();
    let year = now.year() % 100; // Get last 2 digits of year
    let month = now.month();
    let day = now.day();

    let filename = format!(
        "airquality-joined-{:02}{:02}{:02}.{}",
        year, month, day, extension
    );
    PathBuf::from("output").join(filename)
}

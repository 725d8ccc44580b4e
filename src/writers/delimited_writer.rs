use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::models::{JoinedRecord, RowLayout};
use crate::utils::constants::DEFAULT_BUFFER_SIZE;

/// Renders joined records through a `RowLayout`. Plain fields are never
/// quoted, so output matches `RowLayout::render` line for line.
pub struct DelimitedWriter {
    layout: RowLayout,
    empty_marker: String,
    include_header: bool,
}

impl DelimitedWriter {
    pub fn new(layout: RowLayout, empty_marker: &str) -> Self {
        Self {
            layout,
            empty_marker: empty_marker.to_string(),
            include_header: true,
        }
    }

    pub fn with_header(mut self, include_header: bool) -> Self {
        self.include_header = include_header;
        self
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    pub fn write_records(&self, records: &[JoinedRecord], path: &Path) -> Result<usize> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, File::create(path)?);
        self.write_to(records, file)?;
        info!(path = %path.display(), rows = records.len(), "delimited output written");
        Ok(records.len())
    }

    pub fn write_to<W: Write>(&self, records: &[JoinedRecord], writer: W) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.layout.delimiter())
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(writer);

        if self.include_header {
            writer.write_record(self.layout.header())?;
        }
        for record in records {
            writer.write_record(self.layout.fields(record, &self.empty_marker))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Write pre-rendered lines verbatim, one per line.
pub fn write_lines(lines: &[String], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, File::create(path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = lines.len(), "lines written");
    Ok(lines.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pollutant, PollutantSet, StationMetadata};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(city: &str) -> JoinedRecord {
        JoinedRecord {
            timestamp: "2024-01-01T00".to_string(),
            station_id: "STA01".to_string(),
            metadata: StationMetadata::new(
                "STA01".to_string(),
                "INTL01".to_string(),
                "52.10".to_string(),
                "21.00".to_string(),
                "MAZOWIECKIE".to_string(),
                city.to_string(),
            ),
            values: vec![
                (Pollutant::Pm10, Some("12.5".to_string())),
                (Pollutant::Pm25, None),
                (Pollutant::So2, Some("3.2".to_string())),
                (Pollutant::No2, None),
                (Pollutant::C6h6, None),
            ],
        }
    }

    #[test]
    fn test_comma_output_matches_render() -> Result<()> {
        let layout = RowLayout::comma(&PollutantSet::default());
        let writer = DelimitedWriter::new(layout.clone(), "");
        let mut buf = Vec::new();
        writer.write_to(&[record("Warszawa")], &mut buf)?;

        let text = String::from_utf8(buf).unwrap();
        let expected = format!(
            "timestamp,stationId,internationalId,lat,lon,PM10,PM25,SO2,NO2,C6H6\n{}\n",
            layout.render(&record("Warszawa"), "")
        );
        assert_eq!(text, expected);
        Ok(())
    }

    #[test]
    fn test_tab_output_keeps_spaces_unquoted() -> Result<()> {
        let writer = DelimitedWriter::new(RowLayout::tab(&PollutantSet::default()), "NA").with_header(false);
        let mut buf = Vec::new();
        writer.write_to(&[record("Nowy Sącz")], &mut buf)?;
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "52.10\t21.00\tSTA01\tMAZOWIECKIE\tNowy Sącz\t2024-01-01T00\tNA\t12.5\tNA\tNA\t3.2\n"
        );
        Ok(())
    }

    #[test]
    fn test_write_records_creates_parent() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("output").join("joined.csv");
        let writer = DelimitedWriter::new(RowLayout::comma(&PollutantSet::default()), "");
        assert_eq!(writer.write_records(&[record("Warszawa")], &path)?, 1);
        assert_eq!(std::fs::read_to_string(&path)?.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn test_write_lines() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("weather.csv");
        write_lines(&["a,b".to_string(), "c,d".to_string()], &path)?;
        assert_eq!(std::fs::read_to_string(&path)?, "a,b\nc,d\n");
        Ok(())
    }
}

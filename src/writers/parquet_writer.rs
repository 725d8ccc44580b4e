use crate::error::{ProcessingError, Result};
use crate::models::{JoinedRecord, LayoutColumn, PollutantSet, RowLayout};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE,
};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Writes joined records with the comma layout's columns, all as Utf8.
/// Pollutant columns are nullable; a missing reading is a null.
pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    /// Write all records in row-group sized batches. An empty slice writes
    /// nothing.
    pub fn write_records(&self, records: &[JoinedRecord], pollutants: &PollutantSet, path: &Path) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let layout = RowLayout::comma(pollutants);
        let schema = create_schema(&layout);
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for chunk in records.chunks(self.row_group_size) {
            let batch = records_to_batch(chunk, &layout, schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        info!(path = %path.display(), rows = records.len(), compression = ?self.compression, "parquet written");
        Ok(())
    }

    /// Number of rows recorded in a Parquet file's footer
    pub fn row_count(path: &Path) -> Result<i64> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let reader = SerializedFileReader::new(File::open(path)?)?;
        Ok(reader.metadata().file_metadata().num_rows())
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn create_schema(layout: &RowLayout) -> Arc<Schema> {
    let fields: Vec<Field> = layout
        .columns()
        .iter()
        .zip(layout.header())
        .map(|(column, name)| {
            let nullable = matches!(column, LayoutColumn::Pollutant(_));
            Field::new(name, DataType::Utf8, nullable)
        })
        .collect();
    Arc::new(Schema::new(fields))
}

fn records_to_batch(records: &[JoinedRecord], layout: &RowLayout, schema: Arc<Schema>) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = layout
        .columns()
        .iter()
        .map(|column| {
            let values: Vec<Option<&str>> = records
                .iter()
                .map(|r| match column {
                    LayoutColumn::Timestamp | LayoutColumn::Time => Some(r.timestamp.as_str()),
                    LayoutColumn::StationId => Some(r.station_id.as_str()),
                    LayoutColumn::InternationalId => Some(r.metadata.international_id.as_str()),
                    LayoutColumn::Latitude => Some(r.metadata.latitude.as_str()),
                    LayoutColumn::Longitude => Some(r.metadata.longitude.as_str()),
                    LayoutColumn::State => Some(r.metadata.state.as_str()),
                    LayoutColumn::City => Some(r.metadata.city.as_str()),
                    LayoutColumn::Pollutant(p) => r.value(*p),
                })
                .collect();
            Arc::new(StringArray::from(values)) as ArrayRef
        })
        .collect();

    Ok(RecordBatch::try_new(schema, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pollutant, StationMetadata};
    use tempfile::NamedTempFile;

    fn record(timestamp: &str) -> JoinedRecord {
        JoinedRecord {
            timestamp: timestamp.to_string(),
            station_id: "STA01".to_string(),
            metadata: StationMetadata::new(
                "STA01".to_string(),
                "INTL01".to_string(),
                "52.10".to_string(),
                "21.00".to_string(),
                "MAZOWIECKIE".to_string(),
                "Warszawa".to_string(),
            ),
            values: Pollutant::ALL
                .iter()
                .map(|p| (*p, (*p == Pollutant::Pm10).then(|| "12.5".to_string())))
                .collect(),
        }
    }

    #[test]
    fn test_write_empty_records() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        ParquetWriter::new().write_records(&[], &PollutantSet::default(), temp_file.path())?;
        assert_eq!(std::fs::metadata(temp_file.path())?.len(), 0);
        Ok(())
    }

    #[test]
    fn test_write_in_row_groups() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        let records: Vec<JoinedRecord> = (0..5).map(|h| record(&format!("2024-01-01T0{}", h))).collect();

        ParquetWriter::new()
            .with_row_group_size(2)
            .write_records(&records, &PollutantSet::default(), temp_file.path())?;

        assert_eq!(ParquetWriter::row_count(temp_file.path())?, 5);
        Ok(())
    }

    #[test]
    fn test_different_compressions() -> Result<()> {
        for compression in ["snappy", "gzip", "lz4", "zstd", "none"] {
            let writer = ParquetWriter::new().with_compression(compression)?;
            let temp_file = NamedTempFile::new()?;
            let result = writer.write_records(&[record("2024-01-01T00")], &PollutantSet::default(), temp_file.path());
            assert!(result.is_ok(), "Failed with compression: {}", compression);
        }
        assert!(ParquetWriter::new().with_compression("brotli-9").is_err());
        Ok(())
    }
}

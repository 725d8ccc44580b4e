/// Station metadata table layout
pub const METADATA_DELIMITER: char = ';';
pub const METADATA_MIN_COLUMNS: usize = 15;
pub const METADATA_COL_STATION_ID: usize = 1;
pub const METADATA_COL_INTERNATIONAL_ID: usize = 2;
pub const METADATA_COL_STATE: usize = 10;
pub const METADATA_COL_CITY: usize = 11;
pub const METADATA_COL_LATITUDE: usize = 13;
pub const METADATA_COL_LONGITUDE: usize = 14;

/// Wide pollutant files
pub const POLLUTION_DELIMITER: char = ',';

/// Value that marks a missing measurement in raw and intermediate data
pub const MISSING_VALUE: &str = "NA";

/// `yyyy-MM-ddTHH`
pub const HOUR_PREFIX_LEN: usize = 13;

/// Weather/pollution join
pub const WEATHER_FILE_PATTERN: &str = r"^openmeteo_(.+)_(\d{4})\.csv$";
pub const WEATHER_HEADER_MARKERS: [&str; 2] = ["latitude", "time"];
pub const LEADING_FLOAT_PATTERN: &str = r"^\d+\.\d+,.+";
pub const MIN_POLLUTION_FIELDS: usize = 3;
pub const MIN_WEATHER_FIELDS: usize = 2;

/// Two-phase work directory layout
pub const SUCCESS_MARKER: &str = "_SUCCESS";
pub const RESOLVED_STATIONS_FILE: &str = "stations.resolved";
pub const PART_FILE_PREFIX: &str = "part-";

/// Processing defaults
pub const DEFAULT_SPLIT_LINES: usize = 10_000;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB
pub const DEFAULT_PARTITIONS: usize = 4;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";

pub mod header_parser;
pub mod pollutant_reader;
pub mod station_reader;
pub mod weather_reader;

pub use header_parser::{ColumnMap, HeaderParser};
pub use pollutant_reader::{list_csv_files, source_id, source_name, PollutantReader};
pub use station_reader::{build_lookup, decode_metadata, StationLookup, StationReader};
pub use weather_reader::{WeatherFile, WeatherHeaderFilter, WeatherReader};

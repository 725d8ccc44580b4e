pub mod joined;
pub mod keys;
pub mod measurement;
pub mod pollutant;
pub mod station;

pub use joined::{JoinedRecord, LayoutColumn, LayoutKind, RowLayout};
pub use keys::{ColumnRef, CompositeKey, ResolutionValue, SourceLine, StationColumn};
pub use measurement::{is_missing_value, Measurement};
pub use pollutant::{Pollutant, PollutantSet};
pub use station::StationMetadata;

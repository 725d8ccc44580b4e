use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::constants::{
    METADATA_COL_CITY, METADATA_COL_INTERNATIONAL_ID, METADATA_COL_LATITUDE,
    METADATA_COL_LONGITUDE, METADATA_COL_STATE, METADATA_COL_STATION_ID, METADATA_DELIMITER,
    METADATA_MIN_COLUMNS,
};

/// One row of the station metadata table. Coordinates stay as published
/// strings so joined output reproduces them byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StationMetadata {
    #[validate(length(min = 1))]
    pub station_id: String,

    pub international_id: String,

    pub latitude: String,

    pub longitude: String,

    pub state: String,

    pub city: String,
}

impl StationMetadata {
    pub fn new(
        station_id: String,
        international_id: String,
        latitude: String,
        longitude: String,
        state: String,
        city: String,
    ) -> Self {
        Self {
            station_id,
            international_id,
            latitude,
            longitude,
            state,
            city,
        }
    }

    /// Render back into the semicolon table layout, filling only the
    /// positions the loader reads.
    pub fn to_metadata_line(&self) -> String {
        let mut fields = vec![""; METADATA_MIN_COLUMNS];
        fields[METADATA_COL_STATION_ID] = &self.station_id;
        fields[METADATA_COL_INTERNATIONAL_ID] = &self.international_id;
        fields[METADATA_COL_STATE] = &self.state;
        fields[METADATA_COL_CITY] = &self.city;
        fields[METADATA_COL_LATITUDE] = &self.latitude;
        fields[METADATA_COL_LONGITUDE] = &self.longitude;
        fields.join(&METADATA_DELIMITER.to_string())
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.parse::<f64>().is_ok() && self.longitude.parse::<f64>().is_ok()
    }
}

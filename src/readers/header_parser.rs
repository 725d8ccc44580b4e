//! Header parsing for wide pollutant files.
//!
//! A header cell looks like `<rawStationId>-<pollutant>-<suffix>`, e.g.
//! `DsBoleslaMOB-PM10-1g`. The pollutant token is anchor-matched against the
//! configured pollutant set; anything else is an unmatched column.

use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::engine::{Counter, Counters};
use crate::error::Result;
use crate::models::{Pollutant, PollutantSet, StationColumn};
use crate::utils::constants::POLLUTION_DELIMITER;

/// Column index (0 is the time column) to resolved station column
pub type ColumnMap = BTreeMap<usize, StationColumn>;

#[derive(Debug, Clone)]
pub struct HeaderParser {
    pattern: Regex,
}

impl HeaderParser {
    pub fn new(pollutants: &PollutantSet) -> Result<Self> {
        // Longest alias first so `PM2.5` is not cut short by a shorter token.
        let mut aliases: Vec<&str> = pollutants
            .iter()
            .flat_map(|p| p.aliases().iter().copied())
            .collect();
        aliases.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternation = aliases
            .iter()
            .map(|a| regex::escape(a))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&format!(r"^([^-\s]+)-({})(?:\d+g)?(?:-.*)?$", alternation))?;
        Ok(Self { pattern })
    }

    /// Parse one header cell into its station and normalized pollutant.
    pub fn parse_cell(&self, cell: &str) -> Option<StationColumn> {
        let caps = self.pattern.captures(cell.trim())?;
        let station_id = caps.get(1)?.as_str().to_string();
        let pollutant = caps.get(2)?.as_str().parse::<Pollutant>().ok()?;
        Some(StationColumn {
            station_id,
            pollutant,
        })
    }

    /// Build the column map for a full header row. Unmatched cells are
    /// counted and skipped.
    pub fn parse_header(&self, line: &str, counters: &mut Counters) -> ColumnMap {
        let cells: Vec<&str> = line.split(POLLUTION_DELIMITER).collect();
        let mut map = ColumnMap::new();

        if cells.len() <= 1 {
            warn!(line, "header has no station columns");
            counters.incr(Counter::MalformedHeaderLines);
            return map;
        }

        for (index, cell) in cells.iter().enumerate().skip(1) {
            match self.parse_cell(cell) {
                Some(column) => {
                    counters.incr(Counter::HeaderColumnsMatched);
                    map.insert(index, column);
                }
                None => {
                    counters.incr(Counter::HeaderColumnsUnmatched);
                    debug!(index, cell = cell.trim(), "header column did not match");
                }
            }
        }

        debug!(mapped = map.len(), columns = cells.len() - 1, "header parsed");
        map
    }
}

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

use crate::engine::{Counter, Counters};
use crate::error::Result;
use crate::models::{Measurement, StationMetadata};
use crate::readers::{StationLookup, StationReader};

/// How a measurement's station id is matched against metadata keys.
/// An exact hit always wins; the other strategies only apply on a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    #[default]
    Exact,
    /// Metadata key starts with the station id
    Prefix,
    /// Metadata key contains the station id anywhere
    Contains,
}

/// Joins measurements against the station table broadcast to every task.
#[derive(Debug, Clone)]
pub struct MetadataBroadcastJoiner {
    lookup: Arc<StationLookup>,
    strategy: MatchStrategy,
}

impl MetadataBroadcastJoiner {
    pub fn new(lookup: Arc<StationLookup>, strategy: MatchStrategy) -> Self {
        Self { lookup, strategy }
    }

    /// Load the broadcast table once; fails when it is absent or empty.
    pub fn from_broadcast(path: &Path, strategy: MatchStrategy, counters: &mut Counters) -> Result<Self> {
        let lookup = StationReader::new().load_broadcast(path, counters)?;
        Ok(Self::new(Arc::new(lookup), strategy))
    }

    /// Resolve a station's metadata. A miss increments `MissingMetadata`.
    pub fn join_station(&self, station_id: &str, counters: &mut Counters) -> Option<&StationMetadata> {
        let found = self.resolve(station_id, counters);
        if found.is_none() {
            counters.incr(Counter::MissingMetadata);
            trace!(station_id, strategy = ?self.strategy, "no metadata for station");
        }
        found
    }

    /// Pair one measurement with its metadata, dropping it on a miss.
    pub fn join(
        &self,
        measurement: Measurement,
        counters: &mut Counters,
    ) -> Option<(Measurement, &StationMetadata)> {
        let metadata = self.join_station(&measurement.station_id, counters)?;
        Some((measurement, metadata))
    }

    fn resolve(&self, station_id: &str, counters: &mut Counters) -> Option<&StationMetadata> {
        if station_id.is_empty() {
            return None;
        }
        if let Some(metadata) = self.lookup.get(station_id) {
            return Some(metadata);
        }

        let mut matches: Box<dyn Iterator<Item = &StationMetadata> + '_> = match self.strategy {
            MatchStrategy::Exact => return None,
            MatchStrategy::Prefix => Box::new(
                self.lookup
                    .range::<str, _>((Bound::Excluded(station_id), Bound::Unbounded))
                    .take_while(move |(key, _)| key.starts_with(station_id))
                    .map(|(_, metadata)| metadata),
            ),
            MatchStrategy::Contains => Box::new(
                self.lookup
                    .iter()
                    .filter(move |(key, _)| key.contains(station_id))
                    .map(|(_, metadata)| metadata),
            ),
        };

        let first = matches.next()?;
        if matches.next().is_some() {
            counters.incr(Counter::AmbiguousMetadataMatch);
            trace!(station_id, chosen = %first.station_id, "ambiguous metadata match");
        }
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pollutant;

    fn station(id: &str, intl: &str) -> StationMetadata {
        StationMetadata::new(
            id.to_string(),
            intl.to_string(),
            "52.1".to_string(),
            "21.0".to_string(),
            "MAZOWIECKIE".to_string(),
            "Warszawa".to_string(),
        )
    }

    fn joiner(strategy: MatchStrategy) -> MetadataBroadcastJoiner {
        let lookup: StationLookup = [
            station("MzWarAlNiepo", "PL0140A"),
            station("MzWarKondrat", "PL0141A"),
            station("DsWrocWybCon", "PL0194A"),
            station("STA01", "INTL01"),
        ]
        .into_iter()
        .map(|s| (s.station_id.clone(), s))
        .collect();
        MetadataBroadcastJoiner::new(Arc::new(lookup), strategy)
    }

    #[test]
    fn test_exact_match() {
        let mut counters = Counters::new();
        let joiner = joiner(MatchStrategy::Exact);

        assert_eq!(
            joiner.join_station("STA01", &mut counters).unwrap().international_id,
            "INTL01"
        );
        assert!(joiner.join_station("MzWar", &mut counters).is_none());
        assert!(joiner.join_station("sta01", &mut counters).is_none());
        assert_eq!(counters.get(Counter::MissingMetadata), 2);
    }

    #[test]
    fn test_prefix_match_is_deterministic() {
        let mut counters = Counters::new();
        let joiner = joiner(MatchStrategy::Prefix);

        let found = joiner.join_station("MzWar", &mut counters).unwrap();
        assert_eq!(found.station_id, "MzWarAlNiepo");
        assert_eq!(counters.get(Counter::AmbiguousMetadataMatch), 1);

        let found = joiner.join_station("DsWroc", &mut counters).unwrap();
        assert_eq!(found.station_id, "DsWrocWybCon");
        assert_eq!(counters.get(Counter::AmbiguousMetadataMatch), 1);

        assert!(joiner.join_station("WarAl", &mut counters).is_none());
        assert_eq!(counters.get(Counter::MissingMetadata), 1);
    }

    #[test]
    fn test_contains_match() {
        let mut counters = Counters::new();
        let joiner = joiner(MatchStrategy::Contains);

        let found = joiner.join_station("WarAl", &mut counters).unwrap();
        assert_eq!(found.station_id, "MzWarAlNiepo");
        assert_eq!(counters.get(Counter::AmbiguousMetadataMatch), 0);

        // "War" is inside both Warsaw stations; the smallest key wins.
        let found = joiner.join_station("War", &mut counters).unwrap();
        assert_eq!(found.station_id, "MzWarAlNiepo");
        assert_eq!(counters.get(Counter::AmbiguousMetadataMatch), 1);

        assert!(joiner.join_station("", &mut counters).is_none());
    }

    #[test]
    fn test_exact_hit_beats_substring() {
        let mut counters = Counters::new();
        let joiner = joiner(MatchStrategy::Contains);
        let found = joiner.join_station("STA01", &mut counters).unwrap();
        assert_eq!(found.international_id, "INTL01");
        assert!(counters.is_empty());
    }

    #[test]
    fn test_join_drops_unresolved_measurement() {
        let mut counters = Counters::new();
        let joiner = joiner(MatchStrategy::Exact);
        let m = Measurement::new(
            "2024-01-01T00".to_string(),
            "UNKNOWN".to_string(),
            Pollutant::No2,
            "4.0".to_string(),
        );
        assert!(joiner.join(m, &mut counters).is_none());
        assert_eq!(counters.get(Counter::MissingMetadata), 1);
    }
}

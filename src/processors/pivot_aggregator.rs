use std::collections::BTreeMap;
use tracing::trace;

use crate::engine::{Counter, Counters, ReduceTask};
use crate::error::{ProcessingError, Result};
use crate::models::{CompositeKey, JoinedRecord, Measurement, Pollutant, PollutantSet, StationMetadata};
use crate::processors::MetadataBroadcastJoiner;

/// Folds the narrow measurements of one (station, timestamp) group into a
/// single wide record.
#[derive(Debug, Clone)]
pub struct PivotAggregator {
    pollutants: PollutantSet,
}

impl PivotAggregator {
    pub fn new(pollutants: PollutantSet) -> Self {
        Self { pollutants }
    }

    pub fn pollutants(&self) -> &PollutantSet {
        &self.pollutants
    }

    /// Returns `None` when the group holds no usable value. Arrival order
    /// does not matter: a pollutant seen twice keeps the greatest value string.
    pub fn pivot(
        &self,
        station_id: &str,
        timestamp: &str,
        metadata: &StationMetadata,
        measurements: impl IntoIterator<Item = Measurement>,
        counters: &mut Counters,
    ) -> Option<JoinedRecord> {
        let mut by_pollutant: BTreeMap<Pollutant, String> = BTreeMap::new();

        for measurement in measurements {
            if measurement.is_missing() || !self.pollutants.contains(measurement.pollutant) {
                continue;
            }
            match by_pollutant.get_mut(&measurement.pollutant) {
                Some(existing) => {
                    counters.incr(Counter::DuplicatePollutantValue);
                    if measurement.value > *existing {
                        *existing = measurement.value;
                    }
                }
                None => {
                    by_pollutant.insert(measurement.pollutant, measurement.value);
                }
            }
        }

        if by_pollutant.is_empty() {
            counters.incr(Counter::GroupsWithoutValues);
            trace!(station_id, timestamp, "group has no pollutant values");
            return None;
        }

        let values = self
            .pollutants
            .iter()
            .map(|p| (p, by_pollutant.remove(&p)))
            .collect();

        counters.incr(Counter::JoinedRecordsEmitted);
        Some(JoinedRecord {
            timestamp: timestamp.to_string(),
            station_id: station_id.to_string(),
            metadata: metadata.clone(),
            values,
        })
    }
}

/// Reduce step for `StationTime` groups: resolve metadata once per group,
/// then pivot.
pub struct PivotReducer {
    joiner: MetadataBroadcastJoiner,
    aggregator: PivotAggregator,
}

impl PivotReducer {
    pub fn new(joiner: MetadataBroadcastJoiner, aggregator: PivotAggregator) -> Self {
        Self { joiner, aggregator }
    }
}

impl ReduceTask for PivotReducer {
    type Key = CompositeKey;
    type Value = Measurement;
    type Output = JoinedRecord;

    fn reduce(
        &self,
        key: &CompositeKey,
        values: Vec<Measurement>,
        out: &mut Vec<JoinedRecord>,
        counters: &mut Counters,
    ) -> Result<()> {
        let CompositeKey::StationTime {
            station_id,
            timestamp,
        } = key
        else {
            return Err(ProcessingError::InvalidFormat(format!(
                "Pivot received non station-time key {}",
                key
            )));
        };

        let Some(metadata) = self.joiner.join_station(station_id, counters) else {
            return Ok(());
        };

        if let Some(record) = self
            .aggregator
            .pivot(station_id, timestamp, metadata, values, counters)
        {
            out.push(record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowLayout;
    use crate::processors::MatchStrategy;
    use crate::readers::StationLookup;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn metadata() -> StationMetadata {
        StationMetadata::new(
            "STA01".to_string(),
            "INTL01".to_string(),
            "52.10".to_string(),
            "21.00".to_string(),
            "MAZOWIECKIE".to_string(),
            "Warszawa".to_string(),
        )
    }

    fn m(pollutant: Pollutant, value: &str) -> Measurement {
        Measurement::new(
            "2024-01-01T00".to_string(),
            "STA01".to_string(),
            pollutant,
            value.to_string(),
        )
    }

    #[test]
    fn test_pivot_fills_fixed_columns() {
        let aggregator = PivotAggregator::new(PollutantSet::default());
        let mut counters = Counters::new();
        let record = aggregator
            .pivot(
                "STA01",
                "2024-01-01T00",
                &metadata(),
                vec![m(Pollutant::So2, "3.2"), m(Pollutant::Pm10, "12.5")],
                &mut counters,
            )
            .unwrap();

        assert_eq!(record.values.len(), 5);
        let order: Vec<Pollutant> = record.values.iter().map(|(p, _)| *p).collect();
        assert_eq!(order, Pollutant::ALL.to_vec());
        assert_eq!(record.value(Pollutant::Pm10), Some("12.5"));
        assert_eq!(record.value(Pollutant::So2), Some("3.2"));
        assert_eq!(record.present_count(), 2);

        let row = RowLayout::comma(aggregator.pollutants()).render(&record, "NA");
        assert_eq!(row, "2024-01-01T00,STA01,INTL01,52.10,21.00,12.5,NA,3.2,NA,NA");
    }

    #[test]
    fn test_pivot_is_order_independent() {
        let aggregator = PivotAggregator::new(PollutantSet::default());
        let forward = vec![
            m(Pollutant::No2, "1.0"),
            m(Pollutant::No2, "2.0"),
            m(Pollutant::C6h6, "0.4"),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let mut c1 = Counters::new();
        let mut c2 = Counters::new();
        let a = aggregator.pivot("STA01", "t", &metadata(), forward, &mut c1);
        let b = aggregator.pivot("STA01", "t", &metadata(), backward, &mut c2);
        assert_eq!(a, b);
        assert_eq!(a.unwrap().value(Pollutant::No2), Some("2.0"));
        assert_eq!(c1.get(Counter::DuplicatePollutantValue), 1);
    }

    #[test]
    fn test_group_without_values_emits_nothing() {
        let aggregator = PivotAggregator::new(PollutantSet::default());
        let mut counters = Counters::new();
        let record = aggregator.pivot(
            "STA01",
            "t",
            &metadata(),
            vec![m(Pollutant::Pm10, "NA"), m(Pollutant::So2, "")],
            &mut counters,
        );
        assert!(record.is_none());
        assert_eq!(counters.get(Counter::GroupsWithoutValues), 1);
        assert_eq!(counters.get(Counter::JoinedRecordsEmitted), 0);
    }

    #[test]
    fn test_reducer_drops_group_without_metadata() -> Result<()> {
        let lookup: StationLookup = [("STA01".to_string(), metadata())].into_iter().collect();
        let reducer = PivotReducer::new(
            MetadataBroadcastJoiner::new(Arc::new(lookup), MatchStrategy::Exact),
            PivotAggregator::new(PollutantSet::default()),
        );

        let mut out = Vec::new();
        let mut counters = Counters::new();
        let key = CompositeKey::StationTime {
            station_id: "STA99".to_string(),
            timestamp: "2024-01-01T00".to_string(),
        };
        let values = vec![m(Pollutant::Pm10, "1"), m(Pollutant::So2, "2"), m(Pollutant::No2, "3")];
        reducer.reduce(&key, values, &mut out, &mut counters)?;

        assert!(out.is_empty());
        assert_eq!(counters.get(Counter::MissingMetadata), 1);

        let key = CompositeKey::StationTime {
            station_id: "STA01".to_string(),
            timestamp: "2024-01-01T00".to_string(),
        };
        reducer.reduce(&key, vec![m(Pollutant::Pm10, "1")], &mut out, &mut counters)?;
        assert_eq!(out.len(), 1);
        Ok(())
    }

    #[test]
    fn test_reducer_rejects_foreign_keys() {
        let reducer = PivotReducer::new(
            MetadataBroadcastJoiner::new(Arc::new(StationLookup::new()), MatchStrategy::Exact),
            PivotAggregator::new(PollutantSet::default()),
        );
        let result = reducer.reduce(
            &CompositeKey::Station("STA01".to_string()),
            vec![],
            &mut Vec::new(),
            &mut Counters::new(),
        );
        assert!(result.is_err());
    }
}

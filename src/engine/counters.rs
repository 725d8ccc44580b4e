use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Advisory processing counters. Nothing in the pipeline branches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Counter {
    EmptyLinesSkipped,
    HeaderColumnsMatched,
    HeaderColumnsUnmatched,
    MalformedHeaderLines,
    MalformedDataLines,
    EmptyValues,
    MalformedValues,
    UnmappedColumnCells,
    ConflictingColumnMappings,
    MetadataRowsLoaded,
    MalformedMetadataLines,
    DuplicateMetadataRows,
    MissingMetadata,
    AmbiguousMetadataMatch,
    MeasurementsEmitted,
    IntermediateRecordsEmitted,
    DuplicatePollutantValue,
    GroupsWithoutValues,
    JoinedRecordsEmitted,
    HeaderLinesSkipped,
    MalformedPollutionLines,
    MalformedWeatherLines,
    UnrecognizedWeatherFile,
    UnmatchedBuckets,
    TimeJoinRowsEmitted,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Counters {
    values: BTreeMap<Counter, u64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&mut self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&mut self, counter: Counter, delta: u64) {
        if delta > 0 {
            *self.values.entry(counter).or_insert(0) += delta;
        }
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.values.get(&counter).copied().unwrap_or(0)
    }

    pub fn merge(&mut self, other: Counters) {
        for (counter, value) in other.values {
            self.add(counter, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Counter, u64)> + '_ {
        self.values.iter().map(|(c, v)| (*c, *v))
    }

    pub fn log_summary(&self, stage: &str) {
        for (counter, value) in self.iter() {
            info!(stage, %counter, value, "counter");
        }
    }

    pub fn summary(&self) -> String {
        let mut out = String::from("Counters:\n");
        for (counter, value) in self.iter() {
            out.push_str(&format!("  {:<28} {}\n", counter.to_string(), value));
        }
        out
    }
}

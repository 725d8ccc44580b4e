//! Hour-bucketed join of flattened pollution rows with Open-Meteo weather rows.
//!
//! Both sides are keyed by `(hourPrefix, stationId)`. Within a bucket every
//! pollution row is paired with every weather row, so a bucket holding N
//! pollution rows and M weather rows yields N×M output rows. Sources that
//! need one-to-one pairing must be pre-aggregated to one row per hour.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{Counter, Counters, Emitter, JobOutput, LocalEngine, MapTask, ReduceTask};
use crate::error::{ProcessingError, Result};
use crate::models::{CompositeKey, SourceLine};
use crate::processors::KeyBuilder;
use crate::readers::{WeatherFile, WeatherHeaderFilter};
use crate::utils::constants::{MIN_POLLUTION_FIELDS, MIN_WEATHER_FIELDS, POLLUTION_DELIMITER};

/// What to do with a line that cannot be bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MalformedLinePolicy {
    /// Count it and carry on
    #[default]
    Skip,
    /// Abort the task with `ProcessingError::MalformedLine`
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeJoinInput {
    /// Flattened pollution rows: `timestamp,stationId,...`
    Pollution { source: String, lines: Vec<String> },
    Weather(WeatherFile),
}

/// Header row written by the comma layout; not a data row.
const POLLUTION_HEADER_MARKER: &str = "timestamp,";

pub struct TimeWindowJoiner {
    policy: MalformedLinePolicy,
    weather_headers: WeatherHeaderFilter,
}

impl TimeWindowJoiner {
    pub fn new(policy: MalformedLinePolicy) -> Result<Self> {
        Ok(Self {
            policy,
            weather_headers: WeatherHeaderFilter::new()?,
        })
    }

    pub fn run(&self, engine: &LocalEngine, inputs: &[TimeJoinInput]) -> Result<JobOutput<String>> {
        let mapper = BucketMapper {
            policy: self.policy,
            weather_headers: &self.weather_headers,
        };
        let output = engine.run(inputs, &mapper, &CrossJoinReducer)?;
        info!(
            rows = output.records.len(),
            unmatched_buckets = output.counters.get(Counter::UnmatchedBuckets),
            "weather join complete"
        );
        Ok(output)
    }

    fn malformed(
        policy: MalformedLinePolicy,
        source: &str,
        line: &str,
        counter: Counter,
        counters: &mut Counters,
    ) -> Result<()> {
        match policy {
            MalformedLinePolicy::Skip => {
                counters.incr(counter);
                debug!(source, line, "skipping malformed line");
                Ok(())
            }
            MalformedLinePolicy::Fail => Err(ProcessingError::MalformedLine {
                source_name: source.to_string(),
                line: line.to_string(),
            }),
        }
    }
}

struct BucketMapper<'a> {
    policy: MalformedLinePolicy,
    weather_headers: &'a WeatherHeaderFilter,
}

impl BucketMapper<'_> {
    fn map_pollution(
        &self,
        source: &str,
        lines: &[String],
        out: &mut dyn Emitter<CompositeKey, SourceLine>,
        counters: &mut Counters,
    ) -> Result<()> {
        for line in lines {
            if line.trim().is_empty() {
                counters.incr(Counter::EmptyLinesSkipped);
                continue;
            }
            if line.starts_with(POLLUTION_HEADER_MARKER) {
                counters.incr(Counter::HeaderLinesSkipped);
                continue;
            }

            let fields: Vec<&str> = line.split(POLLUTION_DELIMITER).collect();
            let key = if fields.len() >= MIN_POLLUTION_FIELDS {
                KeyBuilder::time_station(fields[0], fields[1])
            } else {
                None
            };

            match key {
                Some(key) => out.emit(key, SourceLine::Pollution(line.clone())),
                None => TimeWindowJoiner::malformed(
                    self.policy,
                    source,
                    line,
                    Counter::MalformedPollutionLines,
                    counters,
                )?,
            }
        }
        Ok(())
    }

    fn map_weather(
        &self,
        file: &WeatherFile,
        out: &mut dyn Emitter<CompositeKey, SourceLine>,
        counters: &mut Counters,
    ) -> Result<()> {
        let Some(station_id) = file.station_id.as_deref() else {
            counters.incr(Counter::UnrecognizedWeatherFile);
            debug!(source = %file.source, "weather file name carries no station id");
            return Ok(());
        };

        for line in &file.lines {
            if line.trim().is_empty() {
                counters.incr(Counter::EmptyLinesSkipped);
                continue;
            }
            if self.weather_headers.is_header(line) {
                counters.incr(Counter::HeaderLinesSkipped);
                continue;
            }

            let fields: Vec<&str> = line.split(POLLUTION_DELIMITER).collect();
            let key = if fields.len() >= MIN_WEATHER_FIELDS {
                KeyBuilder::time_station(fields[0], station_id)
            } else {
                None
            };

            match key {
                Some(key) => out.emit(key, SourceLine::Weather(line.clone())),
                None => TimeWindowJoiner::malformed(
                    self.policy,
                    &file.source,
                    line,
                    Counter::MalformedWeatherLines,
                    counters,
                )?,
            }
        }
        Ok(())
    }
}

impl MapTask for BucketMapper<'_> {
    type Input = TimeJoinInput;
    type Key = CompositeKey;
    type Value = SourceLine;

    fn map(
        &self,
        input: &TimeJoinInput,
        out: &mut dyn Emitter<CompositeKey, SourceLine>,
        counters: &mut Counters,
    ) -> Result<()> {
        match input {
            TimeJoinInput::Pollution { source, lines } => self.map_pollution(source, lines, out, counters),
            TimeJoinInput::Weather(file) => self.map_weather(file, out, counters),
        }
    }
}

struct CrossJoinReducer;

impl ReduceTask for CrossJoinReducer {
    type Key = CompositeKey;
    type Value = SourceLine;
    type Output = String;

    fn reduce(
        &self,
        key: &CompositeKey,
        values: Vec<SourceLine>,
        out: &mut Vec<String>,
        counters: &mut Counters,
    ) -> Result<()> {
        let rows = cross_join(values);
        if rows.is_empty() {
            counters.incr(Counter::UnmatchedBuckets);
            debug!(bucket = %key, "bucket has only one side");
        }
        counters.add(Counter::TimeJoinRowsEmitted, rows.len() as u64);
        out.extend(rows);
        Ok(())
    }
}

/// Pair every pollution line of a bucket with every weather line as
/// `<pollution>,<weather>`. Each side is sorted first so the result does not
/// depend on arrival order.
pub fn cross_join(values: Vec<SourceLine>) -> Vec<String> {
    let mut pollution = Vec::new();
    let mut weather = Vec::new();
    for value in values {
        match value {
            SourceLine::Pollution(line) => pollution.push(line),
            SourceLine::Weather(line) => weather.push(line),
        }
    }
    pollution.sort();
    weather.sort();

    let mut rows = Vec::with_capacity(pollution.len() * weather.len());
    for p in &pollution {
        for w in &weather {
            rows.push(format!("{}{}{}", p, POLLUTION_DELIMITER, w));
        }
    }
    rows
}

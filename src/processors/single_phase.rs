//! One grouping round for inputs read as whole files.
//!
//! When every map task sees its file's header, the column map is built at
//! task start and cells go straight out under (station, timestamp) keys.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::PipelineConfig;
use crate::engine::{Counter, Counters, Emitter, InputSplit, JobOutput, LocalEngine, MapTask};
use crate::error::{ProcessingError, Result};
use crate::models::{CompositeKey, JoinedRecord, Measurement};
use crate::processors::{DataRow, KeyBuilder, MetadataBroadcastJoiner, PivotAggregator, PivotReducer};
use crate::readers::HeaderParser;

pub struct SinglePhasePipeline {
    config: PipelineConfig,
    engine: LocalEngine,
    header_parser: HeaderParser,
}

impl SinglePhasePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let header_parser = HeaderParser::new(&config.pollutants)?;
        let engine = LocalEngine::new(config.max_workers);
        Ok(Self {
            config,
            engine,
            header_parser,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, pollutant_files: &[PathBuf], metadata: &Path) -> Result<JobOutput<JoinedRecord>> {
        info!(files = pollutant_files.len(), "single-phase pivot");

        let mut counters = Counters::new();
        let joiner = MetadataBroadcastJoiner::from_broadcast(metadata, self.config.match_strategy, &mut counters)?;

        let splits = self.config.pollutant_reader().read_whole_files(pollutant_files)?;
        let mapper = JoinMapper {
            header_parser: &self.header_parser,
        };
        let reducer = PivotReducer::new(joiner, PivotAggregator::new(self.config.pollutants.clone()));
        let mut output = self.engine.run(&splits, &mapper, &reducer)?;

        counters.merge(output.counters);
        output.counters = counters;
        output.counters.log_summary("single-phase");
        info!(records = output.records.len(), "single-phase pivot complete");
        Ok(output)
    }
}

/// Parses its own header, then emits one measurement per usable cell.
struct JoinMapper<'a> {
    header_parser: &'a HeaderParser,
}

impl MapTask for JoinMapper<'_> {
    type Input = InputSplit;
    type Key = CompositeKey;
    type Value = Measurement;

    fn map(
        &self,
        split: &InputSplit,
        out: &mut dyn Emitter<CompositeKey, Measurement>,
        counters: &mut Counters,
    ) -> Result<()> {
        if !split.has_header() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Split {} of {} has no header row",
                split.index, split.source
            )));
        }

        let mut lines = split.lines.iter();
        let Some(header) = lines.next() else {
            return Ok(());
        };
        let columns = self.header_parser.parse_header(header, counters);

        for line in lines {
            if line.trim().is_empty() {
                counters.incr(Counter::EmptyLinesSkipped);
                continue;
            }
            let Some(row) = DataRow::parse(line, counters) else {
                continue;
            };
            for (index, value) in row.cells {
                let Some(column) = columns.get(&index) else {
                    counters.incr(Counter::UnmappedColumnCells);
                    continue;
                };
                counters.incr(Counter::MeasurementsEmitted);
                out.emit(
                    KeyBuilder::station_time(&column.station_id, row.timestamp),
                    Measurement::new(
                        row.timestamp.to_string(),
                        column.station_id.clone(),
                        column.pollutant,
                        value.to_string(),
                    ),
                );
            }
        }
        Ok(())
    }
}

//! Two grouping rounds over the wide pollutant files.
//!
//! Splits after the first one of a file never see its header, so a data cell
//! cannot learn its station and pollutant inside the map step. Round one
//! groups every cell with its column's header mapping (and every metadata row
//! with its station) and writes normalized per-station records to a work
//! directory. Round two reads them back, groups by (station, timestamp) and
//! pivots against the resolved station table.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::engine::{
    load_broadcast_file, Counter, Counters, Emitter, InputSplit, JobOutput, LocalEngine, MapTask,
    ReduceTask,
};
use crate::error::{ProcessingError, Result};
use crate::models::{
    CompositeKey, JoinedRecord, Measurement, ResolutionValue, StationColumn, StationMetadata,
};
use crate::processors::{
    DataRow, KeyBuilder, MetadataBroadcastJoiner, PivotAggregator, PivotReducer,
};
use crate::readers::{decode_metadata, HeaderParser, StationReader};
use crate::utils::constants::{
    DEFAULT_PARTITIONS, PART_FILE_PREFIX, RESOLVED_STATIONS_FILE, SUCCESS_MARKER,
};

const PART_SEPARATOR: char = '\t';
const RESOLVED_HEADER: &str =
    "Number;StationID;InternationalStationID;;;;;;;;State;City;Address;lat;long";

/// Input of the first round: the raw metadata table or one pollutant split.
#[derive(Debug, Clone)]
pub enum ResolutionInput {
    Metadata { source: String, content: String },
    Split(InputSplit),
}

/// Output of the first round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRecord {
    Station(StationMetadata),
    Intermediate(Measurement),
}

/// What phase 1 left in the work directory.
#[derive(Debug)]
pub struct Phase1Summary {
    pub part_files: Vec<PathBuf>,
    pub stations_file: PathBuf,
    pub stations: usize,
    pub intermediate_records: usize,
    pub counters: Counters,
}

pub struct TwoPhasePipeline {
    config: PipelineConfig,
    engine: LocalEngine,
    header_parser: HeaderParser,
    partitions: usize,
}

impl TwoPhasePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let header_parser = HeaderParser::new(&config.pollutants)?;
        let engine = LocalEngine::new(config.max_workers);
        Ok(Self {
            config,
            engine,
            header_parser,
            partitions: DEFAULT_PARTITIONS,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Phase 1 then phase 2. A phase-1 failure returns before phase 2 starts.
    pub fn run(
        &self,
        pollutant_files: &[PathBuf],
        metadata: &Path,
        work_dir: &Path,
    ) -> Result<JobOutput<JoinedRecord>> {
        let phase1 = self.run_phase1(pollutant_files, metadata, work_dir)?;
        let mut output = self.run_phase2(work_dir)?;

        let mut counters = phase1.counters;
        counters.merge(output.counters);
        output.counters = counters;
        Ok(output)
    }

    pub fn run_phase1(
        &self,
        pollutant_files: &[PathBuf],
        metadata: &Path,
        work_dir: &Path,
    ) -> Result<Phase1Summary> {
        info!(
            files = pollutant_files.len(),
            work_dir = %work_dir.display(),
            "phase 1: resolving column mappings and station metadata"
        );

        let metadata = load_broadcast_file(metadata)?;
        prepare_work_dir(work_dir)?;

        let mut inputs = vec![ResolutionInput::Metadata {
            source: metadata.display().to_string(),
            content: decode_metadata(&fs::read(&metadata)?).into_owned(),
        }];
        let splits = self.config.pollutant_reader().read_splits(pollutant_files)?;
        inputs.extend(splits.into_iter().map(ResolutionInput::Split));

        let mapper = ResolutionMapper {
            header_parser: &self.header_parser,
        };
        let output = self.engine.run(&inputs, &mapper, &ResolutionReducer)?;

        let mut stations = Vec::new();
        let mut partitions: Vec<Vec<String>> = vec![Vec::new(); self.partitions];
        for record in output.records {
            match record {
                ResolvedRecord::Station(station) => stations.push(station),
                ResolvedRecord::Intermediate(measurement) => {
                    let slot = partition_for(&measurement.station_id, self.partitions);
                    partitions[slot].push(part_line(&measurement));
                }
            }
        }

        if stations.is_empty() {
            return Err(ProcessingError::EmptyBroadcast(metadata));
        }

        let mut part_files = Vec::with_capacity(self.partitions);
        let mut intermediate_records = 0;
        for (index, mut lines) in partitions.into_iter().enumerate() {
            lines.sort();
            intermediate_records += lines.len();
            let path = work_dir.join(format!("{}{:05}", PART_FILE_PREFIX, index));
            write_lines(&path, None, &lines)?;
            part_files.push(path);
        }

        let stations_file = work_dir.join(RESOLVED_STATIONS_FILE);
        let station_lines: Vec<String> = stations.iter().map(|s| s.to_metadata_line()).collect();
        write_lines(&stations_file, Some(RESOLVED_HEADER), &station_lines)?;

        // Last write: phase 2 keys off this marker.
        fs::File::create(work_dir.join(SUCCESS_MARKER))?.sync_all()?;

        output.counters.log_summary("phase1");
        info!(
            stations = stations.len(),
            intermediate_records,
            parts = part_files.len(),
            "phase 1 complete"
        );

        Ok(Phase1Summary {
            part_files,
            stations_file,
            stations: stations.len(),
            intermediate_records,
            counters: output.counters,
        })
    }

    pub fn run_phase2(&self, work_dir: &Path) -> Result<JobOutput<JoinedRecord>> {
        if !work_dir.join(SUCCESS_MARKER).is_file() {
            return Err(ProcessingError::PhaseIncomplete(work_dir.to_path_buf()));
        }
        info!(work_dir = %work_dir.display(), "phase 2: pivoting by station and timestamp");

        // Phase 1 already counted the metadata rows.
        let mut reload = Counters::new();
        let joiner = MetadataBroadcastJoiner::from_broadcast(
            &work_dir.join(RESOLVED_STATIONS_FILE),
            self.config.match_strategy,
            &mut reload,
        )?;
        debug!(
            stations = reload.get(Counter::MetadataRowsLoaded),
            "resolved station table loaded"
        );
        let mut counters = Counters::new();

        let inputs = list_part_files(work_dir)?
            .iter()
            .map(|path| fs::read_to_string(path).map_err(ProcessingError::from))
            .collect::<Result<Vec<String>>>()?;

        let reducer = PivotReducer::new(joiner, PivotAggregator::new(self.config.pollutants.clone()));
        let mut output = self.engine.run(&inputs, &IntermediateMapper, &reducer)?;

        counters.merge(output.counters);
        output.counters = counters;
        output.counters.log_summary("phase2");
        info!(records = output.records.len(), "phase 2 complete");
        Ok(output)
    }
}

/// Clears what a previous run left so a stale `_SUCCESS` can never bless
/// new, partial output.
fn prepare_work_dir(work_dir: &Path) -> Result<()> {
    fs::create_dir_all(work_dir)?;
    let marker = work_dir.join(SUCCESS_MARKER);
    if marker.exists() {
        fs::remove_file(&marker)?;
    }
    for path in list_part_files(work_dir)? {
        fs::remove_file(&path)?;
    }
    let stations = work_dir.join(RESOLVED_STATIONS_FILE);
    if stations.exists() {
        fs::remove_file(&stations)?;
    }
    Ok(())
}

fn list_part_files(work_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut parts = Vec::new();
    for entry in fs::read_dir(work_dir)? {
        let path = entry?.path();
        let is_part = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(PART_FILE_PREFIX));
        if is_part && path.is_file() {
            parts.push(path);
        }
    }
    parts.sort();
    Ok(parts)
}

fn write_lines(path: &Path, header: Option<&str>, lines: &[String]) -> Result<()> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    if let Some(header) = header {
        writeln!(writer, "{}", header)?;
    }
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer
        .into_inner()
        .map_err(|e| ProcessingError::Io(e.into_error()))?
        .sync_all()?;
    debug!(path = %path.display(), lines = lines.len(), "work file written");
    Ok(())
}

/// Stable across runs and platforms, unlike `DefaultHasher`.
pub fn partition_for(station_id: &str, partitions: usize) -> usize {
    let hash = station_id
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    (hash % partitions.max(1) as u64) as usize
}

/// `STATION:<id>\t<timestamp>,<pollutant>,<value>`
pub fn part_line(measurement: &Measurement) -> String {
    format!(
        "{}{}{}",
        KeyBuilder::station(&measurement.station_id),
        PART_SEPARATOR,
        measurement.to_intermediate()
    )
}

pub fn parse_part_line(line: &str) -> Result<Measurement> {
    let invalid = || ProcessingError::InvalidFormat(format!("Invalid intermediate line: '{}'", line));
    let (key, payload) = line.split_once(PART_SEPARATOR).ok_or_else(invalid)?;
    match key.parse::<CompositeKey>()? {
        CompositeKey::Station(station_id) => Measurement::from_intermediate(&station_id, payload),
        _ => Err(invalid()),
    }
}

struct ResolutionMapper<'a> {
    header_parser: &'a HeaderParser,
}

impl ResolutionMapper<'_> {
    fn map_metadata(
        &self,
        source: &str,
        content: &str,
        out: &mut dyn Emitter<CompositeKey, ResolutionValue>,
        counters: &mut Counters,
    ) {
        let reader = StationReader::new();
        for (line_no, line) in content.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                counters.incr(Counter::EmptyLinesSkipped);
                continue;
            }
            match reader.parse_station_line(line) {
                Some(station) => {
                    let (key, value) = KeyBuilder::metadata(line_no, station);
                    out.emit(key, value);
                }
                None => {
                    counters.incr(Counter::MalformedMetadataLines);
                    debug!(source, line_no, "skipping malformed metadata line");
                }
            }
        }
    }

    fn map_split(
        &self,
        split: &InputSplit,
        out: &mut dyn Emitter<CompositeKey, ResolutionValue>,
        counters: &mut Counters,
    ) {
        let mut lines = split.lines.iter();

        if split.has_header() {
            let Some(header) = lines.next() else {
                return;
            };
            for (index, column) in self.header_parser.parse_header(header, counters) {
                let (key, value) = KeyBuilder::column_mapping(&split.source, index, column);
                out.emit(key, value);
            }
        }

        for line in lines {
            if line.trim().is_empty() {
                counters.incr(Counter::EmptyLinesSkipped);
                continue;
            }
            let Some(row) = DataRow::parse(line, counters) else {
                continue;
            };
            for (index, value) in row.cells {
                let (key, value) = KeyBuilder::data_cell(&split.source, index, row.timestamp, value);
                out.emit(key, value);
            }
        }
    }
}

impl MapTask for ResolutionMapper<'_> {
    type Input = ResolutionInput;
    type Key = CompositeKey;
    type Value = ResolutionValue;

    fn map(
        &self,
        input: &ResolutionInput,
        out: &mut dyn Emitter<CompositeKey, ResolutionValue>,
        counters: &mut Counters,
    ) -> Result<()> {
        match input {
            ResolutionInput::Metadata { source, content } => {
                self.map_metadata(source, content, out, counters)
            }
            ResolutionInput::Split(split) => self.map_split(split, out, counters),
        }
        Ok(())
    }
}

struct ResolutionReducer;

impl ResolutionReducer {
    fn resolve_station(
        values: Vec<ResolutionValue>,
        out: &mut Vec<ResolvedRecord>,
        counters: &mut Counters,
    ) {
        let rows = values.len() as u64;
        let latest = values
            .into_iter()
            .filter_map(|value| match value {
                ResolutionValue::Metadata { line, station } => Some((line, station)),
                _ => None,
            })
            .max_by_key(|(line, _)| *line);

        if let Some((_, station)) = latest {
            counters.add(Counter::MetadataRowsLoaded, rows);
            counters.add(Counter::DuplicateMetadataRows, rows.saturating_sub(1));
            out.push(ResolvedRecord::Station(station));
        }
    }

    fn resolve_column(
        key: &CompositeKey,
        values: Vec<ResolutionValue>,
        out: &mut Vec<ResolvedRecord>,
        counters: &mut Counters,
    ) {
        let mut mappings: Vec<StationColumn> = Vec::new();
        let mut cells = Vec::new();
        for value in values {
            match value {
                ResolutionValue::Mapping(column) => mappings.push(column),
                ResolutionValue::Cell { timestamp, value } => cells.push((timestamp, value)),
                ResolutionValue::Metadata { .. } => {}
            }
        }

        mappings.sort();
        mappings.dedup();
        if mappings.len() > 1 {
            counters.incr(Counter::ConflictingColumnMappings);
            warn!(column = %key, mappings = mappings.len(), "column has conflicting mappings");
        }

        let Some(column) = mappings.into_iter().next() else {
            counters.add(Counter::UnmappedColumnCells, cells.len() as u64);
            return;
        };

        counters.add(Counter::IntermediateRecordsEmitted, cells.len() as u64);
        out.extend(cells.into_iter().map(|(timestamp, value)| {
            ResolvedRecord::Intermediate(Measurement::new(
                timestamp,
                column.station_id.clone(),
                column.pollutant,
                value,
            ))
        }));
    }
}

impl ReduceTask for ResolutionReducer {
    type Key = CompositeKey;
    type Value = ResolutionValue;
    type Output = ResolvedRecord;

    fn reduce(
        &self,
        key: &CompositeKey,
        values: Vec<ResolutionValue>,
        out: &mut Vec<ResolvedRecord>,
        counters: &mut Counters,
    ) -> Result<()> {
        match key {
            CompositeKey::Station(_) => Self::resolve_station(values, out, counters),
            CompositeKey::Column(_) => Self::resolve_column(key, values, out, counters),
            _ => {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Column resolution received unexpected key {}",
                    key
                )))
            }
        }
        Ok(())
    }
}

/// Phase-2 map step over the contents of one part file.
struct IntermediateMapper;

impl MapTask for IntermediateMapper {
    type Input = String;
    type Key = CompositeKey;
    type Value = Measurement;

    fn map(
        &self,
        content: &String,
        out: &mut dyn Emitter<CompositeKey, Measurement>,
        counters: &mut Counters,
    ) -> Result<()> {
        for line in content.lines() {
            if line.trim().is_empty() {
                counters.incr(Counter::EmptyLinesSkipped);
                continue;
            }
            match parse_part_line(line) {
                Ok(measurement) => {
                    counters.incr(Counter::MeasurementsEmitted);
                    out.emit(
                        KeyBuilder::station_time(&measurement.station_id, &measurement.timestamp),
                        measurement,
                    );
                }
                Err(e) => {
                    counters.incr(Counter::MalformedDataLines);
                    debug!(error = %e, "skipping malformed intermediate line");
                }
            }
        }
        Ok(())
    }
}

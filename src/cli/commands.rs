use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Cli, Commands, OutputFormat};
use crate::config::PipelineConfig;
use crate::engine::{Counters, LocalEngine};
use crate::error::{ProcessingError, Result};
use crate::models::{JoinedRecord, RowLayout};
use crate::processors::{
    MalformedLinePolicy, SinglePhasePipeline, TimeJoinInput, TimeWindowJoiner, TwoPhasePipeline,
};
use crate::readers::{list_csv_files, source_name, HeaderParser, WeatherReader};
use crate::utils::filename::generate_default_output_filename;
use crate::utils::progress::ProgressReporter;
use crate::writers::{write_lines, DelimitedWriter, ParquetWriter};

/// Install the fmt subscriber. `RUST_LOG` wins; otherwise `-v` selects debug.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = fs::File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Pivot {
            input_dir,
            metadata,
            output_file,
            work_dir,
            single_phase,
            format,
            compression,
            layout,
            match_strategy,
            empty_marker,
            max_workers,
            split_lines,
            mmap,
            counters_json,
        } => {
            let mut config = config;
            if let Some(layout) = layout {
                config.layout = layout;
            }
            if let Some(strategy) = match_strategy {
                config.match_strategy = strategy;
            }
            if let Some(marker) = empty_marker {
                config.empty_marker = marker;
            }
            if let Some(workers) = max_workers {
                config = config.with_max_workers(workers);
            }
            if let Some(lines) = split_lines {
                config = config.with_split_lines(lines);
            }
            if mmap {
                config = config.with_mmap(true);
            }
            validator::Validate::validate(&config)?;

            let output_file = output_file.unwrap_or_else(|| generate_default_output_filename(format.extension()));
            let files = list_csv_files(&input_dir)?;
            if files.is_empty() {
                warn!(dir = %input_dir.display(), "no pollutant CSV files found");
                return Ok(());
            }

            println!("Pivoting {} pollutant files...", files.len());
            println!("Metadata: {}", metadata.display());
            println!("Output file: {}", output_file.display());
            println!(
                "Workers: {}, Split lines: {}, Match: {:?}",
                config.max_workers, config.split_lines, config.match_strategy
            );

            let progress = ProgressReporter::new_spinner("Pivoting pollutant data...", false);
            let run_config = config.clone();
            let output = tokio::task::spawn_blocking(move || -> Result<_> {
                if single_phase {
                    SinglePhasePipeline::new(run_config)?.run(&files, &metadata)
                } else {
                    let pipeline = TwoPhasePipeline::new(run_config)?;
                    match work_dir {
                        Some(dir) => pipeline.run(&files, &metadata, &dir),
                        None => {
                            let dir = tempfile::TempDir::new()?;
                            pipeline.run(&files, &metadata, dir.path())
                        }
                    }
                }
            })
            .await??;
            progress.finish_with_message(&format!("Pivoted {} records", output.records.len()));

            write_joined(&output.records, &config, format, &compression, &output_file)?;
            report_counters(&output.counters, counters_json.as_deref())?;
            println!("Processing complete!");
        }

        Commands::JoinWeather {
            pollution,
            weather_dir,
            output_file,
            fail_on_malformed,
            max_workers,
            counters_json,
        } => {
            let policy = if fail_on_malformed {
                MalformedLinePolicy::Fail
            } else {
                config.malformed_lines
            };
            let workers = max_workers.unwrap_or(config.max_workers);
            let output_file = output_file.unwrap_or_else(|| generate_default_output_filename("csv"));

            let pollution_files = if pollution.is_dir() {
                list_csv_files(&pollution)?
            } else {
                vec![pollution]
            };
            println!("Joining {} pollution files with weather in {}", pollution_files.len(), weather_dir.display());

            let progress = ProgressReporter::new_spinner("Joining by hour...", false);
            let reader_config = config.clone();
            let output = tokio::task::spawn_blocking(move || -> Result<_> {
                let reader = reader_config.pollutant_reader();
                let mut inputs = Vec::new();
                for path in &pollution_files {
                    let content = reader.read_content(path)?;
                    inputs.push(TimeJoinInput::Pollution {
                        source: source_name(path),
                        lines: content.lines().map(str::to_string).collect(),
                    });
                }
                for file in WeatherReader::new()?.read_dir(&weather_dir)? {
                    inputs.push(TimeJoinInput::Weather(file));
                }
                TimeWindowJoiner::new(policy)?.run(&LocalEngine::new(workers), &inputs)
            })
            .await??;
            progress.finish_with_message(&format!("Joined {} rows", output.records.len()));

            write_lines(&output.records, &output_file)?;
            report_counters(&output.counters, counters_json.as_deref())?;
            println!("Processing complete!");
        }

        Commands::InspectHeader { file } => {
            let content = config.pollutant_reader().read_content(&file)?;
            let header = content
                .lines()
                .next()
                .ok_or_else(|| ProcessingError::InvalidFormat(format!("{} is empty", file.display())))?;

            let mut counters = Counters::new();
            let columns = HeaderParser::new(&config.pollutants)?.parse_header(header, &mut counters);
            println!("Header of {}:", file.display());
            for (index, column) in &columns {
                println!("  {:>4}  {:<24} {}", index, column.station_id, column.pollutant);
            }
            println!("\n{}", counters.summary());
        }
    }

    Ok(())
}

fn write_joined(
    records: &[JoinedRecord],
    config: &PipelineConfig,
    format: OutputFormat,
    compression: &str,
    path: &Path,
) -> Result<()> {
    if records.is_empty() {
        println!("No records to write");
        return Ok(());
    }

    match format {
        OutputFormat::Csv => {
            let layout = RowLayout::for_kind(config.layout, &config.pollutants);
            DelimitedWriter::new(layout, &config.empty_marker).write_records(records, path)?;
        }
        OutputFormat::Parquet => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            ParquetWriter::new()
                .with_compression(compression)?
                .write_records(records, &config.pollutants, path)?;
        }
    }
    println!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

fn report_counters(counters: &Counters, json_path: Option<&Path>) -> Result<()> {
    println!("\n{}", counters.summary());
    if let Some(path) = json_path {
        let json = serde_json::to_string_pretty(counters)
            .map_err(|e| ProcessingError::InvalidFormat(format!("Counters not serializable: {}", e)))?;
        fs::write(path, json)?;
        info!(path = %path.display(), "counters written");
    }
    Ok(())
}

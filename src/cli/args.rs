use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::models::LayoutKind;
use crate::processors::MatchStrategy;

#[derive(Parser)]
#[command(name = "airquality-processor")]
#[command(about = "Join and pivot air-quality open data with station metadata and weather")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Pipeline configuration file (TOML)")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pivot wide pollutant files into one joined row per station and timestamp
    Pivot {
        #[arg(short, long, help = "Directory of wide pollutant CSV files")]
        input_dir: PathBuf,

        #[arg(short, long, help = "Semicolon-delimited station metadata table")]
        metadata: PathBuf,

        #[arg(
            short,
            long,
            help = "Output file path [default: output/airquality-joined-{YYMMDD}.csv]"
        )]
        output_file: Option<PathBuf>,

        #[arg(long, help = "Keep phase-1 output here instead of a temporary directory")]
        work_dir: Option<PathBuf>,

        #[arg(long, help = "Read whole files and pivot in a single grouping round")]
        single_phase: bool,

        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,

        #[arg(short, long, default_value = "snappy")]
        compression: String,

        #[arg(long, value_enum)]
        layout: Option<LayoutKind>,

        #[arg(long, value_enum)]
        match_strategy: Option<MatchStrategy>,

        #[arg(long, help = "Rendered for pollutants without a reading")]
        empty_marker: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, help = "Lines per input split")]
        split_lines: Option<usize>,

        #[arg(long, help = "Memory-map the pollutant files")]
        mmap: bool,

        #[arg(long, help = "Write counters as JSON to this path")]
        counters_json: Option<PathBuf>,
    },

    /// Join flattened pollution rows with Open-Meteo weather files by hour
    JoinWeather {
        #[arg(short, long, help = "Flattened pollution CSV file or directory")]
        pollution: PathBuf,

        #[arg(short, long, help = "Directory of openmeteo_<stationId>_<year>.csv files")]
        weather_dir: PathBuf,

        #[arg(
            short,
            long,
            help = "Output file path [default: output/airquality-joined-{YYMMDD}.csv]"
        )]
        output_file: Option<PathBuf>,

        #[arg(long, help = "Abort on the first malformed line instead of skipping it")]
        fail_on_malformed: bool,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, help = "Write counters as JSON to this path")]
        counters_json: Option<PathBuf>,
    },

    /// Show the column map a wide file's header resolves to
    InspectHeader {
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pivot() {
        let cli = Cli::try_parse_from([
            "airquality-processor",
            "pivot",
            "-i",
            "data",
            "-m",
            "stations.csv",
            "--layout",
            "tab",
            "--match-strategy",
            "prefix",
            "--single-phase",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Pivot {
                layout,
                match_strategy,
                single_phase,
                format,
                ..
            } => {
                assert_eq!(layout, Some(LayoutKind::Tab));
                assert_eq!(match_strategy, Some(MatchStrategy::Prefix));
                assert!(single_phase);
                assert_eq!(format, OutputFormat::Csv);
            }
            _ => panic!("expected pivot"),
        }
    }
}

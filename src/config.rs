use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use validator::Validate;

use crate::error::Result;
use crate::models::{LayoutKind, PollutantSet};
use crate::processors::{MalformedLinePolicy, MatchStrategy};
use crate::readers::PollutantReader;
use crate::utils::constants::DEFAULT_SPLIT_LINES;

pub const ENV_PREFIX: &str = "AIRQ";

/// Knobs shared by every pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    /// Output pollutant columns, in order
    pub pollutants: PollutantSet,

    /// Rendered in place of a pollutant with no reading
    pub empty_marker: String,

    pub match_strategy: MatchStrategy,

    pub layout: LayoutKind,

    pub malformed_lines: MalformedLinePolicy,

    #[validate(range(min = 1, max = 1024))]
    pub max_workers: usize,

    #[validate(range(min = 1))]
    pub split_lines: usize,

    /// Memory-map pollutant files instead of buffered reads
    pub use_mmap: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pollutants: PollutantSet::default(),
            empty_marker: String::new(),
            match_strategy: MatchStrategy::Exact,
            layout: LayoutKind::Comma,
            malformed_lines: MalformedLinePolicy::Skip,
            max_workers: num_cpus::get(),
            split_lines: DEFAULT_SPLIT_LINES,
            use_mmap: false,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the optional TOML file, then `AIRQ_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&PipelineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("pollutants"),
        );

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(?config, "pipeline configuration loaded");
        Ok(config)
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_split_lines(mut self, split_lines: usize) -> Self {
        self.split_lines = split_lines;
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn pollutant_reader(&self) -> PollutantReader {
        PollutantReader::new()
            .with_split_lines(self.split_lines)
            .with_mmap(self.use_mmap)
    }
}

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, OutputFormat};
pub use commands::{init_logging, run};

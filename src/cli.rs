use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// Verbosity levels selectable on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Command line arguments structure using clap derive macros
#[derive(Parser)]
#[command(name = "shem-trace")]
#[command(about = "Monte Carlo SHeM image simulation")]
pub struct Args {
    /// Simulation parameter file
    #[arg(short, long, default_value = "ray_tracing_parameters.txt")]
    pub config: String,

    /// Set the logging level (defaults to "info")
    #[arg(long, default_value = "info", help = "Set the logging level")]
    pub debug_level: LogLevel,

    /// RNG seed; identical seeds reproduce identical tallies
    #[arg(long, default_value = "1")]
    pub seed: u64,

    /// Override the per-pixel ray count from the parameter file
    #[arg(long)]
    pub rays: Option<u32>,

    /// Directory the count maps are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: String,

    /// Number of worker threads (defaults to all cores)
    #[arg(long)]
    pub threads: Option<usize>,
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "vision-descr")]
#[command(about = "Resumable image description pipeline", long_about = None)]
pub struct Cli {
    /// Alternate configuration file (defaults to ./config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate descriptions for every image not yet described
    DescribeAll,
    /// Show a summary of the output table
    ResumeStats,
    /// Print the resolved configuration
    PrintConfig,
}

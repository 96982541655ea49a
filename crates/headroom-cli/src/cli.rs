use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find the largest extra injection the network tolerates
    Search {
        /// Study document (JSON or YAML)
        study: PathBuf,
        /// Directory holding the case named by the study (defaults to the study's directory)
        #[arg(long)]
        case_dir: Option<PathBuf>,
        /// Report load and generation headroom for every selected bus separately
        #[arg(long)]
        per_bus: bool,
    },
    /// Check a study against its case without solving
    Validate {
        /// Study document (JSON or YAML)
        study: PathBuf,
        #[arg(long)]
        case_dir: Option<PathBuf>,
    },
}

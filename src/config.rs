/*!
 * Configuration handling for simos
 */

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use log::LevelFilter;

use crate::bail;
use crate::error::Result;
use crate::report::ReportFormat;

/// Command-line arguments for simos
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "simos",
    version = env!("CARGO_PKG_VERSION"),
    about = "Educational OS simulator: namespace store + process engine",
    long_about = "Runs simulated processes whose system calls operate on an in-memory hierarchical file store, or explores that store through an interactive shell."
)]
pub struct Args {
    /// Log level used when RUST_LOG is not set
    #[clap(long, global = true, default_value_t = LevelFilter::Warn)]
    pub log_level: LevelFilter,

    #[clap(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive shell over the namespace store
    Shell {
        /// Namespace state file to load at start (if it exists)
        #[clap(long)]
        state: Option<String>,
    },

    /// Run a workload against the namespace store
    Run {
        /// Workload JSON file (defaults to the built-in demo)
        #[clap(long)]
        workload: Option<String>,

        /// Namespace state file to load before running
        #[clap(long)]
        state: Option<String>,

        /// Where to save the namespace after the run
        #[clap(long, default_value = "fs_state_after.json")]
        save: String,

        /// Print the event trace
        #[clap(long)]
        trace: bool,

        /// Report format
        #[clap(long, value_enum, default_value_t = ReportFormat::ConsoleTable)]
        format: ReportFormat,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[clap(value_enum)]
        shell: Shell,
    },
}

/// What the binary should do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Interactive shell
    Shell,
    /// Workload run
    Run {
        /// Workload file, None for the built-in demo
        workload: Option<PathBuf>,
        /// Save destination
        save: PathBuf,
        /// Print the trace
        trace: bool,
        /// Report format
        format: ReportFormat,
    },
    /// Print completions for a shell
    Completions(Shell),
}

/// Application configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Selected mode
    pub mode: Mode,

    /// Namespace state to load before starting
    pub state_file: Option<PathBuf>,

    /// Whether a missing state file is an error (explicit for `run`,
    /// optional for `shell`)
    pub require_state: bool,

    /// Default log filter
    pub log_level: LevelFilter,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Self {
        let log_level = args.log_level;
        match args.command {
            Command::Shell { state } => Self {
                mode: Mode::Shell,
                state_file: state.map(PathBuf::from),
                require_state: false,
                log_level,
            },
            Command::Run {
                workload,
                state,
                save,
                trace,
                format,
            } => Self {
                mode: Mode::Run {
                    workload: workload.map(PathBuf::from),
                    save: PathBuf::from(save),
                    trace,
                    format,
                },
                state_file: state.map(PathBuf::from),
                require_state: true,
                log_level,
            },
            Command::Completions { shell } => Self {
                mode: Mode::Completions(shell),
                state_file: None,
                require_state: false,
                log_level,
            },
        }
    }

    /// State file to load, if one was given and exists (or is required)
    pub fn state_to_load(&self) -> Option<&Path> {
        self.state_file
            .as_deref()
            .filter(|path| self.require_state || path.exists())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.require_state {
            if let Some(path) = &self.state_file {
                if !path.is_file() {
                    bail!(Config, "State file not found: {}", path.display());
                }
            }
        }

        if let Mode::Run { workload, save, .. } = &self.mode {
            if let Some(path) = workload {
                if !path.is_file() {
                    bail!(Config, "Workload file not found: {}", path.display());
                }
            }

            // Check if save destination directory exists
            if let Some(parent) = save.parent() {
                if !parent.exists() && parent != Path::new("") {
                    bail!(Config, "Output directory not found: {}", parent.display());
                }
            }
        }

        Ok(())
    }
}

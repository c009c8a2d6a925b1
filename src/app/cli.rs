//! Command line interface definition
//!
//! Global flags cover logging and configuration discovery; subcommands map
//! onto the service operations (submit-and-stream, cancellation, identity).

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "repolens")]
#[command(about = "AI-assisted repository analysis service")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(long = "log-level", value_name = "LEVEL", global = true,
          value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", global = true,
          value_parser = ["text", "detailed"])]
    pub log_format: Option<String>,

    /// Log file path (default: stderr)
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (repeatable)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Submit a repository for analysis and stream progress until it settles
    Scan {
        /// Repository URL (https://github.com/..., gitlab.com, bitbucket.org)
        url: String,

        /// Act as this authenticated subject instead of an anonymous caller
        #[arg(long = "as-user", value_name = "SUBJECT")]
        as_user: Option<String>,

        /// Client IP to derive the anonymous identity from
        #[arg(long = "ip", value_name = "ADDR", conflicts_with = "as_user")]
        ip: Option<String>,

        /// Request cancellation once reported progress reaches this percentage
        #[arg(long = "cancel-at", value_name = "PCT")]
        cancel_at: Option<u8>,
    },

    /// Print the stable anonymous identifier the service derives for a caller
    Whoami {
        /// Client IP to derive the anonymous identity from
        #[arg(long = "ip", value_name = "ADDR")]
        ip: Option<String>,
    },
}

impl Cli {
    /// Net verbosity from repeated -v / -q flags
    pub fn verbosity(&self) -> i8 {
        self.verbose as i8 - self.quiet as i8
    }
}

//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Combine weighted optimization responses and report them per iteration
#[derive(Parser, Debug)]
#[command(name = "respcomb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Run directory for report and local config (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub run_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the dependency graph of combined objectives
    Tree {
        /// Optimization settings (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        settings: PathBuf,
    },

    /// List responses evaluated by the internal analyzer
    Internal {
        /// Optimization settings (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        settings: PathBuf,
    },

    /// Run the optimization iterations against recorded responses
    Run {
        /// Optimization settings (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        settings: PathBuf,

        /// Recorded responses per iteration (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        replay: PathBuf,

        /// Number of iterations (default: all recorded)
        #[arg(short = 'n', long)]
        iterations: Option<usize>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,

    /// Print a commented configuration template
    Template,
}

//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::document::{ExportFormat, System};

/// Stavelive live-preview session CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: stavelive.toml)
    #[arg(short = 'C', long, default_value = "stavelive.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Override the render service base URL
    #[arg(short = 'u', long = "service-url", global = true, value_hint = clap::ValueHint::Url)]
    pub service_url: Option<String>,

    /// Enable verbose output for debugging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a live preview session against a notation file
    #[command(visible_alias = "s")]
    Session {
        /// Notation file to watch (the editing surface of the session)
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Notation system to parse under (overrides config)
        #[arg(short, long)]
        system: Option<System>,

        /// Keep session state in memory only (no store file)
        #[arg(long)]
        no_persist: bool,
    },

    /// Render a notation file once and print its artifacts as JSON
    #[command(visible_alias = "r")]
    Render {
        /// Notation file to render
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Notation system to parse under (overrides config)
        #[arg(short, long)]
        system: Option<System>,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Write output to file instead of stdout
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Export a notation file to a target format via the service
    #[command(visible_alias = "e")]
    Export {
        /// Notation file to export
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Target format
        #[arg(short, long, value_enum)]
        format: ExportFormat,

        /// Notation system to parse under (overrides config)
        #[arg(short, long)]
        system: Option<System>,

        /// Write output to file instead of stdout
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
}

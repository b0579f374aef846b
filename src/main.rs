//! Stavelive - live preview session engine for plain-text music notation.

#![allow(dead_code)]

mod cache;
mod cli;
mod config;
mod core;
mod document;
mod engine;
mod logger;
mod remote;
mod schedule;
mod session;
mod views;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::StudioConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = StudioConfig::load(&cli)?;

    match &cli.command {
        Commands::Session {
            file,
            system,
            no_persist,
        } => cli::session::run(file, *system, *no_persist, &config),
        Commands::Render {
            file,
            system,
            pretty,
            output,
        } => cli::render::run(file, *system, *pretty, output.as_deref(), &config),
        Commands::Export {
            file,
            format,
            system,
            output,
        } => cli::export::run(file, *format, *system, output.as_deref(), &config),
    }
}

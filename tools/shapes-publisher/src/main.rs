// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! shapes-publisher - Publish a moving shape
//!
//! Writes one shape instance along a sine sweep once per second, then disposes
//! it when the sample count is reached or Ctrl+C is pressed.
//!
//! # Usage
//!
//! ```bash
//! # Publish a blue square on domain 0 until interrupted
//! shapes-publisher
//!
//! # 20 red samples on domain 3
//! shapes-publisher -d 3 -c RED -s 20
//!
//! # Using a config file, flags still win
//! shapes-publisher --config shapes.toml --color GREEN
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use shapes_core::config::verbosity_directive;
use shapes_core::{
    PublisherSession, ShapeTransport, ShapesConfig, ShutdownToken, Topic, UdpTransport,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shapes-publisher")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish a moving shape on a shapes topic")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// DDS domain ID (0-232)
    #[arg(short, long)]
    domain: Option<u32>,

    /// Number of samples to write (default: until Ctrl+C)
    #[arg(short, long)]
    sample_count: Option<u64>,

    /// Shape color, the instance key
    #[arg(short, long)]
    color: Option<String>,

    /// Topic name
    #[arg(short, long)]
    topic: Option<String>,

    /// Milliseconds between two writes
    #[arg(long)]
    period_ms: Option<u64>,

    /// Log verbosity: 0 off, 1 error, 2 warn, 3 info, 4 debug, 5 trace
    #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(u8).range(0..=5))]
    verbosity: u8,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "shapes.toml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbosity
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_directive(cli.verbosity)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::GenConfig { output }) = &cli.command {
        ShapesConfig::write_example(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Example configuration written to {}", output.display());
        return Ok(());
    }

    let config = build_config(&cli)?;

    let shutdown = ShutdownToken::new();
    let handler = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down...");
        handler.trigger();
    })
    .context("Failed to install Ctrl+C handler")?;

    let transport = UdpTransport::new(config.domain_id, config.udp.clone())
        .context("Failed to create transport")?;
    let writer = transport
        .create_writer(&Topic::new(config.topic.as_str()))
        .context("Failed to create writer")?;

    let report = PublisherSession::new(writer, config.publisher_config(), shutdown).run()?;
    tracing::info!(
        samples_written = report.samples_written,
        reason = %report.stop_reason,
        "Done"
    );
    Ok(())
}

/// File values (or defaults), then command-line overrides.
fn build_config(cli: &Cli) -> Result<ShapesConfig> {
    let mut config = match &cli.config {
        Some(path) => ShapesConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ShapesConfig::default(),
    };

    if let Some(domain) = cli.domain {
        config.domain_id = domain;
    }
    if let Some(topic) = &cli.topic {
        config.topic = topic.clone();
    }
    if let Some(color) = &cli.color {
        config.publisher.color = color.clone();
    }
    if let Some(count) = cli.sample_count {
        config.publisher.sample_count = Some(count);
    }
    if let Some(period_ms) = cli.period_ms {
        config.publisher.period_ms = period_ms;
    }

    config.validate()?;
    Ok(config)
}

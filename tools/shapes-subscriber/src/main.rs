// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! shapes-subscriber - Display received shapes in the terminal
//!
//! One row per known color shows the latest sample of that instance; the
//! bottom of the screen keeps the last lifecycle messages (disposed, writer
//! gone). Diagnostics go to stderr so they do not scribble over the display.
//!
//! # Usage
//!
//! ```bash
//! # Follow domain 0 until interrupted
//! shapes-subscriber
//!
//! # Stop after 50 samples, debug logs to a file
//! shapes-subscriber -s 50 -v 4 2> subscriber.log
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use shapes_core::config::verbosity_directive;
use shapes_core::{
    ShapeTransport, ShapesConfig, ShutdownToken, SubscriberSession, TerminalSink, Topic,
    UdpTransport,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shapes-subscriber")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Display shapes received on a shapes topic")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// DDS domain ID (0-232)
    #[arg(short, long)]
    domain: Option<u32>,

    /// Number of samples to read (default: until Ctrl+C)
    #[arg(short, long)]
    sample_count: Option<u64>,

    /// Topic name
    #[arg(short, long)]
    topic: Option<String>,

    /// Log verbosity: 0 off, 1 error, 2 warn, 3 info, 4 debug, 5 trace
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u8).range(0..=5))]
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
        .with_writer(std::io::stderr)
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
    let reader = transport
        .create_reader(&Topic::new(config.topic.as_str()))
        .context("Failed to create reader")?;

    let sink = TerminalSink::new(std::io::stdout(), config.subscriber.log_depth)
        .context("Failed to initialize terminal")?;
    let mut session = SubscriberSession::new(reader, sink, config.subscriber_config(), shutdown);
    let result = session.run();
    // Restore the terminal before anything else is printed.
    drop(session);

    let report = result?;
    tracing::info!(
        samples_read = report.samples_read,
        lifecycle_events = report.lifecycle_events,
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
    if let Some(count) = cli.sample_count {
        config.subscriber.sample_count = Some(count);
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["shapes-subscriber"]).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(cli.verbosity, 1);
        assert_eq!(config.domain_id, 0);
        assert_eq!(config.subscriber.sample_count, None);
        assert_eq!(config.subscriber_config().topic, "Square");
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "domain_id = 2\ntopic = \"Triangle\"\n[subscriber]\nsample_count = 10"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli =
            Cli::try_parse_from(["shapes-subscriber", "--config", &path, "-s", "99"]).unwrap();
        let config = build_config(&cli).unwrap();

        assert_eq!(config.domain_id, 2);
        assert_eq!(config.topic, "Triangle");
        assert_eq!(config.subscriber.sample_count, Some(99));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from([
            "shapes-subscriber",
            "--config",
            "/nonexistent/shapes.toml",
        ])
        .unwrap();
        let err = build_config(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load"));
    }
}

// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use qrscan::config::Config;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qrscan")]
#[command(about = "Scan a QR code from a camera or a still image")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Decode a QR code from an image file
    Image {
        /// Image file path (opens a file picker when omitted)
        path: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qrscan=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Image { path }) => cli::decode_image(path),
        None => qrscan::terminal::run(Config::load()),
    }
}

//! PhotoTour CLI - headless playback and inspection of photo routes.

mod commands;
mod error;
mod render;

use clap::{Parser, Subcommand};

use commands::{inspect, play};
use error::CliError;

#[derive(Debug, Parser)]
#[command(
    name = "phototour",
    version,
    about = "Animate a marker along a route of photo locations"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write logs to a daily-rolled file instead of stderr
    #[arg(long, global = true)]
    log_to_file: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play the tour headless, narrating playback to the log
    Play(play::PlayArgs),
    /// Print route statistics without playing
    Inspect(inspect::InspectArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_dir = cli.log_to_file.then(default_log_dir).flatten();
    if let Some(dir) = &log_dir {
        let _ = std::fs::create_dir_all(dir);
    }
    // Guard must live for the duration of the process for file logging
    let _log_guard = phototour::telemetry::init_logging(log_dir.as_deref());

    let result = match cli.command {
        Command::Play(args) => play::run(args).await,
        Command::Inspect(args) => inspect::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn default_log_dir() -> Option<std::path::PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("phototour").join("logs"))
}
